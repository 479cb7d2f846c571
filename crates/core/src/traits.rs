//! RemoteStore trait definition
//!
//! This trait defines the interface for a remote hierarchical file store.
//! It keeps the backup logic decoupled from the HTTP adapter.

use std::path::Path;

use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Kind of a remote resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    File,
    Dir,
}

/// Metadata for a remote file or directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceInfo {
    /// Final path component
    pub name: String,

    /// Absolute remote path
    pub path: String,

    /// File or directory
    pub kind: ResourceKind,

    /// Last modification time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<Timestamp>,

    /// Size in bytes (files only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,

    /// Human-readable size
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_human: Option<String>,

    /// Children of a directory, in the order the remote returned them
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ResourceInfo>,
}

impl ResourceInfo {
    /// Create a new ResourceInfo for a file
    pub fn file(path: impl Into<String>, size: u64) -> Self {
        let path = path.into();
        Self {
            name: name_of(&path),
            path,
            kind: ResourceKind::File,
            modified: None,
            size_bytes: Some(size),
            size_human: Some(humansize::format_size(size, humansize::BINARY)),
            children: Vec::new(),
        }
    }

    /// Create a new ResourceInfo for a directory
    pub fn dir(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            name: name_of(&path),
            path,
            kind: ResourceKind::Dir,
            modified: None,
            size_bytes: None,
            size_human: None,
            children: Vec::new(),
        }
    }

    /// Set the modification time
    pub fn modified_at(mut self, ts: Timestamp) -> Self {
        self.modified = Some(ts);
        self
    }

    pub fn is_dir(&self) -> bool {
        self.kind == ResourceKind::Dir
    }

    pub fn is_file(&self) -> bool {
        self.kind == ResourceKind::File
    }
}

fn name_of(path: &str) -> String {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Outcome of a metadata lookup that reached the remote
///
/// Transport failures are reported through `Err`, never as `NotFound`.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Found(ResourceInfo),
    NotFound,
}

impl Lookup {
    pub fn found(&self) -> Option<&ResourceInfo> {
        match self {
            Lookup::Found(info) => Some(info),
            Lookup::NotFound => None,
        }
    }

    pub fn into_found(self) -> Option<ResourceInfo> {
        match self {
            Lookup::Found(info) => Some(info),
            Lookup::NotFound => None,
        }
    }
}

/// Field a directory listing is sorted by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortField {
    Name,
    Path,
    Created,
    Modified,
    Size,
}

/// Sort order requested from the remote for directory listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SortKey {
    pub field: SortField,
    pub descending: bool,
}

impl SortKey {
    /// Most recently modified first
    pub const fn newest_first() -> Self {
        Self {
            field: SortField::Modified,
            descending: true,
        }
    }

    /// Query-string form, `-` marks descending order
    pub fn as_query(&self) -> String {
        let field = match self.field {
            SortField::Name => "name",
            SortField::Path => "path",
            SortField::Created => "created",
            SortField::Modified => "modified",
            SortField::Size => "size",
        };
        if self.descending {
            format!("-{field}")
        } else {
            field.to_string()
        }
    }
}

/// Trait for remote hierarchical storage operations
///
/// This trait is implemented by the Yandex Disk adapter and can be mocked for testing.
/// Every call completes before it returns; callers issue them one at a time.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch metadata for `path`, with children sorted by `sort` when it is a directory
    async fn lookup(&self, path: &str, sort: Option<SortKey>) -> Result<Lookup>;

    /// Create a directory
    async fn create_dir(&self, path: &str) -> Result<()>;

    /// Delete a file or a directory recursively
    async fn delete(&self, path: &str) -> Result<()>;

    /// Upload a local file to `remote_path`
    async fn upload(&self, local: &Path, remote_path: &str, overwrite: bool) -> Result<()>;
}
