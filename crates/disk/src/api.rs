//! Yandex Disk REST API payloads
//!
//! Only the fields ya-backup reads are modelled; everything else in the
//! responses is ignored.

use reqwest::StatusCode;
use serde::Deserialize;

use yb_core::{Error, ResourceInfo};

/// Prefix the API puts in front of every path on the user's disk
const DISK_SCHEME: &str = "disk:";

/// A file or directory as returned by `GET /v1/disk/resources`
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResource {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub modified: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(rename = "_embedded", default)]
    pub embedded: Option<ApiResourceList>,
}

/// One page of directory children
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResourceList {
    #[serde(default)]
    pub items: Vec<ApiResource>,
    #[serde(default)]
    pub total: Option<usize>,
}

/// Response of `GET /v1/disk/resources/upload`
#[derive(Debug, Clone, Deserialize)]
pub struct UploadLink {
    pub href: String,
    #[serde(default)]
    pub method: Option<String>,
}

/// Error body the API returns with non-2xx statuses
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub description: String,
}

impl ApiError {
    /// Parse an error body, tolerating bodies that are not JSON
    pub fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_else(|_| Self {
            description: body.trim().to_string(),
            ..Default::default()
        })
    }

    fn text(&self) -> &str {
        [&self.message, &self.description, &self.error]
            .into_iter()
            .find(|s| !s.is_empty())
            .map(String::as_str)
            .unwrap_or("no details")
    }
}

/// Error code the API uses when creating a directory that already exists
pub const DIR_EXISTS: &str = "DiskPathPointsToExistentDirectoryError";

/// Map a failed response to an error
pub fn status_error(status: StatusCode, body: &ApiError, path: &str) -> Error {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Error::Auth(format!("{status}: {}", body.text()))
        }
        StatusCode::NOT_FOUND => Error::NotFound(path.to_string()),
        _ => Error::Network(format!("{path}: {status}: {}", body.text())),
    }
}

/// Strip the `disk:` scheme from an API path
pub fn local_path(api_path: &str) -> String {
    let path = api_path.strip_prefix(DISK_SCHEME).unwrap_or(api_path);
    yb_core::path::join(&[path])
}

impl ApiResource {
    /// Convert into the storage-neutral representation
    pub fn into_info(self) -> ResourceInfo {
        let path = local_path(&self.path);
        let mut info = match self.kind.as_str() {
            "dir" => ResourceInfo::dir(path),
            _ => ResourceInfo::file(path, self.size.unwrap_or(0)),
        };
        info.name = self.name;
        info.modified = self.modified.as_deref().and_then(|m| m.parse().ok());
        if let Some(list) = self.embedded {
            info.children = list.items.into_iter().map(ApiResource::into_info).collect();
        }
        info
    }
}
