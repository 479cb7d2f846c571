//! In-memory RemoteStore used by unit tests

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use jiff::Timestamp;

use crate::error::{Error, Result};
use crate::path::join;
use crate::traits::{Lookup, RemoteStore, ResourceInfo, ResourceKind, SortField, SortKey};

/// A call received by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Lookup(String),
    CreateDir(String),
    Delete(String),
    Upload {
        local: String,
        remote: String,
        overwrite: bool,
    },
}

#[derive(Debug, Clone)]
struct Node {
    kind: ResourceKind,
    modified: Timestamp,
    size: u64,
}

#[derive(Debug, Default)]
struct Inner {
    nodes: BTreeMap<String, Node>,
    calls: Vec<Call>,
    clock: i64,
    failing_uploads: HashSet<String>,
    offline: bool,
}

/// Remote file tree held in memory
#[derive(Debug)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// A store containing only the root directory
    pub fn new() -> Self {
        let store = Self {
            inner: Mutex::new(Inner {
                clock: 1_700_000_000,
                ..Default::default()
            }),
        };
        store.put("/", ResourceKind::Dir, 0);
        store
    }

    /// Add a directory; modification times increase with every insert
    pub fn add_dir(&self, path: &str) -> &Self {
        self.put(path, ResourceKind::Dir, 0);
        self
    }

    pub fn add_file(&self, path: &str, size: u64) -> &Self {
        self.put(path, ResourceKind::File, size);
        self
    }

    /// Add a file with an explicit modification time
    pub fn add_file_at(&self, path: &str, seconds: i64) -> &Self {
        let mut inner = self.inner.lock().unwrap();
        inner.nodes.insert(
            join(&[path]),
            Node {
                kind: ResourceKind::File,
                modified: Timestamp::from_second(seconds).unwrap(),
                size: 1,
            },
        );
        self
    }

    /// Make uploads to `remote` fail as if no upload target was granted
    pub fn fail_upload(&self, remote: &str) {
        self.inner
            .lock()
            .unwrap()
            .failing_uploads
            .insert(join(&[remote]));
    }

    /// Make every call fail with a transport error
    pub fn go_offline(&self) {
        self.inner.lock().unwrap().offline = true;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn uploads(&self) -> Vec<(String, bool)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Upload {
                    remote, overwrite, ..
                } => Some((remote, overwrite)),
                _ => None,
            })
            .collect()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Delete(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn created_dirs(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::CreateDir(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.inner.lock().unwrap().nodes.contains_key(&join(&[path]))
    }

    /// Names directly below `dir`
    pub fn names_in(&self, dir: &str) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        children_of(&inner.nodes, &join(&[dir]))
            .into_iter()
            .map(|(path, _)| path.rsplit('/').next().unwrap_or_default().to_string())
            .collect()
    }

    fn put(&self, path: &str, kind: ResourceKind, size: u64) {
        let mut inner = self.inner.lock().unwrap();
        inner.clock += 60;
        let modified = Timestamp::from_second(inner.clock).unwrap();
        inner.nodes.insert(
            join(&[path]),
            Node {
                kind,
                modified,
                size,
            },
        );
    }
}

fn parent_of(path: &str) -> String {
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(pos) => path[..pos].to_string(),
    }
}

fn children_of<'a>(nodes: &'a BTreeMap<String, Node>, dir: &str) -> Vec<(&'a String, &'a Node)> {
    nodes
        .iter()
        .filter(|(p, _)| p.as_str() != "/" && parent_of(p) == dir)
        .collect()
}

fn info(path: &str, node: &Node) -> ResourceInfo {
    let info = match node.kind {
        ResourceKind::Dir => ResourceInfo::dir(path),
        ResourceKind::File => ResourceInfo::file(path, node.size),
    };
    info.modified_at(node.modified)
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn lookup(&self, path: &str, sort: Option<SortKey>) -> Result<Lookup> {
        let mut inner = self.inner.lock().unwrap();
        if inner.offline {
            return Err(Error::Network("store is offline".into()));
        }
        inner.calls.push(Call::Lookup(path.to_string()));

        let Some(node) = inner.nodes.get(path) else {
            return Ok(Lookup::NotFound);
        };
        let mut found = info(path, node);
        if node.kind == ResourceKind::Dir {
            let mut children: Vec<ResourceInfo> = children_of(&inner.nodes, path)
                .into_iter()
                .map(|(p, n)| info(p, n))
                .collect();
            if let Some(key) = sort {
                match key.field {
                    SortField::Modified => children.sort_by_key(|c| c.modified),
                    _ => children.sort_by(|a, b| a.name.cmp(&b.name)),
                }
                if key.descending {
                    children.reverse();
                }
            }
            found.children = children;
        }
        Ok(Lookup::Found(found))
    }

    async fn create_dir(&self, path: &str) -> Result<()> {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.offline {
                return Err(Error::Network("store is offline".into()));
            }
            inner.calls.push(Call::CreateDir(path.to_string()));
            if !inner.nodes.contains_key(&parent_of(path)) {
                return Err(Error::Network(format!("409 parent of {path} missing")));
            }
        }
        self.put(path, ResourceKind::Dir, 0);
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.offline {
            return Err(Error::Network("store is offline".into()));
        }
        inner.calls.push(Call::Delete(path.to_string()));
        let below = format!("{path}/");
        inner
            .nodes
            .retain(|p, _| p.as_str() != path && !p.starts_with(&below));
        Ok(())
    }

    async fn upload(&self, local: &Path, remote_path: &str, overwrite: bool) -> Result<()> {
        let size = std::fs::metadata(local)?.len();
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.offline {
                return Err(Error::Network("store is offline".into()));
            }
            inner.calls.push(Call::Upload {
                local: local.to_string_lossy().into_owned(),
                remote: remote_path.to_string(),
                overwrite,
            });
            let parent_is_dir = inner
                .nodes
                .get(&parent_of(remote_path))
                .is_some_and(|n| n.kind == ResourceKind::Dir);
            let blocked = inner.failing_uploads.contains(remote_path)
                || (!overwrite && inner.nodes.contains_key(remote_path));
            if !parent_is_dir || blocked {
                return Err(Error::UploadTarget(remote_path.to_string()));
            }
        }
        self.put(remote_path, ResourceKind::File, size);
        Ok(())
    }
}
