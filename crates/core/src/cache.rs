//! Run-scoped view of a RemoteStore with memoized metadata lookups
//!
//! A `RemoteFs` is created at the start of a run and dropped at its end, so
//! cached metadata never outlives the run. Writes issued through it evict the
//! entries they could have made stale.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use crate::error::Result;
use crate::path::{DELIMITER, join};
use crate::traits::{Lookup, RemoteStore, ResourceInfo, SortKey};

type CacheKey = (String, Option<SortKey>);

/// Memoizing wrapper around a RemoteStore
pub struct RemoteFs<'a> {
    store: &'a dyn RemoteStore,
    cache: Mutex<HashMap<CacheKey, Lookup>>,
}

impl<'a> RemoteFs<'a> {
    pub fn new(store: &'a dyn RemoteStore) -> Self {
        Self {
            store,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Metadata for `path`, served from the cache when possible
    pub async fn lookup(&self, path: &str, sort: Option<SortKey>) -> Result<Lookup> {
        let key = (join(&[path]), sort);
        let cached = self.cache_guard().get(&key).cloned();
        if let Some(hit) = cached {
            tracing::debug!(path = %key.0, "metadata cache hit");
            return Ok(hit);
        }

        let lookup = self.store.lookup(&key.0, sort).await?;
        self.cache_guard().insert(key, lookup.clone());
        Ok(lookup)
    }

    pub async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.lookup(path, None).await?.found().is_some())
    }

    pub async fn is_dir(&self, path: &str) -> Result<bool> {
        let lookup = self.lookup(path, None).await?;
        Ok(lookup.found().is_some_and(ResourceInfo::is_dir))
    }

    pub async fn is_file(&self, path: &str) -> Result<bool> {
        let lookup = self.lookup(path, None).await?;
        Ok(lookup.found().is_some_and(ResourceInfo::is_file))
    }

    /// Children of `path` in remote order; empty if `path` is not a directory
    pub async fn list_children(
        &self,
        path: &str,
        sort: Option<SortKey>,
    ) -> Result<Vec<ResourceInfo>> {
        if !self.is_dir(path).await? {
            return Ok(Vec::new());
        }
        Ok(self
            .lookup(path, sort)
            .await?
            .into_found()
            .map(|info| info.children)
            .unwrap_or_default())
    }

    pub async fn create_dir(&self, path: &str) -> Result<()> {
        self.store.create_dir(path).await?;
        self.invalidate(path);
        Ok(())
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        self.store.delete(path).await?;
        self.invalidate(path);
        Ok(())
    }

    pub async fn upload(&self, local: &Path, remote_path: &str, overwrite: bool) -> Result<()> {
        let result = self.store.upload(local, remote_path, overwrite).await;
        // A failed upload may still have created the resource
        self.invalidate(remote_path);
        result
    }

    /// Drop cached entries for `path`, everything below it and its parent
    pub fn invalidate(&self, path: &str) {
        let path = join(&[path]);
        let below = format!("{path}{DELIMITER}");
        let parent = match path.rfind(DELIMITER) {
            Some(0) | None => DELIMITER.to_string(),
            Some(pos) => path[..pos].to_string(),
        };
        self.cache_guard()
            .retain(|(p, _), _| *p != path && *p != parent && !p.starts_with(&below));
    }

    /// Number of cached lookups
    pub fn cached(&self) -> usize {
        self.cache_guard().len()
    }

    fn cache_guard(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, Lookup>> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::MockRemoteStore;
    use crate::Error;

    #[tokio::test]
    async fn test_lookup_is_memoized() {
        let mut store = MockRemoteStore::new();
        store
            .expect_lookup()
            .times(1)
            .returning(|path, _| Ok(Lookup::Found(ResourceInfo::dir(path))));

        let fs = RemoteFs::new(&store);
        assert!(fs.is_dir("/backups").await.unwrap());
        assert!(fs.exists("/backups/").await.unwrap());
        assert!(!fs.is_file("backups").await.unwrap());
        assert_eq!(fs.cached(), 1);
    }

    #[tokio::test]
    async fn test_sort_key_is_part_of_cache_key() {
        let mut store = MockRemoteStore::new();
        store
            .expect_lookup()
            .times(2)
            .returning(|path, _| Ok(Lookup::Found(ResourceInfo::dir(path))));

        let fs = RemoteFs::new(&store);
        fs.lookup("/a", None).await.unwrap();
        fs.lookup("/a", Some(SortKey::newest_first())).await.unwrap();
        fs.lookup("/a", Some(SortKey::newest_first())).await.unwrap();
        assert_eq!(fs.cached(), 2);
    }

    #[tokio::test]
    async fn test_create_dir_evicts_entry() {
        let mut store = MockRemoteStore::new();
        let mut seq = mockall::Sequence::new();
        store
            .expect_lookup()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(Lookup::NotFound));
        store
            .expect_create_dir()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        store
            .expect_lookup()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|path, _| Ok(Lookup::Found(ResourceInfo::dir(path))));

        let fs = RemoteFs::new(&store);
        assert!(!fs.is_dir("/a/b").await.unwrap());
        fs.create_dir("/a/b").await.unwrap();
        assert!(fs.is_dir("/a/b").await.unwrap());
    }

    #[tokio::test]
    async fn test_transport_error_is_not_cached() {
        let mut store = MockRemoteStore::new();
        let mut seq = mockall::Sequence::new();
        store
            .expect_lookup()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(Error::Network("connection reset".into())));
        store
            .expect_lookup()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(Lookup::NotFound));

        let fs = RemoteFs::new(&store);
        assert!(matches!(fs.exists("/a").await, Err(Error::Network(_))));
        assert!(!fs.exists("/a").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_children_of_missing_dir() {
        let mut store = MockRemoteStore::new();
        store
            .expect_lookup()
            .times(1)
            .returning(|_, _| Ok(Lookup::NotFound));

        let fs = RemoteFs::new(&store);
        let children = fs
            .list_children("/missing", Some(SortKey::newest_first()))
            .await
            .unwrap();
        assert!(children.is_empty());
    }

    #[test]
    fn test_invalidate_scope() {
        let store = MockRemoteStore::new();
        let fs = RemoteFs::new(&store);
        {
            let mut cache = fs.cache_guard();
            for p in ["/", "/a", "/a/b", "/a/b/c", "/a/bc", "/x"] {
                cache.insert((p.to_string(), None), Lookup::NotFound);
            }
        }
        fs.invalidate("/a/b/");

        let mut left: Vec<String> = fs.cache_guard().keys().map(|(p, _)| p.clone()).collect();
        left.sort();
        assert_eq!(left, vec!["/", "/a/bc", "/x"]);
    }
}
