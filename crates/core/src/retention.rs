//! Retention of old backups
//!
//! Keeps the `retain` most recently modified entries whose name passes a
//! filter (a plain prefix, or a target's backup name pattern) and deletes the
//! rest. Ordering comes from the remote listing; equal
//! modification times keep whatever order the remote returned.

use serde::Serialize;

use crate::cache::RemoteFs;
use crate::error::Result;
use crate::path::join;
use crate::traits::{ResourceInfo, SortKey};

/// Entries to keep and to delete at one location
#[derive(Debug, Clone, Default, Serialize)]
pub struct PrunePlan {
    pub location: String,
    pub keep: Vec<String>,
    pub delete: Vec<String>,
}

/// Outcome of a prune
#[derive(Debug, Clone, Default, Serialize)]
pub struct PruneReport {
    pub location: String,
    pub kept: Vec<String>,
    pub deleted: Vec<String>,
}

/// Filter for names starting with `prefix`; an empty prefix matches everything
pub fn has_prefix(prefix: &str) -> impl Fn(&str) -> bool + '_ {
    move |name: &str| prefix.is_empty() || name.starts_with(prefix)
}

/// Split a newest-first listing into names to keep and names to delete
pub fn select(
    entries: &[ResourceInfo],
    retain: usize,
    is_backup: impl Fn(&str) -> bool,
) -> (Vec<String>, Vec<String>) {
    let matching: Vec<&str> = entries
        .iter()
        .map(|e| e.name.as_str())
        .filter(|name| is_backup(*name))
        .collect();
    let split = retain.min(matching.len());
    let (keep, delete) = matching.split_at(split);
    (
        keep.iter().map(|s| s.to_string()).collect(),
        delete.iter().map(|s| s.to_string()).collect(),
    )
}

/// Deletes all but the most recent backups at a location
pub struct RetentionManager<'a> {
    fs: &'a RemoteFs<'a>,
}

impl<'a> RetentionManager<'a> {
    pub fn new(fs: &'a RemoteFs<'a>) -> Self {
        Self { fs }
    }

    /// Work out what `prune` would delete, without deleting anything
    pub async fn plan(&self, retain: usize, location: &str, prefix: &str) -> Result<PrunePlan> {
        self.plan_matching(retain, location, has_prefix(prefix)).await
    }

    /// Like `plan`, for the names accepted by `is_backup`
    pub async fn plan_matching(
        &self,
        retain: usize,
        location: &str,
        is_backup: impl Fn(&str) -> bool,
    ) -> Result<PrunePlan> {
        let location = join(&[location]);
        let entries = self
            .fs
            .list_children(&location, Some(SortKey::newest_first()))
            .await?;
        let (keep, delete) = select(&entries, retain, is_backup);
        Ok(PrunePlan {
            location,
            keep,
            delete,
        })
    }

    /// Keep the `retain` newest entries starting with `prefix`, delete the others
    ///
    /// An empty `prefix` matches every entry. An empty or missing location is
    /// not an error.
    pub async fn prune(&self, retain: usize, location: &str, prefix: &str) -> Result<PruneReport> {
        self.prune_matching(retain, location, has_prefix(prefix)).await
    }

    /// Like `prune`, for the names accepted by `is_backup`
    pub async fn prune_matching(
        &self,
        retain: usize,
        location: &str,
        is_backup: impl Fn(&str) -> bool,
    ) -> Result<PruneReport> {
        let plan = self.plan_matching(retain, location, is_backup).await?;
        if plan.keep.is_empty() && plan.delete.is_empty() {
            tracing::debug!(location = %plan.location, "nothing to prune");
        }

        let mut deleted = Vec::with_capacity(plan.delete.len());
        for name in plan.delete {
            let path = join(&[plan.location.as_str(), &name]);
            self.fs.delete(&path).await?;
            tracing::info!(remote = %path, "deleted old backup");
            deleted.push(name);
        }

        Ok(PruneReport {
            location: plan.location,
            kept: plan.keep,
            deleted,
        })
    }
}
