//! yb-core: Core library for the ya-backup client
//!
//! This crate provides the core functionality for ya-backup, including:
//! - Configuration management
//! - Remote path naming and resolution
//! - Archiving of files and directory trees
//! - Backup orchestration (archive and mirror modes)
//! - Retention of old backups
//! - RemoteStore trait for remote storage operations
//!
//! This crate is independent of any specific storage API, so the backup logic
//! can be tested against an in-memory store.

pub mod archive;
pub mod backup;
pub mod cache;
pub mod config;
pub mod error;
pub mod path;
pub mod retention;
pub mod runner;
pub mod traits;

#[cfg(test)]
mod testing;

pub use backup::{BackupMode, BackupReport, BackupTarget, Orchestrator};
pub use cache::RemoteFs;
pub use config::{Config, ConfigManager};
pub use error::{Error, Result};
pub use path::{BackupPattern, PathResolver, RemoteRoot};
pub use retention::{PruneReport, RetentionManager};
pub use runner::{Runner, TargetOutcome, TargetPlan};
pub use traits::{Lookup, RemoteStore, ResourceInfo, ResourceKind, SortField, SortKey};
