//! Backup orchestration
//!
//! Produces one backup per target, either as a single `.tgz` archive or as a
//! recursive mirror of a directory tree. A target moves through
//! `Idle -> Building -> Uploading -> Done` once, without retries.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::archive::{ARCHIVE_SUFFIX, archive};
use crate::cache::RemoteFs;
use crate::error::{Error, Result};
use crate::path::{BackupPattern, PathResolver, base_name, join};

/// Prefix of temporary directories holding archives before upload
const TEMP_PREFIX: &str = "ya_backup-";

/// A local path to back up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupTarget {
    /// Local file or directory
    pub path: PathBuf,

    /// Number of most recent backups to keep
    #[serde(default = "default_retain")]
    pub retain: usize,

    /// Upload a single compressed archive instead of mirroring
    #[serde(default = "default_archive")]
    pub archive: bool,
}

fn default_retain() -> usize {
    7
}

fn default_archive() -> bool {
    true
}

impl BackupTarget {
    pub fn new(path: impl Into<PathBuf>, retain: usize, archive: bool) -> Self {
        Self {
            path: path.into(),
            retain,
            archive,
        }
    }
}

/// Lifecycle of a single target backup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Building,
    Uploading,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Idle => "idle",
            Stage::Building => "building",
            Stage::Uploading => "uploading",
            Stage::Done => "done",
        };
        f.write_str(s)
    }
}

/// How a target was backed up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupMode {
    /// One compressed archive
    Archive,
    /// Directory tree replicated file by file
    Mirror,
    /// Single file uploaded as-is
    File,
    /// Local path did not exist, nothing uploaded
    Missing,
}

/// A single upload that was issued
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Upload {
    pub local: PathBuf,
    pub remote: String,
    pub overwrite: bool,
}

/// An upload that did not go through
#[derive(Debug, Clone, Serialize)]
pub struct UploadFailure {
    pub local: PathBuf,
    pub remote: String,
    pub error: String,
}

/// Outcome of backing up one target
#[derive(Debug, Clone, Serialize)]
pub struct BackupReport {
    pub mode: BackupMode,
    /// Remote path of the archive, file or mirror root
    pub destination: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub created_dirs: Vec<String>,
    pub uploaded: Vec<Upload>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<UploadFailure>,
}

impl BackupReport {
    fn new(mode: BackupMode, destination: String) -> Self {
        Self {
            mode,
            destination,
            created_dirs: Vec::new(),
            uploaded: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// What a backup would do, computed without touching the remote
#[derive(Debug, Clone, Serialize)]
pub struct BackupPlan {
    pub mode: BackupMode,
    pub destination: String,
}

/// Produces and uploads backups for targets
pub struct Orchestrator<'a> {
    fs: &'a RemoteFs<'a>,
    resolver: &'a PathResolver,
}

impl<'a> Orchestrator<'a> {
    pub fn new(fs: &'a RemoteFs<'a>, resolver: &'a PathResolver) -> Self {
        Self { fs, resolver }
    }

    /// Decide mode and destination for a target
    pub fn plan(&self, target: &BackupTarget) -> BackupPlan {
        let path = &target.path;
        let (mode, destination) = if target.archive {
            (
                BackupMode::Archive,
                self.resolver.resolve(path, "", ARCHIVE_SUFFIX),
            )
        } else if path.is_dir() {
            (BackupMode::Mirror, self.resolver.resolve(path, "", ""))
        } else if path.is_file() {
            (BackupMode::File, self.resolver.resolve_file(path))
        } else {
            (BackupMode::Missing, self.resolver.resolve(path, "", ""))
        };
        BackupPlan { mode, destination }
    }

    /// Names earlier runs gave this target's backups, for retention
    pub fn pattern(&self, target: &BackupTarget) -> BackupPattern {
        let path = &target.path;
        match self.plan(target).mode {
            BackupMode::Archive => self.resolver.pattern(path, "", ARCHIVE_SUFFIX),
            BackupMode::File => self.resolver.file_pattern(path),
            BackupMode::Mirror | BackupMode::Missing => self.resolver.pattern(path, "", ""),
        }
    }

    /// Back up one target
    ///
    /// Upload failures are collected in the report. Local filesystem errors
    /// and remote transport errors outside of uploads abort the target.
    pub async fn backup(&self, target: &BackupTarget) -> Result<BackupReport> {
        let plan = self.plan(target);
        tracing::debug!(
            path = %target.path.display(),
            mode = ?plan.mode,
            stage = %Stage::Idle,
            "starting backup"
        );

        let report = match plan.mode {
            BackupMode::Archive => self.backup_archive(&target.path, plan.destination).await?,
            BackupMode::Mirror => self.backup_mirror(&target.path, plan.destination).await?,
            BackupMode::File => {
                let mut report = BackupReport::new(BackupMode::File, plan.destination);
                enter(Stage::Uploading, &target.path);
                let remote = report.destination.clone();
                self.upload(&mut report, &target.path, &remote, false).await;
                report
            }
            BackupMode::Missing => {
                tracing::warn!(path = %target.path.display(), "nothing to back up, path does not exist");
                BackupReport::new(BackupMode::Missing, plan.destination)
            }
        };

        enter(Stage::Done, &target.path);
        for failure in &report.failures {
            tracing::warn!(
                local = %failure.local.display(),
                remote = %failure.remote,
                error = %failure.error,
                "upload failed"
            );
        }
        Ok(report)
    }

    async fn backup_archive(&self, path: &Path, destination: String) -> Result<BackupReport> {
        let mut report = BackupReport::new(BackupMode::Archive, destination);

        enter(Stage::Building, path);
        // Removed on drop, whatever happens below
        let tmp = tempfile::Builder::new().prefix(TEMP_PREFIX).tempdir()?;
        let archive_path = tmp
            .path()
            .join(format!("{}{ARCHIVE_SUFFIX}", base_name(path)));

        let source = path.to_path_buf();
        let info = tokio::task::spawn_blocking(move || archive(&source, &archive_path))
            .await
            .map_err(|e| Error::General(format!("archive task failed: {e}")))??;
        tracing::debug!(
            archive = %info.path.display(),
            entries = info.entries,
            size = info.size_bytes,
            "archive built"
        );

        enter(Stage::Uploading, path);
        let remote = report.destination.clone();
        self.upload(&mut report, &info.path, &remote, false).await;
        Ok(report)
    }

    async fn backup_mirror(&self, root: &Path, destination: String) -> Result<BackupReport> {
        let mut report = BackupReport::new(BackupMode::Mirror, destination);
        enter(Stage::Building, root);

        let dirs = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.file_type().is_dir());

        for dir in dirs {
            let dir = dir.map_err(walk_error)?;
            let remote_dir = self
                .resolver
                .mirror_dir(&report.destination, root, dir.path())?;

            if !self.fs.is_dir(&remote_dir).await? {
                self.fs.create_dir(&remote_dir).await?;
                tracing::info!(remote = %remote_dir, "created remote directory");
                report.created_dirs.push(remote_dir.clone());
            }

            enter(Stage::Uploading, dir.path());
            for file in files_in(dir.path())? {
                let remote = join(&[remote_dir.as_str(), &base_name(&file)]);
                self.upload(&mut report, &file, &remote, true).await;
            }
        }

        Ok(report)
    }

    async fn upload(&self, report: &mut BackupReport, local: &Path, remote: &str, overwrite: bool) {
        match self.fs.upload(local, remote, overwrite).await {
            Ok(()) => {
                tracing::info!(local = %local.display(), remote, "uploaded");
                report.uploaded.push(Upload {
                    local: local.to_path_buf(),
                    remote: remote.to_string(),
                    overwrite,
                });
            }
            Err(e) => report.failures.push(UploadFailure {
                local: local.to_path_buf(),
                remote: remote.to_string(),
                error: e.to_string(),
            }),
        }
    }
}

fn enter(stage: Stage, path: &Path) {
    tracing::debug!(path = %path.display(), %stage, "backup stage");
}

/// Regular files directly inside `dir`, symlinks to files included
fn files_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(walk_error)?;
        if !entry.file_type().is_dir() && entry.path().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn walk_error(err: walkdir::Error) -> Error {
    match err.into_io_error() {
        Some(io) => Error::Io(io),
        None => Error::General("filesystem loop while walking directory".into()),
    }
}
