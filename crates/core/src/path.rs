//! Remote path naming and resolution
//!
//! Every backup lands at `<root>/<prefix><name>-<stamp><suffix>`, where
//! `<name>` is the last component of the local path and `<stamp>` is the date
//! stamp computed once for the whole run.

use std::path::Path;

use jiff::Zoned;

use crate::error::{Error, Result};

/// Remote path delimiter
pub const DELIMITER: char = '/';

/// Default strftime format for the date stamp
pub const DEFAULT_DATE_FORMAT: &str = "%Y_%m_%d";

/// Join remote path segments
///
/// Redundant delimiters around each segment are stripped and empty segments
/// are dropped. The result always has exactly one leading delimiter and no
/// trailing one; joining nothing yields the root `/`.
pub fn join<S: AsRef<str>>(segments: &[S]) -> String {
    let parts: Vec<&str> = segments
        .iter()
        .flat_map(|s| s.as_ref().split(DELIMITER))
        .filter(|s| !s.is_empty())
        .collect();
    format!("{DELIMITER}{}", parts.join("/"))
}

/// Final component of a local path, ignoring trailing delimiters
pub fn base_name(path: &Path) -> String {
    if let Some(name) = path.file_name() {
        return name.to_string_lossy().into_owned();
    }
    // `..` or a root: fall back to the textual last component
    let text = path.to_string_lossy();
    text.trim_end_matches(['/', std::path::MAIN_SEPARATOR])
        .rsplit(['/', std::path::MAIN_SEPARATOR])
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Normalized remote root directory plus a name prefix shared by all backups
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRoot {
    dir: String,
    prefix: String,
}

impl RemoteRoot {
    /// Create a new RemoteRoot
    ///
    /// `dir` may carry any number of leading or trailing delimiters.
    pub fn new(dir: &str, prefix: impl Into<String>) -> Self {
        Self {
            dir: join(&[dir]),
            prefix: prefix.into(),
        }
    }

    /// Normalized absolute directory, e.g. `/backups`
    pub fn dir(&self) -> &str {
        &self.dir
    }

    /// Name prefix applied to every backup
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

/// Computes remote backup paths for one run
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: RemoteRoot,
    stamp: String,
    date_format: Option<String>,
}

/// Recognises the names of one target's backups: `<head><stamp><tail>`
///
/// The stamp is checked against the date format when it can be parsed back,
/// otherwise against the shape of the current stamp (same length, digits in
/// the same places, other characters equal).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupPattern {
    head: String,
    tail: String,
    date_format: Option<String>,
    sample: String,
}

impl BackupPattern {
    /// Fixed start of every matching name
    pub fn head(&self) -> &str {
        &self.head
    }

    /// Fixed end of every matching name
    pub fn tail(&self) -> &str {
        &self.tail
    }

    pub fn matches(&self, name: &str) -> bool {
        name.strip_prefix(self.head.as_str())
            .and_then(|rest| rest.strip_suffix(self.tail.as_str()))
            .is_some_and(|stamp| self.is_stamp(stamp))
    }

    fn is_stamp(&self, candidate: &str) -> bool {
        if candidate.is_empty() || candidate.contains(DELIMITER) {
            return false;
        }
        match &self.date_format {
            Some(format) => jiff::fmt::strtime::parse(format, candidate).is_ok(),
            None => same_shape(candidate, &self.sample),
        }
    }
}

fn same_shape(candidate: &str, sample: &str) -> bool {
    candidate.chars().count() == sample.chars().count()
        && candidate.chars().zip(sample.chars()).all(|(c, s)| {
            if s.is_ascii_digit() {
                c.is_ascii_digit()
            } else {
                c == s
            }
        })
}

/// Stem and `.ext` suffix of a file name; files without an extension keep
/// their whole name and get an empty suffix
fn split_extension(local: &Path) -> (&Path, String) {
    match (local.file_stem(), local.extension()) {
        (Some(stem), Some(ext)) => (Path::new(stem), format!(".{}", ext.to_string_lossy())),
        _ => (local, String::new()),
    }
}

impl PathResolver {
    /// Create a resolver, formatting `now` with the strftime `date_format`
    pub fn new(root: RemoteRoot, date_format: &str, now: &Zoned) -> Result<Self> {
        let stamp = jiff::fmt::strtime::format(date_format, now)
            .map_err(|e| Error::Config(format!("Invalid date format '{date_format}': {e}")))?;
        if stamp.contains(DELIMITER) {
            return Err(Error::Config(format!(
                "Date format '{date_format}' must not produce '{DELIMITER}'"
            )));
        }
        let mut resolver = Self::with_stamp(root, stamp);
        // Formats jiff cannot read back are matched by shape instead
        if jiff::fmt::strtime::parse(date_format, &resolver.stamp).is_ok() {
            resolver.date_format = Some(date_format.to_string());
        }
        Ok(resolver)
    }

    /// Create a resolver with a fixed date stamp
    pub fn with_stamp(root: RemoteRoot, stamp: impl Into<String>) -> Self {
        Self {
            root,
            stamp: stamp.into(),
            date_format: None,
        }
    }

    pub fn root(&self) -> &RemoteRoot {
        &self.root
    }

    pub fn stamp(&self) -> &str {
        &self.stamp
    }

    /// Backup name for a local path, without the root directory
    pub fn backup_name(&self, local: &Path, prefix: &str, suffix: &str) -> String {
        format!(
            "{}{}{}-{}{}",
            self.root.prefix,
            prefix,
            base_name(local),
            self.stamp,
            suffix
        )
    }

    /// Absolute remote path for a local path
    pub fn resolve(&self, local: &Path, prefix: &str, suffix: &str) -> String {
        join(&[self.root.dir.as_str(), &self.backup_name(local, prefix, suffix)])
    }

    /// Remote path for a single file that keeps its extension after the stamp
    ///
    /// `report.txt` becomes `report-<stamp>.txt`. Files without an extension,
    /// dot-files included, fall back to `resolve`.
    pub fn resolve_file(&self, local: &Path) -> String {
        let (stem, suffix) = split_extension(local);
        self.resolve(stem, "", &suffix)
    }

    /// Names `resolve(local, prefix, suffix)` produces on any date
    pub fn pattern(&self, local: &Path, prefix: &str, suffix: &str) -> BackupPattern {
        BackupPattern {
            head: format!("{}{}{}-", self.root.prefix, prefix, base_name(local)),
            tail: suffix.to_string(),
            date_format: self.date_format.clone(),
            sample: self.stamp.clone(),
        }
    }

    /// Names `resolve_file(local)` produces on any date
    pub fn file_pattern(&self, local: &Path) -> BackupPattern {
        let (stem, suffix) = split_extension(local);
        self.pattern(stem, "", &suffix)
    }

    /// Mirror location of `dir`, a directory at or below the backup root `base`
    ///
    /// `mirror_root` is the resolved remote path of `base`.
    pub fn mirror_dir(&self, mirror_root: &str, base: &Path, dir: &Path) -> Result<String> {
        let offset = dir.strip_prefix(base).map_err(|_| {
            Error::InvalidPath(format!(
                "{} is not below {}",
                dir.display(),
                base.display()
            ))
        })?;
        let mut segments = vec![mirror_root.to_string()];
        segments.extend(
            offset
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned()),
        );
        Ok(join(&segments))
    }
}
