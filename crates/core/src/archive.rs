//! Compressed archives of local files and directory trees
//!
//! Archives are gzip-compressed tarballs. Entries are stored relative to the
//! parent of the archived path, so `/srv/www` yields `www/...` entries.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use tar::Builder;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::path::base_name;

/// File name suffix of archives produced by [`archive`]
pub const ARCHIVE_SUFFIX: &str = ".tgz";

/// Summary of a written archive
#[derive(Debug, Clone)]
pub struct ArchiveInfo {
    pub path: PathBuf,
    pub entries: usize,
    pub size_bytes: u64,
}

/// Write a `.tgz` of `source` to `dest`
///
/// A missing source produces an empty archive. Failing to create `dest` or to
/// read a source file is an error.
pub fn archive(source: &Path, dest: &Path) -> Result<ArchiveInfo> {
    let file = File::create(dest)?;
    let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));
    builder.follow_symlinks(false);

    let name = PathBuf::from(base_name(source));
    let mut entries = 0;

    if source.is_dir() {
        for entry in WalkDir::new(source).follow_links(false) {
            let entry = entry.map_err(|e| Error::Archive(format!("walk failed: {e}")))?;
            let file_type = entry.file_type();
            if !(file_type.is_file() || file_type.is_symlink()) {
                continue;
            }
            let relative = entry.path().strip_prefix(source).unwrap_or(entry.path());
            builder
                .append_path_with_name(entry.path(), name.join(relative))
                .map_err(|e| append_error(entry.path(), e))?;
            entries += 1;
        }
    } else if source.is_file() {
        builder
            .append_path_with_name(source, &name)
            .map_err(|e| append_error(source, e))?;
        entries += 1;
    } else {
        tracing::warn!(
            source = %source.display(),
            "source is neither a file nor a directory, archive will be empty"
        );
    }

    let mut file = builder
        .into_inner()
        .map_err(|e| Error::Archive(format!("tar finalize failed: {e}")))?
        .finish()
        .map_err(|e| Error::Archive(format!("gzip finish failed: {e}")))?;
    file.flush()?;

    let size_bytes = file.metadata()?.len();
    tracing::debug!(
        dest = %dest.display(),
        entries,
        size = %humansize::format_size(size_bytes, humansize::BINARY),
        "archive written"
    );

    Ok(ArchiveInfo {
        path: dest.to_path_buf(),
        entries,
        size_bytes,
    })
}

fn append_error(path: &Path, err: std::io::Error) -> Error {
    Error::Archive(format!("failed to add {}: {err}", path.display()))
}
