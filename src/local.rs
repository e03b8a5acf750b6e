//! Read-only view of the local mirror.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::debug;
use walkdir::WalkDir;

use crate::types::error::AuditError;

/// Local path an object name is mirrored to.
///
/// Leading slashes are stripped so a name can never escape `root`.
pub fn mirror_path(root: &Path, name: &str) -> PathBuf {
    root.join(name.trim_start_matches('/'))
}

/// Whether `name` is present under `root` as a regular file.
///
/// Symlinks are followed.
pub fn is_mirrored(root: &Path, name: &str) -> bool {
    mirror_path(root, name).is_file()
}

/// Recursive size of the tree rooted at `root`.
///
/// Files and directories both count, `root` included, with symlinks
/// followed. Other entry kinds, dangling symlinks included, are ignored.
/// Any other walk error aborts.
pub fn tree_size(root: &Path) -> Result<u64> {
    let mut total = 0u64;

    for entry in WalkDir::new(root).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if is_dangling_symlink(&e) => {
                debug!(path = ?e.path(), "skipping dangling symlink.");
                continue;
            }
            Err(e) => {
                return Err(anyhow!(AuditError::Io(e.to_string())))
                    .with_context(|| format!("walking {} failed.", root.display()));
            }
        };

        let file_type = entry.file_type();
        if !file_type.is_file() && !file_type.is_dir() {
            continue;
        }

        let metadata = entry
            .metadata()
            .map_err(|e| anyhow!(AuditError::Io(e.to_string())))
            .with_context(|| format!("reading metadata of {} failed.", entry.path().display()))?;
        total += metadata.len();
    }

    Ok(total)
}

fn is_dangling_symlink(e: &walkdir::Error) -> bool {
    let not_found = e
        .io_error()
        .is_some_and(|io| io.kind() == std::io::ErrorKind::NotFound);

    not_found
        && e.path()
            .and_then(|path| path.symlink_metadata().ok())
            .is_some_and(|metadata| metadata.file_type().is_symlink())
}
