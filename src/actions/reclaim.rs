//! Bottom-up removal of empty directories.
//!
//! Directories are collected with a pre-order walk that never follows links
//! and never descends into protected subtrees, then evaluated in reverse.
//! Reversed pre-order puts every directory after all of its descendants, so
//! removing a leaf can make its parent removable in the same pass.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use crate::progress::{ProgressCallback, PHASE_RECLAIM};
use crate::scanner::resolve_lenient;

/// Error type for a directory that could not be reclaimed.
#[derive(Debug, Error)]
pub enum ReclaimError {
    /// Listing the tree failed at this path.
    #[error("cannot scan {path}: {message}")]
    Scan { path: PathBuf, message: String },

    /// Reading or removing the directory failed.
    #[error("cannot remove {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ReclaimError {
    /// The directory this error refers to.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Scan { path, .. } | Self::Remove { path, .. } => path,
        }
    }
}

/// Outcome of a reclamation pass.
#[derive(Debug, Default)]
pub struct ReclaimResult {
    /// Directories removed, deepest first.
    pub removed: Vec<PathBuf>,
    /// Directories that could not be evaluated or removed.
    pub failures: Vec<ReclaimError>,
}

impl ReclaimResult {
    /// Number of removed directories.
    #[must_use]
    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }

    /// Number of failures.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }
}

/// Remove every empty directory under `root`.
///
/// The root itself and every directory in `protected` (with its whole
/// subtree) are left alone. Failures are logged and collected; the pass
/// always runs to completion.
pub fn remove_empty_dirs(
    root: &Path,
    protected: &[PathBuf],
    progress: Option<&dyn ProgressCallback>,
) -> ReclaimResult {
    let root = resolve_lenient(root);
    let protected: Vec<PathBuf> = protected.iter().map(|p| resolve_lenient(p)).collect();
    let mut result = ReclaimResult::default();

    let mut dirs = Vec::new();
    let walker = WalkDir::new(&root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !(e.file_type().is_dir() && protected.iter().any(|p| p == e.path())));

    for entry in walker {
        match entry {
            Ok(e) if e.file_type().is_dir() => dirs.push(e.into_path()),
            Ok(_) => {}
            Err(e) => {
                let path = e.path().map_or_else(|| root.clone(), Path::to_path_buf);
                log::warn!("Skipping unreadable directory {}: {}", path.display(), e);
                result.failures.push(ReclaimError::Scan {
                    path,
                    message: e.to_string(),
                });
            }
        }
    }

    if let Some(callback) = progress {
        callback.on_phase_start(PHASE_RECLAIM, dirs.len());
    }

    for (idx, dir) in dirs.iter().rev().enumerate() {
        match try_remove(dir) {
            Ok(true) => {
                log::debug!("Removed empty directory: {}", dir.display());
                result.removed.push(dir.clone());
            }
            Ok(false) => {}
            Err(e) => {
                log::warn!("Could not remove directory {}: {}", dir.display(), e);
                result.failures.push(ReclaimError::Remove {
                    path: dir.clone(),
                    source: e,
                });
            }
        }

        if let Some(callback) = progress {
            callback.on_progress(idx + 1, dir.to_string_lossy().as_ref());
        }
    }

    if let Some(callback) = progress {
        callback.on_phase_end(PHASE_RECLAIM);
    }

    log::info!(
        "Removed {} empty directories under {}",
        result.removed_count(),
        root.display()
    );
    result
}

/// Remove `dir` if it has no entries right now. Returns whether it was removed.
fn try_remove(dir: &Path) -> io::Result<bool> {
    let is_empty = match fs::read_dir(dir) {
        Ok(mut entries) => entries.next().is_none(),
        // Already gone
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    if !is_empty {
        return Ok(false);
    }
    fs::remove_dir(dir)?;
    Ok(true)
}
