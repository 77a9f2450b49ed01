//! Collision-safe relocation of files and symbolic links.
//!
//! # Overview
//!
//! This module provides:
//! - Deterministic destination disambiguation (`name (1).ext`, `name (2).ext`, ...)
//! - Plan-time reservation of destinations through [`DestinationAllocator`]
//! - Batch moves that keep going when a single item fails
//!
//! # Safety
//!
//! An existing entry is never replaced. Occupancy is checked with
//! `symlink_metadata`, so a dangling symlink at the destination counts as
//! taken. Each destination is checked again immediately before its move;
//! if it became occupied after planning, the next free variant is used.
//!
//! Symbolic links are moved as link objects. Their targets are never read,
//! copied or followed, which means a relative link may dangle after it moves.
//!
//! # Example
//!
//! ```no_run
//! use treesift::actions::relocate::{relocate_batch, Relocation, RelocationKind};
//! use std::path::PathBuf;
//!
//! let plan = vec![Relocation::new(
//!     PathBuf::from("/data/a/x.txt"),
//!     PathBuf::from("/data/Duplicates/a/x.txt"),
//!     RelocationKind::File,
//!     12,
//! )];
//! let result = relocate_batch(&plan, None);
//! println!("{}", result.summary());
//! ```

use std::collections::HashSet;
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::progress::{ProgressCallback, PHASE_RELOCATE};

/// What is being moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelocationKind {
    /// A regular file
    File,
    /// A symbolic link (the link itself, never its target)
    Symlink,
}

impl fmt::Display for RelocationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => f.write_str("file"),
            Self::Symlink => f.write_str("symlink"),
        }
    }
}

/// One planned move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocation {
    /// Current location
    pub source: PathBuf,
    /// Planned location
    pub destination: PathBuf,
    /// Entry kind
    pub kind: RelocationKind,
    /// Size in bytes at planning time
    pub size: u64,
}

impl Relocation {
    /// Create a new planned move.
    #[must_use]
    pub fn new(source: PathBuf, destination: PathBuf, kind: RelocationKind, size: u64) -> Self {
        Self {
            source,
            destination,
            kind,
            size,
        }
    }
}

/// Error type for a single relocation.
#[derive(Debug, Error)]
pub enum RelocateError {
    /// The source vanished before it could be moved.
    #[error("source not found: {0}")]
    SourceMissing(PathBuf),

    /// Permission denied on the source or destination.
    #[error("permission denied moving {source_path} -> {destination}")]
    PermissionDenied {
        source_path: PathBuf,
        destination: PathBuf,
    },

    /// Creating the destination's parent directories failed.
    #[error("cannot create directory {path}: {source}")]
    CreateParent {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The move itself failed.
    #[error("move failed {source_path} -> {destination}: {source}")]
    Io {
        source_path: PathBuf,
        destination: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl RelocateError {
    fn from_move(source_path: &Path, destination: &Path, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound if fs::symlink_metadata(source_path).is_err() => {
                Self::SourceMissing(source_path.to_path_buf())
            }
            io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                source_path: source_path.to_path_buf(),
                destination: destination.to_path_buf(),
            },
            _ => Self::Io {
                source_path: source_path.to_path_buf(),
                destination: destination.to_path_buf(),
                source: error,
            },
        }
    }
}

/// Results of a batch relocation.
#[derive(Debug, Clone, Default)]
pub struct BatchRelocateResult {
    /// Completed moves, with the destination actually used.
    pub successes: Vec<Relocation>,
    /// Failed moves with their error messages.
    pub failures: Vec<(Relocation, String)>,
}

impl BatchRelocateResult {
    /// Number of successful moves.
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.successes.len()
    }

    /// Number of failed moves.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Total number of attempted moves.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    /// `(succeeded, attempted)` for one kind.
    #[must_use]
    pub fn counts(&self, kind: RelocationKind) -> (usize, usize) {
        let ok = self.successes.iter().filter(|r| r.kind == kind).count();
        let failed = self.failures.iter().filter(|(r, _)| r.kind == kind).count();
        (ok, ok + failed)
    }

    /// Bytes moved successfully.
    #[must_use]
    pub fn bytes_moved(&self) -> u64 {
        self.successes.iter().map(|r| r.size).sum()
    }

    /// Check if all moves succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    /// Human-readable summary of the operation.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.all_succeeded() {
            format!("Moved {} item(s)", self.success_count())
        } else {
            format!(
                "Moved {} item(s), {} failed",
                self.success_count(),
                self.failure_count()
            )
        }
    }
}

/// Check whether anything (including a dangling symlink) occupies `path`.
#[must_use]
pub fn is_occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Build `stem (n).ext` next to `path`.
///
/// Only the last extension is kept after the counter, so `a.tar.gz`
/// becomes `a.tar (1).gz`.
#[must_use]
pub fn numbered_variant(path: &Path, n: u64) -> PathBuf {
    let mut name: OsString = path.file_stem().unwrap_or_default().to_os_string();
    name.push(format!(" ({n})"));
    if let Some(ext) = path.extension() {
        name.push(".");
        name.push(ext);
    }
    path.with_file_name(name)
}

/// First free path among `desired`, `desired (1)`, `desired (2)`, ...
///
/// Only the filesystem is consulted. Use [`DestinationAllocator`] when
/// several destinations are planned together.
#[must_use]
pub fn unique_destination(desired: &Path) -> PathBuf {
    if !is_occupied(desired) {
        return desired.to_path_buf();
    }
    (1..)
        .map(|n| numbered_variant(desired, n))
        .find(|candidate| !is_occupied(candidate))
        .unwrap_or_else(|| desired.to_path_buf())
}

/// Hands out destinations that are free on disk and not yet claimed by the
/// current plan.
#[derive(Debug, Default)]
pub struct DestinationAllocator {
    claimed: HashSet<PathBuf>,
}

impl DestinationAllocator {
    /// Create an allocator with nothing claimed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the first free variant of `desired`.
    pub fn allocate(&mut self, desired: &Path) -> PathBuf {
        let taken = |p: &Path, claimed: &HashSet<PathBuf>| claimed.contains(p) || is_occupied(p);

        let mut candidate = desired.to_path_buf();
        let mut n = 0u64;
        while taken(&candidate, &self.claimed) {
            n += 1;
            candidate = numbered_variant(desired, n);
        }
        if n > 0 {
            log::debug!(
                "Destination {} taken, using {}",
                desired.display(),
                candidate.display()
            );
        }
        self.claimed.insert(candidate.clone());
        candidate
    }

    /// Number of destinations claimed so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.claimed.len()
    }

    /// True when nothing has been claimed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.claimed.is_empty()
    }
}

/// Move one entry, creating parent directories as needed.
///
/// Returns the destination actually used, which differs from the planned one
/// if that became occupied after planning.
///
/// # Errors
///
/// Returns [`RelocateError`] if the source is gone, the parent cannot be
/// created, or the move fails.
pub fn relocate(relocation: &Relocation) -> Result<PathBuf, RelocateError> {
    let source = relocation.source.as_path();

    if let Err(e) = fs::symlink_metadata(source) {
        return Err(match e.kind() {
            io::ErrorKind::NotFound => RelocateError::SourceMissing(source.to_path_buf()),
            _ => RelocateError::from_move(source, &relocation.destination, e),
        });
    }

    let mut destination = relocation.destination.clone();
    if is_occupied(&destination) {
        destination = unique_destination(&destination);
        log::warn!(
            "Destination {} appeared after planning, using {}",
            relocation.destination.display(),
            destination.display()
        );
    }

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|e| RelocateError::CreateParent {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    move_entry(source, &destination, relocation.kind)
        .map_err(|e| RelocateError::from_move(source, &destination, e))?;

    if relocation.kind == RelocationKind::Symlink && fs::metadata(&destination).is_err() {
        log::debug!("Moved link no longer resolves: {}", destination.display());
    }

    Ok(destination)
}

/// Execute a plan in order, continuing past failures.
///
/// Every attempt produces one log line: `info` on success, `error` on
/// failure, both naming source and destination.
pub fn relocate_batch(
    plan: &[Relocation],
    progress: Option<&dyn ProgressCallback>,
) -> BatchRelocateResult {
    let mut result = BatchRelocateResult::default();

    if let Some(callback) = progress {
        callback.on_phase_start(PHASE_RELOCATE, plan.len());
    }

    for (idx, item) in plan.iter().enumerate() {
        match relocate(item) {
            Ok(used) => {
                log::info!(
                    "[MOVE {}] {} -> {}",
                    item.kind,
                    item.source.display(),
                    used.display()
                );
                let mut done = item.clone();
                done.destination = used;
                result.successes.push(done);
            }
            Err(e) => {
                log::error!(
                    "[ERROR {}] {} -> {}: {}",
                    item.kind,
                    item.source.display(),
                    item.destination.display(),
                    e
                );
                result.failures.push((item.clone(), e.to_string()));
            }
        }

        if let Some(callback) = progress {
            callback.on_progress(idx + 1, item.source.to_string_lossy().as_ref());
        }
    }

    if let Some(callback) = progress {
        callback.on_phase_end(PHASE_RELOCATE);
    }

    log::info!("{}", result.summary());
    result
}

/// Rename, falling back to copy + remove across filesystems.
fn move_entry(source: &Path, destination: &Path, kind: RelocationKind) -> io::Result<()> {
    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => {
            log::debug!(
                "Cross-device move, copying {} -> {}",
                source.display(),
                destination.display()
            );
            match kind {
                RelocationKind::File => copy_file_then_remove(source, destination),
                RelocationKind::Symlink => recreate_link_then_remove(source, destination),
            }
        }
        Err(e) => Err(e),
    }
}

fn is_cross_device(error: &io::Error) -> bool {
    // EXDEV on Unix, ERROR_NOT_SAME_DEVICE on Windows
    #[cfg(unix)]
    const CROSS_DEVICE: i32 = 18;
    #[cfg(windows)]
    const CROSS_DEVICE: i32 = 17;
    #[cfg(not(any(unix, windows)))]
    const CROSS_DEVICE: i32 = -1;

    error.raw_os_error() == Some(CROSS_DEVICE)
}

fn copy_file_then_remove(source: &Path, destination: &Path) -> io::Result<()> {
    let metadata = fs::metadata(source)?;
    fs::copy(source, destination)?;

    let atime = filetime::FileTime::from_last_access_time(&metadata);
    let mtime = filetime::FileTime::from_last_modification_time(&metadata);
    if let Err(e) = filetime::set_file_times(destination, atime, mtime) {
        log::warn!("Could not preserve times on {}: {}", destination.display(), e);
    }

    if let Err(e) = fs::remove_file(source) {
        // Leave exactly one copy behind
        let _ = fs::remove_file(destination);
        return Err(e);
    }
    Ok(())
}

fn recreate_link_then_remove(source: &Path, destination: &Path) -> io::Result<()> {
    let target = fs::read_link(source)?;

    #[cfg(unix)]
    std::os::unix::fs::symlink(&target, destination)?;

    #[cfg(windows)]
    {
        let resolved = source.parent().map_or(target.clone(), |p| p.join(&target));
        if resolved.is_dir() {
            std::os::windows::fs::symlink_dir(&target, destination)?;
        } else {
            std::os::windows::fs::symlink_file(&target, destination)?;
        }
    }

    #[cfg(not(any(unix, windows)))]
    return Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symlinks are not supported on this platform",
    ));

    #[cfg(any(unix, windows))]
    {
        if let Err(e) = fs::remove_file(source) {
            let _ = fs::remove_file(destination);
            return Err(e);
        }
        Ok(())
    }
}
