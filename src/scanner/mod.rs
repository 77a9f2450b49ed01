//! Scanner module for directory traversal and content hashing.
//!
//! This module provides functionality for:
//! - Sorted directory walking using walkdir
//! - Content hashing with a selectable digest algorithm
//! - Path helpers shared by both pipelines
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and entry classification
//! - [`hasher`]: Chunked streaming digests
//!
//! # Example
//!
//! ```no_run
//! use treesift::scanner::{EntryKind, Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("."), WalkerConfig::default());
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(file) if file.kind == EntryKind::Regular => println!("{}", file.path.display()),
//!         Ok(_) => {}
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

pub mod hasher;
pub mod walker;

use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

// Re-export main types
pub use hasher::{ContentDigest, HashAlgorithm, Hasher, DEFAULT_CHUNK_SIZE, MIN_CHUNK_SIZE};
pub use walker::{WalkSummary, Walker};

/// Classification of a filesystem entry produced by the walker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// A regular file (hard links included).
    Regular,
    /// A symbolic link, never followed for classification purposes.
    Symlink,
    /// A directory (including a followed directory symlink).
    Directory,
}

/// Metadata for a discovered entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Absolute path to the entry
    pub path: PathBuf,
    /// What kind of entry this is
    pub kind: EntryKind,
    /// Size in bytes (of the link object itself for symlinks)
    pub size: u64,
    /// Last modification time, for regular files
    pub modified: Option<SystemTime>,
}

impl FileEntry {
    /// Create an entry for a regular file.
    #[must_use]
    pub fn regular(path: PathBuf, size: u64, modified: SystemTime) -> Self {
        Self {
            path,
            kind: EntryKind::Regular,
            size,
            modified: Some(modified),
        }
    }

    /// Create an entry for a symbolic link.
    #[must_use]
    pub fn symlink(path: PathBuf) -> Self {
        Self {
            path,
            kind: EntryKind::Symlink,
            size: 0,
            modified: None,
        }
    }

    /// Modification time as fractional seconds since the Unix epoch.
    ///
    /// Times before the epoch are negative. A missing timestamp sorts below
    /// every real one.
    #[must_use]
    pub fn mtime_secs(&self) -> f64 {
        match self.modified {
            Some(time) => match time.duration_since(UNIX_EPOCH) {
                Ok(d) => d.as_secs_f64(),
                Err(e) => -e.duration().as_secs_f64(),
            },
            None => f64::NEG_INFINITY,
        }
    }
}

/// Predicate deciding whether a directory subtree is skipped.
pub type ExcludeFn = dyn Fn(&Path) -> bool + Send + Sync;

/// Configuration for directory walking.
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Descend into symlinked directories.
    /// Loops are detected by walkdir and reported as errors.
    pub follow_symlinks: bool,

    /// Directories whose whole subtree is skipped (compared by path).
    pub excluded_dirs: Vec<PathBuf>,
}

impl WalkerConfig {
    /// Create a new configuration.
    #[must_use]
    pub fn new(follow_symlinks: bool, excluded_dirs: Vec<PathBuf>) -> Self {
        Self {
            follow_symlinks,
            excluded_dirs,
        }
    }

    /// Add a directory to skip.
    #[must_use]
    pub fn exclude(mut self, dir: impl Into<PathBuf>) -> Self {
        self.excluded_dirs.push(dir.into());
        self
    }
}

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The entry vanished between listing and inspection.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// A symlinked directory points back at one of its ancestors.
    #[error("Filesystem loop at {path} (points to {ancestor})")]
    Loop {
        /// The looping entry
        path: PathBuf,
        /// The ancestor it resolves to
        ancestor: PathBuf,
    },

    /// An I/O error occurred while accessing an entry.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl ScanError {
    /// Build a scan error from an I/O error, keeping the common kinds distinct.
    #[must_use]
    pub fn from_io(path: &Path, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}

/// Errors that can occur during file hashing.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl HashError {
    /// Build a hash error from an I/O error.
    #[must_use]
    pub fn from_io(path: &Path, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }

    /// Path of the file that could not be hashed.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound(p) | Self::PermissionDenied(p) | Self::Io { path: p, .. } => p,
        }
    }
}

/// Resolve a path that may not exist yet.
///
/// The longest existing ancestor is canonicalized and the remaining
/// components are appended lexically, so `dest/new/sub` under a symlinked
/// parent still compares correctly against canonical roots.
#[must_use]
pub fn resolve_lenient(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };

    let mut existing = absolute.as_path();
    let mut tail: Vec<&std::ffi::OsStr> = Vec::new();
    loop {
        if let Ok(canonical) = existing.canonicalize() {
            let mut resolved = canonical;
            for part in tail.iter().rev() {
                resolved.push(part);
            }
            return normalize_lexically(&resolved);
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name);
                existing = parent;
            }
            _ => return normalize_lexically(&absolute),
        }
    }
}

/// Remove `.` and `..` components without touching the filesystem.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Check whether `path` equals `parent` or lies beneath it.
///
/// Both paths are resolved with [`resolve_lenient`] first.
#[must_use]
pub fn is_subpath(path: &Path, parent: &Path) -> bool {
    resolve_lenient(path).starts_with(resolve_lenient(parent))
}
