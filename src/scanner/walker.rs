//! Directory walker implementation using walkdir.
//!
//! # Overview
//!
//! This module provides the [`Walker`] struct for enumerating every entry
//! beneath a root and classifying it as a regular file, a symbolic link or a
//! directory.
//!
//! # Features
//!
//! - Deterministic order (entries sorted by file name within each directory)
//! - Symlinks reported as links, never as their targets
//! - Symlinked directories descended only when explicitly requested, with
//!   loop detection
//! - Subtree exclusion by path or predicate, evaluated before descent
//! - Unreadable or vanishing entries surface as [`ScanError`] items instead
//!   of stopping the walk
//!
//! # Example
//!
//! ```no_run
//! use treesift::scanner::{EntryKind, Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let config = WalkerConfig::default().exclude("/data/photos/Duplicates");
//! let walker = Walker::new(Path::new("/data/photos"), config);
//! let files: Vec<_> = walker
//!     .walk()
//!     .filter_map(Result::ok)
//!     .filter(|e| e.kind == EntryKind::Regular)
//!     .collect();
//! println!("Found {} files", files.len());
//! ```

use std::fmt;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use walkdir::{DirEntry, WalkDir};

use super::{resolve_lenient, EntryKind, ExcludeFn, FileEntry, ScanError, WalkerConfig};

/// Everything found by one complete walk.
#[derive(Debug, Default)]
pub struct WalkSummary {
    /// Regular files, in walk order
    pub regular: Vec<FileEntry>,
    /// Symbolic links, in walk order
    pub symlinks: Vec<FileEntry>,
    /// Number of directories seen
    pub directories: usize,
    /// Entries that could not be read (already logged)
    pub errors: Vec<ScanError>,
}

/// Directory walker for file discovery.
pub struct Walker {
    /// Root path to walk (resolved to an absolute path)
    root: PathBuf,
    /// Walker configuration
    config: WalkerConfig,
    /// Extra exclusion predicate, evaluated on directories
    exclude: Option<Box<ExcludeFn>>,
}

impl fmt::Debug for Walker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Walker")
            .field("root", &self.root)
            .field("config", &self.config)
            .field("exclude", &self.exclude.as_ref().map(|_| "<predicate>"))
            .finish()
    }
}

impl Walker {
    /// Create a new walker for the given path.
    ///
    /// The root and every excluded directory are resolved to absolute paths
    /// so that exclusion compares like with like.
    #[must_use]
    pub fn new(path: &Path, mut config: WalkerConfig) -> Self {
        config.excluded_dirs = config
            .excluded_dirs
            .iter()
            .map(|p| resolve_lenient(p))
            .collect();
        Self {
            root: resolve_lenient(path),
            config,
            exclude: None,
        }
    }

    /// Skip every directory for which `predicate` returns true.
    #[must_use]
    pub fn with_exclude<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Path) -> bool + Send + Sync + 'static,
    {
        self.exclude = Some(Box::new(predicate));
        self
    }

    /// The resolved root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_excluded(&self, path: &Path) -> bool {
        self.config.excluded_dirs.iter().any(|d| d == path)
            || self.exclude.as_ref().is_some_and(|f| f(path))
    }

    /// Exclusion check for a directory entry.
    ///
    /// A followed link is judged by where it leads: a link into an excluded
    /// subtree is skipped like the subtree itself.
    fn is_excluded_entry(&self, entry: &DirEntry) -> bool {
        let path = entry.path();
        if self.is_excluded(path) {
            return true;
        }
        if !(self.config.follow_symlinks && entry.path_is_symlink()) {
            return false;
        }
        match std::fs::canonicalize(path) {
            Ok(real) => {
                self.config.excluded_dirs.iter().any(|d| real.starts_with(d))
                    || self.exclude.as_ref().is_some_and(|f| f(&real))
            }
            Err(_) => false,
        }
    }

    /// Walk the directory tree, yielding every descendant of the root.
    ///
    /// Errors are yielded as [`ScanError`] values rather than stopping
    /// iteration. The root itself is not yielded.
    pub fn walk(&self) -> impl Iterator<Item = Result<FileEntry, ScanError>> + '_ {
        WalkDir::new(&self.root)
            .min_depth(1)
            .follow_links(self.config.follow_symlinks)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| {
                let skip = entry.file_type().is_dir() && self.is_excluded_entry(entry);
                if skip {
                    log::debug!("Excluding subtree: {}", entry.path().display());
                }
                !skip
            })
            .filter_map(move |result| match result {
                Ok(entry) => self.classify(&entry),
                Err(e) => Some(self.handle_walkdir_error(e)),
            })
    }

    /// Drain the walk, splitting entries by kind.
    ///
    /// Both pipelines need full enumeration, so nothing here stops early.
    #[must_use]
    pub fn collect(&self) -> WalkSummary {
        let mut summary = WalkSummary::default();
        for item in self.walk() {
            match item {
                Ok(entry) => match entry.kind {
                    EntryKind::Regular => summary.regular.push(entry),
                    EntryKind::Symlink => summary.symlinks.push(entry),
                    EntryKind::Directory => summary.directories += 1,
                },
                Err(e) => summary.errors.push(e),
            }
        }
        log::debug!(
            "Walked {}: {} files, {} symlinks, {} directories, {} errors",
            self.root.display(),
            summary.regular.len(),
            summary.symlinks.len(),
            summary.directories,
            summary.errors.len()
        );
        summary
    }

    /// Turn a walkdir entry into a [`FileEntry`], or `None` for entries we do
    /// not track (sockets, fifos, devices).
    fn classify(&self, entry: &DirEntry) -> Option<Result<FileEntry, ScanError>> {
        let path = entry.path();
        let file_type = entry.file_type();

        // With follow_links the file type is the target's; path_is_symlink
        // still tells us the entry itself is a link.
        if file_type.is_symlink() || (entry.path_is_symlink() && !file_type.is_dir()) {
            return Some(Ok(FileEntry::symlink(path.to_path_buf())));
        }

        if file_type.is_dir() {
            return Some(Ok(FileEntry {
                path: path.to_path_buf(),
                kind: EntryKind::Directory,
                size: 0,
                modified: None,
            }));
        }

        if !file_type.is_file() {
            log::debug!("Skipping special file: {}", path.display());
            return None;
        }

        match entry.metadata() {
            Ok(metadata) => Some(Ok(regular_entry(path, &metadata))),
            Err(e) => {
                let io = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("metadata unavailable"));
                Some(Err(self.handle_io_error(path, io)))
            }
        }
    }

    /// Handle I/O errors during entry access.
    fn handle_io_error(&self, path: &Path, error: std::io::Error) -> ScanError {
        let err = ScanError::from_io(path, error);
        log::warn!("Skipping unreadable entry: {}", err);
        err
    }

    /// Handle walkdir errors.
    ///
    /// A dangling symlink met while following links is still a symlink, so it
    /// is reported as one instead of as an error.
    fn handle_walkdir_error(&self, error: walkdir::Error) -> Result<FileEntry, ScanError> {
        let path = error
            .path()
            .map_or_else(|| self.root.clone(), Path::to_path_buf);

        if let Some(ancestor) = error.loop_ancestor() {
            log::warn!(
                "Skipping filesystem loop: {} -> {}",
                path.display(),
                ancestor.display()
            );
            return Err(ScanError::Loop {
                path,
                ancestor: ancestor.to_path_buf(),
            });
        }

        if self.config.follow_symlinks
            && std::fs::symlink_metadata(&path).is_ok_and(|m| m.file_type().is_symlink())
        {
            log::debug!("Dangling symlink: {}", path.display());
            return Ok(FileEntry::symlink(path));
        }

        let io = error
            .into_io_error()
            .unwrap_or_else(|| std::io::Error::other("walk error"));
        Err(self.handle_io_error(&path, io))
    }
}

fn regular_entry(path: &Path, metadata: &Metadata) -> FileEntry {
    let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
    FileEntry::regular(path.to_path_buf(), metadata.len(), modified)
}
