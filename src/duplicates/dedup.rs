//! Single-tree deduplication.
//!
//! # Overview
//!
//! Walks one tree (skipping its quarantine subtree), hashes every regular
//! file, and for each content group keeps the survivor in place while moving
//! the other copies under the quarantine directory at their original
//! relative paths.
//!
//! Planning ([`plan_dedup`]) never touches the filesystem beyond existence
//! checks. [`run_dedup`] executes the plan unless `dry_run` is set, then
//! removes directories the moves left empty.
//!
//! A second run over the same tree plans nothing: every group then has at
//! most one member outside the quarantine.
//!
//! # Example
//!
//! ```no_run
//! use treesift::duplicates::{run_dedup, DedupOptions};
//! use std::path::PathBuf;
//!
//! let options = DedupOptions::new(PathBuf::from("/data/photos")).with_dry_run(true);
//! let report = run_dedup(&options).unwrap();
//! println!("{} files would move", report.plan.len());
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use super::finder::{hash_entries, HashConfig, DEFAULT_IO_THREADS};
use super::groups::{group_by_digest, DuplicateGroup, GroupingStats};
use crate::actions::{
    relocate_batch, remove_empty_dirs, BatchRelocateResult, DestinationAllocator, ReclaimResult,
    Relocation, RelocationKind,
};
use crate::error::ConfigError;
use crate::progress::{ProgressCallback, PHASE_SCAN};
use crate::scanner::{
    resolve_lenient, FileEntry, HashError, Hasher, Walker, WalkerConfig,
};

/// Default name of the quarantine directory inside the scanned root.
pub const DEFAULT_QUARANTINE_DIR: &str = "Duplicates";

/// Options for a deduplication run.
#[derive(Clone)]
pub struct DedupOptions {
    /// Tree to deduplicate
    pub root: PathBuf,
    /// Quarantine directory name, created directly under `root`
    pub quarantine_name: String,
    /// Plan only
    pub dry_run: bool,
    /// Descend into symlinked directories
    pub follow_symlinks: bool,
    /// Skip empty-directory removal
    pub keep_empty_dirs: bool,
    /// Content hasher
    pub hasher: Hasher,
    /// Hashing threads
    pub io_threads: usize,
    /// Optional progress callback
    pub progress: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for DedupOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedupOptions")
            .field("root", &self.root)
            .field("quarantine_name", &self.quarantine_name)
            .field("dry_run", &self.dry_run)
            .field("follow_symlinks", &self.follow_symlinks)
            .field("keep_empty_dirs", &self.keep_empty_dirs)
            .field("hasher", &self.hasher)
            .field("io_threads", &self.io_threads)
            .finish_non_exhaustive()
    }
}

impl DedupOptions {
    /// Defaults for `root`: apply mode, no link following, SHA-256.
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            quarantine_name: DEFAULT_QUARANTINE_DIR.to_string(),
            dry_run: false,
            follow_symlinks: false,
            keep_empty_dirs: false,
            hasher: Hasher::default(),
            io_threads: DEFAULT_IO_THREADS,
            progress: None,
        }
    }

    /// Plan only.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Descend into symlinked directories.
    #[must_use]
    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Keep directories left empty by the moves.
    #[must_use]
    pub fn with_keep_empty_dirs(mut self, keep: bool) -> Self {
        self.keep_empty_dirs = keep;
        self
    }

    /// Use a different quarantine directory name.
    #[must_use]
    pub fn with_quarantine_name(mut self, name: impl Into<String>) -> Self {
        self.quarantine_name = name.into();
        self
    }

    /// Use a different hasher.
    #[must_use]
    pub fn with_hasher(mut self, hasher: Hasher) -> Self {
        self.hasher = hasher;
        self
    }

    /// Set the number of hashing threads.
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
        self
    }

    /// Set a progress callback.
    #[must_use]
    pub fn with_progress(mut self, progress: Option<Arc<dyn ProgressCallback>>) -> Self {
        self.progress = progress;
        self
    }
}

/// Planned deduplication of one tree.
#[derive(Debug, Clone)]
pub struct DedupPlan {
    /// Every content group, unique ones included
    pub groups: Vec<DuplicateGroup>,
    /// Moves into the quarantine, sorted by source path
    pub relocations: Vec<Relocation>,
    /// Counts over `groups`
    pub stats: GroupingStats,
}

impl DedupPlan {
    /// Files that stay in place, one per content group.
    pub fn survivors(&self) -> impl Iterator<Item = &FileEntry> + '_ {
        self.groups.iter().filter_map(DuplicateGroup::survivor)
    }

    /// Bytes that would move.
    #[must_use]
    pub fn bytes_planned(&self) -> u64 {
        self.relocations.iter().map(|r| r.size).sum()
    }
}

/// Outcome of [`run_dedup`].
#[derive(Debug)]
pub struct DedupReport {
    /// Resolved root
    pub root: PathBuf,
    /// Resolved quarantine directory
    pub quarantine: PathBuf,
    /// Whether this was a dry run
    pub dry_run: bool,
    /// Regular files found outside the quarantine
    pub scanned_files: usize,
    /// Entries the walker could not read
    pub scan_errors: usize,
    /// Files that could not be hashed
    pub hash_failures: Vec<HashError>,
    /// Grouping counts
    pub stats: GroupingStats,
    /// Planned moves
    pub plan: Vec<Relocation>,
    /// Move results, absent on a dry run
    pub relocation: Option<BatchRelocateResult>,
    /// Reclamation results, absent on a dry run or with `keep_empty_dirs`
    pub reclaimed: Option<ReclaimResult>,
}

/// Quarantine directory for `root`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidQuarantine`] unless `name` is a single
/// plain directory name.
pub fn quarantine_root(root: &Path, name: &str) -> Result<PathBuf, ConfigError> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(root.join(name)),
        (None, _) => Err(ConfigError::InvalidQuarantine {
            name: name.to_string(),
            reason: "name is empty",
        }),
        _ => Err(ConfigError::InvalidQuarantine {
            name: name.to_string(),
            reason: "must be a single directory name",
        }),
    }
}

/// Plan the quarantine moves for a set of groups.
///
/// Every redundant file maps to `quarantine` plus its path relative to
/// `root`; occupied or already-planned destinations get a ` (n)` suffix.
#[must_use]
pub fn plan_dedup(root: &Path, quarantine: &Path, groups: Vec<DuplicateGroup>) -> DedupPlan {
    let stats = GroupingStats::from_groups(&groups);

    let mut redundant: Vec<&FileEntry> = groups.iter().flat_map(DuplicateGroup::redundant).collect();
    redundant.sort_by(|a, b| a.path.cmp(&b.path));

    let mut allocator = DestinationAllocator::new();
    let relocations = redundant
        .into_iter()
        .map(|file| {
            let relative = match file.path.strip_prefix(root) {
                Ok(rel) => rel.to_path_buf(),
                Err(_) => {
                    log::warn!(
                        "{} is outside {}, quarantining by file name",
                        file.path.display(),
                        root.display()
                    );
                    PathBuf::from(file.path.file_name().unwrap_or_default())
                }
            };
            let destination = allocator.allocate(&quarantine.join(relative));
            Relocation::new(
                file.path.clone(),
                destination,
                RelocationKind::File,
                file.size,
            )
        })
        .collect();

    DedupPlan {
        groups,
        relocations,
        stats,
    }
}

/// Deduplicate one tree.
///
/// # Errors
///
/// Returns [`ConfigError`] if the root is missing or not a directory, or
/// the quarantine name is invalid. Per-file failures are recorded in the
/// report instead.
pub fn run_dedup(options: &DedupOptions) -> Result<DedupReport, ConfigError> {
    if !options.root.exists() {
        return Err(ConfigError::RootMissing {
            label: "root",
            path: options.root.clone(),
        });
    }
    if !options.root.is_dir() {
        return Err(ConfigError::RootNotDirectory {
            label: "root",
            path: options.root.clone(),
        });
    }

    let root = resolve_lenient(&options.root);
    let quarantine = quarantine_root(&root, &options.quarantine_name)?;
    log::info!(
        "Deduplicating {} (quarantine: {}, {})",
        root.display(),
        quarantine.display(),
        if options.dry_run { "dry run" } else { "apply" }
    );

    let walker = Walker::new(
        &root,
        WalkerConfig::new(options.follow_symlinks, vec![quarantine.clone()]),
    );
    let walked = walker.collect();
    let files = if options.follow_symlinks {
        drop_link_aliases(walked.regular)
    } else {
        walked.regular
    };
    let scanned_files = files.len();

    let hash_config = HashConfig::default()
        .with_io_threads(options.io_threads)
        .with_phase(PHASE_SCAN)
        .with_progress_callback(options.progress.clone());
    let hashed = hash_entries(files, &options.hasher, &hash_config);

    let plan = plan_dedup(walker.root(), &quarantine, group_by_digest(hashed.hashed));
    log::info!(
        "{} duplicate groups, {} kept in place, {} to move",
        plan.stats.duplicate_groups,
        plan.stats.unique_contents,
        plan.relocations.len()
    );

    let mut report = DedupReport {
        root: root.clone(),
        quarantine: quarantine.clone(),
        dry_run: options.dry_run,
        scanned_files,
        scan_errors: walked.errors.len(),
        hash_failures: hashed.failures,
        stats: plan.stats,
        plan: plan.relocations,
        relocation: None,
        reclaimed: None,
    };

    if options.dry_run {
        for item in &report.plan {
            log::debug!(
                "[PLAN file] {} -> {}",
                item.source.display(),
                item.destination.display()
            );
        }
        log::info!("Dry run complete, no changes made");
        return Ok(report);
    }

    if let Err(e) = fs::create_dir_all(&quarantine) {
        log::error!(
            "Cannot create quarantine directory {}: {}",
            quarantine.display(),
            e
        );
    }

    report.relocation = Some(relocate_batch(&report.plan, options.progress.as_deref()));

    if !options.keep_empty_dirs {
        report.reclaimed = Some(remove_empty_dirs(
            &root,
            &[quarantine],
            options.progress.as_deref(),
        ));
    }

    Ok(report)
}

/// Keep one entry per underlying file when directory links are followed.
///
/// A file seen through a followed link and through its real path must not
/// group with itself: moving either path moves the only copy. The entry at
/// the real path wins.
fn drop_link_aliases(files: Vec<FileEntry>) -> Vec<FileEntry> {
    let mut seen: HashMap<PathBuf, usize> = HashMap::new();
    let mut kept: Vec<FileEntry> = Vec::with_capacity(files.len());

    for file in files {
        let Ok(canonical) = fs::canonicalize(&file.path) else {
            kept.push(file);
            continue;
        };
        match seen.get(&canonical) {
            Some(&idx) => {
                let (alias, real) = if file.path == canonical {
                    (std::mem::replace(&mut kept[idx], file), &kept[idx])
                } else {
                    (file, &kept[idx])
                };
                log::debug!(
                    "Skipping {} (same file as {})",
                    alias.path.display(),
                    real.path.display()
                );
            }
            None => {
                seen.insert(canonical, kept.len());
                kept.push(file);
            }
        }
    }
    kept
}
