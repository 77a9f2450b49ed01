//! Cross-tree reconciliation.
//!
//! # Overview
//!
//! Given a *current* tree and an *older* copy of it, find the regular files
//! in the older tree whose content exists nowhere in the current tree and
//! move them to a destination tree. Every symbolic link in the older tree is
//! moved to a separate symlink destination, whatever it points to. Relative
//! paths under the older root are kept in both destinations.
//!
//! The run has four steps:
//!
//! 1. [`validate_roots`]: pre-flight checks, before anything is read or written
//! 2. [`build_membership`]: digest every regular file in the current tree
//! 3. [`plan_reconcile`]: walk the older tree and decide what moves
//! 4. [`run_reconcile`]: execute the plan (with `apply`) and reclaim empty
//!    directories in the older tree
//!
//! Without `apply` nothing on disk changes.
//!
//! # Example
//!
//! ```no_run
//! use treesift::reconcile::{run_reconcile, ReconcileOptions};
//! use std::path::PathBuf;
//!
//! let options = ReconcileOptions::new(
//!     PathBuf::from("/backup/current"),
//!     PathBuf::from("/backup/2019"),
//!     PathBuf::from("/backup/rescued"),
//!     PathBuf::from("/backup/rescued-links"),
//! );
//! let report = run_reconcile(&options).unwrap();
//! println!("{} files and {} links would move", report.plan.regular.len(), report.plan.symlinks.len());
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::actions::{
    relocate_batch, remove_empty_dirs, BatchRelocateResult, DestinationAllocator, ReclaimResult,
    Relocation, RelocationKind,
};
use crate::duplicates::{hash_entries, HashConfig, DEFAULT_IO_THREADS};
use crate::error::ConfigError;
use crate::progress::{ProgressCallback, PHASE_INDEX, PHASE_SCAN};
use crate::scanner::{
    is_subpath, resolve_lenient, ContentDigest, FileEntry, HashError, Hasher, Walker,
    WalkerConfig,
};

/// Digests present in the current tree.
pub type MembershipSet = HashSet<ContentDigest>;

/// Options for a reconciliation run.
#[derive(Clone)]
pub struct ReconcileOptions {
    /// Reference tree; never modified
    pub current: PathBuf,
    /// Tree whose unique content is rescued
    pub older: PathBuf,
    /// Destination for regular files
    pub dest: PathBuf,
    /// Destination for symbolic links
    pub symlinks_dest: PathBuf,
    /// Perform the moves (preview otherwise)
    pub apply: bool,
    /// Skip empty-directory removal in the older tree
    pub keep_empty_dirs: bool,
    /// Content hasher, shared by both trees
    pub hasher: Hasher,
    /// Hashing threads
    pub io_threads: usize,
    /// Optional progress callback
    pub progress: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for ReconcileOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconcileOptions")
            .field("current", &self.current)
            .field("older", &self.older)
            .field("dest", &self.dest)
            .field("symlinks_dest", &self.symlinks_dest)
            .field("apply", &self.apply)
            .field("keep_empty_dirs", &self.keep_empty_dirs)
            .field("hasher", &self.hasher)
            .field("io_threads", &self.io_threads)
            .finish_non_exhaustive()
    }
}

impl ReconcileOptions {
    /// Preview-mode defaults for the four paths.
    #[must_use]
    pub fn new(current: PathBuf, older: PathBuf, dest: PathBuf, symlinks_dest: PathBuf) -> Self {
        Self {
            current,
            older,
            dest,
            symlinks_dest,
            apply: false,
            keep_empty_dirs: false,
            hasher: Hasher::default(),
            io_threads: DEFAULT_IO_THREADS,
            progress: None,
        }
    }

    /// Perform the moves.
    #[must_use]
    pub fn with_apply(mut self, apply: bool) -> Self {
        self.apply = apply;
        self
    }

    /// Keep directories left empty in the older tree.
    #[must_use]
    pub fn with_keep_empty_dirs(mut self, keep: bool) -> Self {
        self.keep_empty_dirs = keep;
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

    fn hash_config(&self, phase: &'static str) -> HashConfig {
        HashConfig::default()
            .with_io_threads(self.io_threads)
            .with_phase(phase)
            .with_progress_callback(self.progress.clone())
    }
}

/// Roots that passed pre-flight validation, resolved to absolute paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRoots {
    /// Current tree
    pub current: PathBuf,
    /// Older tree
    pub older: PathBuf,
    /// Regular-file destination
    pub dest: PathBuf,
    /// Symlink destination
    pub symlinks_dest: PathBuf,
    /// Subtrees of the older tree that must not be walked or reclaimed
    pub excluded_from_older: Vec<PathBuf>,
    /// Legal but questionable layouts, already logged
    pub cautions: Vec<String>,
}

/// Pre-flight checks for a reconciliation.
///
/// # Errors
///
/// Returns [`ConfigError`] if either root is missing or not a directory,
/// the roots are the same directory, a destination lies inside the current
/// tree, or a destination is the older root itself.
pub fn validate_roots(
    current: &Path,
    older: &Path,
    dest: &Path,
    symlinks_dest: &Path,
) -> Result<ValidatedRoots, ConfigError> {
    for (label, path) in [("current", current), ("older", older)] {
        if !path.exists() {
            return Err(ConfigError::RootMissing {
                label,
                path: path.to_path_buf(),
            });
        }
        if !path.is_dir() {
            return Err(ConfigError::RootNotDirectory {
                label,
                path: path.to_path_buf(),
            });
        }
    }

    let current = resolve_lenient(current);
    let older = resolve_lenient(older);
    if current == older {
        return Err(ConfigError::IdenticalRoots(current));
    }

    let dest = resolve_lenient(dest);
    let symlinks_dest = resolve_lenient(symlinks_dest);
    let destinations = [("destination", &dest), ("symlink destination", &symlinks_dest)];

    for (label, path) in destinations {
        if is_subpath(path, &current) {
            return Err(ConfigError::DestinationInsideCurrent {
                label,
                path: path.clone(),
            });
        }
        if *path == older {
            return Err(ConfigError::DestinationIsOlder {
                label,
                path: path.clone(),
            });
        }
    }

    let mut excluded_from_older = Vec::new();
    let mut cautions = Vec::new();

    for (label, path) in destinations {
        if path.starts_with(&older) {
            cautions.push(format!(
                "{label} {} is inside the older folder; it is skipped when scanning and may slow cleanup",
                path.display()
            ));
            if !excluded_from_older.contains(path) {
                excluded_from_older.push(path.clone());
            }
        }
    }
    if current.starts_with(&older) {
        cautions.push(format!(
            "current folder {} is inside the older folder; it is skipped when scanning",
            current.display()
        ));
        excluded_from_older.push(current.clone());
    }
    if older.starts_with(&current) {
        cautions.push(format!(
            "older folder {} is inside the current folder; all of its files count as present",
            older.display()
        ));
    }

    for caution in &cautions {
        log::warn!("{}", caution);
    }

    Ok(ValidatedRoots {
        current,
        older,
        dest,
        symlinks_dest,
        excluded_from_older,
        cautions,
    })
}

/// Digests of the current tree, with what it took to build them.
#[derive(Debug, Default)]
pub struct MembershipIndex {
    /// Every digest seen
    pub digests: MembershipSet,
    /// Regular files hashed
    pub indexed_files: usize,
    /// Entries the walker could not read
    pub scan_errors: usize,
    /// Files that could not be hashed
    pub hash_failures: Vec<HashError>,
}

/// Hash every regular file under `current`. Symbolic links are ignored.
#[must_use]
pub fn build_membership(current: &Path, hasher: &Hasher, config: &HashConfig) -> MembershipIndex {
    let walker = Walker::new(current, WalkerConfig::default());
    let walked = walker.collect();
    let hashed = hash_entries(walked.regular, hasher, config);

    let index = MembershipIndex {
        indexed_files: hashed.hashed.len(),
        digests: hashed.hashed.into_iter().map(|(_, digest)| digest).collect(),
        scan_errors: walked.errors.len(),
        hash_failures: hashed.failures,
    };
    log::info!(
        "Indexed {} files in {} ({} distinct contents)",
        index.indexed_files,
        walker.root().display(),
        index.digests.len()
    );
    index
}

/// Planned reconciliation moves.
#[derive(Debug, Clone, Default)]
pub struct ReconcilePlan {
    /// Regular files whose content is absent from the current tree
    pub regular: Vec<Relocation>,
    /// Every symbolic link in the older tree
    pub symlinks: Vec<Relocation>,
    /// Regular files hashed in the older tree
    pub scanned_regular: usize,
    /// Regular files left in place because their content is present
    pub already_present: usize,
}

impl ReconcilePlan {
    /// Bytes of regular files that would move.
    #[must_use]
    pub fn bytes_planned(&self) -> u64 {
        self.regular.iter().map(|r| r.size).sum()
    }

    /// True when nothing would move.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regular.is_empty() && self.symlinks.is_empty()
    }
}

/// Decide the moves for already-hashed older files and links.
///
/// Links always move. Files move only when their digest is not in
/// `membership`. One allocator covers both destinations, so they may even
/// be the same directory.
#[must_use]
pub fn plan_moves(
    older: &Path,
    dest: &Path,
    symlinks_dest: &Path,
    membership: &MembershipSet,
    hashed: Vec<(FileEntry, ContentDigest)>,
    symlinks: Vec<FileEntry>,
) -> ReconcilePlan {
    let mut allocator = DestinationAllocator::new();
    let mut plan = ReconcilePlan {
        scanned_regular: hashed.len(),
        ..ReconcilePlan::default()
    };

    for (file, digest) in hashed {
        if membership.contains(&digest) {
            log::trace!("Present in current: {}", file.path.display());
            plan.already_present += 1;
            continue;
        }
        let destination = allocator.allocate(&target_under(older, dest, &file.path));
        plan.regular.push(Relocation::new(
            file.path,
            destination,
            RelocationKind::File,
            file.size,
        ));
    }

    for link in symlinks {
        let destination = allocator.allocate(&target_under(older, symlinks_dest, &link.path));
        plan.symlinks.push(Relocation::new(
            link.path,
            destination,
            RelocationKind::Symlink,
            link.size,
        ));
    }

    plan
}

/// `base` plus the path of `path` relative to `root`.
fn target_under(root: &Path, base: &Path, path: &Path) -> PathBuf {
    match path.strip_prefix(root) {
        Ok(relative) => base.join(relative),
        Err(_) => {
            log::warn!(
                "{} is outside {}, using its file name only",
                path.display(),
                root.display()
            );
            base.join(path.file_name().unwrap_or_default())
        }
    }
}

/// Outcome of walking and hashing the older tree.
#[derive(Debug, Default)]
pub struct OlderScan {
    /// The plan
    pub plan: ReconcilePlan,
    /// Entries the walker could not read
    pub scan_errors: usize,
    /// Files that could not be hashed (left in place)
    pub hash_failures: Vec<HashError>,
}

/// Walk the older tree and plan every move.
#[must_use]
pub fn plan_reconcile(
    roots: &ValidatedRoots,
    membership: &MembershipSet,
    hasher: &Hasher,
    config: &HashConfig,
) -> OlderScan {
    let walker = Walker::new(
        &roots.older,
        WalkerConfig::new(false, roots.excluded_from_older.clone()),
    );
    let walked = walker.collect();
    log::info!(
        "Scanning older folder: {} files and {} symlinks",
        walked.regular.len(),
        walked.symlinks.len()
    );

    let hashed = hash_entries(walked.regular, hasher, config);
    let plan = plan_moves(
        walker.root(),
        &roots.dest,
        &roots.symlinks_dest,
        membership,
        hashed.hashed,
        walked.symlinks,
    );
    log::info!(
        "Plan ready: {} files and {} symlinks to move, {} files already present",
        plan.regular.len(),
        plan.symlinks.len(),
        plan.already_present
    );

    OlderScan {
        plan,
        scan_errors: walked.errors.len(),
        hash_failures: hashed.failures,
    }
}

/// Outcome of [`run_reconcile`].
#[derive(Debug)]
pub struct ReconcileReport {
    /// Validated roots
    pub roots: ValidatedRoots,
    /// Whether moves were performed
    pub applied: bool,
    /// Regular files hashed in the current tree
    pub indexed_files: usize,
    /// Distinct digests in the current tree
    pub unique_digests: usize,
    /// The plan
    pub plan: ReconcilePlan,
    /// Unreadable entries across both walks
    pub scan_errors: usize,
    /// Files in either tree that could not be hashed
    pub hash_failures: Vec<HashError>,
    /// Regular-file move results, present with `apply`
    pub relocation_files: Option<BatchRelocateResult>,
    /// Symlink move results, present with `apply`
    pub relocation_symlinks: Option<BatchRelocateResult>,
    /// Reclamation results, present with `apply` unless empty dirs are kept
    pub reclaimed: Option<ReclaimResult>,
}

/// Reconcile the older tree against the current tree.
///
/// # Errors
///
/// Returns [`ConfigError`] when pre-flight validation fails. Nothing has
/// been read or written at that point.
pub fn run_reconcile(options: &ReconcileOptions) -> Result<ReconcileReport, ConfigError> {
    let roots = validate_roots(
        &options.current,
        &options.older,
        &options.dest,
        &options.symlinks_dest,
    )?;
    log::info!(
        "Reconciling {} against {} ({})",
        roots.older.display(),
        roots.current.display(),
        if options.apply { "apply" } else { "preview" }
    );

    let membership = build_membership(
        &roots.current,
        &options.hasher,
        &options.hash_config(PHASE_INDEX),
    );
    let older = plan_reconcile(
        &roots,
        &membership.digests,
        &options.hasher,
        &options.hash_config(PHASE_SCAN),
    );

    let mut hash_failures = membership.hash_failures;
    hash_failures.extend(older.hash_failures);

    let mut report = ReconcileReport {
        indexed_files: membership.indexed_files,
        unique_digests: membership.digests.len(),
        plan: older.plan,
        scan_errors: membership.scan_errors + older.scan_errors,
        hash_failures,
        applied: options.apply,
        relocation_files: None,
        relocation_symlinks: None,
        reclaimed: None,
        roots,
    };

    if !options.apply {
        for item in report.plan.regular.iter().chain(&report.plan.symlinks) {
            log::debug!(
                "[PLAN {}] {} -> {}",
                item.kind,
                item.source.display(),
                item.destination.display()
            );
        }
        log::info!("Preview complete, no changes made");
        return Ok(report);
    }

    for dir in [&report.roots.dest, &report.roots.symlinks_dest] {
        if let Err(e) = fs::create_dir_all(dir) {
            log::error!("Cannot create destination {}: {}", dir.display(), e);
        }
    }

    let progress = options.progress.as_deref();
    report.relocation_files = Some(relocate_batch(&report.plan.regular, progress));
    report.relocation_symlinks = Some(relocate_batch(&report.plan.symlinks, progress));

    if !options.keep_empty_dirs {
        report.reclaimed = Some(remove_empty_dirs(
            &report.roots.older,
            &report.roots.excluded_from_older,
            progress,
        ));
    }

    Ok(report)
}
