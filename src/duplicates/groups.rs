//! Content grouping and survivor selection.
//!
//! # Overview
//!
//! Files are grouped by [`ContentDigest`]. A group with a single member is
//! unique content and needs no action. In a group with several members
//! exactly one file, the *survivor*, stays where it is; the others are
//! redundant.
//!
//! ## Survivor rule
//!
//! 1. Newest modification time wins.
//! 2. Among files whose times are within [`MTIME_EPSILON`] of the newest,
//!    the shortest path string wins.
//! 3. If lengths are equal, the lexicographically smallest path wins.
//!
//! The rule depends only on the set of members, never on their order.
//!
//! # Example
//!
//! ```
//! use treesift::duplicates::{group_by_digest, select_survivor};
//! use treesift::scanner::{ContentDigest, FileEntry};
//! use std::path::PathBuf;
//! use std::time::{Duration, UNIX_EPOCH};
//!
//! let digest = ContentDigest::from_hex("ab");
//! let older = FileEntry::regular(PathBuf::from("/t/a/x.txt"), 1, UNIX_EPOCH + Duration::from_secs(10));
//! let newer = FileEntry::regular(PathBuf::from("/t/b/x.txt"), 1, UNIX_EPOCH + Duration::from_secs(20));
//!
//! let groups = group_by_digest(vec![(older, digest.clone()), (newer, digest)]);
//! assert_eq!(groups.len(), 1);
//! assert_eq!(groups[0].survivor().unwrap().path, PathBuf::from("/t/b/x.txt"));
//! ```

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::scanner::{ContentDigest, FileEntry};

/// Modification times closer than this (in seconds) count as equal.
pub const MTIME_EPSILON: f64 = 1e-6;

/// Files sharing one content digest.
#[derive(Debug, Clone)]
pub struct DuplicateGroup {
    /// Content digest shared by every member
    pub digest: ContentDigest,
    /// Members in walk order
    pub files: Vec<FileEntry>,
    survivor: Option<usize>,
}

impl DuplicateGroup {
    /// Create a group and select its survivor.
    #[must_use]
    pub fn new(digest: ContentDigest, files: Vec<FileEntry>) -> Self {
        let survivor = select_survivor(&files);
        Self {
            digest,
            files,
            survivor,
        }
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// True when the group has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// True when the group holds more than one file.
    #[must_use]
    pub fn has_duplicates(&self) -> bool {
        self.files.len() > 1
    }

    /// Size of one copy in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.files.first().map_or(0, |f| f.size)
    }

    /// The member that stays in place.
    #[must_use]
    pub fn survivor(&self) -> Option<&FileEntry> {
        self.survivor.and_then(|idx| self.files.get(idx))
    }

    /// Every member except the survivor.
    pub fn redundant(&self) -> impl Iterator<Item = &FileEntry> + '_ {
        self.files
            .iter()
            .enumerate()
            .filter(move |(idx, _)| Some(*idx) != self.survivor)
            .map(|(_, f)| f)
    }

    /// Bytes taken up by redundant copies.
    #[must_use]
    pub fn wasted_space(&self) -> u64 {
        self.redundant().map(|f| f.size).sum()
    }
}

/// Index of the survivor among `files`, or `None` for an empty slice.
#[must_use]
pub fn select_survivor(files: &[FileEntry]) -> Option<usize> {
    let newest = files
        .iter()
        .map(FileEntry::mtime_secs)
        .fold(f64::NEG_INFINITY, f64::max);

    files
        .iter()
        .enumerate()
        .filter(|(_, f)| {
            let m = f.mtime_secs();
            m == newest || newest - m < MTIME_EPSILON
        })
        .min_by(|(_, a), (_, b)| compare_paths(a, b))
        .map(|(idx, _)| idx)
}

/// Shorter path string first, then lexicographic.
fn compare_paths(a: &FileEntry, b: &FileEntry) -> Ordering {
    let a = a.path.to_string_lossy();
    let b = b.path.to_string_lossy();
    a.chars()
        .count()
        .cmp(&b.chars().count())
        .then_with(|| a.cmp(&b))
}

/// Group hashed files by digest.
///
/// Groups come back ordered by digest and members keep their input order,
/// so the same input always yields the same groups.
#[must_use]
pub fn group_by_digest(hashed: Vec<(FileEntry, ContentDigest)>) -> Vec<DuplicateGroup> {
    let mut by_digest: BTreeMap<ContentDigest, Vec<FileEntry>> = BTreeMap::new();
    for (file, digest) in hashed {
        by_digest.entry(digest).or_default().push(file);
    }

    by_digest
        .into_iter()
        .map(|(digest, files)| {
            if files.len() > 1 {
                log::debug!("Duplicate group {}: {} files", digest.short(), files.len());
            }
            DuplicateGroup::new(digest, files)
        })
        .collect()
}

/// Counts describing a set of groups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupingStats {
    /// Files across all groups
    pub total_files: usize,
    /// Distinct digests
    pub unique_contents: usize,
    /// Groups with more than one member
    pub duplicate_groups: usize,
    /// Files that are not survivors
    pub redundant_files: usize,
    /// Bytes held by redundant files
    pub wasted_space: u64,
}

impl GroupingStats {
    /// Compute statistics for `groups`.
    #[must_use]
    pub fn from_groups(groups: &[DuplicateGroup]) -> Self {
        groups.iter().fold(Self::default(), |mut stats, group| {
            stats.total_files += group.len();
            stats.unique_contents += 1;
            if group.has_duplicates() {
                stats.duplicate_groups += 1;
                stats.redundant_files += group.len() - 1;
                stats.wasted_space += group.wasted_space();
            }
            stats
        })
    }
}
