//! Duplicate detection module.
//!
//! This module provides functionality for:
//! - Parallel content hashing (`finder`)
//! - Digest grouping and survivor selection (`groups`)
//! - The single-tree deduplication pipeline (`dedup`)

pub mod dedup;
pub mod finder;
pub mod groups;

pub use dedup::{
    plan_dedup, quarantine_root, run_dedup, DedupOptions, DedupPlan, DedupReport,
    DEFAULT_QUARANTINE_DIR,
};
pub use finder::{hash_entries, HashConfig, HashOutcome, DEFAULT_IO_THREADS};
pub use groups::{group_by_digest, select_survivor, DuplicateGroup, GroupingStats, MTIME_EPSILON};
