//! Filesystem actions module.
//!
//! This module provides functionality for:
//! - Collision-safe moves of files and symbolic links
//! - Bottom-up removal of directories left empty
//!
//! # Relocation
//!
//! The relocate module never overwrites anything:
//! - Destinations are disambiguated as `name (1).ext`, `name (2).ext`, ...
//! - Every destination is re-checked immediately before its move
//! - Batch operations continue past individual failures
//!
//! ```no_run
//! use treesift::actions::relocate::{unique_destination, DestinationAllocator};
//! use std::path::Path;
//!
//! let mut allocator = DestinationAllocator::new();
//! let first = allocator.allocate(Path::new("/q/x.txt"));
//! let second = allocator.allocate(Path::new("/q/x.txt"));
//! assert_ne!(first, second);
//! ```
//!
//! # Reclamation
//!
//! ```no_run
//! use treesift::actions::reclaim::remove_empty_dirs;
//! use std::path::{Path, PathBuf};
//!
//! let result = remove_empty_dirs(Path::new("/data"), &[PathBuf::from("/data/Duplicates")], None);
//! println!("Removed {} directories", result.removed_count());
//! ```

pub mod reclaim;
pub mod relocate;

// Re-export commonly used types
pub use reclaim::{remove_empty_dirs, ReclaimError, ReclaimResult};
pub use relocate::{
    is_occupied, numbered_variant, relocate, relocate_batch, unique_destination,
    BatchRelocateResult, DestinationAllocator, RelocateError, Relocation, RelocationKind,
};
