//! Plain-text reports for the terminal.
//!
//! Previews list at most [`PREVIEW_LIMIT`] planned moves per category; the
//! full plan goes to the log at debug level.

use std::io::{self, Write};
use std::path::Path;

use bytesize::ByteSize;

use crate::actions::{BatchRelocateResult, Relocation};
use crate::duplicates::DedupReport;
use crate::reconcile::ReconcileReport;

/// Planned moves shown per category in a preview.
pub const PREVIEW_LIMIT: usize = 10;

/// Human-readable size using binary units.
#[must_use]
pub fn format_size(bytes: u64) -> String {
    ByteSize::b(bytes).to_string()
}

/// Write the summary of a dedup run.
///
/// # Errors
///
/// Propagates write errors.
pub fn write_dedup_report<W: Write>(
    out: &mut W,
    report: &DedupReport,
    log_file: Option<&Path>,
) -> io::Result<()> {
    let moved_bytes: u64 = report.plan.iter().map(|r| r.size).sum();
    let quarantine_name = report
        .quarantine
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    writeln!(out, "Scanned: {} ({} files)", report.root.display(), report.scanned_files)?;
    writeln!(out, "Groups with duplicates: {}", report.stats.duplicate_groups)?;
    writeln!(
        out,
        "Kept in place: {} files (one per content group)",
        report.stats.unique_contents
    )?;
    writeln!(
        out,
        "To move to '{}': {} files ({})",
        quarantine_name,
        report.plan.len(),
        format_size(moved_bytes)
    )?;
    write_skipped(out, report.scan_errors, report.hash_failures.len())?;

    if report.dry_run {
        write_preview(out, "file", &report.plan)?;
        writeln!(out, "Dry run complete, no changes made.")?;
    } else {
        writeln!(out)?;
        writeln!(out, "==== Summary ====")?;
        if let Some(ref moved) = report.relocation {
            write_moved(out, "Files moved", moved, report.plan.len())?;
        }
        if let Some(ref reclaimed) = report.reclaimed {
            writeln!(out, "  Empty directories removed: {}", reclaimed.removed_count())?;
        }
        if let Some(ref moved) = report.relocation {
            write_failures(out, moved)?;
        }
    }

    if let Some(path) = log_file {
        writeln!(out, "  Log: {}", path.display())?;
    }
    Ok(())
}

/// Write the summary of a reconcile run.
///
/// # Errors
///
/// Propagates write errors.
pub fn write_reconcile_report<W: Write>(
    out: &mut W,
    report: &ReconcileReport,
    log_file: Option<&Path>,
    keep_empty_dirs: bool,
) -> io::Result<()> {
    let plan = &report.plan;

    writeln!(
        out,
        "Current folder: {} files indexed ({} distinct contents)",
        report.indexed_files, report.unique_digests
    )?;
    writeln!(
        out,
        "Older folder: {} files scanned, {} already present in current",
        plan.scanned_regular, plan.already_present
    )?;
    writeln!(
        out,
        "Found to move: {} files ({}) + {} symlinks",
        plan.regular.len(),
        format_size(plan.bytes_planned()),
        plan.symlinks.len()
    )?;
    write_skipped(out, report.scan_errors, report.hash_failures.len())?;
    if let Some(path) = log_file {
        writeln!(out, "Full details are in the log: {}", path.display())?;
    }

    if !report.applied {
        write_preview(out, "file", &plan.regular)?;
        write_preview(out, "symlink", &plan.symlinks)?;
        if !keep_empty_dirs {
            writeln!(out, "  Empty directories in the older folder would be removed afterwards.")?;
        }
        writeln!(out, "==== PREVIEW: no changes made (use --apply) ====")?;
        return Ok(());
    }

    writeln!(out)?;
    writeln!(out, "==== Summary ====")?;
    if let Some(ref moved) = report.relocation_files {
        write_moved(out, "Files moved", moved, plan.regular.len())?;
    }
    if let Some(ref moved) = report.relocation_symlinks {
        write_moved(out, "Symlinks moved", moved, plan.symlinks.len())?;
    }
    if let Some(ref reclaimed) = report.reclaimed {
        writeln!(
            out,
            "  Empty directories removed in the older folder: {}",
            reclaimed.removed_count()
        )?;
    }
    for moved in [&report.relocation_files, &report.relocation_symlinks]
        .into_iter()
        .flatten()
    {
        write_failures(out, moved)?;
    }
    if let Some(path) = log_file {
        writeln!(out, "  Log: {}", path.display())?;
    }
    Ok(())
}

fn write_preview<W: Write>(out: &mut W, label: &str, plan: &[Relocation]) -> io::Result<()> {
    for item in plan.iter().take(PREVIEW_LIMIT) {
        writeln!(
            out,
            "  ({label}) '{}' -> '{}'",
            item.source.display(),
            item.destination.display()
        )?;
    }
    if plan.len() > PREVIEW_LIMIT {
        writeln!(
            out,
            "  ... and {} more {label} moves (see the log)",
            plan.len() - PREVIEW_LIMIT
        )?;
    }
    Ok(())
}

fn write_moved<W: Write>(
    out: &mut W,
    label: &str,
    moved: &BatchRelocateResult,
    planned: usize,
) -> io::Result<()> {
    writeln!(
        out,
        "  {label}: {} / {} ({})",
        moved.success_count(),
        planned,
        format_size(moved.bytes_moved())
    )
}

fn write_failures<W: Write>(out: &mut W, moved: &BatchRelocateResult) -> io::Result<()> {
    for (item, error) in &moved.failures {
        writeln!(out, "  Failed: {}: {}", item.source.display(), error)?;
    }
    Ok(())
}

fn write_skipped<W: Write>(out: &mut W, scan_errors: usize, hash_failures: usize) -> io::Result<()> {
    if scan_errors + hash_failures > 0 {
        writeln!(
            out,
            "Skipped: {} unreadable entries, {} files that could not be hashed",
            scan_errors, hash_failures
        )?;
    }
    Ok(())
}
