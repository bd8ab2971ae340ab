//! Data management commands: backup, restore, prune, clear and check.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use descansa_core::Clock;
use descansa_store::Tracker;

use super::util::{absolute_path, write_list};

pub fn backup<C: Clock, W: Write>(writer: &mut W, tracker: &Tracker<C>, path: &Path) -> Result<()> {
    let path = absolute_path(path)?;
    tracker
        .backup_all_data(&path)
        .context("failed to write backup")?;
    writeln!(
        writer,
        "Backed up {} sessions to {}",
        tracker.session_count(),
        path.display()
    )?;
    Ok(())
}

pub fn restore<C: Clock, W: Write>(
    writer: &mut W,
    tracker: &mut Tracker<C>,
    path: &Path,
) -> Result<()> {
    let path = absolute_path(path)?;
    tracker
        .restore_from_backup(&path)
        .with_context(|| format!("failed to restore from {}", path.display()))?;
    writeln!(
        writer,
        "Restored {} sessions from {}",
        tracker.session_count(),
        path.display()
    )?;
    write_list(
        writer,
        "Skipped records",
        &tracker
            .diagnostics()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>(),
    )?;
    Ok(())
}

pub fn prune<C: Clock, W: Write>(writer: &mut W, tracker: &mut Tracker<C>, keep_days: u32) -> Result<()> {
    let removed = tracker.clear_old_data(keep_days);
    writeln!(
        writer,
        "Removed {removed} sessions older than {keep_days} days ({} left)",
        tracker.session_count()
    )?;
    Ok(())
}

pub fn clear<C: Clock, W: Write>(writer: &mut W, tracker: &mut Tracker<C>) -> Result<()> {
    let count = tracker.session_count();
    tracker.clear_history();
    writeln!(writer, "Removed {count} sessions. Goals were kept.")?;
    Ok(())
}

/// Reports load issues, invariant violations and data warnings.
pub fn check<C: Clock, W: Write>(writer: &mut W, tracker: &Tracker<C>) -> Result<()> {
    let load_issues: Vec<String> = tracker
        .diagnostics()
        .iter()
        .map(ToString::to_string)
        .collect();
    let problems = tracker.validate_data_integrity();
    let warnings = tracker.data_warnings();

    writeln!(writer, "{}", tracker.system_status())?;
    write_list(writer, "Load issues", &load_issues)?;
    write_list(writer, "Integrity problems", &problems)?;
    write_list(writer, "Warnings", &warnings)?;
    if load_issues.is_empty() && problems.is_empty() && warnings.is_empty() {
        writeln!(writer, "No problems found.")?;
    }
    Ok(())
}
