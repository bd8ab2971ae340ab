//! Report and export commands.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use descansa_core::Clock;
use descansa_store::export::detailed_report;
use descansa_store::{ExportKind, Tracker};

use super::util::absolute_path;

/// Prints the detailed report followed by the score breakdown.
pub fn run<C: Clock, W: Write>(writer: &mut W, tracker: &Tracker<C>) -> Result<()> {
    write!(writer, "{}", detailed_report(&tracker.stats()))?;
    writeln!(writer)?;
    writeln!(writer, "{}", tracker.sleep_score_explanation().trim_end())?;
    Ok(())
}

pub fn export<C: Clock, W: Write>(
    writer: &mut W,
    tracker: &Tracker<C>,
    kind: ExportKind,
    path: &Path,
) -> Result<()> {
    let path = absolute_path(path)?;
    tracker
        .export(kind, &path)
        .with_context(|| format!("failed to export {kind} data"))?;
    writeln!(writer, "Exported {kind} data to {}", path.display())?;
    Ok(())
}
