//! Shared utilities for CLI commands.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Resolves a user-supplied path against the current directory.
///
/// The store only accepts absolute paths.
pub fn absolute_path(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("invalid path {}", path.display()))
}

/// Writes a bulleted list under `heading`, or nothing when `items` is empty.
pub fn write_list<W: std::io::Write>(writer: &mut W, heading: &str, items: &[String]) -> Result<()> {
    if items.is_empty() {
        return Ok(());
    }
    writeln!(writer, "{heading}:")?;
    for item in items {
        writeln!(writer, "- {item}")?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use descansa_core::{Clock as _, ManualClock};
    use descansa_store::Tracker;
    use tempfile::TempDir;

    /// A tracker in a temp dir with the clock at 2025-01-15 22:00 UTC.
    pub fn tracker() -> (TempDir, ManualClock, Tracker<ManualClock>) {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::at(2025, 1, 15, 22, 0, 0).unwrap();
        let tracker =
            Tracker::initialize_with_clock(dir.path().join("descansa.dat"), clock.clone()).unwrap();
        (dir, clock, tracker)
    }

    /// Records a completed session of `minutes` starting now, then moves the
    /// clock a day past the start.
    pub fn sleep(tracker: &mut Tracker<ManualClock>, clock: &ManualClock, minutes: i64) {
        let start = clock.now_seconds();
        assert!(tracker.start_sleep_session());
        clock.advance(chrono::Duration::minutes(minutes));
        tracker.end_sleep_session().unwrap().unwrap();
        clock.set(start + chrono::Duration::days(1));
    }

    pub fn output(buffer: Vec<u8>) -> String {
        String::from_utf8(buffer).unwrap()
    }
}
