//! The tracker handle: in-memory state bound to a data file and a clock.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use descansa_core::insights;
use descansa_core::stats::WEEK_DAYS;
use descansa_core::{
    Clock, CoreError, Goals, History, ScoreBreakdown, SleepQuality, SleepSession, SleepStats,
    SleepWindow, SystemClock, cutoff_before, format_duration, format_time_of_day,
};

use crate::atomic::{require_absolute, unused_sibling, write_atomic, write_atomic_creating_dirs};
use crate::codec::{self, Decoded, Diagnostic};
use crate::export::{self, ExportKind};
use crate::StoreError;

/// A snapshot of tracker health for display.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemStatus {
    pub data_path: PathBuf,
    pub session_running: bool,
    pub current_session: Duration,
    pub session_count: usize,
    pub adherence_pct: f64,
    pub sleep_debt: Duration,
    pub unsaved_changes: bool,
    pub diagnostics: usize,
}

impl fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.session_running {
            writeln!(
                f,
                "Session:     running ({})",
                format_duration(self.current_session)
            )?;
        } else {
            writeln!(f, "Session:     idle")?;
        }
        writeln!(f, "Sessions:    {} completed", self.session_count)?;
        writeln!(f, "Adherence:   {:.1}%", self.adherence_pct)?;
        writeln!(
            f,
            "Sleep debt:  {} (last {WEEK_DAYS} days)",
            format_duration(self.sleep_debt)
        )?;
        let state = if self.unsaved_changes { " (unsaved changes)" } else { "" };
        write!(f, "Data file:   {}{state}", self.data_path.display())?;
        if self.diagnostics > 0 {
            write!(f, "\nLoad issues: {}", self.diagnostics)?;
        }
        Ok(())
    }
}

/// Goals and history bound to a data file.
///
/// Mutations mark the tracker dirty; [`Tracker::save`] or
/// [`Tracker::save_if_dirty`] flush it. Dropping a tracker does not save, so
/// hosts call [`Tracker::close`] on shutdown.
#[derive(Debug)]
pub struct Tracker<C: Clock = SystemClock> {
    path: PathBuf,
    clock: C,
    goals: Goals,
    history: History,
    dirty: bool,
    diagnostics: Vec<Diagnostic>,
}

impl Tracker<SystemClock> {
    /// Opens the tracker at `path` using the device clock.
    pub fn initialize(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::initialize_with_clock(path, SystemClock)
    }
}

impl<C: Clock> Tracker<C> {
    /// Opens the tracker at `path`, loading the file if it exists.
    ///
    /// A missing file yields defaults. A structurally corrupted file is moved
    /// to `<path>.bak` (or `<path>.bak.N` when that is taken) and defaults are adopted; the reason is kept in
    /// [`Tracker::diagnostics`].
    pub fn initialize_with_clock(path: impl AsRef<Path>, clock: C) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        require_absolute(&path)?;

        let mut tracker = Self {
            path,
            clock,
            goals: Goals::default(),
            history: History::new(),
            dirty: false,
            diagnostics: Vec::new(),
        };
        tracker.load()?;
        Ok(tracker)
    }

    fn load(&mut self) -> Result<(), StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no data file, using defaults");
                return Ok(());
            }
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };

        let decoded = String::from_utf8(bytes)
            .map_err(|e| StoreError::corrupted(0, format!("not valid UTF-8: {e}")))
            .and_then(|text| codec::decode(&text));

        match decoded {
            Ok(decoded) => {
                self.adopt(decoded);
                tracing::debug!(
                    path = %self.path.display(),
                    sessions = self.history.count(),
                    running = self.history.is_running(),
                    "loaded data file"
                );
                Ok(())
            }
            Err(StoreError::Corrupted { line, reason }) => {
                self.quarantine_corrupted_file(line, reason)
            }
            Err(e) => Err(e),
        }
    }

    fn adopt(&mut self, decoded: Decoded) {
        for diagnostic in &decoded.diagnostics {
            tracing::warn!(path = %self.path.display(), %diagnostic, "dropped invalid session");
        }
        // Rewriting the file removes the dropped records.
        self.dirty = !decoded.diagnostics.is_empty();
        self.goals = decoded.goals;
        self.history = decoded.history;
        self.diagnostics = decoded.diagnostics;
    }

    fn quarantine_corrupted_file(&mut self, line: usize, reason: String) -> Result<(), StoreError> {
        let backup = unused_sibling(&self.path, ".bak");
        tracing::warn!(
            path = %self.path.display(),
            backup = %backup.display(),
            line,
            reason = %reason,
            "data file is corrupted, moving it aside and using defaults"
        );
        fs::rename(&self.path, &backup).map_err(|e| StoreError::io(&backup, e))?;
        self.goals = Goals::default();
        self.history = History::new();
        self.diagnostics = vec![Diagnostic {
            line,
            message: format!("{reason} (original kept at {})", backup.display()),
        }];
        self.dirty = true;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub const fn clock(&self) -> &C {
        &self.clock
    }

    pub const fn goals(&self) -> &Goals {
        &self.goals
    }

    pub const fn history(&self) -> &History {
        &self.history
    }

    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Problems found by the last load.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now_seconds()
    }

    /// Statistics over the loaded goals and history, evaluated now.
    pub fn stats(&self) -> SleepStats<'_, C> {
        SleepStats::new(&self.goals, &self.history, &self.clock, self.now())
    }

    fn window(&self) -> SleepWindow<'_, C> {
        SleepWindow::new(&self.goals, &self.clock)
    }

    // === Session control ===

    /// Starts a session now. Returns `false` if one is already running.
    pub fn start_sleep_session(&mut self) -> bool {
        let now = self.now();
        let started = self.history.start(now);
        if started {
            self.dirty = true;
            tracing::info!(start = %now, "sleep session started");
        }
        started
    }

    /// Ends the running session now.
    ///
    /// Returns the completed session, or `None` when nothing was running. A
    /// session that is empty or longer than 24 hours is discarded and the
    /// error returned.
    pub fn end_sleep_session(&mut self) -> Result<Option<SleepSession>, CoreError> {
        if !self.history.is_running() {
            return Ok(None);
        }
        let now = self.now();
        self.dirty = true;
        let session = self.history.end(now)?.cloned();
        if let Some(session) = &session {
            tracing::info!(
                start = %session.start,
                end = %now,
                minutes = session.duration().num_minutes(),
                "sleep session ended"
            );
        }
        Ok(session)
    }

    pub const fn is_session_running(&self) -> bool {
        self.history.is_running()
    }

    // === Goals ===

    pub fn set_target_sleep_hours(&mut self, hours: f64) -> Result<(), CoreError> {
        self.goals.set_target_sleep_hours(hours)?;
        self.dirty = true;
        Ok(())
    }

    pub fn set_target_wake_time(&mut self, hour: u8, minute: u8) -> Result<(), CoreError> {
        self.goals.set_target_wake_time(hour, minute)?;
        self.dirty = true;
        Ok(())
    }

    pub fn set_enhanced_goals(
        &mut self,
        hours: f64,
        bedtime_hour: u8,
        wake_hour: u8,
        efficiency_pct: f64,
    ) -> Result<(), CoreError> {
        self.goals
            .set_enhanced(hours, bedtime_hour, wake_hour, efficiency_pct)?;
        self.dirty = true;
        Ok(())
    }

    pub fn current_target_sleep_hours(&self) -> f64 {
        self.goals.target_sleep_hours()
    }

    pub const fn current_wake_hour(&self) -> u8 {
        self.goals.wake_hour()
    }

    pub const fn current_wake_minute(&self) -> u8 {
        self.goals.wake_minute()
    }

    // === Time window ===

    pub fn is_in_sleep_period(&self) -> bool {
        self.window().is_in_sleep_period(self.now())
    }

    pub fn is_before_target_wake_time(&self) -> bool {
        self.window().is_before_target_wake_time(self.now())
    }

    pub fn next_wake_instant(&self) -> DateTime<Utc> {
        self.window().next_wake_instant(self.now())
    }

    pub fn time_until_wake(&self) -> Duration {
        self.window().time_until_wake(self.now())
    }

    pub fn remaining_wake_time(&self) -> Duration {
        self.window().remaining_wake_time(self.now())
    }

    /// Elapsed time of the running session; zero when idle.
    pub fn current_session_duration(&self) -> Duration {
        let now = self.now();
        self.history
            .active()
            .map_or_else(Duration::zero, |session| session.elapsed(now))
    }

    pub fn remaining_work_time_formatted(&self) -> String {
        format_duration(self.remaining_wake_time())
    }

    pub fn time_until_wake_formatted(&self) -> String {
        format_duration(self.time_until_wake())
    }

    pub fn time_until_next_wake_formatted(&self) -> String {
        self.time_until_wake_formatted()
    }

    /// Local `HH:MM` of the next wake instant.
    pub fn next_wake_time_formatted(&self) -> String {
        format_time_of_day(self.clock.local_time(self.next_wake_instant()))
    }

    pub fn current_session_duration_formatted(&self) -> String {
        format_duration(self.current_session_duration())
    }

    pub fn last_sleep_duration_formatted(&self) -> String {
        format_duration(self.stats().last_sleep_duration())
    }

    pub fn average_sleep_duration_formatted(&self, days: u32) -> String {
        format_duration(self.stats().average_sleep_duration(days))
    }

    pub fn session_count(&self) -> usize {
        self.history.count()
    }

    // === Annotations on the last completed session ===

    pub fn set_sleep_quality(&mut self, rating: u8) -> Result<(), CoreError> {
        let quality = SleepQuality::try_from(rating)?;
        self.history.set_quality(quality)?;
        self.dirty = true;
        Ok(())
    }

    pub fn add_session_note(&mut self, text: &str) -> Result<(), CoreError> {
        self.history.add_note(text)?;
        self.dirty = true;
        Ok(())
    }

    pub fn mark_as_nap(&mut self, is_nap: bool) -> Result<(), CoreError> {
        self.history.mark_nap(is_nap)?;
        self.dirty = true;
        Ok(())
    }

    // === Statistics ===

    pub fn sleep_score(&self) -> f64 {
        self.stats().sleep_score()
    }

    pub fn sleep_score_breakdown(&self) -> ScoreBreakdown {
        self.stats().sleep_score_breakdown()
    }

    pub fn sleep_efficiency(&self) -> f64 {
        self.stats().sleep_efficiency()
    }

    pub fn sleep_debt(&self) -> Duration {
        self.stats().sleep_debt()
    }

    pub fn sleep_debt_formatted(&self) -> String {
        format_duration(self.sleep_debt())
    }

    pub fn is_in_sleep_debt(&self) -> bool {
        self.stats().is_in_sleep_debt()
    }

    pub fn goal_adherence(&self) -> f64 {
        self.stats().goal_adherence_pct()
    }

    pub fn is_meeting_goals(&self) -> bool {
        self.stats().is_meeting_goals()
    }

    pub fn current_recommendations(&self) -> Vec<String> {
        insights::recommendations(&self.stats())
    }

    pub fn sleep_patterns(&self) -> Vec<String> {
        insights::patterns(&self.stats())
    }

    pub fn improvement_suggestions(&self) -> Vec<String> {
        insights::improvement_suggestions(&self.stats())
    }

    pub fn sleep_score_explanation(&self) -> String {
        insights::score_explanation(&self.stats())
    }

    pub fn suggest_recovery_bedtimes(&self) -> Vec<DateTime<Utc>> {
        insights::recovery_bedtimes(&self.stats())
    }

    pub fn data_warnings(&self) -> Vec<String> {
        insights::data_warnings(&self.stats())
    }

    /// Violated invariants; empty when the state is consistent.
    pub fn validate_data_integrity(&self) -> Vec<String> {
        self.history.integrity_problems()
    }

    pub fn system_status(&self) -> SystemStatus {
        let stats = self.stats();
        SystemStatus {
            data_path: self.path.clone(),
            session_running: self.history.is_running(),
            current_session: self.current_session_duration(),
            session_count: self.history.count(),
            adherence_pct: stats.goal_adherence_pct(),
            sleep_debt: stats.sleep_debt(),
            unsaved_changes: self.dirty,
            diagnostics: self.diagnostics.len(),
        }
    }

    // === Persistence ===

    /// Writes the data file. The parent directory must exist.
    pub fn save(&mut self) -> Result<(), StoreError> {
        let contents = codec::encode(&self.goals, &self.history);
        write_atomic(&self.path, &contents)?;
        self.dirty = false;
        tracing::debug!(path = %self.path.display(), sessions = self.history.count(), "saved");
        Ok(())
    }

    /// Saves only if something changed since the last save. Returns whether it wrote.
    pub fn save_if_dirty(&mut self) -> Result<bool, StoreError> {
        if !self.dirty {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    /// Flushes pending changes and releases the tracker.
    pub fn close(mut self) -> Result<(), StoreError> {
        self.save_if_dirty().map(|_| ())
    }

    /// Removes every session, including a running one. Goals are kept.
    pub fn clear_history(&mut self) {
        self.history.clear();
        self.dirty = true;
        tracing::info!("history cleared");
    }

    /// Drops completed sessions that ended more than `days_to_keep` days ago.
    pub fn clear_old_data(&mut self, days_to_keep: u32) -> usize {
        let cutoff = cutoff_before(self.now(), Duration::days(i64::from(days_to_keep)));
        let removed = self.history.prune_before(cutoff);
        if removed > 0 {
            self.dirty = true;
            tracing::info!(removed, days_to_keep, "pruned old sessions");
        }
        removed
    }

    /// Replaces goals and history with the contents of a backup file.
    ///
    /// A backup that fails to parse leaves the tracker unchanged.
    pub fn restore_from_backup(&mut self, backup_path: impl AsRef<Path>) -> Result<(), StoreError> {
        let backup_path = backup_path.as_ref();
        require_absolute(backup_path)?;
        let text =
            fs::read_to_string(backup_path).map_err(|e| StoreError::io(backup_path, e))?;
        let decoded = codec::decode(&text)?;
        self.adopt(decoded);
        self.dirty = true;
        tracing::info!(
            from = %backup_path.display(),
            sessions = self.history.count(),
            "restored from backup"
        );
        Ok(())
    }

    // === Exports ===

    pub fn export(&self, kind: ExportKind, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let contents = match kind {
            ExportKind::Analysis => export::analysis_csv(&self.history, &self.clock),
            ExportKind::Summary => export::summary_csv(&self.stats()),
            ExportKind::Detailed => export::detailed_report(&self.stats()),
        };
        let path = path.as_ref();
        write_atomic_creating_dirs(path, &contents)?;
        tracing::debug!(kind = %kind, path = %path.display(), "exported");
        Ok(())
    }

    pub fn export_analysis_csv(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        self.export(ExportKind::Analysis, path)
    }

    pub fn export_summary_csv(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        self.export(ExportKind::Summary, path)
    }

    pub fn export_detailed_data(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        self.export(ExportKind::Detailed, path)
    }

    /// Writes the data file format with a `# BACKUP` comment line.
    pub fn backup_all_data(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let generated = self.clock.local(self.now());
        let contents = export::backup(&self.goals, &self.history, generated);
        let path = path.as_ref();
        write_atomic_creating_dirs(path, &contents)?;
        tracing::debug!(path = %path.display(), "backup written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atomic::sibling;
    use chrono::{FixedOffset, TimeZone};
    use descansa_core::ManualClock;
    use tempfile::TempDir;

    /// Tracker in a temp dir, clock at 2025-01-15 22:00 UTC.
    fn setup() -> (TempDir, ManualClock, Tracker<ManualClock>) {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::at(2025, 1, 15, 22, 0, 0).unwrap();
        let tracker =
            Tracker::initialize_with_clock(dir.path().join("descansa.dat"), clock.clone()).unwrap();
        (dir, clock, tracker)
    }

    fn reopen(tracker: &Tracker<ManualClock>, clock: &ManualClock) -> Tracker<ManualClock> {
        Tracker::initialize_with_clock(tracker.path(), clock.clone()).unwrap()
    }

    #[test]
    fn fresh_tracker_has_defaults() {
        let (_dir, _clock, tracker) = setup();
        assert_eq!(tracker.goals(), &Goals::default());
        assert_eq!(tracker.session_count(), 0);
        assert!(!tracker.is_session_running());
        assert!(!tracker.is_dirty());
        assert!(tracker.diagnostics().is_empty());
        assert!(!tracker.path().exists());
    }

    #[test]
    fn relative_path_is_rejected() {
        let clock = ManualClock::at(2025, 1, 15, 22, 0, 0).unwrap();
        let err = Tracker::initialize_with_clock("descansa.dat", clock).unwrap_err();
        assert!(matches!(err, StoreError::InvalidPath { .. }));
    }

    #[test]
    fn start_twice_is_a_noop() {
        let (_dir, clock, mut tracker) = setup();
        assert!(tracker.start_sleep_session());
        clock.advance(Duration::minutes(5));
        assert!(!tracker.start_sleep_session());
        assert_eq!(tracker.current_session_duration_formatted(), "0h 5m");
    }

    #[test]
    fn end_without_session_changes_nothing() {
        let (_dir, _clock, mut tracker) = setup();
        assert_eq!(tracker.end_sleep_session().unwrap(), None);
        assert!(!tracker.is_dirty());
    }

    #[test]
    fn short_nap_shows_in_exports() {
        let (dir, clock, mut tracker) = setup();
        tracker.start_sleep_session();
        clock.advance(Duration::minutes(30));
        let session = tracker.end_sleep_session().unwrap().unwrap();
        assert_eq!(session.duration(), Duration::minutes(30));
        tracker.mark_as_nap(true).unwrap();

        assert_eq!(tracker.last_sleep_duration_formatted(), "0h 30m");
        let csv_path = dir.path().join("out/analysis.csv");
        tracker.export_analysis_csv(&csv_path).unwrap();
        insta::assert_snapshot!(fs::read_to_string(&csv_path).unwrap().trim_end(), @r#"
        start_iso,end_iso,duration_minutes,quality,nap,note
        2025-01-15T22:00:00+00:00,2025-01-15T22:30:00+00:00,30,0,1,""
        "#);
    }

    #[test]
    fn overflowing_session_is_discarded() {
        let (_dir, clock, mut tracker) = setup();
        tracker.start_sleep_session();
        clock.advance(Duration::hours(25));
        let err = tracker.end_sleep_session().unwrap_err();
        assert_eq!(err, CoreError::DurationOverflow { minutes: 1500 });
        assert_eq!(tracker.session_count(), 0);
        assert!(!tracker.is_session_running());
    }

    #[test]
    fn annotations_need_a_completed_session() {
        let (_dir, _clock, mut tracker) = setup();
        assert_eq!(tracker.set_sleep_quality(3), Err(CoreError::NoSession));
        assert_eq!(tracker.add_session_note("x"), Err(CoreError::NoSession));
        assert!(matches!(
            tracker.set_sleep_quality(5),
            Err(CoreError::OutOfRange { field: "quality", .. })
        ));
        assert!(!tracker.is_dirty());
    }

    #[test]
    fn persistence_round_trip_keeps_analysis_csv() {
        let (dir, clock, mut tracker) = setup();
        tracker.set_target_sleep_hours(7.5).unwrap();
        tracker.set_target_wake_time(6, 30).unwrap();
        tracker.set_enhanced_goals(7.5, 23, 6, 88.0).unwrap();
        tracker.start_sleep_session();
        clock.advance(Duration::minutes(7 * 60 + 15));
        tracker.end_sleep_session().unwrap();
        tracker.set_sleep_quality(3).unwrap();
        tracker.add_session_note("slept well\nthanks").unwrap();

        let before = dir.path().join("before.csv");
        tracker.export_analysis_csv(&before).unwrap();
        tracker.save().unwrap();
        assert!(!tracker.is_dirty());

        let reloaded = reopen(&tracker, &clock);
        assert_eq!(reloaded.goals(), tracker.goals());
        assert_eq!(reloaded.history(), tracker.history());
        assert_eq!(reloaded.goals().target_sleep_minutes(), 450);
        assert_eq!(reloaded.current_wake_minute(), 30);

        let after = dir.path().join("after.csv");
        reloaded.export_analysis_csv(&after).unwrap();
        let after = fs::read_to_string(after).unwrap();
        assert_eq!(fs::read_to_string(before).unwrap(), after);
        assert!(after.ends_with(",435,3,0,\"slept well thanks\"\n"));
    }

    #[test]
    fn running_session_survives_reload() {
        let (_dir, clock, mut tracker) = setup();
        tracker.start_sleep_session();
        tracker.save().unwrap();

        clock.advance(Duration::hours(8));
        let mut reloaded = reopen(&tracker, &clock);
        assert!(reloaded.is_session_running());
        assert_eq!(reloaded.current_session_duration(), Duration::hours(8));
        let session = reloaded.end_sleep_session().unwrap().unwrap();
        assert_eq!(session.duration(), Duration::hours(8));
    }

    #[test]
    fn corrupted_file_is_moved_aside() {
        let (_dir, clock, tracker) = setup();
        fs::write(tracker.path(), "not a descansa file\n").unwrap();

        let mut reloaded = reopen(&tracker, &clock);
        assert_eq!(reloaded.goals(), &Goals::default());
        assert_eq!(reloaded.diagnostics().len(), 1);
        assert_eq!(reloaded.diagnostics()[0].line, 1);
        let backup = sibling(tracker.path(), ".bak");
        assert_eq!(fs::read_to_string(&backup).unwrap(), "not a descansa file\n");
        assert!(!tracker.path().exists());

        assert!(reloaded.save_if_dirty().unwrap());
        assert!(fs::read_to_string(tracker.path()).unwrap().starts_with("DESCANSA v1\n"));
    }

    #[test]
    fn second_corruption_keeps_first_quarantined_file() {
        let (_dir, clock, tracker) = setup();
        fs::write(tracker.path(), "first corrupted\n").unwrap();
        let mut first = reopen(&tracker, &clock);
        first.save().unwrap();

        fs::write(tracker.path(), "second corrupted\n").unwrap();
        let second = reopen(&tracker, &clock);

        let first_backup = sibling(tracker.path(), ".bak");
        let second_backup = sibling(tracker.path(), ".bak.1");
        assert_eq!(fs::read_to_string(&first_backup).unwrap(), "first corrupted\n");
        assert_eq!(fs::read_to_string(&second_backup).unwrap(), "second corrupted\n");
        assert!(second.diagnostics()[0]
            .message
            .ends_with(&format!("(original kept at {})", second_backup.display())));
    }

    #[test]
    fn invalid_sessions_are_reported_and_dropped() {
        let (_dir, clock, tracker) = setup();
        fs::write(
            tracker.path(),
            "DESCANSA v1\nSESSION start=100 end=50 q=0 nap=0 note=\"\"\nSESSION start=0 end=60 q=0 nap=0 note=\"\"\n",
        )
        .unwrap();

        let reloaded = reopen(&tracker, &clock);
        assert_eq!(reloaded.session_count(), 1);
        assert_eq!(reloaded.diagnostics().len(), 1);
        assert!(reloaded.is_dirty());
        assert!(reloaded.validate_data_integrity().is_empty());
    }

    #[test]
    fn backup_then_initialize_is_equivalent() {
        let (dir, clock, mut tracker) = setup();
        tracker.set_enhanced_goals(7.0, 22, 6, 90.0).unwrap();
        for _ in 0..3 {
            tracker.start_sleep_session();
            clock.advance(Duration::hours(7));
            tracker.end_sleep_session().unwrap();
            clock.advance(Duration::hours(17));
        }
        tracker.start_sleep_session();

        let backup = dir.path().join("backups/descansa.bak.txt");
        tracker.backup_all_data(&backup).unwrap();
        let text = fs::read_to_string(&backup).unwrap();
        assert!(text.starts_with("# BACKUP 2025-01-18T22:00:00+00:00\n"));

        let restored = Tracker::initialize_with_clock(&backup, clock.clone()).unwrap();
        assert_eq!(restored.goals(), tracker.goals());
        assert_eq!(restored.history(), tracker.history());
    }

    #[test]
    fn restore_from_backup_replaces_state() {
        let (dir, clock, mut tracker) = setup();
        tracker.start_sleep_session();
        clock.advance(Duration::hours(8));
        tracker.end_sleep_session().unwrap();
        let backup = dir.path().join("backup.txt");
        tracker.backup_all_data(&backup).unwrap();

        tracker.clear_history();
        tracker.set_target_sleep_hours(6.0).unwrap();
        tracker.save().unwrap();

        tracker.restore_from_backup(&backup).unwrap();
        assert_eq!(tracker.session_count(), 1);
        assert_eq!(tracker.goals(), &Goals::default());
        assert!(tracker.is_dirty());
    }

    #[test]
    fn corrupted_backup_leaves_state_unchanged() {
        let (dir, clock, mut tracker) = setup();
        tracker.start_sleep_session();
        clock.advance(Duration::hours(8));
        tracker.end_sleep_session().unwrap();
        let bad = dir.path().join("bad.txt");
        fs::write(&bad, "garbage").unwrap();

        let err = tracker.restore_from_backup(&bad).unwrap_err();
        assert!(matches!(err, StoreError::Corrupted { .. }));
        assert_eq!(tracker.session_count(), 1);
        assert!(bad.exists());
    }

    #[test]
    fn clear_history_keeps_goals() {
        let (_dir, clock, mut tracker) = setup();
        tracker.set_target_sleep_hours(9.0).unwrap();
        tracker.start_sleep_session();
        clock.advance(Duration::hours(1));
        tracker.end_sleep_session().unwrap();
        tracker.start_sleep_session();

        tracker.clear_history();
        assert_eq!(tracker.session_count(), 0);
        assert!(!tracker.is_session_running());
        assert_eq!(tracker.goals().target_sleep_minutes(), 540);
    }

    #[test]
    fn clear_old_data_drops_sessions_by_end() {
        let (_dir, clock, mut tracker) = setup();
        for _ in 0..5 {
            tracker.start_sleep_session();
            clock.advance(Duration::hours(8));
            tracker.end_sleep_session().unwrap();
            clock.advance(Duration::hours(16));
        }
        tracker.save().unwrap();
        assert_eq!(tracker.clear_old_data(30), 0);
        assert!(!tracker.is_dirty());
        // Sessions ended 16h, 1d16h, 2d16h, 3d16h and 4d16h ago.
        assert_eq!(tracker.clear_old_data(2), 3);
        assert_eq!(tracker.session_count(), 2);
        assert!(tracker.is_dirty());
    }

    #[test]
    fn clear_old_data_with_huge_retention_keeps_everything() {
        let (_dir, clock, mut tracker) = setup();
        tracker.start_sleep_session();
        clock.advance(Duration::hours(8));
        tracker.end_sleep_session().unwrap();

        assert_eq!(tracker.clear_old_data(u32::MAX), 0);
        assert_eq!(tracker.session_count(), 1);
        assert_eq!(tracker.average_sleep_duration_formatted(u32::MAX), "8h 0m");
    }

    #[test]
    fn save_if_dirty_skips_clean_state() {
        let (_dir, _clock, mut tracker) = setup();
        assert!(!tracker.save_if_dirty().unwrap());
        assert!(!tracker.path().exists());
        tracker.start_sleep_session();
        assert!(tracker.save_if_dirty().unwrap());
        assert!(tracker.path().exists());
    }

    #[test]
    fn close_flushes_pending_changes() {
        let (_dir, clock, mut tracker) = setup();
        tracker.start_sleep_session();
        let path = tracker.path().to_path_buf();
        tracker.close().unwrap();
        let reloaded = Tracker::initialize_with_clock(&path, clock).unwrap();
        assert!(reloaded.is_session_running());
    }

    #[test]
    fn save_fails_when_directory_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::at(2025, 1, 15, 22, 0, 0).unwrap();
        let mut tracker =
            Tracker::initialize_with_clock(dir.path().join("missing/descansa.dat"), clock).unwrap();
        tracker.start_sleep_session();
        assert!(matches!(tracker.save(), Err(StoreError::Io { .. })));
        assert!(tracker.is_dirty());
        assert!(tracker.is_session_running());
    }

    #[test]
    fn window_queries_use_the_clock() {
        let (_dir, clock, tracker) = setup();
        // 22:00 UTC, default goals: bedtime 23:00, wake 07:00.
        assert!(!tracker.is_in_sleep_period());
        assert!(!tracker.is_before_target_wake_time());
        assert_eq!(tracker.remaining_work_time_formatted(), "1h 0m");
        assert_eq!(tracker.time_until_wake_formatted(), "9h 0m");
        assert_eq!(tracker.time_until_next_wake_formatted(), "9h 0m");
        assert_eq!(tracker.next_wake_time_formatted(), "07:00");

        clock.advance(Duration::minutes(90));
        assert!(tracker.is_in_sleep_period());
        assert!(tracker.is_before_target_wake_time());
        assert_eq!(tracker.remaining_work_time_formatted(), "0h 0m");
    }

    #[test]
    fn window_queries_follow_the_local_offset() {
        let dir = tempfile::tempdir().unwrap();
        let instant = Utc.with_ymd_and_hms(2025, 1, 15, 22, 0, 0).unwrap();
        // 22:00 UTC is 07:00 the next day in UTC+9.
        let clock = ManualClock::new(instant, FixedOffset::east_opt(9 * 3600).unwrap());
        let tracker = Tracker::initialize_with_clock(dir.path().join("d.dat"), clock).unwrap();
        assert!(!tracker.is_in_sleep_period());
        assert_eq!(tracker.time_until_wake_formatted(), "24h 0m");
    }

    #[test]
    fn system_status_renders() {
        let (_dir, clock, mut tracker) = setup();
        tracker.start_sleep_session();
        clock.advance(Duration::minutes(65));
        let status = tracker.system_status();
        assert!(status.session_running);
        let rendered = status.to_string();
        assert!(rendered.starts_with("Session:     running (1h 5m)\nSessions:    0 completed\n"));
        assert!(rendered.ends_with("(unsaved changes)"));
    }

    #[test]
    fn export_kinds_write_files() {
        let (dir, _clock, tracker) = setup();
        for kind in [ExportKind::Analysis, ExportKind::Summary, ExportKind::Detailed] {
            let path = dir.path().join(format!("exports/{kind}.txt"));
            tracker.export(kind, &path).unwrap();
            assert!(fs::metadata(&path).unwrap().len() > 0);
        }
        assert!(matches!(
            tracker.export_summary_csv("relative.csv"),
            Err(StoreError::InvalidPath { .. })
        ));
    }
}
