//! Ordered store of completed sessions plus the active one.

use chrono::{DateTime, Duration, Utc};

use crate::error::CoreError;
use crate::session::{SleepQuality, SleepSession};

/// `now - window`, saturating at the earliest representable instant.
pub fn cutoff_before(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    now.checked_sub_signed(window)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Completed sessions in ascending start order, and at most one running session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History {
    completed: Vec<SleepSession>,
    active: Option<SleepSession>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn completed(&self) -> &[SleepSession] {
        &self.completed
    }

    pub const fn active(&self) -> Option<&SleepSession> {
        self.active.as_ref()
    }

    pub const fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Number of completed sessions.
    pub fn count(&self) -> usize {
        self.completed.len()
    }

    /// Most recent completed session (latest start).
    pub fn last_completed(&self) -> Option<&SleepSession> {
        self.completed.last()
    }

    /// Starts a session at `now`. Returns `false` if one is already running.
    pub fn start(&mut self, now: DateTime<Utc>) -> bool {
        if self.active.is_some() {
            return false;
        }
        self.active = Some(SleepSession::started(now));
        true
    }

    /// Ends the running session at `now`.
    ///
    /// Returns `Ok(None)` when nothing is running. A session that would break
    /// the duration invariant is removed and the violation returned.
    pub fn end(&mut self, now: DateTime<Utc>) -> Result<Option<&SleepSession>, CoreError> {
        let Some(mut session) = self.active.take() else {
            return Ok(None);
        };
        session.end = Some(now);
        if let Err(e) = session.check_interval() {
            tracing::warn!(start = %session.start, end = %now, error = %e, "discarding sleep session");
            return Err(e);
        }
        let index = self.insert_completed(session);
        Ok(self.completed.get(index))
    }

    /// Inserts a completed session, keeping start order. Returns its index.
    ///
    /// Sessions sharing a start keep insertion order.
    pub fn insert_completed(&mut self, session: SleepSession) -> usize {
        let index = self
            .completed
            .partition_point(|existing| existing.start <= session.start);
        self.completed.insert(index, session);
        index
    }

    /// Restores a running session, replacing any previous one.
    ///
    /// Returns the session that was replaced.
    pub fn restore_active(&mut self, session: SleepSession) -> Option<SleepSession> {
        self.active.replace(session)
    }

    fn last_completed_mut(&mut self) -> Result<&mut SleepSession, CoreError> {
        self.completed.last_mut().ok_or(CoreError::NoSession)
    }

    pub fn set_quality(&mut self, quality: SleepQuality) -> Result<(), CoreError> {
        self.last_completed_mut()?.quality = Some(quality);
        Ok(())
    }

    pub fn add_note(&mut self, text: &str) -> Result<(), CoreError> {
        self.last_completed_mut()?.append_note(text);
        Ok(())
    }

    pub fn mark_nap(&mut self, is_nap: bool) -> Result<(), CoreError> {
        self.last_completed_mut()?.is_nap = is_nap;
        Ok(())
    }

    /// Removes every session, including a running one.
    pub fn clear(&mut self) {
        self.completed.clear();
        self.active = None;
    }

    /// Drops completed sessions that ended before `cutoff`. Returns how many.
    pub fn prune_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.completed.len();
        self.completed
            .retain(|session| session.end.is_some_and(|end| end >= cutoff));
        before - self.completed.len()
    }

    /// Completed sessions whose end lies in `[from, to]`.
    pub fn ended_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> impl Iterator<Item = &SleepSession> {
        self.completed
            .iter()
            .filter(move |s| s.end.is_some_and(|end| end >= from && end <= to))
    }

    /// Completed sessions that ended within `window` before `now`.
    pub fn ended_within(
        &self,
        now: DateTime<Utc>,
        window: Duration,
    ) -> impl Iterator<Item = &SleepSession> {
        self.ended_between(cutoff_before(now, window), now)
    }

    /// Invariant violations, as human-readable descriptions.
    pub fn integrity_problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for (index, session) in self.completed.iter().enumerate() {
            if session.end.is_none() {
                problems.push(format!("session {index} is stored as completed but has no end"));
            } else if let Err(e) = session.check_interval() {
                problems.push(format!("session {index}: {e}"));
            }
        }
        if self
            .completed
            .windows(2)
            .any(|pair| pair[0].start > pair[1].start)
        {
            problems.push("sessions are not in chronological order".to_string());
        }
        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn ts(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    #[test]
    fn start_is_idempotent() {
        let mut history = History::new();
        assert!(history.start(ts(0)));
        assert!(!history.start(ts(10)));
        assert_eq!(history.active().unwrap().start, ts(0));
    }

    #[test]
    fn end_without_active_is_noop() {
        let mut history = History::new();
        assert_eq!(history.end(ts(0)).unwrap(), None);
        assert_eq!(history, History::new());
    }

    #[test]
    fn end_records_completed_session() {
        let mut history = History::new();
        history.start(ts(0));
        let session = history.end(ts(30)).unwrap().unwrap();
        assert_eq!(session.duration(), Duration::minutes(30));
        assert!(!history.is_running());
        assert_eq!(history.count(), 1);
    }

    #[test]
    fn overflowing_session_is_discarded() {
        let mut history = History::new();
        history.start(ts(0));
        let err = history.end(ts(25 * 60)).unwrap_err();
        assert_eq!(err, CoreError::DurationOverflow { minutes: 1500 });
        assert_eq!(history.count(), 0);
        assert!(!history.is_running());
    }

    #[test]
    fn empty_session_is_discarded() {
        let mut history = History::new();
        history.start(ts(5));
        assert_eq!(history.end(ts(5)).unwrap_err(), CoreError::EmptySession);
        assert_eq!(history.count(), 0);
    }

    #[test]
    fn insert_keeps_start_order() {
        let mut history = History::new();
        history.insert_completed(SleepSession::completed(ts(100), ts(200)));
        history.insert_completed(SleepSession::completed(ts(0), ts(50)));
        history.insert_completed(SleepSession::completed(ts(60), ts(70)));
        let starts: Vec<_> = history.completed().iter().map(|s| s.start).collect();
        assert_eq!(starts, vec![ts(0), ts(60), ts(100)]);
        assert!(history.integrity_problems().is_empty());
    }

    #[test]
    fn annotations_target_last_completed_session() {
        let mut history = History::new();
        assert_eq!(history.set_quality(SleepQuality::Good), Err(CoreError::NoSession));
        assert_eq!(history.add_note("x"), Err(CoreError::NoSession));
        assert_eq!(history.mark_nap(true), Err(CoreError::NoSession));

        history.insert_completed(SleepSession::completed(ts(0), ts(30)));
        history.insert_completed(SleepSession::completed(ts(600), ts(1000)));
        history.start(ts(1100));

        history.set_quality(SleepQuality::Excellent).unwrap();
        history.add_note("restful").unwrap();
        history.mark_nap(true).unwrap();

        let last = history.last_completed().unwrap();
        assert_eq!(last.start, ts(600));
        assert_eq!(last.quality, Some(SleepQuality::Excellent));
        assert_eq!(last.note, "restful");
        assert!(last.is_nap);
        assert!(history.active().unwrap().note.is_empty());
    }

    #[test]
    fn prune_drops_old_sessions() {
        let mut history = History::new();
        history.insert_completed(SleepSession::completed(ts(0), ts(60)));
        history.insert_completed(SleepSession::completed(ts(1000), ts(1400)));
        assert_eq!(history.prune_before(ts(100)), 1);
        assert_eq!(history.count(), 1);
        assert_eq!(history.completed()[0].start, ts(1000));
    }

    #[test]
    fn ended_within_uses_end_instant() {
        let mut history = History::new();
        history.insert_completed(SleepSession::completed(ts(0), ts(60)));
        history.insert_completed(SleepSession::completed(ts(100), ts(500)));
        let now = ts(600);
        let recent: Vec<_> = history.ended_within(now, Duration::minutes(200)).collect();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].start, ts(100));
    }

    #[test]
    fn ended_within_saturates_for_huge_windows() {
        let mut history = History::new();
        history.insert_completed(SleepSession::completed(ts(0), ts(60)));
        history.insert_completed(SleepSession::completed(ts(100), ts(500)));
        let window = Duration::days(i64::from(u32::MAX));

        assert_eq!(cutoff_before(ts(600), window), DateTime::<Utc>::MIN_UTC);
        assert_eq!(history.ended_within(ts(600), window).count(), 2);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Start,
        End,
        Advance(i64),
        Quality(u8),
        Nap(bool),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::Start),
            Just(Op::End),
            (0i64..2000).prop_map(Op::Advance),
            (1u8..=4).prop_map(Op::Quality),
            any::<bool>().prop_map(Op::Nap),
        ]
    }

    proptest! {
        #[test]
        fn invariants_hold_for_any_operation_sequence(ops in prop::collection::vec(op_strategy(), 0..60)) {
            let mut history = History::new();
            let mut now = ts(0);
            let mut ended = 0usize;
            for op in ops {
                match op {
                    Op::Start => {
                        let before = history.clone();
                        let started = history.start(now);
                        if !started {
                            prop_assert_eq!(&history, &before);
                        }
                    }
                    Op::End => {
                        if let Ok(Some(_)) = history.end(now) {
                            ended += 1;
                        }
                        prop_assert!(!history.is_running());
                    }
                    Op::Advance(minutes) => now += Duration::minutes(minutes),
                    Op::Quality(q) => {
                        let _ = history.set_quality(SleepQuality::try_from(q).unwrap());
                    }
                    Op::Nap(flag) => {
                        let _ = history.mark_nap(flag);
                    }
                }
                prop_assert!(history.integrity_problems().is_empty());
                prop_assert_eq!(history.count(), ended);
            }
        }
    }
}
