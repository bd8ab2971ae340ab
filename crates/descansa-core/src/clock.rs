//! Wall-clock abstraction.
//!
//! Every time-of-day question the tracker answers goes through a [`Clock`], so
//! tests can pin both the instant and the local offset.

use std::cell::Cell;
use std::rc::Rc;

use chrono::{
    DateTime, Duration, FixedOffset, Local, LocalResult, NaiveDate, NaiveDateTime, NaiveTime,
    Offset, SubsecRound, TimeZone, Utc,
};

/// Source of "now" plus conversions between instants and local wall time.
pub trait Clock {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;

    /// The instant expressed in local wall time.
    fn local(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset>;

    /// Maps a local wall time back to an instant.
    ///
    /// Nonexistent local times (DST spring-forward) resolve one hour later;
    /// ambiguous ones resolve to the earlier instant.
    fn resolve_local(&self, local: NaiveDateTime) -> DateTime<Utc>;

    fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        self.local(instant).date_naive()
    }

    fn local_time(&self, instant: DateTime<Utc>) -> NaiveTime {
        self.local(instant).time()
    }

    /// The current instant at the persisted resolution (whole seconds).
    fn now_seconds(&self) -> DateTime<Utc> {
        self.now().trunc_subsecs(0)
    }
}

/// The device clock in the device's time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn local(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        instant.with_timezone(&Local).fixed_offset()
    }

    fn resolve_local(&self, local: NaiveDateTime) -> DateTime<Utc> {
        match Local.from_local_datetime(&local) {
            LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
            LocalResult::None => Local
                .from_local_datetime(&(local + Duration::hours(1)))
                .earliest()
                .map_or_else(|| Utc.from_utc_datetime(&local), |dt| dt.with_timezone(&Utc)),
        }
    }
}

/// A clock with a fixed UTC offset whose instant is set by hand.
///
/// Clones share the same instant, so a test can keep one handle and give
/// another to the tracker.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<DateTime<Utc>>>,
    offset: FixedOffset,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self {
            now: Rc::new(Cell::new(now)),
            offset,
        }
    }

    /// A clock whose local time is UTC.
    pub fn utc(now: DateTime<Utc>) -> Self {
        Self::new(now, Utc.fix())
    }

    /// A UTC clock set to the given local date and time.
    ///
    /// Returns `None` for an invalid calendar date or time.
    pub fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> Option<Self> {
        let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;
        Some(Self::utc(Utc.from_utc_datetime(&naive)))
    }

    pub fn set(&self, now: DateTime<Utc>) {
        self.now.set(now);
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub const fn offset(&self) -> FixedOffset {
        self.offset
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }

    fn local(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        instant.with_timezone(&self.offset)
    }

    fn resolve_local(&self, local: NaiveDateTime) -> DateTime<Utc> {
        // A fixed offset has no gaps or folds.
        self.offset
            .from_local_datetime(&local)
            .earliest()
            .map_or_else(|| Utc.from_utc_datetime(&local), |dt| dt.with_timezone(&Utc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn manual_clock_clones_share_instant() {
        let clock = ManualClock::at(2025, 3, 1, 22, 0, 0).unwrap();
        let handle = clock.clone();
        handle.advance(Duration::minutes(90));
        assert_eq!(clock.local_time(clock.now()).hour(), 23);
        assert_eq!(clock.local_time(clock.now()).minute(), 30);
    }

    #[test]
    fn manual_clock_applies_offset() {
        let instant = Utc.with_ymd_and_hms(2025, 3, 1, 22, 30, 0).unwrap();
        let clock = ManualClock::new(instant, FixedOffset::east_opt(9 * 3600).unwrap());
        assert_eq!(
            clock.local_date(instant),
            NaiveDate::from_ymd_opt(2025, 3, 2).unwrap()
        );
        assert_eq!(
            clock.local_time(instant),
            NaiveTime::from_hms_opt(7, 30, 0).unwrap()
        );
    }

    #[test]
    fn resolve_local_inverts_local() {
        let instant = Utc.with_ymd_and_hms(2025, 6, 10, 4, 15, 0).unwrap();
        let clock = ManualClock::new(instant, FixedOffset::west_opt(5 * 3600).unwrap());
        let local = clock.local(instant).naive_local();
        assert_eq!(clock.resolve_local(local), instant);
    }

    #[test]
    fn now_seconds_drops_subseconds() {
        let instant = Utc.with_ymd_and_hms(2025, 6, 10, 4, 15, 0).unwrap()
            + Duration::milliseconds(750);
        let clock = ManualClock::utc(instant);
        assert_eq!(clock.now_seconds().timestamp_subsec_nanos(), 0);
        assert_eq!(clock.now_seconds().timestamp(), instant.timestamp());
    }
}
