//! Time-window arithmetic: where "now" sits relative to the sleep window.
//!
//! The sleep window is the half-open local time-of-day interval
//! `[bedtime, wake)`, where `bedtime = wake - target` modulo one day. When
//! `bedtime > wake` (e.g. 23:00 to 07:00) the window spans midnight and is
//! treated as `[bedtime, 24:00) ∪ [00:00, wake)`.
//!
//! All functions take `now` explicitly so one query sees a single instant.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Timelike, Utc};

use crate::clock::Clock;
use crate::goals::{Goals, MINUTES_PER_DAY};

/// The sleep window implied by a set of goals, resolved through a clock.
#[derive(Debug, Clone, Copy)]
pub struct SleepWindow<'a, C: Clock + ?Sized> {
    goals: &'a Goals,
    clock: &'a C,
}

impl<'a, C: Clock + ?Sized> SleepWindow<'a, C> {
    pub const fn new(goals: &'a Goals, clock: &'a C) -> Self {
        Self { goals, clock }
    }

    /// Window length in minutes (the target sleep duration).
    pub const fn length_minutes(&self) -> u32 {
        self.goals.target_sleep_minutes()
    }

    /// Whether a local minute-of-day falls inside the window.
    pub fn contains_minute(&self, minute_of_day: u32) -> bool {
        let bedtime = self.goals.bedtime_minute_of_day();
        let wake = self.goals.wake_minute_of_day();
        let minute = minute_of_day % MINUTES_PER_DAY;
        match bedtime.cmp(&wake) {
            std::cmp::Ordering::Less => minute >= bedtime && minute < wake,
            std::cmp::Ordering::Greater => minute >= bedtime || minute < wake,
            // Bedtime equals wake only for a 24h target: the window is the whole day.
            std::cmp::Ordering::Equal => true,
        }
    }

    pub fn contains_time(&self, time: NaiveTime) -> bool {
        self.contains_minute(minute_of_day(time))
    }

    /// Whether `instant` falls inside the window on the local clock.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.contains_time(self.clock.local_time(instant))
    }

    pub fn is_in_sleep_period(&self, now: DateTime<Utc>) -> bool {
        self.contains(now)
    }

    /// True while the upcoming wake time has not been reached.
    ///
    /// Inside the window that is always the case. Outside it, this compares
    /// the local time of day against the wake time.
    pub fn is_before_target_wake_time(&self, now: DateTime<Utc>) -> bool {
        if self.contains(now) {
            return true;
        }
        minute_of_day(self.clock.local_time(now)) < self.goals.wake_minute_of_day()
    }

    /// The first local instant strictly after `now` at the wake time of day.
    pub fn next_wake_instant(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.next_occurrence(now, self.goals.wake_time(), |candidate| candidate > now)
    }

    /// `next_wake_instant - now`, never negative.
    pub fn time_until_wake(&self, now: DateTime<Utc>) -> Duration {
        (self.next_wake_instant(now) - now).max(Duration::zero())
    }

    /// Today's bedtime if it has not passed yet, otherwise tomorrow's.
    pub fn next_bedtime_instant(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.next_occurrence(now, self.goals.bedtime(), |candidate| candidate >= now)
    }

    /// Awake time left before bedtime; zero inside the window.
    pub fn remaining_wake_time(&self, now: DateTime<Utc>) -> Duration {
        if self.contains(now) {
            return Duration::zero();
        }
        (self.next_bedtime_instant(now) - now).max(Duration::zero())
    }

    /// Resolves `time` on today's local date, moving forward a day at a time
    /// until `accept` holds.
    fn next_occurrence(
        &self,
        now: DateTime<Utc>,
        time: NaiveTime,
        accept: impl Fn(DateTime<Utc>) -> bool,
    ) -> DateTime<Utc> {
        let today = self.clock.local_date(now);
        let mut date: NaiveDate = today;
        // Two steps suffice; the third covers a DST transition landing on the same instant.
        for _ in 0..3 {
            let candidate = self.clock.resolve_local(date.and_time(time));
            if accept(candidate) {
                return candidate;
            }
            date = date.succ_opt().unwrap_or(date);
        }
        now + Duration::days(1)
    }
}

fn minute_of_day(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}
