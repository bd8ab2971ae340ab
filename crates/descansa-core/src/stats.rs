//! Rolling statistics over the session history.
//!
//! # Conventions
//!
//! - A session belongs to the local calendar day on which it ended.
//! - "Last N calendar days" means today plus the N-1 preceding local days.
//! - Start times are compared on a noon-anchored clock, so 23:50 and 00:10
//!   are twenty minutes apart rather than almost a day.

use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use serde::Serialize;

use crate::clock::Clock;
use crate::goals::{Goals, MINUTES_PER_DAY};
use crate::history::{History, cutoff_before};
use crate::session::SleepSession;
use crate::window::SleepWindow;

/// Days covered by the short rolling window (average, efficiency, debt, score).
pub const WEEK_DAYS: u32 = 7;

/// Days covered by goal adherence.
pub const ADHERENCE_DAYS: u32 = 14;

/// Share of the target a day must reach to count as adherent.
const ADHERENCE_THRESHOLD: f64 = 0.8;

/// Adherence percentage at which goals count as met.
const MEETING_GOALS_PCT: f64 = 70.0;

/// Completed sessions needed before a score is produced.
const MIN_SESSIONS_FOR_SCORE: usize = 3;

const DURATION_WEIGHT: f64 = 0.5;
const CONSISTENCY_WEIGHT: f64 = 0.3;
const EFFICIENCY_WEIGHT: f64 = 0.2;

/// Consistency penalty per minute of start-time standard deviation.
/// A 60-minute deviation scores 50.
const CONSISTENCY_PENALTY_PER_MINUTE: f64 = 50.0 / 60.0;

/// The weighted parts of the sleep score, each on `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub duration: f64,
    pub consistency: f64,
    pub efficiency: f64,
    pub total: f64,
}

/// Total sleep attributed to one local calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub slept: Duration,
    pub longest: Duration,
}

/// Statistics evaluated at a single instant.
pub struct SleepStats<'a, C: Clock + ?Sized> {
    goals: &'a Goals,
    history: &'a History,
    clock: &'a C,
    now: DateTime<Utc>,
}

impl<'a, C: Clock + ?Sized> SleepStats<'a, C> {
    pub const fn new(
        goals: &'a Goals,
        history: &'a History,
        clock: &'a C,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            goals,
            history,
            clock,
            now,
        }
    }

    pub const fn goals(&self) -> &'a Goals {
        self.goals
    }

    pub const fn history(&self) -> &'a History {
        self.history
    }

    pub const fn clock(&self) -> &'a C {
        self.clock
    }

    pub const fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub const fn window(&self) -> SleepWindow<'a, C> {
        SleepWindow::new(self.goals, self.clock)
    }

    pub fn session_count(&self) -> usize {
        self.history.count()
    }

    /// Duration of the most recent completed session with `end > start`.
    pub fn last_sleep_duration(&self) -> Duration {
        self.history
            .completed()
            .iter()
            .rev()
            .map(SleepSession::duration)
            .find(|d| *d > Duration::zero())
            .unwrap_or_else(Duration::zero)
    }

    /// Completed sessions that ended in the last `days * 24h`.
    pub fn recent_sessions(&self, days: u32) -> impl Iterator<Item = &'a SleepSession> + use<'a, C> {
        self.history
            .ended_within(self.now, Duration::days(i64::from(days)))
    }

    /// Mean duration of sessions that ended in the last `days * 24h`, naps included.
    pub fn average_sleep_duration(&self, days: u32) -> Duration {
        mean_duration(self.recent_sessions(days))
    }

    /// Like [`Self::average_sleep_duration`] but ignoring sessions marked as naps.
    pub fn average_night_sleep_duration(&self, days: u32) -> Duration {
        mean_duration(self.recent_sessions(days).filter(|s| !s.is_nap))
    }

    /// Slept minutes over available window minutes, as a percentage.
    ///
    /// Counts sessions from the last seven days whose start fell inside the
    /// sleep window. Each contributes at most one window length of sleep.
    pub fn sleep_efficiency(&self) -> f64 {
        let window = self.window();
        let window_minutes = f64::from(window.length_minutes());
        let since = cutoff_before(self.now, Duration::days(i64::from(WEEK_DAYS)));

        let (slept, available) = self
            .history
            .completed()
            .iter()
            .filter(|s| s.start >= since && s.start <= self.now)
            .filter(|s| window.contains(s.start))
            .fold((0.0, 0.0), |(slept, available), s| {
                let minutes = minutes_f64(s.duration()).min(window_minutes);
                (slept + minutes, available + window_minutes)
            });

        if available <= 0.0 {
            return 0.0;
        }
        (slept / available * 100.0).clamp(0.0, 100.0)
    }

    /// `100 - stddev(start time) * 5/6`, clipped to `[0, 100]`.
    pub fn consistency_score(&self) -> f64 {
        let starts: Vec<f64> = self
            .recent_sessions(WEEK_DAYS)
            .map(|s| f64::from(self.anchored_start_minute(s)))
            .collect();
        let deviation = population_std_dev(&starts);
        (100.0 - deviation * CONSISTENCY_PENALTY_PER_MINUTE).clamp(0.0, 100.0)
    }

    /// Weighted components of the sleep score.
    pub fn sleep_score_breakdown(&self) -> ScoreBreakdown {
        if self.session_count() < MIN_SESSIONS_FOR_SCORE {
            return ScoreBreakdown {
                duration: 0.0,
                consistency: 0.0,
                efficiency: 0.0,
                total: 0.0,
            };
        }

        let average = minutes_f64(self.average_sleep_duration(WEEK_DAYS));
        let target = f64::from(self.goals.target_sleep_minutes());
        let duration = (average / target).min(1.0) * 100.0;
        let consistency = self.consistency_score();
        let efficiency = self.sleep_efficiency();
        let total = (duration * DURATION_WEIGHT
            + consistency * CONSISTENCY_WEIGHT
            + efficiency * EFFICIENCY_WEIGHT)
            .clamp(0.0, 100.0);

        ScoreBreakdown {
            duration,
            consistency,
            efficiency,
            total,
        }
    }

    /// Sleep score on `[0, 100]`; zero until three sessions exist.
    pub fn sleep_score(&self) -> f64 {
        self.sleep_score_breakdown().total
    }

    /// Per-day totals for the last `days` calendar days, oldest first.
    pub fn daily_totals(&self, days: u32) -> Vec<DailyTotal> {
        let today = self.clock.local_date(self.now);
        let mut totals: Vec<DailyTotal> = (0..i64::from(days))
            .rev()
            .filter_map(|back| today.checked_sub_signed(Duration::days(back)))
            .map(|date| DailyTotal {
                date,
                slept: Duration::zero(),
                longest: Duration::zero(),
            })
            .collect();

        for session in self.history.completed() {
            let Some(end) = session.end else { continue };
            if end > self.now {
                continue;
            }
            let date = self.clock.local_date(end);
            if let Some(day) = totals.iter_mut().find(|d| d.date == date) {
                let duration = session.duration();
                day.slept += duration;
                day.longest = day.longest.max(duration);
            }
        }
        totals
    }

    /// Sum over the last seven calendar days of each day's shortfall against target.
    ///
    /// Days that meet or exceed the target contribute nothing.
    pub fn sleep_debt(&self) -> Duration {
        let target = Duration::minutes(i64::from(self.goals.target_sleep_minutes()));
        self.daily_totals(WEEK_DAYS)
            .iter()
            .map(|day| (target - day.slept).max(Duration::zero()))
            .fold(Duration::zero(), |acc, d| acc + d)
    }

    pub fn is_in_sleep_debt(&self) -> bool {
        self.sleep_debt() > Duration::zero()
    }

    /// Percentage of the last fourteen calendar days with at least one
    /// session reaching 80% of the target.
    #[allow(clippy::cast_precision_loss)]
    pub fn goal_adherence_pct(&self) -> f64 {
        let threshold = f64::from(self.goals.target_sleep_minutes()) * ADHERENCE_THRESHOLD;
        let met = self
            .daily_totals(ADHERENCE_DAYS)
            .iter()
            .filter(|day| minutes_f64(day.longest) >= threshold)
            .count();
        met as f64 / f64::from(ADHERENCE_DAYS) * 100.0
    }

    pub fn is_meeting_goals(&self) -> bool {
        self.goal_adherence_pct() >= MEETING_GOALS_PCT
    }

    /// Start minute of day, shifted so noon is zero.
    pub fn anchored_start_minute(&self, session: &SleepSession) -> u32 {
        let time = self.clock.local_time(session.start);
        anchor_minute(time.hour() * 60 + time.minute())
    }
}

/// Shifts a minute of day so that noon maps to zero and midnight to 720.
pub const fn anchor_minute(minute_of_day: u32) -> u32 {
    (minute_of_day + MINUTES_PER_DAY / 2) % MINUTES_PER_DAY
}

fn mean_duration<'s>(sessions: impl Iterator<Item = &'s SleepSession>) -> Duration {
    let (total, count) = sessions.fold((0i64, 0i64), |(total, count), s| {
        (total + s.duration().num_seconds(), count + 1)
    });
    if count == 0 {
        return Duration::zero();
    }
    Duration::seconds(total / count)
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn minutes_f64(duration: Duration) -> f64 {
    duration.num_seconds() as f64 / 60.0
}

#[allow(clippy::cast_precision_loss)]
fn population_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}
