//! Text insights derived from statistics: recommendations, patterns,
//! suggestions, score explanation and recovery planning.

use std::fmt::Write as _;

use chrono::{DateTime, Duration, Utc};

use crate::clock::Clock;
use crate::format::format_duration;
use crate::session::SleepSession;
use crate::stats::{SleepStats, anchor_minute, minutes_f64};

/// Sessions needed before pattern analysis runs.
const MIN_SESSIONS_FOR_PATTERNS: usize = 7;

/// Sessions considered by pattern analysis.
const PATTERN_SESSIONS: usize = 14;

/// Sessions considered by recommendations.
const RECENT_SESSIONS: usize = 3;

/// Adherence below which a suggestion is made.
const LOW_ADHERENCE_PCT: f64 = 70.0;

/// How much earlier than the target bedtime a recovery night starts.
const RECOVERY_ADVANCE_MINUTES: i64 = 45;

const MAX_RECOVERY_NIGHTS: usize = 7;

fn last_sessions<'a, C: Clock + ?Sized>(
    stats: &SleepStats<'a, C>,
    count: usize,
) -> &'a [SleepSession] {
    let completed = stats.history().completed();
    &completed[completed.len().saturating_sub(count)..]
}

/// Advice for right now, based on the last few sessions and the clock.
pub fn recommendations<C: Clock + ?Sized>(stats: &SleepStats<'_, C>) -> Vec<String> {
    let mut out = Vec::new();
    let goals = stats.goals();

    if stats.session_count() >= RECENT_SESSIONS {
        let recent = last_sessions(stats, RECENT_SESSIONS);
        let target = Duration::minutes(i64::from(goals.target_sleep_minutes()));
        let short_nights = recent.iter().filter(|s| s.duration() < target).count();
        if short_nights >= 2 {
            out.push(
                "Consider going to bed earlier - you've had sleep debt for multiple days".to_string(),
            );
        }

        let total: u32 = recent.iter().map(|s| stats.anchored_start_minute(s)).sum();
        let average_start = total / u32::try_from(recent.len()).unwrap_or(1).max(1);
        let latest_ok = anchor_minute(u32::from(goals.bedtime_hour()) * 60 + 60);
        if average_start > latest_ok {
            out.push(
                "Your recent bedtimes are later than your goal - try to wind down earlier"
                    .to_string(),
            );
        }
    }

    let window = stats.window();
    let now = stats.now();
    if !window.is_in_sleep_period(now) && window.remaining_wake_time(now) < Duration::hours(2) {
        out.push(
            "Start your bedtime routine soon - less than 2 hours until target bedtime".to_string(),
        );
    }
    out
}

/// Bedtime regularity and duration range over the last two weeks of sessions.
pub fn patterns<C: Clock + ?Sized>(stats: &SleepStats<'_, C>) -> Vec<String> {
    if stats.session_count() < MIN_SESSIONS_FOR_PATTERNS {
        return vec!["Insufficient data for pattern analysis".to_string()];
    }

    let recent = last_sessions(stats, PATTERN_SESSIONS);
    let hours: Vec<u32> = recent
        .iter()
        .map(|s| stats.anchored_start_minute(s) / 60)
        .collect();
    let spread = hours.iter().max().unwrap_or(&0) - hours.iter().min().unwrap_or(&0);

    let mut out = Vec::new();
    out.push(
        match spread {
            0..=1 => "Highly consistent bedtime schedule",
            2 => "Moderately consistent bedtime schedule",
            _ => "Irregular bedtime schedule - high variance detected",
        }
        .to_string(),
    );

    #[allow(clippy::cast_precision_loss)]
    let average_hours =
        recent.iter().map(|s| minutes_f64(s.duration())).sum::<f64>() / recent.len() as f64 / 60.0;
    out.push(
        if average_hours < 7.0 {
            "Chronic sleep restriction pattern detected"
        } else if average_hours > 9.0 {
            "Extended sleep duration pattern"
        } else {
            "Normal sleep duration range"
        }
        .to_string(),
    );

    let naps = recent.iter().filter(|s| s.is_nap).count();
    if naps > 0 {
        out.push(format!("{naps} of the last {} sessions were naps", recent.len()));
    }
    out
}

/// Concrete changes that would bring the numbers up to the goals.
pub fn improvement_suggestions<C: Clock + ?Sized>(stats: &SleepStats<'_, C>) -> Vec<String> {
    let mut out = Vec::new();
    if stats.session_count() == 0 {
        return out;
    }
    let goals = stats.goals();

    let average = stats.average_sleep_duration(14);
    let target = Duration::minutes(i64::from(goals.target_sleep_minutes()));
    if average > Duration::zero() && average < target {
        let deficit = (target - average).num_minutes();
        out.push(format!("Increase sleep duration by {deficit} minutes to meet your goal"));
    }

    if stats.sleep_efficiency() < goals.target_efficiency_pct() {
        out.push("Improve sleep efficiency by optimizing your sleep environment".to_string());
        out.push("Consider limiting screen time 1 hour before bed".to_string());
        out.push("Establish a consistent pre-sleep routine".to_string());
    }

    if stats.goal_adherence_pct() < LOW_ADHERENCE_PCT {
        out.push(
            "Your goal adherence is below 70% - consider adjusting goals or improving habits"
                .to_string(),
        );
    }
    out
}

/// Multi-line breakdown of the sleep score.
pub fn score_explanation<C: Clock + ?Sized>(stats: &SleepStats<'_, C>) -> String {
    let count = stats.session_count();
    if count == 0 {
        return "No sleep data available for scoring".to_string();
    }

    let breakdown = stats.sleep_score_breakdown();
    let mut out = String::new();
    writeln!(out, "Sleep Score: {:.1}/100", breakdown.total).unwrap();
    if count < 3 {
        writeln!(
            out,
            "A score needs at least 3 completed sessions ({count} recorded)"
        )
        .unwrap();
        return out;
    }

    writeln!(
        out,
        "Duration ({} avg): {:.1}/50 points",
        format_duration(stats.average_sleep_duration(7)),
        breakdown.duration * 0.5
    )
    .unwrap();
    writeln!(
        out,
        "Consistency: {:.1}/30 points",
        breakdown.consistency * 0.3
    )
    .unwrap();
    writeln!(
        out,
        "Efficiency ({:.1}%): {:.1}/20 points",
        breakdown.efficiency,
        breakdown.efficiency * 0.2
    )
    .unwrap();
    out
}

/// Upcoming bedtimes, each 45 minutes before the target, that would work
/// off the current debt. Empty when there is no debt.
pub fn recovery_bedtimes<C: Clock + ?Sized>(stats: &SleepStats<'_, C>) -> Vec<DateTime<Utc>> {
    let debt = stats.sleep_debt();
    if debt <= Duration::zero() {
        return Vec::new();
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let nights = ((minutes_f64(debt) / 60.0 * 2.0) as usize).min(MAX_RECOVERY_NIGHTS);

    let clock = stats.clock();
    let bedtime = stats.goals().bedtime();
    let advance = Duration::minutes(RECOVERY_ADVANCE_MINUTES);
    // The first suggestion must still lie ahead once moved earlier.
    let first = stats.window().next_bedtime_instant(stats.now() + advance);
    let first_date = clock.local_date(first);

    (0..nights)
        .filter_map(|night| {
            let date = first_date.checked_add_signed(Duration::days(i64::try_from(night).ok()?))?;
            Some(
                clock.resolve_local(date.and_time(bedtime)) - advance,
            )
        })
        .collect()
}

/// Data-quality warnings: unrated sessions and a session left running.
pub fn data_warnings<C: Clock + ?Sized>(stats: &SleepStats<'_, C>) -> Vec<String> {
    let mut out = Vec::new();
    let unrated = stats
        .history()
        .completed()
        .iter()
        .filter(|s| s.quality.is_none())
        .count();
    if unrated > 0 {
        out.push(format!("Missing sleep quality ratings for {unrated} sessions"));
    }

    if let Some(active) = stats.history().active() {
        if active.elapsed(stats.now()) > crate::session::max_session_duration() {
            out.push(format!(
                "Active session has been running for {} and will be discarded when stopped",
                format_duration(active.elapsed(stats.now()))
            ));
        }
    }
    out
}
