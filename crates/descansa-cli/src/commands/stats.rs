//! Stats command: rolling averages, score, debt and adherence.

use std::fmt::Write as _;
use std::io::Write;

use anyhow::Result;
use chrono::Duration;
use descansa_core::format::whole_minutes;
use descansa_core::stats::{ADHERENCE_DAYS, WEEK_DAYS};
use descansa_core::{Clock, ScoreBreakdown, format_duration};
use descansa_store::Tracker;
use serde::Serialize;

const MONTH_DAYS: u32 = 30;

/// Everything the stats command shows, computed once.
#[derive(Debug, Serialize)]
pub struct StatsData {
    pub generated_at: String,
    pub sessions: usize,
    pub session_running: bool,
    pub last_sleep_minutes: i64,
    pub average_week_minutes: i64,
    pub average_night_week_minutes: i64,
    pub average_month_minutes: i64,
    pub score: ScoreBreakdown,
    pub efficiency_pct: f64,
    pub sleep_debt_minutes: i64,
    pub adherence_pct: f64,
    pub meeting_goals: bool,
    pub recovery_bedtimes: Vec<String>,
}

pub fn collect<C: Clock>(tracker: &Tracker<C>) -> StatsData {
    let stats = tracker.stats();
    let clock = tracker.clock();

    StatsData {
        generated_at: clock.local(stats.now()).to_rfc3339(),
        sessions: stats.session_count(),
        session_running: tracker.is_session_running(),
        last_sleep_minutes: whole_minutes(stats.last_sleep_duration()),
        average_week_minutes: whole_minutes(stats.average_sleep_duration(WEEK_DAYS)),
        average_night_week_minutes: whole_minutes(stats.average_night_sleep_duration(WEEK_DAYS)),
        average_month_minutes: whole_minutes(stats.average_sleep_duration(MONTH_DAYS)),
        score: stats.sleep_score_breakdown(),
        efficiency_pct: stats.sleep_efficiency(),
        sleep_debt_minutes: whole_minutes(stats.sleep_debt()),
        adherence_pct: stats.goal_adherence_pct(),
        meeting_goals: stats.is_meeting_goals(),
        recovery_bedtimes: tracker
            .suggest_recovery_bedtimes()
            .into_iter()
            .map(|bedtime| clock.local(bedtime).format("%Y-%m-%d %H:%M").to_string())
            .collect(),
    }
}

fn minutes(value: i64) -> String {
    format_duration(Duration::minutes(value))
}

/// Formats stats as aligned text.
pub fn format_stats(data: &StatsData) -> String {
    let mut out = String::new();
    writeln!(out, "Sleep statistics").unwrap();
    writeln!(out, "Sessions:               {}", data.sessions).unwrap();
    writeln!(out, "Last sleep:             {}", minutes(data.last_sleep_minutes)).unwrap();
    writeln!(
        out,
        "Average ({WEEK_DAYS}d):           {}",
        minutes(data.average_week_minutes)
    )
    .unwrap();
    writeln!(
        out,
        "Average nights ({WEEK_DAYS}d):    {}",
        minutes(data.average_night_week_minutes)
    )
    .unwrap();
    writeln!(
        out,
        "Average ({MONTH_DAYS}d):          {}",
        minutes(data.average_month_minutes)
    )
    .unwrap();
    writeln!(out, "Sleep score:            {:.1}/100", data.score.total).unwrap();
    writeln!(out, "  Duration:             {:.1}", data.score.duration).unwrap();
    writeln!(out, "  Consistency:          {:.1}", data.score.consistency).unwrap();
    writeln!(out, "  Efficiency:           {:.1}", data.score.efficiency).unwrap();
    writeln!(out, "Sleep efficiency:       {:.1}%", data.efficiency_pct).unwrap();
    writeln!(
        out,
        "Sleep debt ({WEEK_DAYS}d):        {}",
        minutes(data.sleep_debt_minutes)
    )
    .unwrap();
    writeln!(
        out,
        "Goal adherence ({ADHERENCE_DAYS}d):   {:.1}% ({})",
        data.adherence_pct,
        if data.meeting_goals { "meeting goals" } else { "below goal" }
    )
    .unwrap();

    if !data.recovery_bedtimes.is_empty() {
        writeln!(out, "Recovery bedtimes:").unwrap();
        for bedtime in &data.recovery_bedtimes {
            writeln!(out, "- {bedtime}").unwrap();
        }
    }
    out
}

/// Formats stats as pretty JSON.
pub fn format_stats_json(data: &StatsData) -> Result<String> {
    Ok(serde_json::to_string_pretty(data)?)
}

pub fn run<C: Clock, W: Write>(writer: &mut W, tracker: &Tracker<C>, json: bool) -> Result<()> {
    let data = collect(tracker);
    if json {
        writeln!(writer, "{}", format_stats_json(&data)?)?;
    } else {
        write!(writer, "{}", format_stats(&data))?;
    }
    Ok(())
}
