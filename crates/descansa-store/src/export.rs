//! Export formats: analysis CSV, summary CSV, detailed text report, backup.
//!
//! Renderers return the full file contents; [`crate::Tracker`] writes them
//! atomically.

use std::fmt::Write as _;
use std::str::FromStr;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use descansa_core::format::whole_minutes;
use descansa_core::insights;
use descansa_core::{
    Clock, Goals, History, SleepQuality, SleepSession, SleepStats, format_duration,
    format_time_of_day, normalize_note,
};

use crate::StoreError;
use crate::codec;

/// Header row of the analysis CSV.
pub const ANALYSIS_HEADER: &str = "start_iso,end_iso,duration_minutes,quality,nap,note";

/// Header row of the summary CSV.
pub const SUMMARY_HEADER: &str = "metric,value";

/// Days covered by the report's session list.
const REPORT_DAYS: i64 = 14;

/// Local timestamp layout used in exports.
const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";

/// Which export to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Analysis,
    Summary,
    Detailed,
}

impl ExportKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Analysis => "analysis",
            Self::Summary => "summary",
            Self::Detailed => "detailed",
        }
    }
}

impl std::fmt::Display for ExportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "analysis" => Ok(Self::Analysis),
            "summary" => Ok(Self::Summary),
            "detailed" => Ok(Self::Detailed),
            _ => Err(format!("unknown export kind: {s}")),
        }
    }
}

fn iso<C: Clock + ?Sized>(clock: &C, instant: DateTime<Utc>) -> String {
    clock.local(instant).format(ISO_FORMAT).to_string()
}

/// One row per completed session, oldest first.
pub fn analysis_csv<C: Clock + ?Sized>(history: &History, clock: &C) -> String {
    let mut out = String::new();
    writeln!(out, "{ANALYSIS_HEADER}").unwrap();
    for session in history.completed() {
        let Some(end) = session.end else { continue };
        writeln!(
            out,
            "{},{},{},{},{},{}",
            iso(clock, session.start),
            iso(clock, end),
            whole_minutes(session.duration()),
            session.quality.map_or(0, SleepQuality::rating),
            u8::from(session.is_nap),
            quote_csv(&session.note),
        )
        .unwrap();
    }
    out
}

fn quote_csv(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

/// Reads an analysis CSV back into completed sessions.
///
/// The duration column is checked against the timestamps, which are the
/// source of truth.
pub fn parse_analysis_csv(text: &str) -> Result<Vec<SleepSession>, StoreError> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line))
        .filter(|(_, line)| !line.trim().is_empty());

    match lines.next() {
        Some((_, header)) if header.trim() == ANALYSIS_HEADER => {}
        Some((line, _)) => return Err(StoreError::corrupted(line, "missing analysis CSV header")),
        None => return Err(StoreError::corrupted(0, "empty analysis CSV")),
    }

    lines
        .map(|(line, row)| parse_analysis_row(row, line))
        .collect()
}

fn parse_analysis_row(row: &str, line: usize) -> Result<SleepSession, StoreError> {
    let fields = split_csv(row, line)?;
    let [start, end, minutes, quality, nap, note] = fields.as_slice() else {
        return Err(StoreError::corrupted(
            line,
            format!("expected 6 columns, found {}", fields.len()),
        ));
    };

    let parse_instant = |raw: &str| {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StoreError::corrupted(line, format!("invalid timestamp {raw:?}: {e}")))
    };
    let start = parse_instant(start.as_str())?;
    let end = parse_instant(end.as_str())?;

    let minutes: i64 = minutes
        .parse()
        .map_err(|_| StoreError::corrupted(line, format!("invalid duration {minutes:?}")))?;
    if minutes != whole_minutes(end - start) {
        return Err(StoreError::corrupted(
            line,
            format!("duration {minutes} does not match timestamps"),
        ));
    }

    let quality = match quality.as_str() {
        "0" => None,
        raw => Some(
            raw.parse::<u8>()
                .map_err(|_| StoreError::corrupted(line, format!("invalid quality {raw:?}")))
                .and_then(|q| {
                    SleepQuality::try_from(q).map_err(|e| StoreError::corrupted(line, e.to_string()))
                })?,
        ),
    };
    let is_nap = match nap.as_str() {
        "0" => false,
        "1" => true,
        raw => return Err(StoreError::corrupted(line, format!("invalid nap flag {raw:?}"))),
    };

    let session = SleepSession {
        start,
        end: Some(end),
        quality,
        note: normalize_note(note),
        is_nap,
    };
    session
        .check_interval()
        .map_err(|e| StoreError::corrupted(line, e.to_string()))?;
    Ok(session)
}

/// Splits one CSV row. Quoted fields may contain commas and doubled quotes.
fn split_csv(row: &str, line: usize) -> Result<Vec<String>, StoreError> {
    let mut fields = Vec::new();
    let mut chars = row.chars().peekable();
    loop {
        let mut field = String::new();
        if chars.next_if_eq(&'"').is_some() {
            loop {
                match chars.next() {
                    Some('"') if chars.next_if_eq(&'"').is_some() => field.push('"'),
                    Some('"') => break,
                    Some(c) => field.push(c),
                    None => return Err(StoreError::corrupted(line, "unterminated quoted field")),
                }
            }
        } else {
            while let Some(c) = chars.next_if(|c| *c != ',') {
                field.push(c);
            }
        }
        fields.push(field);

        match chars.next() {
            Some(',') => {}
            None => return Ok(fields),
            Some(c) => {
                return Err(StoreError::corrupted(
                    line,
                    format!("unexpected {c:?} after quoted field"),
                ));
            }
        }
    }
}

/// Headline metrics as `metric,value` rows.
pub fn summary_csv<C: Clock + ?Sized>(stats: &SleepStats<'_, C>) -> String {
    let mut out = String::new();
    writeln!(out, "{SUMMARY_HEADER}").unwrap();
    writeln!(out, "sessions,{}", stats.session_count()).unwrap();
    writeln!(
        out,
        "avg_duration_7d,{}",
        whole_minutes(stats.average_sleep_duration(7))
    )
    .unwrap();
    writeln!(out, "sleep_score,{:.1}", stats.sleep_score()).unwrap();
    writeln!(out, "efficiency_pct,{:.1}", stats.sleep_efficiency()).unwrap();
    writeln!(out, "debt_minutes,{}", whole_minutes(stats.sleep_debt())).unwrap();
    writeln!(out, "adherence_pct,{:.1}", stats.goal_adherence_pct()).unwrap();
    out
}

fn heading(out: &mut String, title: &str) {
    writeln!(out).unwrap();
    writeln!(out, "{title}").unwrap();
    writeln!(out, "{}", "─".repeat(title.chars().count())).unwrap();
}

fn bullets(out: &mut String, items: &[String], empty: &str) {
    if items.is_empty() {
        writeln!(out, "{empty}").unwrap();
    }
    for item in items {
        writeln!(out, "  - {item}").unwrap();
    }
}

fn describe_goals(goals: &Goals) -> String {
    format!(
        "{} per night, bedtime {}, wake {}",
        format_duration(Duration::minutes(i64::from(goals.target_sleep_minutes()))),
        format_time_of_day(goals.bedtime()),
        format_time_of_day(goals.wake_time()),
    )
}

/// Plain-text report: summary, recent sessions, patterns, suggestions.
pub fn detailed_report<C: Clock + ?Sized>(stats: &SleepStats<'_, C>) -> String {
    let clock = stats.clock();
    let now = stats.now();
    let mut out = String::new();

    writeln!(out, "DESCANSA SLEEP REPORT").unwrap();
    writeln!(
        out,
        "Generated: {}",
        clock.local(now).format("%Y-%m-%d %H:%M:%S %:z")
    )
    .unwrap();

    heading(&mut out, "SUMMARY");
    writeln!(out, "Goal:            {}", describe_goals(stats.goals())).unwrap();
    writeln!(out, "Sessions:        {}", stats.session_count()).unwrap();
    writeln!(
        out,
        "Last sleep:      {}",
        format_duration(stats.last_sleep_duration())
    )
    .unwrap();
    writeln!(
        out,
        "Average (7d):    {}",
        format_duration(stats.average_sleep_duration(7))
    )
    .unwrap();
    writeln!(out, "Sleep score:     {:.1}/100", stats.sleep_score()).unwrap();
    writeln!(out, "Efficiency:      {:.1}%", stats.sleep_efficiency()).unwrap();
    writeln!(
        out,
        "Sleep debt:      {}",
        format_duration(stats.sleep_debt())
    )
    .unwrap();
    writeln!(out, "Goal adherence:  {:.1}%", stats.goal_adherence_pct()).unwrap();

    heading(&mut out, "RECENT SESSIONS (last 14 days)");
    let mut any = false;
    for session in stats
        .history()
        .ended_within(now, Duration::days(REPORT_DAYS))
    {
        any = true;
        writeln!(out, "{}", describe_session(clock, session)).unwrap();
    }
    if !any {
        writeln!(out, "(no sessions)").unwrap();
    }

    heading(&mut out, "PATTERNS");
    bullets(&mut out, &insights::patterns(stats), "(none)");

    heading(&mut out, "SUGGESTIONS");
    bullets(
        &mut out,
        &insights::improvement_suggestions(stats),
        "(none - goals are being met)",
    );
    out
}

fn describe_session<C: Clock + ?Sized>(clock: &C, session: &SleepSession) -> String {
    let start = clock.local(session.start);
    let mut line = format!(
        "  {} {}",
        start.format("%Y-%m-%d"),
        format_time_of_day(start.time())
    );
    if let Some(end) = session.end {
        write!(
            line,
            " - {}  {:>7}",
            format_time_of_day(clock.local_time(end)),
            format_duration(session.duration())
        )
        .unwrap();
    }
    if let Some(quality) = session.quality {
        write!(line, "  {quality}").unwrap();
    }
    if session.is_nap {
        line.push_str("  (nap)");
    }
    if !session.note.is_empty() {
        write!(line, "  \"{}\"", session.note).unwrap();
    }
    line
}

/// The data file format preceded by a `# BACKUP <timestamp>` comment.
pub fn backup(goals: &Goals, history: &History, generated: DateTime<FixedOffset>) -> String {
    format!(
        "# BACKUP {}\n{}",
        generated.format(ISO_FORMAT),
        codec::encode(goals, history)
    )
}
