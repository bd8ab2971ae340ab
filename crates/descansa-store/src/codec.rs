//! Text encoding of goals and sessions.
//!
//! See the [crate documentation](crate) for the format. Decoding separates two
//! kinds of problem:
//!
//! - Structural: missing header, malformed fields, goal values out of range.
//!   The whole file is rejected with [`StoreError::Corrupted`].
//! - Logical: a single session that breaks an invariant. That session is
//!   dropped and reported as a [`Diagnostic`]; the rest of the file loads.

use std::fmt;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use descansa_core::{Goals, History, SleepQuality, SleepSession, normalize_note};

use crate::StoreError;

/// First non-comment line of every data file.
pub const HEADER: &str = "DESCANSA v1";

/// A problem in one session that was skipped while loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

/// The result of decoding a data file.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub goals: Goals,
    pub history: History,
    pub diagnostics: Vec<Diagnostic>,
}

/// Serializes goals and history. The active session, if any, comes last.
pub fn encode(goals: &Goals, history: &History) -> String {
    let mut out = String::new();
    writeln!(out, "{HEADER}").unwrap();
    writeln!(
        out,
        "GOAL target_minutes={} wake_h={} wake_m={} bed_h={} eff={:?}",
        goals.target_sleep_minutes(),
        goals.wake_hour(),
        goals.wake_minute(),
        goals.bedtime_hour(),
        goals.target_efficiency_pct(),
    )
    .unwrap();
    for session in history.completed().iter().chain(history.active()) {
        encode_session(&mut out, session);
    }
    out
}

fn encode_session(out: &mut String, session: &SleepSession) {
    let end = session
        .end
        .map_or_else(|| "-".to_string(), |end| end.timestamp().to_string());
    writeln!(
        out,
        "SESSION start={} end={end} q={} nap={} note=\"{}\"",
        session.start.timestamp(),
        session.quality.map_or(0, SleepQuality::rating),
        u8::from(session.is_nap),
        escape(&session.note),
    )
    .unwrap();
}

/// Escapes `\`, `"` and line breaks for a quoted field.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(ch),
        }
    }
    out
}

/// Parses a data file.
pub fn decode(text: &str) -> Result<Decoded, StoreError> {
    let mut goals = Goals::default();
    let mut history = History::new();
    let mut diagnostics = Vec::new();
    let mut saw_header = false;

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if !saw_header {
            if line != HEADER {
                return Err(StoreError::corrupted(
                    line_no,
                    format!("expected header {HEADER:?}, found {line:?}"),
                ));
            }
            saw_header = true;
            continue;
        }

        let (kind, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        match kind {
            "GOAL" => goals = decode_goals(&Fields::parse(rest, line_no)?, line_no)?,
            "SESSION" => {
                let session = decode_session(&Fields::parse(rest, line_no)?, line_no)?;
                restore_session(&mut history, &mut diagnostics, session, line_no);
            }
            other => {
                tracing::debug!(line = line_no, kind = other, "skipping unknown record");
            }
        }
    }

    if !saw_header {
        return Err(StoreError::corrupted(0, "missing header"));
    }

    Ok(Decoded {
        goals,
        history,
        diagnostics,
    })
}

fn restore_session(
    history: &mut History,
    diagnostics: &mut Vec<Diagnostic>,
    session: SleepSession,
    line: usize,
) {
    if session.end.is_none() {
        if let Some(previous) = history.restore_active(session) {
            diagnostics.push(Diagnostic {
                line,
                message: format!(
                    "active session started at {} superseded by a later one",
                    previous.start
                ),
            });
        }
        return;
    }

    if let Err(e) = session.check_interval() {
        diagnostics.push(Diagnostic {
            line,
            message: e.to_string(),
        });
        return;
    }
    history.insert_completed(session);
}

fn decode_goals(fields: &Fields, line: usize) -> Result<Goals, StoreError> {
    let target: u32 = fields.number("target_minutes", line)?;
    let wake_h: u8 = fields.number("wake_h", line)?;
    let wake_m: u8 = fields.number("wake_m", line)?;
    let eff: f64 = fields.number("eff", line)?;
    let bed_h: Option<u8> = fields.optional_number("bed_h", line)?;

    let reject = |e: descansa_core::CoreError| StoreError::corrupted(line, e.to_string());
    let derived = Goals::new(target, wake_h, wake_m, None, eff).map_err(reject)?;
    // A stored bedtime equal to the derived one was never set explicitly.
    match bed_h {
        Some(hour) if hour != derived.derived_bedtime_hour() => {
            Goals::new(target, wake_h, wake_m, Some(hour), eff).map_err(reject)
        }
        _ => Ok(derived),
    }
}

fn decode_session(fields: &Fields, line: usize) -> Result<SleepSession, StoreError> {
    let start = timestamp(fields.number("start", line)?, line)?;
    let end = match fields.required("end", line)? {
        "-" => None,
        _ => Some(timestamp(fields.number("end", line)?, line)?),
    };
    let quality = match fields.optional_number::<u8>("q", line)?.unwrap_or(0) {
        0 => None,
        rating => Some(
            SleepQuality::try_from(rating).map_err(|e| StoreError::corrupted(line, e.to_string()))?,
        ),
    };
    let is_nap = match fields.optional_number::<u8>("nap", line)?.unwrap_or(0) {
        0 => false,
        1 => true,
        other => return Err(StoreError::corrupted(line, format!("invalid nap flag {other}"))),
    };
    let note = fields.get("note").map(normalize_note).unwrap_or_default();

    Ok(SleepSession {
        start,
        end,
        quality,
        note,
        is_nap,
    })
}

fn timestamp(seconds: i64, line: usize) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| StoreError::corrupted(line, format!("timestamp out of range: {seconds}")))
}

/// `key=value` pairs from one record. Values may be double-quoted with escapes.
struct Fields {
    pairs: Vec<(String, String)>,
}

impl Fields {
    fn parse(text: &str, line: usize) -> Result<Self, StoreError> {
        let mut pairs = Vec::new();
        let mut chars = text.chars().peekable();

        loop {
            while chars.next_if(|c| c.is_whitespace()).is_some() {}
            if chars.peek().is_none() {
                break;
            }

            let mut key = String::new();
            while let Some(c) = chars.next_if(|c| *c != '=' && !c.is_whitespace()) {
                key.push(c);
            }
            if chars.next_if_eq(&'=').is_none() {
                return Err(StoreError::corrupted(line, format!("field {key:?} has no value")));
            }

            let mut value = String::new();
            if chars.next_if_eq(&'"').is_some() {
                let mut closed = false;
                while let Some(c) = chars.next() {
                    match c {
                        '"' => {
                            closed = true;
                            break;
                        }
                        '\\' => match chars.next() {
                            Some('n') => value.push('\n'),
                            Some('r') => value.push('\r'),
                            Some(other) => value.push(other),
                            None => break,
                        },
                        _ => value.push(c),
                    }
                }
                if !closed {
                    return Err(StoreError::corrupted(
                        line,
                        format!("unterminated quote in field {key:?}"),
                    ));
                }
            } else {
                while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                    value.push(c);
                }
            }
            pairs.push((key, value));
        }

        Ok(Self { pairs })
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn required(&self, key: &str, line: usize) -> Result<&str, StoreError> {
        self.get(key)
            .ok_or_else(|| StoreError::corrupted(line, format!("missing field {key:?}")))
    }

    fn number<T: std::str::FromStr>(&self, key: &str, line: usize) -> Result<T, StoreError> {
        let raw = self.required(key, line)?;
        raw.parse()
            .map_err(|_| StoreError::corrupted(line, format!("invalid {key}: {raw:?}")))
    }

    fn optional_number<T: std::str::FromStr>(
        &self,
        key: &str,
        line: usize,
    ) -> Result<Option<T>, StoreError> {
        match self.get(key) {
            None => Ok(None),
            Some(_) => self.number(key, line).map(Some),
        }
    }
}
