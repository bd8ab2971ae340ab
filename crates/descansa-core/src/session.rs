//! Sleep session records.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Maximum note length in bytes after normalization.
pub const MAX_NOTE_LENGTH: usize = 1024;

/// Separator used when a note is appended to an existing one.
const NOTE_SEPARATOR: &str = "; ";

/// Longest duration a completed session may have.
pub fn max_session_duration() -> Duration {
    Duration::hours(24)
}

/// Perceived quality of a completed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SleepQuality {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl SleepQuality {
    /// Numeric rating, 1 (poor) through 4 (excellent).
    #[must_use]
    pub const fn rating(self) -> u8 {
        match self {
            Self::Poor => 1,
            Self::Fair => 2,
            Self::Good => 3,
            Self::Excellent => 4,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Poor => "Poor",
            Self::Fair => "Fair",
            Self::Good => "Good",
            Self::Excellent => "Excellent",
        }
    }
}

impl TryFrom<u8> for SleepQuality {
    type Error = CoreError;

    fn try_from(rating: u8) -> Result<Self, Self::Error> {
        match rating {
            1 => Ok(Self::Poor),
            2 => Ok(Self::Fair),
            3 => Ok(Self::Good),
            4 => Ok(Self::Excellent),
            _ => Err(CoreError::out_of_range("quality", rating)),
        }
    }
}

impl std::fmt::Display for SleepQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SleepQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "1" | "poor" => Ok(Self::Poor),
            "2" | "fair" => Ok(Self::Fair),
            "3" | "good" => Ok(Self::Good),
            "4" | "excellent" => Ok(Self::Excellent),
            _ => Err(format!("invalid sleep quality: {s}")),
        }
    }
}

/// One sleep interval. `end == None` means the session is still running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SleepSession {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub quality: Option<SleepQuality>,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub is_nap: bool,
}

impl SleepSession {
    /// A running session started at `start`.
    pub const fn started(start: DateTime<Utc>) -> Self {
        Self {
            start,
            end: None,
            quality: None,
            note: String::new(),
            is_nap: false,
        }
    }

    /// A completed session with no quality, note or nap flag.
    pub const fn completed(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end: Some(end),
            quality: None,
            note: String::new(),
            is_nap: false,
        }
    }

    pub const fn is_active(&self) -> bool {
        self.end.is_none()
    }

    /// Recorded duration; zero while running.
    pub fn duration(&self) -> Duration {
        self.end.map_or_else(Duration::zero, |end| end - self.start)
    }

    /// Duration up to `now` for a running session, recorded duration otherwise.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        let end = self.end.unwrap_or(now);
        (end - self.start).max(Duration::zero())
    }

    /// Checks the invariant for completed sessions: `0 < duration <= 24h`.
    pub fn check_interval(&self) -> Result<(), CoreError> {
        let duration = self.duration();
        if duration <= Duration::zero() {
            return Err(CoreError::EmptySession);
        }
        if duration > max_session_duration() {
            return Err(CoreError::DurationOverflow {
                minutes: duration.num_minutes(),
            });
        }
        Ok(())
    }

    /// Appends a note, keeping the stored note normalized.
    pub fn append_note(&mut self, text: &str) {
        let addition = normalize_note(text);
        if addition.is_empty() {
            return;
        }
        let combined = if self.note.is_empty() {
            addition
        } else {
            format!("{}{NOTE_SEPARATOR}{addition}", self.note)
        };
        self.note = normalize_note(&combined);
    }
}

/// Trims, collapses every run of line breaks into one space, and caps the
/// result at [`MAX_NOTE_LENGTH`] bytes on a character boundary.
pub fn normalize_note(text: &str) -> String {
    let mut out = String::with_capacity(text.len().min(MAX_NOTE_LENGTH));
    let mut in_break = false;
    for ch in text.trim().chars() {
        if ch == '\n' || ch == '\r' {
            if !in_break {
                out.push(' ');
            }
            in_break = true;
        } else {
            out.push(ch);
            in_break = false;
        }
    }

    if out.len() > MAX_NOTE_LENGTH {
        let mut cut = MAX_NOTE_LENGTH;
        while !out.is_char_boundary(cut) {
            cut -= 1;
        }
        out.truncate(cut);
    }
    out.trim_end().to_string()
}
