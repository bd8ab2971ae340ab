//! Command-line argument definitions.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use clap::{Parser, Subcommand};
use descansa_core::SleepQuality;
use descansa_store::ExportKind;

/// Headless sleep tracker.
///
/// Records sleep sessions against a nightly goal and reports on duration,
/// consistency, efficiency and sleep debt.
#[derive(Debug, Parser)]
#[command(name = "descansa", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Use this RFC 3339 instant as the current time.
    #[arg(long, global = true, hide = true, value_parser = parse_now)]
    pub now: Option<DateTime<FixedOffset>>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show the current session, sleep window and recommendations.
    Status,

    /// Start a sleep session now.
    Start,

    /// End the running sleep session.
    Stop,

    /// Show or change sleep goals.
    Goals {
        #[command(subcommand)]
        action: Option<GoalsAction>,
    },

    /// Rate the most recent completed session (1-4 or poor/fair/good/excellent).
    Quality { rating: SleepQuality },

    /// Append a note to the most recent completed session.
    Note {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Mark the most recent completed session as a nap.
    Nap {
        /// Clear the nap flag instead.
        #[arg(long)]
        unset: bool,
    },

    /// Show sleep statistics.
    Stats {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the detailed sleep report.
    Report,

    /// Export data to a file.
    Export {
        /// Export format (analysis, summary or detailed).
        kind: ExportKind,
        /// Destination file.
        path: PathBuf,
    },

    /// Write a backup of goals and all sessions.
    Backup { path: PathBuf },

    /// Replace goals and sessions with the contents of a backup.
    Restore { path: PathBuf },

    /// Remove completed sessions older than the given number of days.
    Prune {
        #[arg(long)]
        keep_days: u32,
    },

    /// Remove all sessions. Goals are kept.
    Clear,

    /// Check the data file for problems.
    Check,
}

/// Goal subcommands.
#[derive(Debug, Subcommand)]
pub enum GoalsAction {
    /// Show current goals.
    Show,

    /// Change one or more goals.
    Set {
        /// Target sleep per night, in hours (up to 24).
        #[arg(long)]
        hours: Option<f64>,

        /// Target wake time as HH:MM.
        #[arg(long)]
        wake: Option<WakeTime>,

        /// Bedtime hour (0-23). Derived from wake time and target when unset.
        #[arg(long)]
        bedtime: Option<u8>,

        /// Target sleep efficiency percentage (70-100).
        #[arg(long)]
        efficiency: Option<f64>,
    },
}

/// A wake time given as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeTime {
    pub hour: u8,
    pub minute: u8,
}

impl FromStr for WakeTime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hour, minute) = s
            .split_once(':')
            .ok_or_else(|| format!("expected HH:MM, got {s:?}"))?;
        let hour = hour
            .parse()
            .map_err(|_| format!("invalid hour in {s:?}"))?;
        let minute = minute
            .parse()
            .map_err(|_| format!("invalid minute in {s:?}"))?;
        Ok(Self { hour, minute })
    }
}

impl fmt::Display for WakeTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

fn parse_now(s: &str) -> Result<DateTime<FixedOffset>, String> {
    DateTime::parse_from_rfc3339(s).map_err(|e| format!("invalid RFC 3339 timestamp: {e}"))
}
