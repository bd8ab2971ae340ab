//! Core domain logic for the sleep tracker.
//!
//! This crate contains the in-memory engine:
//! - Goals and sessions: the validated data model
//! - History: completed sessions in start order plus the active one
//! - Sleep window: time-of-day arithmetic across midnight, through an injectable [`Clock`]
//! - Statistics and insights: averages, score, efficiency, debt, adherence, advice text

pub mod clock;
mod error;
pub mod format;
pub mod goals;
pub mod history;
pub mod insights;
pub mod session;
pub mod stats;
pub mod window;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::CoreError;
pub use format::{format_duration, format_time_of_day};
pub use goals::Goals;
pub use history::{History, cutoff_before};
pub use session::{SleepQuality, SleepSession, normalize_note};
pub use stats::{DailyTotal, ScoreBreakdown, SleepStats};
pub use window::SleepWindow;
