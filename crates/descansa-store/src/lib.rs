//! Storage layer for the sleep tracker.
//!
//! Provides the on-disk format for goals and sessions, the export writers, and
//! [`Tracker`], the handle a host creates once and passes to every operation.
//!
//! # File Format
//!
//! The data file is line-oriented UTF-8 text:
//!
//! ```text
//! DESCANSA v1
//! GOAL target_minutes=480 wake_h=7 wake_m=0 bed_h=23 eff=85.0
//! SESSION start=1736900000 end=1736928800 q=3 nap=0 note="slept well"
//! SESSION start=1736986400 end=- q=0 nap=0 note=""
//! ```
//!
//! Timestamps are Unix seconds. Lines starting with `#` are comments, and
//! lines with an unknown leading word are skipped so newer files still load.
//!
//! # Save Discipline
//!
//! Every write goes to `<path>.tmp` first and is renamed over the target, so a
//! failed write never corrupts an existing file.

use std::path::PathBuf;

use descansa_core::CoreError;
use thiserror::Error;

mod atomic;
pub mod codec;
pub mod export;
mod tracker;

pub use codec::{Decoded, Diagnostic};
pub use export::ExportKind;
pub use tracker::{SystemStatus, Tracker};

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading, writing or renaming a file failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The file could not be parsed.
    #[error("corrupted data at line {line}: {reason}")]
    Corrupted { line: usize, reason: String },
    /// Paths handed to the store must be absolute.
    #[error("path must be absolute: {}", path.display())]
    InvalidPath { path: PathBuf },
    /// A goal or session operation was rejected.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupted(line: usize, reason: impl Into<String>) -> Self {
        Self::Corrupted {
            line,
            reason: reason.into(),
        }
    }
}
