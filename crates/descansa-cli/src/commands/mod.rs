//! CLI subcommand implementations.

pub mod data;
pub mod goals;
pub mod report;
pub mod session;
pub mod stats;
pub mod status;
pub mod util;
