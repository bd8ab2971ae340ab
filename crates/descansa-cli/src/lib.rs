//! Descansa CLI library.
//!
//! This crate provides the command-line host for the sleep tracker.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands, GoalsAction, WakeTime};
pub use config::Config;
