use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use descansa_core::{Clock, ManualClock, SystemClock};
use descansa_store::Tracker;
use tracing_subscriber::EnvFilter;

use descansa_cli::commands::goals::GoalChanges;
use descansa_cli::commands::{data, goals, report, session, stats, status};
use descansa_cli::{Cli, Commands, Config, GoalsAction};

/// Load config and open the tracker, ensuring the data directory exists.
fn open_tracker<C: Clock>(config_path: Option<&Path>, clock: C) -> Result<Tracker<C>> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    let data_path = config.data_file()?;
    if let Some(parent) = data_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create data directory")?;
    }

    let tracker = Tracker::initialize_with_clock(&data_path, clock)
        .with_context(|| format!("failed to open {}", data_path.display()))?;
    for diagnostic in tracker.diagnostics() {
        eprintln!("warning: {diagnostic}");
    }
    Ok(tracker)
}

/// Runs one command against the tracker, then saves pending changes.
///
/// A failed command returns before saving, so a rejected change never
/// reaches the data file.
fn run<C: Clock>(command: &Commands, mut tracker: Tracker<C>, timezone: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match command {
        Commands::Status => status::run(&mut out, &tracker, timezone)?,
        Commands::Start => session::start(&mut out, &mut tracker)?,
        Commands::Stop => session::stop(&mut out, &mut tracker)?,
        Commands::Goals { action } => match action {
            None | Some(GoalsAction::Show) => goals::show(&mut out, &tracker)?,
            Some(GoalsAction::Set {
                hours,
                wake,
                bedtime,
                efficiency,
            }) => {
                let changes = GoalChanges {
                    hours: *hours,
                    wake: *wake,
                    bedtime: *bedtime,
                    efficiency: *efficiency,
                };
                goals::set(&mut out, &mut tracker, changes)?;
            }
        },
        Commands::Quality { rating } => session::quality(&mut out, &mut tracker, *rating)?,
        Commands::Note { text } => session::note(&mut out, &mut tracker, text)?,
        Commands::Nap { unset } => session::nap(&mut out, &mut tracker, !*unset)?,
        Commands::Stats { json } => stats::run(&mut out, &tracker, *json)?,
        Commands::Report => report::run(&mut out, &tracker)?,
        Commands::Export { kind, path } => report::export(&mut out, &tracker, *kind, path)?,
        Commands::Backup { path } => data::backup(&mut out, &tracker, path)?,
        Commands::Restore { path } => data::restore(&mut out, &mut tracker, path)?,
        Commands::Prune { keep_days } => data::prune(&mut out, &mut tracker, *keep_days)?,
        Commands::Clear => data::clear(&mut out, &mut tracker)?,
        Commands::Check => data::check(&mut out, &tracker)?,
    }
    out.flush()?;

    tracker.close().context("failed to save data")
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Logs go to stderr so `stats --json` stays parseable.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let config_path = cli.config.as_deref();
    match cli.now {
        Some(now) => {
            let clock = ManualClock::new(now.with_timezone(&Utc), *now.offset());
            let tracker = open_tracker(config_path, clock)?;
            run(command, tracker, &now.offset().to_string())
        }
        None => {
            let timezone = iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string());
            let tracker = open_tracker(config_path, SystemClock)?;
            run(command, tracker, &timezone)
        }
    }
}
