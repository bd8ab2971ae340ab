//! Status command: the running session, the sleep window and what to do next.

use std::io::Write;

use anyhow::Result;
use descansa_core::{Clock, format_time_of_day};
use descansa_store::Tracker;

use super::util::write_list;

pub fn run<C: Clock, W: Write>(writer: &mut W, tracker: &Tracker<C>, timezone: &str) -> Result<()> {
    let goals = tracker.goals();
    let now = tracker.clock().now_seconds();
    let in_window = tracker.is_in_sleep_period();

    writeln!(writer, "Descansa status")?;
    writeln!(writer, "Time zone:     {timezone}")?;
    writeln!(
        writer,
        "Local time:    {}",
        format_time_of_day(tracker.clock().local_time(now))
    )?;
    if tracker.is_session_running() {
        writeln!(
            writer,
            "Session:       running for {}",
            tracker.current_session_duration_formatted()
        )?;
    } else {
        writeln!(writer, "Session:       idle")?;
    }
    writeln!(
        writer,
        "Sleep window:  {} - {} ({})",
        format_time_of_day(goals.bedtime()),
        format_time_of_day(goals.wake_time()),
        if in_window { "inside" } else { "outside" }
    )?;
    writeln!(
        writer,
        "Next wake:     {} (in {})",
        tracker.next_wake_time_formatted(),
        tracker.time_until_wake_formatted()
    )?;
    if !in_window {
        writeln!(
            writer,
            "Until bedtime: {}",
            tracker.remaining_work_time_formatted()
        )?;
    }
    writeln!(writer, "Last sleep:    {}", tracker.last_sleep_duration_formatted())?;
    writeln!(
        writer,
        "Average (7d):  {}",
        tracker.average_sleep_duration_formatted(7)
    )?;
    writeln!(writer, "Sessions:      {}", tracker.session_count())?;
    writeln!(writer, "Data file:     {}", tracker.path().display())?;

    write_list(writer, "Recommendations", &tracker.current_recommendations())?;
    write_list(writer, "Warnings", &tracker.data_warnings())?;
    Ok(())
}
