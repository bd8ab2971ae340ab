//! Goals command for showing and changing sleep goals.

use std::io::Write;

use anyhow::{Context, Result};
use descansa_core::{Clock, format_time_of_day};
use descansa_store::Tracker;

use crate::WakeTime;

/// Requested goal changes; `None` keeps the current value.
#[derive(Debug, Default, Clone, Copy)]
pub struct GoalChanges {
    pub hours: Option<f64>,
    pub wake: Option<WakeTime>,
    pub bedtime: Option<u8>,
    pub efficiency: Option<f64>,
}

pub fn show<C: Clock, W: Write>(writer: &mut W, tracker: &Tracker<C>) -> Result<()> {
    let goals = tracker.goals();
    let bedtime_source = if goals.explicit_bedtime_hour().is_some() {
        "set"
    } else {
        "derived"
    };

    writeln!(writer, "Target sleep:  {:.2}h", goals.target_sleep_hours())?;
    writeln!(writer, "Wake time:     {}", format_time_of_day(goals.wake_time()))?;
    writeln!(
        writer,
        "Sleep window:  {} - {}",
        format_time_of_day(goals.bedtime()),
        format_time_of_day(goals.wake_time())
    )?;
    writeln!(
        writer,
        "Bedtime hour:  {} ({bedtime_source})",
        goals.bedtime_hour()
    )?;
    writeln!(writer, "Efficiency:    {:.1}%", goals.target_efficiency_pct())?;
    Ok(())
}

/// Applies `changes` in order, then shows the resulting goals.
///
/// A rejected value fails the command; the caller does not save in that case.
pub fn set<C: Clock, W: Write>(
    writer: &mut W,
    tracker: &mut Tracker<C>,
    changes: GoalChanges,
) -> Result<()> {
    if changes.bedtime.is_some() || changes.efficiency.is_some() {
        let goals = tracker.goals();
        let hours = changes.hours.unwrap_or_else(|| goals.target_sleep_hours());
        let bedtime = changes.bedtime.unwrap_or_else(|| goals.bedtime_hour());
        let wake_hour = changes.wake.map_or(goals.wake_hour(), |wake| wake.hour);
        let efficiency = changes
            .efficiency
            .unwrap_or_else(|| goals.target_efficiency_pct());
        tracker
            .set_enhanced_goals(hours, bedtime, wake_hour, efficiency)
            .context("invalid goals")?;
    } else if let Some(hours) = changes.hours {
        tracker
            .set_target_sleep_hours(hours)
            .context("invalid target sleep")?;
    }

    if let Some(wake) = changes.wake {
        tracker
            .set_target_wake_time(wake.hour, wake.minute)
            .context("invalid wake time")?;
    }

    show(writer, tracker)
}
