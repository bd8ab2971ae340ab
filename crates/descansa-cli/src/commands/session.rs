//! Session commands: start, stop and annotations on the last session.

use std::io::Write;

use anyhow::{Context, Result};
use descansa_core::{Clock, SleepQuality, format_duration, format_time_of_day};
use descansa_store::Tracker;

pub fn start<C: Clock, W: Write>(writer: &mut W, tracker: &mut Tracker<C>) -> Result<()> {
    if tracker.start_sleep_session() {
        let now = tracker.clock().now_seconds();
        writeln!(
            writer,
            "Sleep session started at {}.",
            format_time_of_day(tracker.clock().local_time(now))
        )?;
    } else {
        writeln!(
            writer,
            "A sleep session is already running ({}).",
            tracker.current_session_duration_formatted()
        )?;
    }
    Ok(())
}

/// Ends the running session. A discarded session is reported, not returned as
/// an error, so the caller still saves the removal.
pub fn stop<C: Clock, W: Write>(writer: &mut W, tracker: &mut Tracker<C>) -> Result<()> {
    match tracker.end_sleep_session() {
        Ok(Some(session)) => {
            let clock = tracker.clock();
            let end = session.end.unwrap_or(session.start);
            writeln!(
                writer,
                "Slept {} ({} - {}).",
                format_duration(session.duration()),
                format_time_of_day(clock.local_time(session.start)),
                format_time_of_day(clock.local_time(end))
            )?;
        }
        Ok(None) => writeln!(writer, "No sleep session is running.")?,
        Err(e) => writeln!(writer, "Sleep session not recorded: {e}.")?,
    }
    Ok(())
}

pub fn quality<C: Clock, W: Write>(
    writer: &mut W,
    tracker: &mut Tracker<C>,
    rating: SleepQuality,
) -> Result<()> {
    tracker
        .set_sleep_quality(rating.rating())
        .context("cannot rate sleep")?;
    writeln!(writer, "Rated last session: {rating}.")?;
    Ok(())
}

pub fn note<C: Clock, W: Write>(writer: &mut W, tracker: &mut Tracker<C>, text: &[String]) -> Result<()> {
    tracker
        .add_session_note(&text.join(" "))
        .context("cannot add note")?;
    let note = tracker
        .history()
        .last_completed()
        .map_or("", |session| session.note.as_str());
    writeln!(writer, "Note: {note}")?;
    Ok(())
}

pub fn nap<C: Clock, W: Write>(writer: &mut W, tracker: &mut Tracker<C>, is_nap: bool) -> Result<()> {
    tracker.mark_as_nap(is_nap).context("cannot mark nap")?;
    if is_nap {
        writeln!(writer, "Last session marked as a nap.")?;
    } else {
        writeln!(writer, "Last session marked as night sleep.")?;
    }
    Ok(())
}
