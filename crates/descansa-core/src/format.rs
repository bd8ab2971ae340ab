//! Display formatting for durations and times of day.

use chrono::{Duration, NaiveTime, Timelike};

/// Formats a duration as `Hh Mm`.
///
/// Seconds are truncated and negative durations render as `0h 0m`.
pub fn format_duration(duration: Duration) -> String {
    let total_minutes = duration.num_minutes().max(0);
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;
    format!("{hours}h {minutes}m")
}

/// Formats a time of day as 24-hour `HH:MM`.
pub fn format_time_of_day(time: NaiveTime) -> String {
    format!("{:02}:{:02}", time.hour(), time.minute())
}

/// Whole minutes in a duration, never negative.
pub fn whole_minutes(duration: Duration) -> i64 {
    duration.num_minutes().max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration_hours_and_minutes() {
        assert_eq!(format_duration(Duration::minutes(450)), "7h 30m");
        assert_eq!(format_duration(Duration::minutes(30)), "0h 30m");
        assert_eq!(format_duration(Duration::hours(24)), "24h 0m");
    }

    #[test]
    fn test_format_duration_zero_and_negative() {
        assert_eq!(format_duration(Duration::zero()), "0h 0m");
        assert_eq!(format_duration(Duration::minutes(-5)), "0h 0m");
    }

    #[test]
    fn test_format_duration_truncates_seconds() {
        assert_eq!(format_duration(Duration::seconds(59)), "0h 0m");
        assert_eq!(format_duration(Duration::seconds(3_659)), "1h 0m");
    }

    #[test]
    fn test_format_time_of_day_pads() {
        let time = NaiveTime::from_hms_opt(6, 5, 59).unwrap();
        assert_eq!(format_time_of_day(time), "06:05");
    }
}
