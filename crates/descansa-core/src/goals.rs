//! User sleep goals.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Minutes in a day.
pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Default target sleep: 8 hours.
pub const DEFAULT_TARGET_SLEEP_MINUTES: u32 = 480;

/// Default wake time: 07:00.
pub const DEFAULT_WAKE_HOUR: u8 = 7;
pub const DEFAULT_WAKE_MINUTE: u8 = 0;

/// Default target sleep efficiency (percent).
pub const DEFAULT_TARGET_EFFICIENCY: f64 = 85.0;

const MIN_TARGET_EFFICIENCY: f64 = 70.0;
const MAX_TARGET_EFFICIENCY: f64 = 100.0;

/// The singleton goals record.
///
/// Fields are private so every value that reaches the tracker has passed
/// validation. Equality compares the effective bedtime hour, so an explicit
/// bedtime equal to the derived one matches an unset bedtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goals {
    target_sleep_minutes: u32,
    wake_hour: u8,
    wake_minute: u8,
    bedtime_hour: Option<u8>,
    target_efficiency_pct: f64,
}

impl Default for Goals {
    fn default() -> Self {
        Self {
            target_sleep_minutes: DEFAULT_TARGET_SLEEP_MINUTES,
            wake_hour: DEFAULT_WAKE_HOUR,
            wake_minute: DEFAULT_WAKE_MINUTE,
            bedtime_hour: None,
            target_efficiency_pct: DEFAULT_TARGET_EFFICIENCY,
        }
    }
}

impl PartialEq for Goals {
    fn eq(&self, other: &Self) -> bool {
        self.target_sleep_minutes == other.target_sleep_minutes
            && self.wake_hour == other.wake_hour
            && self.wake_minute == other.wake_minute
            && self.bedtime_hour() == other.bedtime_hour()
            && self.target_efficiency_pct == other.target_efficiency_pct
    }
}

impl Goals {
    /// Builds a goals record from raw values, validating each one.
    pub fn new(
        target_sleep_minutes: u32,
        wake_hour: u8,
        wake_minute: u8,
        bedtime_hour: Option<u8>,
        target_efficiency_pct: f64,
    ) -> Result<Self, CoreError> {
        validate_target_minutes(target_sleep_minutes)?;
        validate_hour("wake_hour", wake_hour)?;
        validate_minute(wake_minute)?;
        if let Some(hour) = bedtime_hour {
            validate_hour("bedtime_hour", hour)?;
        }
        validate_efficiency(target_efficiency_pct)?;
        Ok(Self {
            target_sleep_minutes,
            wake_hour,
            wake_minute,
            bedtime_hour,
            target_efficiency_pct,
        })
    }

    pub const fn target_sleep_minutes(&self) -> u32 {
        self.target_sleep_minutes
    }

    pub fn target_sleep_hours(&self) -> f64 {
        f64::from(self.target_sleep_minutes) / 60.0
    }

    pub const fn wake_hour(&self) -> u8 {
        self.wake_hour
    }

    pub const fn wake_minute(&self) -> u8 {
        self.wake_minute
    }

    /// The explicitly configured bedtime hour, if any.
    pub const fn explicit_bedtime_hour(&self) -> Option<u8> {
        self.bedtime_hour
    }

    /// The bedtime hour, derived from wake time and target when not set.
    pub fn bedtime_hour(&self) -> u8 {
        self.bedtime_hour.unwrap_or_else(|| self.derived_bedtime_hour())
    }

    /// `(wakeHour - targetSleepMinutes / 60) mod 24`.
    pub fn derived_bedtime_hour(&self) -> u8 {
        let target_hours = i64::from(self.target_sleep_minutes / 60);
        let hour = (i64::from(self.wake_hour) - target_hours).rem_euclid(24);
        u8::try_from(hour).unwrap_or(0)
    }

    pub const fn target_efficiency_pct(&self) -> f64 {
        self.target_efficiency_pct
    }

    /// Wake time as minutes after local midnight.
    pub fn wake_minute_of_day(&self) -> u32 {
        u32::from(self.wake_hour) * 60 + u32::from(self.wake_minute)
    }

    /// Start of the sleep window as minutes after local midnight.
    pub fn bedtime_minute_of_day(&self) -> u32 {
        (self.wake_minute_of_day() + MINUTES_PER_DAY - self.target_sleep_minutes % MINUTES_PER_DAY)
            % MINUTES_PER_DAY
    }

    pub fn wake_time(&self) -> NaiveTime {
        time_from_minute_of_day(self.wake_minute_of_day())
    }

    pub fn bedtime(&self) -> NaiveTime {
        time_from_minute_of_day(self.bedtime_minute_of_day())
    }

    /// Sets the target sleep duration; stored as `round(hours * 60)` minutes.
    pub fn set_target_sleep_hours(&mut self, hours: f64) -> Result<(), CoreError> {
        self.target_sleep_minutes = hours_to_minutes(hours)?;
        Ok(())
    }

    pub fn set_target_wake_time(&mut self, hour: u8, minute: u8) -> Result<(), CoreError> {
        validate_hour("wake_hour", hour)?;
        validate_minute(minute)?;
        self.wake_hour = hour;
        self.wake_minute = minute;
        Ok(())
    }

    /// Updates target hours, bedtime hour, wake hour and efficiency together.
    ///
    /// Either all four values are applied or none is. The wake minute is kept.
    pub fn set_enhanced(
        &mut self,
        hours: f64,
        bedtime_hour: u8,
        wake_hour: u8,
        efficiency_pct: f64,
    ) -> Result<(), CoreError> {
        let target_sleep_minutes = hours_to_minutes(hours)?;
        validate_hour("bedtime_hour", bedtime_hour)?;
        validate_hour("wake_hour", wake_hour)?;
        validate_efficiency(efficiency_pct)?;

        self.target_sleep_minutes = target_sleep_minutes;
        self.bedtime_hour = Some(bedtime_hour);
        self.wake_hour = wake_hour;
        self.target_efficiency_pct = efficiency_pct;
        Ok(())
    }
}

fn hours_to_minutes(hours: f64) -> Result<u32, CoreError> {
    if !hours.is_finite() || hours <= 0.0 || hours > 24.0 {
        return Err(CoreError::out_of_range("target_sleep_hours", hours));
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let minutes = (hours * 60.0).round() as u32;
    if minutes == 0 {
        return Err(CoreError::out_of_range("target_sleep_hours", hours));
    }
    Ok(minutes)
}

fn validate_target_minutes(minutes: u32) -> Result<(), CoreError> {
    if minutes == 0 || minutes > MINUTES_PER_DAY {
        return Err(CoreError::out_of_range("target_sleep_minutes", minutes));
    }
    Ok(())
}

fn validate_hour(field: &'static str, hour: u8) -> Result<(), CoreError> {
    if hour > 23 {
        return Err(CoreError::out_of_range(field, hour));
    }
    Ok(())
}

fn validate_minute(minute: u8) -> Result<(), CoreError> {
    if minute > 59 {
        return Err(CoreError::out_of_range("wake_minute", minute));
    }
    Ok(())
}

fn validate_efficiency(pct: f64) -> Result<(), CoreError> {
    if !(MIN_TARGET_EFFICIENCY..=MAX_TARGET_EFFICIENCY).contains(&pct) {
        return Err(CoreError::out_of_range("target_efficiency_pct", pct));
    }
    Ok(())
}

fn time_from_minute_of_day(minute_of_day: u32) -> NaiveTime {
    NaiveTime::from_num_seconds_from_midnight_opt((minute_of_day % MINUTES_PER_DAY) * 60, 0)
        .unwrap_or(NaiveTime::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_eight_hours_waking_at_seven() {
        let goals = Goals::default();
        assert_eq!(goals.target_sleep_minutes(), 480);
        assert_eq!(goals.wake_hour(), 7);
        assert_eq!(goals.wake_minute(), 0);
        assert_eq!(goals.bedtime_hour(), 23);
        assert!((goals.target_efficiency_pct() - 85.0).abs() < f64::EPSILON);
    }

    #[test]
    fn target_hours_round_to_minutes() {
        let mut goals = Goals::default();
        goals.set_target_sleep_hours(7.5).unwrap();
        assert_eq!(goals.target_sleep_minutes(), 450);
        goals.set_target_sleep_hours(7.258).unwrap();
        assert_eq!(goals.target_sleep_minutes(), 435);
        goals.set_target_sleep_hours(24.0).unwrap();
        assert_eq!(goals.target_sleep_minutes(), 1440);
    }

    #[test]
    fn target_hours_out_of_range_leave_goals_unchanged() {
        let mut goals = Goals::default();
        for hours in [0.0, -1.0, 24.01, f64::NAN, 0.001] {
            let err = goals.set_target_sleep_hours(hours).unwrap_err();
            assert!(matches!(err, CoreError::OutOfRange { field: "target_sleep_hours", .. }));
        }
        assert_eq!(goals, Goals::default());
    }

    #[test]
    fn wake_time_is_validated() {
        let mut goals = Goals::default();
        assert!(goals.set_target_wake_time(24, 0).is_err());
        assert!(goals.set_target_wake_time(6, 60).is_err());
        goals.set_target_wake_time(6, 30).unwrap();
        assert_eq!((goals.wake_hour(), goals.wake_minute()), (6, 30));
    }

    #[test]
    fn enhanced_update_is_all_or_nothing() {
        let mut goals = Goals::default();
        let err = goals.set_enhanced(7.0, 22, 6, 65.0).unwrap_err();
        assert!(matches!(err, CoreError::OutOfRange { field: "target_efficiency_pct", .. }));
        assert_eq!(goals, Goals::default());

        goals.set_enhanced(7.0, 22, 6, 90.0).unwrap();
        assert_eq!(goals.target_sleep_minutes(), 420);
        assert_eq!(goals.bedtime_hour(), 22);
        assert_eq!(goals.wake_hour(), 6);
        assert!((goals.target_efficiency_pct() - 90.0).abs() < f64::EPSILON);
    }

    #[test]
    fn window_boundaries_span_midnight() {
        let goals = Goals::new(450, 6, 30, None, 88.0).unwrap();
        assert_eq!(goals.wake_minute_of_day(), 390);
        assert_eq!(goals.bedtime_minute_of_day(), 1380);
        assert_eq!(goals.bedtime(), NaiveTime::from_hms_opt(23, 0, 0).unwrap());
        assert_eq!(goals.wake_time(), NaiveTime::from_hms_opt(6, 30, 0).unwrap());
    }

    #[test]
    fn full_day_target_puts_bedtime_at_wake_time() {
        let goals = Goals::new(1440, 7, 0, None, 85.0).unwrap();
        assert_eq!(goals.bedtime_minute_of_day(), goals.wake_minute_of_day());
    }

    #[test]
    fn equality_uses_effective_bedtime() {
        let unset = Goals::new(480, 7, 0, None, 85.0).unwrap();
        let explicit = Goals::new(480, 7, 0, Some(23), 85.0).unwrap();
        let earlier = Goals::new(480, 7, 0, Some(22), 85.0).unwrap();
        assert_eq!(unset, explicit);
        assert_ne!(unset, earlier);
    }

    #[test]
    fn derived_bedtime_hour_wraps() {
        let goals = Goals::new(540, 5, 0, None, 85.0).unwrap();
        assert_eq!(goals.derived_bedtime_hour(), 20);
        let goals = Goals::new(300, 2, 0, None, 85.0).unwrap();
        assert_eq!(goals.derived_bedtime_hour(), 21);
    }
}
