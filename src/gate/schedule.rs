use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeDelta};
use std::fmt;
use thiserror::Error;

/// Substitute for every non-alphanumeric character of an instance key
pub const KEY_SUBSTITUTE: char = '_';

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum ScheduleError {
    #[error("Invalid event date {0:?}, expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Invalid event hour {0:?}, expected 00-23")]
    InvalidHour(String),

    #[error("Invalid event minute {0:?}, expected 00-59")]
    InvalidMinute(String),
}

/// One scheduled event instance: a civil date plus hour and minute.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct EventSchedule {
    start: NaiveDateTime,
}

impl EventSchedule {
    /// Parse the raw `date`, `hour` and `minute` request fields.
    ///
    /// Hour and minute may be given with or without a leading zero.
    pub fn parse(date: &str, hour: &str, minute: &str) -> Result<Self, ScheduleError> {
        let day = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
            .map_err(|_| ScheduleError::InvalidDate(date.to_string()))?;
        let hour_value = parse_clock_field(hour, 23)
            .ok_or_else(|| ScheduleError::InvalidHour(hour.to_string()))?;
        let minute_value = parse_clock_field(minute, 59)
            .ok_or_else(|| ScheduleError::InvalidMinute(minute.to_string()))?;

        let start = day
            .and_hms_opt(hour_value, minute_value, 0)
            .ok_or_else(|| ScheduleError::InvalidHour(hour.to_string()))?;
        Ok(Self { start })
    }

    pub fn date(&self) -> NaiveDate {
        self.start.date()
    }

    /// Wall-clock start of the event, without any zone attached
    pub fn naive_start(&self) -> NaiveDateTime {
        self.start
    }

    /// Start of the event as an instant in the given civil timezone
    pub fn starts_at(&self, tz: &FixedOffset) -> DateTime<FixedOffset> {
        let utc = self.start - TimeDelta::seconds(i64::from(tz.local_minus_utc()));
        DateTime::from_naive_utc_and_offset(utc, *tz)
    }

    pub fn instance_key(&self) -> EventInstanceKey {
        EventInstanceKey::from_schedule(self)
    }
}

fn parse_clock_field(raw: &str, max: u32) -> Option<u32> {
    let raw = raw.trim();
    if raw.is_empty() || raw.len() > 2 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse::<u32>().ok().filter(|value| *value <= max)
}

/// Storage-safe name of a ledger partition, one per event instance.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct EventInstanceKey(String);

impl EventInstanceKey {
    pub fn from_schedule(schedule: &EventSchedule) -> Self {
        // Fixed-width fields keep the mapping injective after substitution.
        let canonical = schedule.start.format("%Y-%m-%d_%H_%M").to_string();
        let key = canonical
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { KEY_SUBSTITUTE })
            .collect();
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventInstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_parse_schedule() {
        let schedule = EventSchedule::parse("2025-06-01", "12", "00").unwrap();
        assert_eq!(schedule.date(), NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert_eq!(schedule.naive_start().hour(), 12);
        assert_eq!(schedule.naive_start().minute(), 0);

        // Leading zeros are optional
        assert_eq!(
            EventSchedule::parse("2025-06-01", "9", "5").unwrap(),
            EventSchedule::parse("2025-06-01", "09", "05").unwrap()
        );
    }

    #[test]
    fn test_parse_schedule_failures() {
        assert_eq!(
            EventSchedule::parse("2025/06/01", "12", "00"),
            Err(ScheduleError::InvalidDate("2025/06/01".into()))
        );
        assert_eq!(
            EventSchedule::parse("2025-02-30", "12", "00"),
            Err(ScheduleError::InvalidDate("2025-02-30".into()))
        );
        assert_eq!(
            EventSchedule::parse("2025-06-01", "24", "00"),
            Err(ScheduleError::InvalidHour("24".into()))
        );
        assert_eq!(
            EventSchedule::parse("2025-06-01", "+9", "00"),
            Err(ScheduleError::InvalidHour("+9".into()))
        );
        assert_eq!(
            EventSchedule::parse("2025-06-01", "12", "60"),
            Err(ScheduleError::InvalidMinute("60".into()))
        );
        assert_eq!(
            EventSchedule::parse("2025-06-01", "12", "abc"),
            Err(ScheduleError::InvalidMinute("abc".into()))
        );
    }

    #[test]
    fn test_starts_at_uses_given_offset() {
        let kst = FixedOffset::east_opt(9 * 3600).unwrap();
        let schedule = EventSchedule::parse("2025-06-01", "12", "00").unwrap();
        let start = schedule.starts_at(&kst);

        assert_eq!(start.offset(), &kst);
        assert_eq!(start.naive_local(), schedule.naive_start());
        assert_eq!(start.naive_utc().hour(), 3);
    }

    #[test]
    fn test_instance_key() {
        let schedule = EventSchedule::parse("2025-06-01", "12", "00").unwrap();
        assert_eq!(schedule.instance_key().as_str(), "2025_06_01_12_00");

        // Same schedule, different spelling
        let other = EventSchedule::parse(" 2025-06-01 ", "12", "0").unwrap();
        assert_eq!(schedule.instance_key(), other.instance_key());

        // Distinct schedules never collide
        let keys = [
            EventSchedule::parse("2025-06-01", "12", "00").unwrap(),
            EventSchedule::parse("2025-06-02", "12", "00").unwrap(),
            EventSchedule::parse("2025-06-01", "1", "20").unwrap(),
            EventSchedule::parse("2025-06-01", "12", "01").unwrap(),
        ]
        .map(|s| s.instance_key());
        for (i, a) in keys.iter().enumerate() {
            for b in &keys[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_instance_key_is_storage_safe() {
        let key = EventSchedule::parse("2025-12-31", "23", "59")
            .unwrap()
            .instance_key();
        assert!(key.as_str().chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
        assert_eq!(key.to_string(), "2025_12_31_23_59");
    }
}
