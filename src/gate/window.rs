use chrono::{DateTime, FixedOffset, TimeDelta};

/// Admission interval around an event start, both ends inclusive.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct AdmissionWindow {
    pub open_before: TimeDelta,
    pub close_after: TimeDelta,
}

impl Default for AdmissionWindow {
    fn default() -> Self {
        Self {
            open_before: TimeDelta::hours(1),
            close_after: TimeDelta::hours(2),
        }
    }
}

impl AdmissionWindow {
    pub fn new(open_before: TimeDelta, close_after: TimeDelta) -> Self {
        Self {
            open_before,
            close_after,
        }
    }

    pub fn from_minutes(open_before: u32, close_after: u32) -> Self {
        Self::new(
            TimeDelta::minutes(i64::from(open_before)),
            TimeDelta::minutes(i64::from(close_after)),
        )
    }

    /// Whether `now` falls inside `[event - open_before, event + close_after]`.
    ///
    /// `now` is moved onto the event's offset first, so both sides are civil
    /// times in the same zone.
    pub fn contains(&self, event: DateTime<FixedOffset>, now: DateTime<FixedOffset>) -> bool {
        let now = now.with_timezone(event.offset());
        event - self.open_before <= now && now <= event + self.close_after
    }

    pub fn opens_at(&self, event: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
        event - self.open_before
    }

    pub fn closes_at(&self, event: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
        event + self.close_after
    }
}
