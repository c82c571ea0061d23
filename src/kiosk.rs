use crate::api::params::clock_field;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Default event schedule as written by the kiosk app:
/// `{"date": "2025-06-01", "hour": "12", "minute": "00"}`.
///
/// The file is re-read on every use so an operator can switch events without a restart.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct KioskSchedule {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "clock_field")]
    pub hour: Option<String>,
    #[serde(default, deserialize_with = "clock_field")]
    pub minute: Option<String>,
}

impl KioskSchedule {
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("read kiosk config {}", path.display()))?;
        let schedule: KioskSchedule = serde_json::from_str(&content)
            .with_context(|| format!("parse kiosk config {}", path.display()))?;
        debug!(path = %path.display(), ?schedule, "Loaded kiosk schedule");
        Ok(schedule)
    }

    /// Fill whichever of `date`, `hour` and `minute` are absent from this schedule
    pub fn fill(
        &self,
        date: &mut Option<String>,
        hour: &mut Option<String>,
        minute: &mut Option<String>,
    ) {
        if date.is_none() {
            date.clone_from(&self.date);
        }
        if hour.is_none() {
            hour.clone_from(&self.hour);
        }
        if minute.is_none() {
            minute.clone_from(&self.minute);
        }
    }
}
