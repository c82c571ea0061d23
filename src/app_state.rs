use crate::gate::{AdmissionGate, AdmissionWindow, ConsumptionLedger};
use crate::kiosk::KioskSchedule;
use crate::storage::StorageConfig;
use chrono::FixedOffset;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<AdmissionGate>,
    secret: Arc<str>,
    kiosk_config: Option<PathBuf>,
}

impl AppState {
    pub fn new(
        storage: &StorageConfig,
        window: AdmissionWindow,
        timezone: FixedOffset,
        secret: &str,
        kiosk_config: Option<PathBuf>,
    ) -> anyhow::Result<Self> {
        let operator = storage.build_operator()?;
        let ledger = Arc::new(ConsumptionLedger::new(operator));
        let gate = Arc::new(AdmissionGate::new(ledger, window, timezone));

        info!(
            durable = storage.is_durable(),
            %timezone,
            open_before_mins = window.open_before.num_minutes(),
            close_after_mins = window.close_after.num_minutes(),
            kiosk_config = ?kiosk_config,
            "Admission gate ready"
        );

        Ok(Self {
            gate,
            secret: Arc::from(secret),
            kiosk_config,
        })
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn kiosk_config(&self) -> Option<&Path> {
        self.kiosk_config.as_deref()
    }

    /// Complete a partially given schedule from the kiosk config, if one is configured
    pub async fn resolve_schedule(
        &self,
        date: &mut Option<String>,
        hour: &mut Option<String>,
        minute: &mut Option<String>,
    ) {
        if date.is_some() && hour.is_some() && minute.is_some() {
            return;
        }
        let Some(path) = self.kiosk_config() else {
            return;
        };

        match KioskSchedule::load(path).await {
            Ok(schedule) => schedule.fill(date, hour, minute),
            Err(error) => warn!(?error, "Kiosk config unavailable, schedule stays incomplete"),
        }
    }
}
