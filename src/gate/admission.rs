use crate::gate::error::Rejection;
use crate::gate::ledger::{ConsumptionLedger, LedgerError};
use crate::gate::schedule::EventSchedule;
use crate::gate::token::authenticate;
use crate::gate::window::AdmissionWindow;
use chrono::{DateTime, FixedOffset, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Format of credential issue times, in the civil timezone
pub const ISSUE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// One presentation of a credential at the gate.
///
/// Every field is optional here so that absence can be reported as a rejection
/// instead of failing deserialization upstream.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct AdmissionRequest {
    pub serial: Option<String>,
    pub token: Option<String>,
    pub issue_time: Option<String>,
    pub date: Option<String>,
    pub hour: Option<String>,
    pub minute: Option<String>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum AdmissionOutcome {
    Admitted,
    Rejected(Rejection),
}

impl AdmissionOutcome {
    pub fn is_admitted(&self) -> bool {
        matches!(self, AdmissionOutcome::Admitted)
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            AdmissionOutcome::Admitted => None,
            AdmissionOutcome::Rejected(rejection) => Some(rejection),
        }
    }
}

impl From<Rejection> for AdmissionOutcome {
    fn from(rejection: Rejection) -> Self {
        AdmissionOutcome::Rejected(rejection)
    }
}

/// Fields of a request once presence has been checked
struct Presented<'a> {
    serial: &'a str,
    token: &'a str,
    issue_time: &'a str,
    date: &'a str,
    hour: &'a str,
    minute: &'a str,
}

impl AdmissionRequest {
    fn presented(&self) -> Result<Presented<'_>, Rejection> {
        let fields = [
            ("serial", &self.serial),
            ("token", &self.token),
            ("issue_time", &self.issue_time),
            ("date", &self.date),
            ("hour", &self.hour),
            ("minute", &self.minute),
        ];
        let missing = fields
            .iter()
            .filter(|(_, value)| value.as_deref().is_none_or(|v| v.trim().is_empty()))
            .map(|(name, _)| *name)
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            return Err(Rejection::MissingParameters(missing));
        }

        let [serial, token, issue_time, date, hour, minute] =
            fields.map(|(_, value)| value.as_deref().unwrap_or_default());
        Ok(Presented {
            serial,
            token,
            issue_time,
            date,
            hour,
            minute,
        })
    }
}

/// Entry point of the gate: validates a presented credential and consumes it.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    ledger: Arc<ConsumptionLedger>,
    window: AdmissionWindow,
    timezone: FixedOffset,
}

impl AdmissionGate {
    pub fn new(
        ledger: Arc<ConsumptionLedger>,
        window: AdmissionWindow,
        timezone: FixedOffset,
    ) -> Self {
        Self {
            ledger,
            window,
            timezone,
        }
    }

    pub fn ledger(&self) -> &Arc<ConsumptionLedger> {
        &self.ledger
    }

    /// Current time in the gate's civil timezone
    pub fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.timezone)
    }

    pub async fn admit_now(
        &self,
        request: &AdmissionRequest,
        secret: &str,
    ) -> Result<AdmissionOutcome, LedgerError> {
        self.admit(request, secret, self.now()).await
    }

    /// Run the admission checks in order: presence, schedule, window, token, ledger.
    ///
    /// The ledger is only touched once every other check has passed. A ledger
    /// failure is returned as an error and never as an admission.
    pub async fn admit(
        &self,
        request: &AdmissionRequest,
        secret: &str,
        now: DateTime<FixedOffset>,
    ) -> Result<AdmissionOutcome, LedgerError> {
        let presented = match request.presented() {
            Ok(presented) => presented,
            Err(rejection) => {
                info!(%rejection, "Admission rejected");
                return Ok(rejection.into());
            }
        };
        let serial = presented.serial;

        let schedule = match EventSchedule::parse(presented.date, presented.hour, presented.minute)
        {
            Ok(schedule) => schedule,
            Err(error) => {
                warn!(serial, %error, "Admission rejected, malformed schedule");
                return Ok(Rejection::from(error).into());
            }
        };

        let event = schedule.starts_at(&self.timezone);
        let now = now.with_timezone(&self.timezone);
        if !self.window.contains(event, now) {
            info!(
                serial,
                %event,
                %now,
                opens_at = %self.window.opens_at(event),
                closes_at = %self.window.closes_at(event),
                "Admission rejected, outside window"
            );
            return Ok(Rejection::OutsideWindow.into());
        }

        if !authenticate(serial, presented.issue_time, presented.token, secret) {
            warn!(
                serial,
                issue_time = presented.issue_time,
                "Admission rejected, invalid token"
            );
            return Ok(Rejection::InvalidToken.into());
        }

        let key = schedule.instance_key();
        debug!(serial, instance = %key, "Token verified, consulting ledger");
        if !self.ledger.check_and_consume(&key, serial).await? {
            info!(serial, instance = %key, "Admission rejected, already used");
            return Ok(Rejection::AlreadyUsed.into());
        }

        info!(serial, instance = %key, "Admitted");
        Ok(AdmissionOutcome::Admitted)
    }
}
