pub mod admission;
pub mod error;
pub mod ledger;
pub mod schedule;
pub mod token;
pub mod window;

// Re-export public types and functions
pub use admission::{AdmissionGate, AdmissionOutcome, AdmissionRequest, ISSUE_TIME_FORMAT};
pub use error::Rejection;
pub use ledger::{
    ConsumptionLedger, IDENTITY_SEPARATOR, LEDGER_DIR, LedgerError, composite_identity,
};
pub use schedule::{EventInstanceKey, EventSchedule, ScheduleError};
pub use token::{authenticate, compute_token};
pub use window::AdmissionWindow;
