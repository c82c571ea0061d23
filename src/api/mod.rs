pub mod middleware;
pub mod params;
pub mod routes;

pub use middleware::log_request_errors;
pub use routes::{append_record, issue_credential, ledger_stats, verify_credential};
