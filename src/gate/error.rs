use crate::gate::schedule::ScheduleError;
use axum::http::StatusCode;
use thiserror::Error;

/// Why an admission was refused. These are outcomes, not faults.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum Rejection {
    #[error("Missing required parameters: {}", .0.join(", "))]
    MissingParameters(Vec<&'static str>),

    #[error("Event schedule could not be parsed: {0}")]
    ScheduleParseError(#[from] ScheduleError),

    #[error("Outside the admission window")]
    OutsideWindow,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Credential already used")]
    AlreadyUsed,
}

impl Rejection {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::MissingParameters(_) => "missing_parameters",
            Rejection::ScheduleParseError(_) => "schedule_parse_error",
            Rejection::OutsideWindow => "outside_window",
            Rejection::InvalidToken => "invalid_token",
            Rejection::AlreadyUsed => "already_used",
        }
    }

    /// Convert rejection to HTTP status code
    pub fn to_status_code(&self) -> StatusCode {
        match self {
            Rejection::MissingParameters(_) | Rejection::ScheduleParseError(_) => {
                StatusCode::BAD_REQUEST
            }
            Rejection::InvalidToken => StatusCode::UNAUTHORIZED,
            Rejection::OutsideWindow => StatusCode::FORBIDDEN,
            Rejection::AlreadyUsed => StatusCode::CONFLICT,
        }
    }

    /// Rejections worth flagging for tamper detection
    pub fn is_security_relevant(&self) -> bool {
        matches!(self, Rejection::InvalidToken)
    }
}
