use crate::api::params::{
    AdmittedResponse, IssueCredentialRequest, IssueCredentialResponse, LedgerQuery,
    LedgerStatsResponse, RecordRequest, RecordResponse, VerifyQuery,
};
use crate::gate::{
    AdmissionOutcome, AdmissionRequest, EventSchedule, IDENTITY_SEPARATOR, ISSUE_TIME_FORMAT,
    LedgerError, Rejection, composite_identity, compute_token,
};
use crate::AppState;
use axum::extract::{Extension, Path as AxumPath, Query};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::NaiveDateTime;
use serde_json::json;
use tracing::{debug, error, info, warn};

/// Machine-readable error code attached to error responses for request logging
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ErrorCode(pub &'static str);

/// Create an error response
pub(crate) fn err_response(status: StatusCode, code: &'static str, message: &str) -> Response {
    let body = json!({
        "error": code,
        "message": message,
        "status": status.as_u16()
    });

    let mut response = (status, Json(body)).into_response();
    response.extensions_mut().insert(ErrorCode(code));
    response
}

fn rejection_response(rejection: &Rejection) -> Response {
    let mut response = err_response(
        rejection.to_status_code(),
        rejection.code(),
        &rejection.to_string(),
    );
    response.extensions_mut().insert(rejection.clone());
    response
}

/// Storage trouble never admits anyone
fn ledger_unavailable(error: &LedgerError) -> Response {
    error!(%error, "Ledger unavailable, failing closed");
    err_response(
        StatusCode::SERVICE_UNAVAILABLE,
        "ledger_unavailable",
        "Admission could not be recorded, try again",
    )
}

/// Validate serial with basic rules
fn is_valid_serial(serial: &str) -> bool {
    !serial.is_empty()
        && serial.len() <= 64
        && serial
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Record fields are joined into one identity, so they may not carry the separator
fn is_valid_record_field(value: &str) -> bool {
    !value.contains(IDENTITY_SEPARATOR)
}

fn schedule_from(
    date: Option<String>,
    hour: Option<String>,
    minute: Option<String>,
) -> Result<EventSchedule, Rejection> {
    let missing = [("date", &date), ("hour", &hour), ("minute", &minute)]
        .into_iter()
        .filter(|(_, value)| value.as_deref().is_none_or(|v| v.trim().is_empty()))
        .map(|(name, _)| name)
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(Rejection::MissingParameters(missing));
    }

    Ok(EventSchedule::parse(
        date.as_deref().unwrap_or_default(),
        hour.as_deref().unwrap_or_default(),
        minute.as_deref().unwrap_or_default(),
    )?)
}

/// `GET /q/{serial}`: the link encoded in a guest's QR code
pub async fn verify_credential(
    Extension(state): Extension<AppState>,
    AxumPath(serial): AxumPath<String>,
    Query(query): Query<VerifyQuery>,
) -> Response {
    let VerifyQuery {
        token,
        t,
        mut date,
        mut hour,
        mut minute,
    } = query;
    state
        .resolve_schedule(&mut date, &mut hour, &mut minute)
        .await;

    let request = AdmissionRequest {
        serial: Some(serial.clone()),
        token,
        issue_time: t,
        date,
        hour,
        minute,
    };

    match state.gate.admit_now(&request, state.secret()).await {
        Ok(AdmissionOutcome::Admitted) => (
            StatusCode::OK,
            Json(AdmittedResponse {
                status: "admitted".into(),
                serial,
            }),
        )
            .into_response(),
        Ok(AdmissionOutcome::Rejected(rejection)) => rejection_response(&rejection),
        Err(error) => ledger_unavailable(&error),
    }
}

/// `POST /credentials`: derive the token for a serial, for the kiosk printing QR codes
pub async fn issue_credential(
    Extension(state): Extension<AppState>,
    Json(request): Json<IssueCredentialRequest>,
) -> Response {
    if !is_valid_serial(&request.serial) {
        warn!(serial = %request.serial, "Invalid serial");
        return err_response(
            StatusCode::BAD_REQUEST,
            "invalid_serial",
            "serial must be 1-64 characters of A-Z, a-z, 0-9, '-' or '_'",
        );
    }

    // Set issue time to current time if not specified
    let issue_time = request
        .issue_time
        .unwrap_or_else(|| state.gate.now().format(ISSUE_TIME_FORMAT).to_string());
    if NaiveDateTime::parse_from_str(&issue_time, ISSUE_TIME_FORMAT).is_err() {
        warn!(issue_time, "Invalid issue time");
        return err_response(
            StatusCode::BAD_REQUEST,
            "invalid_issue_time",
            "issue_time must be formatted as YYYY-MM-DDTHH:MM:SS",
        );
    }

    let token = compute_token(&request.serial, &issue_time, state.secret());
    let mut path = format!("/q/{}?token={token}&t={issue_time}", request.serial);

    if request.date.is_some() || request.hour.is_some() || request.minute.is_some() {
        match schedule_from(request.date, request.hour, request.minute) {
            Ok(schedule) => {
                let query = schedule
                    .naive_start()
                    .format("&date=%Y-%m-%d&hour=%H&minute=%M");
                path.push_str(&query.to_string());
            }
            Err(rejection) => return rejection_response(&rejection),
        }
    }

    debug!(serial = %request.serial, issue_time, "Credential issued");
    (
        StatusCode::OK,
        Json(IssueCredentialResponse {
            serial: request.serial,
            issue_time,
            token,
            path,
        }),
    )
        .into_response()
}

/// `POST /records`: append-once guard for guest-book entries
pub async fn append_record(
    Extension(state): Extension<AppState>,
    Json(request): Json<RecordRequest>,
) -> Response {
    let RecordRequest {
        guest_name,
        timestamp,
        mut date,
        mut hour,
        mut minute,
    } = request;

    let missing = [("guest_name", &guest_name), ("timestamp", &timestamp)]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return rejection_response(&Rejection::MissingParameters(missing));
    }

    if !is_valid_record_field(&guest_name) || !is_valid_record_field(&timestamp) {
        warn!(guest_name, timestamp, "Invalid record");
        return err_response(
            StatusCode::BAD_REQUEST,
            "invalid_record",
            "guest_name and timestamp must not contain '|'",
        );
    }

    state
        .resolve_schedule(&mut date, &mut hour, &mut minute)
        .await;
    let key = match schedule_from(date, hour, minute) {
        Ok(schedule) => schedule.instance_key(),
        Err(rejection) => return rejection_response(&rejection),
    };

    let identity = composite_identity(&guest_name, &timestamp);
    match state.gate.ledger().check_and_consume(&key, &identity).await {
        Ok(true) => {
            info!(instance = %key, guest_name, timestamp, "Record accepted");
            (
                StatusCode::CREATED,
                Json(RecordResponse {
                    status: "recorded".into(),
                    instance: key.to_string(),
                }),
            )
                .into_response()
        }
        Ok(false) => err_response(
            StatusCode::CONFLICT,
            "duplicate_record",
            "Record already submitted",
        ),
        Err(error) => ledger_unavailable(&error),
    }
}

/// `GET /ledger`: how many identities an event instance has consumed
pub async fn ledger_stats(
    Extension(state): Extension<AppState>,
    Query(query): Query<LedgerQuery>,
) -> Response {
    let LedgerQuery {
        mut date,
        mut hour,
        mut minute,
    } = query;
    state
        .resolve_schedule(&mut date, &mut hour, &mut minute)
        .await;

    let key = match schedule_from(date, hour, minute) {
        Ok(schedule) => schedule.instance_key(),
        Err(rejection) => return rejection_response(&rejection),
    };

    match state.gate.ledger().consumed_count(&key).await {
        Ok(consumed) => (
            StatusCode::OK,
            Json(LedgerStatsResponse {
                instance: key.to_string(),
                consumed,
            }),
        )
            .into_response(),
        Err(error) => ledger_unavailable(&error),
    }
}
