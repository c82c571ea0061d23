use crate::api::routes::ErrorCode;
use crate::gate::Rejection;
use axum::{body::Body, http::Request, middleware::Next, response::Response};
use tracing::{error, info, warn};

pub async fn log_request_errors(req: Request<Body>, next: Next) -> Response {
    let uri = req.uri().clone();
    let method = req.method().clone();

    let response = next.run(req).await;
    let status = response.status();
    let code = response
        .extensions()
        .get::<ErrorCode>()
        .map(|code| code.0)
        .unwrap_or("unknown");

    let suspicious = response
        .extensions()
        .get::<Rejection>()
        .is_some_and(Rejection::is_security_relevant);

    if status.is_client_error() {
        if suspicious {
            warn!(
                method = %method,
                uri = %uri,
                status = %status,
                code,
                "Suspicious request"
            );
        } else {
            // Double scans and early arrivals are routine
            info!(
                method = %method,
                uri = %uri,
                status = %status,
                code,
                "Request rejected"
            );
        }
    } else if status.is_server_error() {
        error!(
            method = %method,
            uri = %uri,
            status = %status,
            code,
            "Server error"
        );
    }

    response
}
