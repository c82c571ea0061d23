use admission_gate::Config;
use chrono::{FixedOffset, Utc};
use std::time::Duration;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio::time::sleep;

const SECRET: &str = "integration-secret";

#[derive(serde::Deserialize)]
struct IssueCredentialResponse {
    token: String,
    issue_time: String,
    path: String,
}

/// Test harness that runs the gate on free ports with an in-memory ledger
struct TestServer {
    handle: JoinHandle<()>,
    e_port: u16,
    i_port: u16,
    client: reqwest::Client,
    date: String,
    hour: String,
    minute: String,
    _workspace: TempDir,
}

impl TestServer {
    async fn start() -> Self {
        // Only open when debugging
        // tracing_subscriber::fmt::init();

        let e_port = portpicker::pick_unused_port().expect("No available port");
        let i_port = portpicker::pick_unused_port().expect("No available port");
        let workspace = tempfile::tempdir().unwrap();

        // Event starting this minute in the venue's zone, so "now" is inside the window
        let now = Utc::now().with_timezone(&FixedOffset::east_opt(9 * 3600).unwrap());
        let date = now.format("%Y-%m-%d").to_string();
        let hour = now.format("%H").to_string();
        let minute = now.format("%M").to_string();

        let kiosk_config = workspace.path().join("kiosk_config.json");
        std::fs::write(
            &kiosk_config,
            serde_json::json!({ "date": date, "hour": hour, "minute": minute }).to_string(),
        )
        .unwrap();

        let config = Config {
            listen_on_port: e_port,
            internal_port: i_port,
            workspace: workspace.path().to_string_lossy().into_owned(),
            secret: Some(SECRET.into()),
            kiosk_config: Some(kiosk_config.to_string_lossy().into_owned()),
            storage_backend: "memory".into(),
            ..Default::default()
        };
        config.validate().unwrap();

        let handle = tokio::spawn(async move {
            admission_gate::run(config).await.unwrap();
        });

        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();

        // Poll until server is ready
        for _ in 0..200 {
            if let Ok(response) = client
                .get(format!("http://127.0.0.1:{i_port}/ledger"))
                .send()
                .await
                && response.status().is_success()
            {
                break;
            }

            sleep(Duration::from_millis(10)).await;
        }

        TestServer {
            handle,
            e_port,
            i_port,
            client,
            date,
            hour,
            minute,
            _workspace: workspace,
        }
    }

    fn ext_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.e_port)
    }

    fn int_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.i_port)
    }

    async fn issue(&self, serial: &str) -> IssueCredentialResponse {
        let response = self
            .client
            .post(format!("{}/credentials", self.int_url()))
            .json(&serde_json::json!({ "serial": serial }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        response.json().await.unwrap()
    }

    async fn get_ext(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{path}", self.ext_url()))
            .send()
            .await
            .unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn error_code(response: reqwest::Response) -> String {
    let body: serde_json::Value = response.json().await.unwrap();
    body["error"].as_str().unwrap_or_default().to_string()
}

#[tokio::test]
async fn test_issued_credential_admits_once() {
    let server = TestServer::start().await;
    let credential = server.issue("GUEST-1").await;
    assert!(credential.path.starts_with("/q/GUEST-1?token="));
    assert_eq!(credential.token.len(), 64);

    let response = server.get_ext(&credential.path).await;
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "admitted");
    assert_eq!(body["serial"], "GUEST-1");

    let response = server.get_ext(&credential.path).await;
    assert_eq!(response.status(), 409);
    assert_eq!(error_code(response).await, "already_used");

    let response = server
        .client
        .get(format!("{}/ledger", server.int_url()))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["consumed"], 1);
}

#[tokio::test]
async fn test_explicit_schedule_in_link() {
    let server = TestServer::start().await;
    let credential = server.issue("GUEST-2").await;

    let path = format!(
        "{}&date={}&hour={}&minute={}",
        credential.path, server.date, server.hour, server.minute
    );
    let response = server.get_ext(&path).await;
    assert_eq!(response.status(), 200);

    // A schedule years in the past is long closed
    let response = server
        .get_ext(&format!(
            "/q/GUEST-2?token={}&t={}&date=2020-01-01&hour=12&minute=00",
            credential.token, credential.issue_time
        ))
        .await;
    assert_eq!(response.status(), 403);
    assert_eq!(error_code(response).await, "outside_window");
}

#[tokio::test]
async fn test_rejection_codes() {
    let server = TestServer::start().await;
    let credential = server.issue("GUEST-3").await;

    // Wrong token
    let response = server
        .get_ext(&format!(
            "/q/GUEST-3?token={}&t={}",
            "0".repeat(64),
            credential.issue_time
        ))
        .await;
    assert_eq!(response.status(), 401);
    assert_eq!(error_code(response).await, "invalid_token");

    // Missing token and issue time
    let response = server.get_ext("/q/GUEST-3").await;
    assert_eq!(response.status(), 400);
    assert_eq!(error_code(response).await, "missing_parameters");

    // Malformed schedule
    let response = server
        .get_ext(&format!("{}&hour=25", credential.path))
        .await;
    assert_eq!(response.status(), 400);
    assert_eq!(error_code(response).await, "schedule_parse_error");

    // The credential was never consumed by the failed attempts
    let response = server.get_ext(&credential.path).await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_issue_rejects_bad_input() {
    let server = TestServer::start().await;

    let response = server
        .client
        .post(format!("{}/credentials", server.int_url()))
        .json(&serde_json::json!({ "serial": "A|B" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    assert_eq!(error_code(response).await, "invalid_serial");

    let response = server
        .client
        .post(format!("{}/credentials", server.int_url()))
        .json(&serde_json::json!({ "serial": "GUEST-4", "issue_time": "yesterday" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    assert_eq!(error_code(response).await, "invalid_issue_time");
}

#[tokio::test]
async fn test_records_are_deduplicated() {
    let server = TestServer::start().await;
    let record = serde_json::json!({
        "guest_name": "Kim",
        "timestamp": "2025-06-01T11:40:00",
    });

    let response = server
        .client
        .post(format!("{}/records", server.int_url()))
        .json(&record)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);

    let response = server
        .client
        .post(format!("{}/records", server.int_url()))
        .json(&record)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);
    assert_eq!(error_code(response).await, "duplicate_record");

    // Same guest, other event
    let response = server
        .client
        .post(format!("{}/records", server.int_url()))
        .json(&serde_json::json!({
            "guest_name": "Kim",
            "timestamp": "2025-06-01T11:40:00",
            "date": "2030-01-01",
            "hour": 12,
            "minute": 0,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
}

#[tokio::test]
async fn test_records_reject_separator_in_fields() {
    let server = TestServer::start().await;
    let record = serde_json::json!({ "guest_name": "Kim", "timestamp": "2025|x" });

    let response = server
        .client
        .post(format!("{}/records", server.int_url()))
        .json(&serde_json::json!({ "guest_name": "Kim|2025", "timestamp": "x" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    assert_eq!(error_code(response).await, "invalid_record");

    let response = server
        .client
        .post(format!("{}/records", server.int_url()))
        .json(&record)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    assert_eq!(error_code(response).await, "invalid_record");

    // Nothing was recorded by the refused submissions
    let response = server
        .client
        .get(format!("{}/ledger", server.int_url()))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["consumed"], 0);
}
