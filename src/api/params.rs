use serde::{Deserialize, Deserializer, Serialize};

/// Accept an hour or minute given either as text (`"09"`) or as a number (`9`).
pub fn clock_field<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    }))
}

/// Query of `GET /q/{serial}`
#[derive(Debug, Default, Deserialize)]
pub struct VerifyQuery {
    pub token: Option<String>,
    /// Issue time, `YYYY-MM-DDTHH:MM:SS`
    #[serde(alias = "issue_time")]
    pub t: Option<String>,
    pub date: Option<String>,
    #[serde(default, deserialize_with = "clock_field")]
    pub hour: Option<String>,
    #[serde(default, deserialize_with = "clock_field")]
    pub minute: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdmittedResponse {
    pub status: String,
    pub serial: String,
}

/// Request structure for issuing a credential token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueCredentialRequest {
    pub serial: String,

    /// Issue time (optional, defaults to now in the venue's timezone)
    #[serde(default)]
    pub issue_time: Option<String>,

    /// Event schedule to embed in the QR link (optional)
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "clock_field")]
    pub hour: Option<String>,
    #[serde(default, deserialize_with = "clock_field")]
    pub minute: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueCredentialResponse {
    pub serial: String,
    pub issue_time: String,
    pub token: String,
    /// Relative verification link to encode in the QR code
    pub path: String,
}

/// Guest-record entry, de-duplicated on `guest_name|timestamp` per event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordRequest {
    pub guest_name: String,
    pub timestamp: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "clock_field")]
    pub hour: Option<String>,
    #[serde(default, deserialize_with = "clock_field")]
    pub minute: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecordResponse {
    pub status: String,
    pub instance: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LedgerQuery {
    pub date: Option<String>,
    #[serde(default, deserialize_with = "clock_field")]
    pub hour: Option<String>,
    #[serde(default, deserialize_with = "clock_field")]
    pub minute: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LedgerStatsResponse {
    pub instance: String,
    pub consumed: usize,
}
