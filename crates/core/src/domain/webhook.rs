use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WebhookStatus {
    Success,
    Error,
}

impl WebhookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// Outcome of one webhook call. Transport failures are carried as data with a
/// zero status code; callers never see an `Err`.
#[derive(Clone, Debug, PartialEq)]
pub struct WebhookResponse {
    pub status_code: u16,
    pub status: WebhookStatus,
    pub data: Option<Map<String, Value>>,
    pub error: Option<String>,
}

impl WebhookResponse {
    pub fn success(status_code: u16, data: Option<Map<String, Value>>) -> Self {
        Self { status_code, status: WebhookStatus::Success, data, error: None }
    }

    pub fn failure(status_code: u16, error: impl Into<String>) -> Self {
        Self { status_code, status: WebhookStatus::Error, data: None, error: Some(error.into()) }
    }

    pub fn is_success(&self) -> bool {
        self.status == WebhookStatus::Success
    }

    /// Shape exposed to response templates as `WebhookResponse`.
    pub fn template_value(&self) -> Value {
        json!({
            "StatusCode": self.status_code,
            "Status": self.status.as_str(),
            "Data": self.data.clone().map(Value::Object).unwrap_or_else(|| Value::Object(Map::new())),
            "Error": self.error.clone().unwrap_or_default(),
        })
    }
}

/// One selectable choice served by a remote options endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteOption {
    pub label: String,
    pub value: String,
}

impl RemoteOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self { label: label.into(), value: value.into() }
    }
}
