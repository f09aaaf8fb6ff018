use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Upstream call outcome. `Failure` is a business-rule rejection the provider
/// understood and refused; `Error` is a transport or infrastructure fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallStatus {
    Success,
    Failure,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub msg: String,
}

impl UpstreamError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            code: None,
            msg: msg.into(),
        }
    }
}

/// Uniform JSON envelope relayed for every non-binary operation. Callers
/// branch on `status`, never on the transport status code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub status: CallStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<UpstreamError>,
}

impl Envelope {
    pub fn success(response: Value) -> Self {
        Self {
            status: CallStatus::Success,
            response: Some(response),
            errors: Vec::new(),
        }
    }

    pub fn failure(errors: Vec<UpstreamError>) -> Self {
        Self {
            status: CallStatus::Failure,
            response: None,
            errors,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == CallStatus::Success
    }

    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return "upstream call failed".to_string();
        }
        self.errors
            .iter()
            .map(|e| e.msg.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}
