use serde::{Deserialize, Serialize};

/// Response of the remote access-check endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessReport {
    pub has_access: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Outstanding requirements (aptitude test, payment), passed through as-is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<serde_json::Value>,
}

impl AccessReport {
    pub fn granted() -> Self {
        Self {
            has_access: true,
            reason: None,
            requirements: None,
        }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            has_access: false,
            reason: Some(reason.into()),
            requirements: None,
        }
    }
}
