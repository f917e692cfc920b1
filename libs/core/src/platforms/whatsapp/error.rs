use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("request timed out")]
    Timeout,
    #[error("transport error")]
    Transport(#[source] reqwest::Error),
    #[error("platform returned {status}")]
    Remote { status: StatusCode, body: Value },
    #[error("failed to encode request body")]
    Encode(#[from] serde_json::Error),
}

impl DeliveryError {
    /// Timeouts, connection failures and 5xx may succeed on another attempt;
    /// a 4xx is the platform's final answer.
    pub fn is_retryable(&self) -> bool {
        match self {
            DeliveryError::Timeout | DeliveryError::Transport(_) => true,
            DeliveryError::Remote { status, .. } => status.is_server_error(),
            DeliveryError::Encode(_) => false,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            DeliveryError::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn graph_error(&self) -> Option<GraphApiError> {
        match self {
            DeliveryError::Remote { body, .. } => GraphApiError::from_body(body),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for DeliveryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DeliveryError::Timeout
        } else {
            DeliveryError::Transport(err)
        }
    }
}

/// `error` object of a Graph API failure body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GraphApiError {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

impl GraphApiError {
    pub fn from_body(body: &Value) -> Option<Self> {
        serde_json::from_value(body.get("error")?.clone()).ok()
    }

    /// Operator-facing explanation for the well-known failure codes.
    pub fn hint(&self) -> Option<&'static str> {
        match self.code {
            Some(190) => Some("access token is invalid or expired; generate a new token"),
            Some(100) => Some(
                "phone number id is incorrect or not authorized for this token",
            ),
            _ if self
                .message
                .as_deref()
                .is_some_and(|m| m.to_lowercase().contains("rate limit")) =>
            {
                Some("rate limited by the platform; wait before retrying")
            }
            _ => None,
        }
    }
}
