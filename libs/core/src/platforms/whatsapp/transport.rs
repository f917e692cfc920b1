use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

use super::error::DeliveryError;

#[derive(Clone, Debug)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// One authenticated JSON POST. Implementations report timeouts and
/// connection failures as errors and every HTTP answer as a response.
#[async_trait]
pub trait SendTransport: Send + Sync {
    async fn post_json(
        &self,
        url: &str,
        token: &str,
        body: &Value,
        timeout: Duration,
    ) -> Result<TransportResponse, DeliveryError>;
}

pub type SharedSendTransport = Arc<dyn SendTransport>;

#[derive(Clone, Default)]
pub struct ReqwestSendTransport {
    client: reqwest::Client,
}

impl ReqwestSendTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SendTransport for ReqwestSendTransport {
    async fn post_json(
        &self,
        url: &str,
        token: &str,
        body: &Value,
        timeout: Duration,
    ) -> Result<TransportResponse, DeliveryError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .timeout(timeout)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        let body = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        Ok(TransportResponse { status, body })
    }
}
