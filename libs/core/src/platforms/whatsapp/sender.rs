use std::sync::Arc;

use metrics::counter;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::creds::WhatsAppCredentials;
use super::error::DeliveryError;
use super::transport::SharedSendTransport;
use crate::backoff::{Backoff, FixedBackoff, RetryPolicy};
use crate::outbound::{ComposedReply, OutboundMessageSpec};

/// Sends replies to the Cloud API with bounded retry. Every failure is logged
/// and folded into a `false` return; nothing is propagated to the caller.
pub struct DeliveryClient {
    transport: SharedSendTransport,
    creds: WhatsAppCredentials,
    policy: RetryPolicy,
    backoff: Arc<dyn Backoff>,
}

impl DeliveryClient {
    pub fn new(transport: SharedSendTransport, creds: WhatsAppCredentials) -> Self {
        Self {
            transport,
            creds,
            policy: RetryPolicy::default(),
            backoff: Arc::new(FixedBackoff::default()),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_backoff(mut self, backoff: Arc<dyn Backoff>) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn credentials(&self) -> &WhatsAppCredentials {
        &self.creds
    }

    /// Sends `spec` with up to `max_attempts` tries.
    pub async fn send(&self, to: &str, spec: &OutboundMessageSpec) -> bool {
        self.send_with_attempts(to, spec, self.policy.max_attempts)
            .await
    }

    /// Sends a composed reply. An interactive spec that cannot be delivered
    /// degrades to one unretried plain-text attempt with the fallback body;
    /// the result is then the fallback's outcome.
    pub async fn deliver(&self, to: &str, reply: &ComposedReply) -> bool {
        if self.send(to, &reply.spec).await {
            return true;
        }
        let Some(fallback) = reply.fallback.as_deref() else {
            return false;
        };
        if !reply.spec.is_interactive() {
            return false;
        }

        info!(to, kind = reply.spec.kind(), "interactive send failed; sending text fallback");
        let delivered = self
            .send_with_attempts(to, &OutboundMessageSpec::text(fallback), 1)
            .await;
        counter!(
            "delivery_fallbacks_total",
            "outcome" => if delivered { "delivered" } else { "failed" }
        )
        .increment(1);
        delivered
    }

    async fn send_with_attempts(
        &self,
        to: &str,
        spec: &OutboundMessageSpec,
        max_attempts: u32,
    ) -> bool {
        let url = self.creds.messages_url();
        let body = spec.to_wire(to);
        let max_attempts = max_attempts.max(1);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            match self.post_once(&url, &body).await {
                Ok(message_id) => {
                    counter!("delivery_attempts_total", "outcome" => "delivered").increment(1);
                    info!(
                        to,
                        kind = spec.kind(),
                        attempt,
                        message_id = message_id.as_deref().unwrap_or("n/a"),
                        "whatsapp message sent"
                    );
                    return true;
                }
                Err(err) => {
                    let retryable = err.is_retryable();
                    counter!(
                        "delivery_attempts_total",
                        "outcome" => if retryable { "retryable" } else { "rejected" }
                    )
                    .increment(1);
                    log_failure(to, spec, attempt, &err);

                    if !retryable || attempt >= max_attempts {
                        return false;
                    }
                    let delay = self.backoff.delay(attempt);
                    debug!(?delay, attempt, "retrying whatsapp send");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn post_once(&self, url: &str, body: &Value) -> Result<Option<String>, DeliveryError> {
        let timeout = self.policy.attempt_timeout;
        // Transports get the timeout too, but a stalled one must not outlive the attempt.
        let response = tokio::time::timeout(
            timeout,
            self.transport
                .post_json(url, &self.creds.access_token, body, timeout),
        )
        .await
        .map_err(|_| DeliveryError::Timeout)??;
        if !response.status.is_success() {
            return Err(DeliveryError::Remote {
                status: response.status,
                body: response.body,
            });
        }
        Ok(response
            .body
            .get("messages")
            .and_then(|v| v.get(0))
            .and_then(|v| v.get("id"))
            .and_then(|v| v.as_str())
            .map(str::to_string))
    }
}

fn log_failure(to: &str, spec: &OutboundMessageSpec, attempt: u32, err: &DeliveryError) {
    match err {
        DeliveryError::Remote { status, body } => {
            let graph = err.graph_error();
            warn!(
                to,
                kind = spec.kind(),
                attempt,
                status = status.as_u16(),
                code = graph.as_ref().and_then(|g| g.code),
                hint = graph.as_ref().and_then(|g| g.hint()).unwrap_or(""),
                body = %body,
                "whatsapp send rejected"
            );
        }
        other => {
            warn!(
                to,
                kind = spec.kind(),
                attempt,
                error = %other,
                "whatsapp send failed"
            );
        }
    }
}
