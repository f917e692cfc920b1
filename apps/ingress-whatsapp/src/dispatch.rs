//! Webhook dispatcher: unpacks an inbound event and runs classify, compose and
//! deliver for every user message in it, in array order.

use civic_core::{
    ChangeKind, ChangeValue, DeliveryClient, FAILURE_NOTICE, InboundEvent, InboundMessage,
    MessageContent, OutboundMessageSpec, ReplyCatalog, Utterance, classify, normalize,
};
use metrics::counter;
use serde_json::Value;
use thiserror::Error;
use tracing::{Instrument, debug, error, info, warn};

use crate::telemetry::message_span;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("message has no sender")]
    MissingSender,
    #[error("malformed message: {0}")]
    Malformed(&'static str),
    #[error("undecodable message: {0}")]
    Undecodable(#[source] serde_json::Error),
}

/// Per-call tally, mostly for logs and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub replied: usize,
    pub skipped: usize,
    pub failed: usize,
    pub status_updates: usize,
}

enum MessageOutcome {
    Replied { delivered: bool },
    Skipped,
}

pub struct Dispatcher {
    delivery: DeliveryClient,
    catalog: ReplyCatalog,
}

impl Dispatcher {
    pub fn new(delivery: DeliveryClient, catalog: ReplyCatalog) -> Self {
        Self { delivery, catalog }
    }

    /// Decodes a raw request body. Bodies that are not an inbound event are
    /// ignored.
    pub async fn handle_payload(&self, body: &[u8]) -> DispatchReport {
        match serde_json::from_slice::<InboundEvent>(body) {
            Ok(event) => self.handle_event(&event).await,
            Err(err) => {
                counter!("webhook_events_total", "outcome" => "undecodable").increment(1);
                debug!(error = %err, "ignoring undecodable webhook body");
                DispatchReport::default()
            }
        }
    }

    pub async fn handle_event(&self, event: &InboundEvent) -> DispatchReport {
        let mut report = DispatchReport::default();
        if !event.is_whatsapp() {
            counter!("webhook_events_total", "outcome" => "ignored").increment(1);
            debug!(object = ?event.object, "not a whatsapp business webhook");
            return report;
        }
        counter!("webhook_events_total", "outcome" => "accepted").increment(1);

        for entry in &event.entries {
            for change in &entry.changes {
                self.handle_change(&change.value, &mut report).await;
            }
        }
        report
    }

    async fn handle_change(&self, value: &ChangeValue, report: &mut DispatchReport) {
        let messages = match value.kind() {
            ChangeKind::StatusUpdate => {
                debug!("skipping status update");
                report.status_updates += 1;
                return;
            }
            ChangeKind::MessageBatch { messages, .. } => messages,
        };

        for raw in messages {
            let sender = InboundMessage::sender_of(raw);
            let sender = sender.as_deref().unwrap_or_default();
            let span = message_span(sender, raw.get("id").and_then(Value::as_str));
            let display_name = value.display_name_for(sender);
            let outcome = match InboundMessage::from_value(raw) {
                Ok(message) => {
                    self.handle_message(&message, display_name)
                        .instrument(span.clone())
                        .await
                }
                Err(err) => Err(DispatchError::Undecodable(err)),
            };
            match outcome {
                Ok(MessageOutcome::Replied { delivered }) => {
                    report.replied += 1;
                    if !delivered {
                        span.in_scope(|| warn!("reply was not delivered"));
                    }
                }
                Ok(MessageOutcome::Skipped) => report.skipped += 1,
                Err(err) => {
                    report.failed += 1;
                    self.notify_failure(sender, &err).instrument(span).await;
                }
            }
        }
    }

    async fn handle_message(
        &self,
        message: &InboundMessage,
        display_name: &str,
    ) -> Result<MessageOutcome, DispatchError> {
        let sender = message
            .from
            .as_deref()
            .filter(|from| !from.is_empty())
            .ok_or(DispatchError::MissingSender)?;
        info!(name = display_name, kind = ?message.kind, "received message");

        let intent = match message.content() {
            MessageContent::Text(raw) => classify(Utterance::Text(&normalize(raw))),
            MessageContent::Selection(id) => classify(Utterance::Selection(id)),
            MessageContent::Unsupported => {
                debug!(kind = ?message.kind, "unsupported message type");
                return Ok(MessageOutcome::Skipped);
            }
            MessageContent::Malformed(reason) => return Err(DispatchError::Malformed(reason)),
        };
        counter!("messages_classified_total", "intent" => intent.label()).increment(1);
        info!(intent = intent.label(), "classified message");

        let mut delivered = true;
        for reply in self.catalog.compose(&intent, display_name) {
            delivered &= self.delivery.deliver(sender, &reply).await;
        }
        Ok(MessageOutcome::Replied { delivered })
    }

    async fn notify_failure(&self, sender: &str, err: &DispatchError) {
        warn!(error = %err, "failed to process message");
        if sender.is_empty() {
            return;
        }
        let notice = OutboundMessageSpec::text(FAILURE_NOTICE);
        if !self.delivery.send(sender, &notice).await {
            error!("failure notice could not be delivered");
        }
    }
}
