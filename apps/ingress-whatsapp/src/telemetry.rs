use tracing::Span;

const INGRESS_SPAN_NAME: &str = "ingress.handle";

/// Span wrapping the handling of one inbound message.
pub fn message_span(sender: &str, msg_id: Option<&str>) -> Span {
    tracing::info_span!(
        INGRESS_SPAN_NAME,
        platform = "whatsapp",
        chat_id = %sender,
        msg_id = %msg_id.unwrap_or("n/a"),
    )
}
