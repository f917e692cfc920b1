use serde_json::{Value, json};

pub const DEFAULT_FROM: &str = "919999999999";
pub const DEFAULT_TEXT: &str = "hi";

/// A single-message inbound event shaped like a live WhatsApp Business
/// webhook delivery.
pub fn inbound_event(from: &str, text: &str, message_id: &str, timestamp: u64) -> Value {
    json!({
        "object": civic_core::WHATSAPP_OBJECT,
        "entry": [{
            "id": "WHATSAPP_BUSINESS_ACCOUNT_ID",
            "changes": [{
                "field": "messages",
                "value": {
                    "messaging_product": "whatsapp",
                    "metadata": {
                        "display_phone_number": "15550000000",
                        "phone_number_id": "PHONE_NUMBER_ID"
                    },
                    "contacts": [{
                        "profile": {"name": "Test User"},
                        "wa_id": from
                    }],
                    "messages": [{
                        "from": from,
                        "id": message_id,
                        "timestamp": timestamp.to_string(),
                        "type": "text",
                        "text": {"body": text}
                    }]
                }
            }]
        }]
    })
}
