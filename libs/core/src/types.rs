use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Value of `object` on every WhatsApp Business webhook delivery.
pub const WHATSAPP_OBJECT: &str = "whatsapp_business_account";

/// Display name used when the platform sends no contact profile.
pub const DEFAULT_DISPLAY_NAME: &str = "there";

/// Raw webhook envelope as posted by the platform.
///
/// ```
/// use civic_core::InboundEvent;
///
/// let event: InboundEvent = serde_json::from_str(r#"{"object":"page","entry":[]}"#).unwrap();
/// assert!(!event.is_whatsapp());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InboundEvent {
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default, rename = "entry")]
    pub entries: Vec<Entry>,
}

impl InboundEvent {
    pub fn is_whatsapp(&self) -> bool {
        self.object.as_deref() == Some(WHATSAPP_OBJECT)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Entry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Change {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub value: ChangeValue,
}

/// Body of a change. The platform reuses one shape for receipts and messages,
/// so the distinction is made by [`ChangeValue::kind`].
///
/// Messages stay raw JSON until they are handled so one bad element cannot
/// fail the decode of the whole delivery; see [`InboundMessage::from_value`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChangeValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messaging_product: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(
        default,
        deserialize_with = "valid_elements",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub contacts: Vec<Contact>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statuses: Option<Vec<Value>>,
}

pub enum ChangeKind<'a> {
    /// Delivery/read receipt; never actionable.
    StatusUpdate,
    MessageBatch {
        messages: &'a [Value],
        contacts: &'a [Contact],
    },
}

impl ChangeValue {
    pub fn kind(&self) -> ChangeKind<'_> {
        if self.statuses.is_some() {
            ChangeKind::StatusUpdate
        } else {
            ChangeKind::MessageBatch {
                messages: &self.messages,
                contacts: &self.contacts,
            }
        }
    }

    /// Resolves the profile name for `sender`, preferring the contact whose
    /// `wa_id` matches and falling back to the first contact in the batch.
    pub fn display_name_for(&self, sender: &str) -> &str {
        self.contacts
            .iter()
            .find(|contact| contact.wa_id.as_deref() == Some(sender))
            .or_else(|| self.contacts.first())
            .and_then(Contact::display_name)
            .unwrap_or(DEFAULT_DISPLAY_NAME)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Contact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wa_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
}

impl Contact {
    pub fn display_name(&self) -> Option<&str> {
        self.profile
            .as_ref()
            .and_then(|profile| profile.name.as_deref())
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Text,
    Interactive,
    #[default]
    #[serde(other)]
    Unsupported,
}

/// One user message inside a batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InboundMessage {
    #[serde(default, deserialize_with = "string_or_number")]
    pub from: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub timestamp: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TextPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interactive: Option<InteractivePayload>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TextPayload {
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InteractivePayload {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_reply: Option<SelectionReply>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_reply: Option<SelectionReply>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SelectionReply {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// What a message carries once its type has been inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageContent<'a> {
    /// Raw (not yet normalized) text body.
    Text(&'a str),
    /// Identifier of a list or button selection.
    Selection(&'a str),
    /// Type the bot does not handle (images, reactions, unknown replies).
    Unsupported,
    /// Declared type does not match its payload.
    Malformed(&'static str),
}

impl InboundMessage {
    /// Decodes one element of a message batch.
    pub fn from_value(raw: &Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(raw)
    }

    /// Best-effort sender of a raw element, for replying to messages that do
    /// not decode.
    pub fn sender_of(raw: &Value) -> Option<String> {
        match raw.get("from")? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn content(&self) -> MessageContent<'_> {
        match self.kind {
            MessageType::Text => match self.text.as_ref().and_then(|t| t.body.as_deref()) {
                Some(body) => MessageContent::Text(body),
                None => MessageContent::Malformed("text message without body"),
            },
            MessageType::Interactive => {
                let Some(interactive) = self.interactive.as_ref() else {
                    return MessageContent::Unsupported;
                };
                let reply = match interactive.kind.as_deref() {
                    Some("list_reply") => interactive.list_reply.as_ref(),
                    Some("button_reply") => interactive.button_reply.as_ref(),
                    _ => interactive
                        .list_reply
                        .as_ref()
                        .or(interactive.button_reply.as_ref()),
                };
                match reply {
                    Some(selection) => MessageContent::Selection(selection.id.as_str()),
                    None => MessageContent::Unsupported,
                }
            }
            MessageType::Unsupported => MessageContent::Unsupported,
        }
    }
}

// Contacts only feed display names; elements that do not decode are dropped.
fn valid_elements<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

// Live webhooks send the timestamp as a string; hand-written test payloads
// often send a number.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
