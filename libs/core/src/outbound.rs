use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// A ready-to-send reply, independent of who receives it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutboundMessageSpec {
    PlainText {
        body: String,
    },
    InteractiveList {
        header: String,
        body: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        footer: Option<String>,
        button_label: String,
        sections: Vec<ListSection>,
    },
    InteractiveButtons {
        header: String,
        body: String,
        buttons: Vec<ReplyButton>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListSection {
    pub title: String,
    pub rows: Vec<ListRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRow {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyButton {
    pub id: String,
    pub title: String,
}

impl OutboundMessageSpec {
    pub fn text(body: impl Into<String>) -> Self {
        OutboundMessageSpec::PlainText { body: body.into() }
    }

    pub fn is_interactive(&self) -> bool {
        !matches!(self, OutboundMessageSpec::PlainText { .. })
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundMessageSpec::PlainText { .. } => "text",
            OutboundMessageSpec::InteractiveList { .. } => "list",
            OutboundMessageSpec::InteractiveButtons { .. } => "buttons",
        }
    }

    /// Builds the Cloud API `/messages` request body for recipient `to`.
    ///
    /// ```
    /// use civic_core::OutboundMessageSpec;
    ///
    /// let body = OutboundMessageSpec::text("hello").to_wire("15551234567");
    /// assert_eq!(body["type"], "text");
    /// assert_eq!(body["text"]["body"], "hello");
    /// ```
    pub fn to_wire(&self, to: &str) -> Value {
        let mut payload = json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": to,
        });
        match self {
            OutboundMessageSpec::PlainText { body } => {
                payload["type"] = json!("text");
                payload["text"] = json!({ "body": body });
            }
            OutboundMessageSpec::InteractiveList {
                header,
                body,
                footer,
                button_label,
                sections,
            } => {
                let mut interactive = json!({
                    "type": "list",
                    "header": { "type": "text", "text": header },
                    "body": { "text": body },
                    "action": {
                        "button": button_label,
                        "sections": sections,
                    },
                });
                if let Some(footer) = footer {
                    interactive["footer"] = json!({ "text": footer });
                }
                payload["type"] = json!("interactive");
                payload["interactive"] = interactive;
            }
            OutboundMessageSpec::InteractiveButtons {
                header,
                body,
                buttons,
            } => {
                let buttons: Vec<Value> = buttons
                    .iter()
                    .map(|button| {
                        json!({
                            "type": "reply",
                            "reply": { "id": button.id, "title": button.title },
                        })
                    })
                    .collect();
                payload["type"] = json!("interactive");
                payload["interactive"] = json!({
                    "type": "button",
                    "header": { "type": "text", "text": header },
                    "body": { "text": body },
                    "action": { "buttons": buttons },
                });
            }
        }
        payload
    }
}

/// One reply step: the preferred spec plus the plain text to degrade to if an
/// interactive spec cannot be delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposedReply {
    pub spec: OutboundMessageSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
}

impl ComposedReply {
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            spec: OutboundMessageSpec::text(body),
            fallback: None,
        }
    }

    pub fn with_fallback(spec: OutboundMessageSpec, fallback: impl Into<String>) -> Self {
        Self {
            spec,
            fallback: Some(fallback.into()),
        }
    }
}
