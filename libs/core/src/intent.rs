//! Maps one user message to a conversational intent.
//!
//! Rules are evaluated top to bottom and the first match wins:
//!
//! 1. list/button selection ids
//! 2. greeting words
//! 3. property-tax trigger (`1`, or text containing `property`)
//! 4. water-bill trigger (`2`, or text containing `water`)
//! 5. property id: 6-10 ASCII digits
//! 6. water consumer number: 6-12 ASCII alphanumerics, not all digits
//!
//! Anything else is [`Intent::Unrecognized`]. All-digit input belongs to the
//! property id space only: 6-10 digits are claimed by rule 5 and longer digit
//! runs fall through to unrecognized.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const PROPERTY_TAX_ID: &str = "property_tax";
pub const WATER_BILL_ID: &str = "water_bill";

const GREETINGS: [&str; 4] = ["hi", "hello", "hey", "hola"];

static PROPERTY_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{6,10}$").expect("property id pattern must compile"));
static CONSUMER_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9]{6,12}$").expect("consumer id pattern must compile"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "intent", content = "id", rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    RequestPropertyTax,
    RequestWaterBill,
    PropertyIdSupplied(String),
    WaterConsumerIdSupplied(String),
    Unrecognized,
}

impl Intent {
    /// Stable label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Intent::Greeting => "greeting",
            Intent::RequestPropertyTax => "request_property_tax",
            Intent::RequestWaterBill => "request_water_bill",
            Intent::PropertyIdSupplied(_) => "property_id_supplied",
            Intent::WaterConsumerIdSupplied(_) => "water_consumer_id_supplied",
            Intent::Unrecognized => "unrecognized",
        }
    }
}

/// Classifier input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Utterance<'a> {
    /// Text already passed through [`normalize`].
    Text(&'a str),
    /// Selection id from an interactive reply.
    Selection(&'a str),
}

/// Lowercases and trims surrounding whitespace.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// ```
/// use civic_core::intent::{Intent, Utterance, classify};
///
/// assert_eq!(classify(Utterance::Text("hola")), Intent::Greeting);
/// assert_eq!(
///     classify(Utterance::Selection("water_bill")),
///     Intent::RequestWaterBill
/// );
/// ```
pub fn classify(utterance: Utterance<'_>) -> Intent {
    match utterance {
        Utterance::Selection(id) => classify_selection(id),
        Utterance::Text(text) => classify_text(text),
    }
}

fn classify_selection(id: &str) -> Intent {
    match id {
        PROPERTY_TAX_ID => Intent::RequestPropertyTax,
        WATER_BILL_ID => Intent::RequestWaterBill,
        _ => Intent::Unrecognized,
    }
}

fn classify_text(text: &str) -> Intent {
    if GREETINGS.contains(&text) {
        Intent::Greeting
    } else if text == "1" || text.contains("property") {
        Intent::RequestPropertyTax
    } else if text == "2" || text.contains("water") {
        Intent::RequestWaterBill
    } else if PROPERTY_ID_RE.is_match(text) {
        Intent::PropertyIdSupplied(text.to_string())
    } else if CONSUMER_ID_RE.is_match(text) && !text.bytes().all(|b| b.is_ascii_digit()) {
        Intent::WaterConsumerIdSupplied(text.to_string())
    } else {
        Intent::Unrecognized
    }
}
