//! Municipal services messaging core.
//!
//! Holds the webhook data model, the intent classifier, the reply composer and
//! the WhatsApp delivery client. Everything except delivery is pure and free of
//! I/O.
pub mod backoff;
pub mod compose;
pub mod intent;
pub mod outbound;
pub mod platforms;
pub mod types;

pub use backoff::*;
pub use compose::*;
pub use intent::{Intent, Utterance, classify, normalize};
pub use outbound::*;
pub use platforms::whatsapp::*;
pub use types::*;
