//! WhatsApp Cloud API delivery.

pub mod creds;
pub mod error;
pub mod sender;
pub mod transport;

pub use creds::*;
pub use error::*;
pub use sender::*;
pub use transport::*;
