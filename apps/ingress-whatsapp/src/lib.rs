//! WhatsApp webhook service for municipal services: answers the platform's
//! verification handshake, acknowledges deliveries immediately and replies to
//! each user message in the background.

pub mod config;
pub mod dispatch;
pub mod http;
pub mod telemetry;

pub use config::AppConfig;
pub use dispatch::{DispatchError, DispatchReport, Dispatcher};
pub use http::{AppState, build_router};
