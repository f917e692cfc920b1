use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use tracing::{Instrument, info, info_span, warn};

use crate::dispatch::Dispatcher;

pub const ACK_BODY: &str = "EVENT_RECEIVED";
pub const BANNER: &str = "Municipal Services WhatsApp Bot is running!";

#[derive(Clone)]
pub struct AppState {
    dispatcher: Arc<Dispatcher>,
    verify_token: Arc<str>,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher, verify_token: impl Into<Arc<str>>) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            verify_token: verify_token.into(),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(banner))
        .route("/webhook", get(verify).post(receive))
        .route("/healthz", get(healthz))
        .with_state(state)
}

#[derive(Deserialize)]
struct VerifyQs {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
    #[serde(rename = "hub.verify_token")]
    token: Option<String>,
}

async fn verify(State(state): State<AppState>, Query(q): Query<VerifyQs>) -> Response {
    let token_matches = q
        .token
        .as_deref()
        .is_some_and(|token| token_matches_secret(token, &state.verify_token));

    if q.mode.as_deref() == Some("subscribe") && token_matches {
        info!("webhook verified");
        (StatusCode::OK, q.challenge.unwrap_or_default()).into_response()
    } else {
        warn!(mode = ?q.mode, "webhook verification rejected");
        StatusCode::FORBIDDEN.into_response()
    }
}

/// Acknowledges before any processing; the outcome of processing never
/// changes the response.
async fn receive(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let dispatcher = Arc::clone(&state.dispatcher);
    let span = info_span!("webhook.process", bytes = body.len());
    tokio::spawn(
        async move {
            let report = dispatcher.handle_payload(&body).await;
            info!(
                replied = report.replied,
                skipped = report.skipped,
                failed = report.failed,
                status_updates = report.status_updates,
                "webhook processed"
            );
        }
        .instrument(span),
    );
    (StatusCode::OK, ACK_BODY)
}

async fn banner() -> &'static str {
    BANNER
}

async fn healthz() -> impl IntoResponse {
    StatusCode::NO_CONTENT
}

fn token_matches_secret(provided: &str, secret: &str) -> bool {
    let (provided, secret) = (provided.as_bytes(), secret.as_bytes());
    provided.len() == secret.len() && provided.ct_eq(secret).into()
}
