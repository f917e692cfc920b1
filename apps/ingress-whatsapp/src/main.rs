//! Municipal services WhatsApp webhook.
//!
//! ```text
//! GET  /webhook  Meta subscription handshake
//! POST /webhook  inbound events, acknowledged immediately
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use civic_core::ReqwestSendTransport;
use civic_ingress_whatsapp::{AppConfig, AppState, Dispatcher, build_router};
use civic_telemetry::install as init_telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    init_telemetry("civic-ingress-whatsapp")?;
    let config = AppConfig::from_env()?;
    config.log_startup_check();

    let transport = Arc::new(ReqwestSendTransport::new(reqwest::Client::new()));
    let dispatcher = Dispatcher::new(config.delivery_client(transport), config.reply_catalog());
    let app = build_router(AppState::new(dispatcher, config.verify_token.clone()));

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;
    tracing::info!("ingress-whatsapp listening on {}", config.addr);
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
