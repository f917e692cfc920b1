use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use civic_core::{
    DEFAULT_API_BASE, DEFAULT_API_VERSION, DeliveryClient, FixedBackoff, ReplyCatalog,
    RetryPolicy, SharedSendTransport, WhatsAppCredentials,
};
use tracing::info;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;
const DEFAULT_PAYMENT_BASE: &str = "https://municipal.gov";

#[derive(Clone)]
pub struct AppConfig {
    pub creds: WhatsAppCredentials,
    pub verify_token: String,
    pub addr: SocketAddr,
    pub attempt_timeout: Duration,
    pub retry_delay: Duration,
    pub payment_base: String,
}

impl AppConfig {
    /// Reads the process environment after loading `.env` when present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required =
            |key: &str| get(key).ok_or_else(|| anyhow!("{key} must be set"));

        let token = required("WHATSAPP_API_KEY")?;
        let phone_number_id = required("PHONE_NUMBER_ID")?;
        let verify_token = required("VERIFY_TOKEN")?;
        let creds = WhatsAppCredentials::new(phone_number_id, token)
            .with_api_version(get("API_VERSION").unwrap_or_else(|| DEFAULT_API_VERSION.into()))
            .with_api_base(get("WA_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.into()));

        let addr = match get("BIND") {
            Some(bind) => SocketAddr::from_str(bind.trim())
                .with_context(|| format!("invalid BIND address {bind:?}"))?,
            None => {
                let port = parse_or("PORT", get("PORT"), DEFAULT_PORT)?;
                SocketAddr::from(([0, 0, 0, 0], port))
            }
        };

        Ok(Self {
            creds,
            verify_token,
            addr,
            attempt_timeout: Duration::from_millis(parse_or(
                "DELIVERY_TIMEOUT_MS",
                get("DELIVERY_TIMEOUT_MS"),
                DEFAULT_TIMEOUT_MS,
            )?),
            retry_delay: Duration::from_millis(parse_or(
                "DELIVERY_RETRY_DELAY_MS",
                get("DELIVERY_RETRY_DELAY_MS"),
                DEFAULT_RETRY_DELAY_MS,
            )?),
            payment_base: get("PAYMENT_BASE_URL").unwrap_or_else(|| DEFAULT_PAYMENT_BASE.into()),
        })
    }

    pub fn delivery_client(&self, transport: SharedSendTransport) -> DeliveryClient {
        DeliveryClient::new(transport, self.creds.clone())
            .with_policy(RetryPolicy::default().with_timeout(self.attempt_timeout))
            .with_backoff(Arc::new(FixedBackoff(self.retry_delay)))
    }

    pub fn reply_catalog(&self) -> ReplyCatalog {
        ReplyCatalog::new(self.payment_base.clone())
    }

    /// Logs what the service will run with; secrets are reported as set/unset.
    pub fn log_startup_check(&self) {
        info!(
            token_configured = !self.creds.access_token.is_empty(),
            phone_number_id = %self.creds.phone_number_id,
            api_version = %self.creds.api_version,
            api_base = %self.creds.api_base,
            bind = %self.addr,
            "configuration check"
        );
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("creds", &self.creds)
            .field("verify_token", &"<redacted>")
            .field("addr", &self.addr)
            .field("attempt_timeout", &self.attempt_timeout)
            .field("retry_delay", &self.retry_delay)
            .field("payment_base", &self.payment_base)
            .finish()
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid {key} value {raw:?}")),
        None => Ok(default),
    }
}
