use std::{
    process::ExitCode,
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use anyhow::{Context, Result, anyhow};
use civic_core::{
    DEFAULT_API_BASE, DEFAULT_API_VERSION, DeliveryClient, GraphApiError, OutboundMessageSpec,
    ReqwestSendTransport, WhatsAppCredentials,
};
use civic_telemetry::{TelemetryConfig, init_tracing};
use clap::{Parser, Subcommand};
use reqwest::StatusCode;
use serde_json::Value;

mod sample;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_TEST_TEXT: &str = "Test message from the Municipal Services bot";

#[derive(Parser, Debug)]
#[command(
    name = "civic-messaging",
    version,
    about = "Diagnostics for the municipal services WhatsApp bot"
)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Check the access token and phone number id against the Graph API
    CheckToken,
    /// Send one plain-text message through the delivery client
    SendTest {
        /// Recipient number in international format without '+'
        #[arg(long)]
        to: String,
        #[arg(long, default_value = DEFAULT_TEST_TEXT)]
        text: String,
    },
    /// Replay the platform's subscription handshake against a webhook
    VerifyWebhook {
        /// Full webhook URL, e.g. https://example.org/webhook
        #[arg(long)]
        url: String,
        /// Defaults to VERIFY_TOKEN
        #[arg(long)]
        token: Option<String>,
    },
    /// POST a sample inbound event to a webhook
    PostSample {
        #[arg(long)]
        url: String,
        #[arg(long, default_value = sample::DEFAULT_TEXT)]
        text: String,
        #[arg(long, default_value = sample::DEFAULT_FROM)]
        from: String,
    },
    /// Print a sample inbound event
    SamplePayload {
        #[arg(long, default_value = sample::DEFAULT_TEXT)]
        text: String,
        #[arg(long, default_value = sample::DEFAULT_FROM)]
        from: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging()?;

    let ok = match cli.command {
        CliCommand::CheckToken => check_token(&credentials_from_env()?).await?,
        CliCommand::SendTest { to, text } => send_test(credentials_from_env()?, &to, &text).await,
        CliCommand::VerifyWebhook { url, token } => {
            let token = match token {
                Some(token) => token,
                None => env_var("VERIFY_TOKEN")?,
            };
            verify_webhook(&url, &token).await?
        }
        CliCommand::PostSample { url, text, from } => post_sample(&url, &from, &text).await?,
        CliCommand::SamplePayload { text, from } => {
            let event = sample::inbound_event(&from, &text, &sample_message_id(), unix_now());
            println!("{}", serde_json::to_string_pretty(&event)?);
            true
        }
    };
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn init_logging() -> Result<()> {
    let mut cfg = TelemetryConfig::from_env("civic-messaging");
    if std::env::var_os("LOG_FORMAT").is_none() {
        cfg.json_logs = false;
    }
    cfg.default_filter = "warn".into();
    cfg.log_to_stderr = true;
    init_tracing(&cfg)
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| anyhow!("{key} must be set (environment or .env)"))
}

fn credentials_from_env() -> Result<WhatsAppCredentials> {
    let optional = |key: &str, default: &str| env_var(key).unwrap_or_else(|_| default.into());
    Ok(
        WhatsAppCredentials::new(env_var("PHONE_NUMBER_ID")?, env_var("WHATSAPP_API_KEY")?)
            .with_api_version(optional("API_VERSION", DEFAULT_API_VERSION))
            .with_api_base(optional("WA_API_BASE", DEFAULT_API_BASE)),
    )
}

fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("failed to build http client")
}

async fn check_token(creds: &WhatsAppCredentials) -> Result<bool> {
    println!("Checking phone number {} ...", creds.phone_number_id);
    let response = http_client()?
        .get(creds.phone_url())
        .bearer_auth(&creds.access_token)
        .send()
        .await
        .context("request to the Graph API failed")?;
    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);

    if status.is_success() {
        println!("Token is valid.");
        for field in [
            "id",
            "display_phone_number",
            "verified_name",
            "code_verification_status",
            "quality_rating",
        ] {
            if let Some(value) = body.get(field).and_then(Value::as_str) {
                println!("  {field}: {value}");
            }
        }
        return Ok(true);
    }

    println!("Token check failed with status {status}");
    report_graph_error(&body);
    Ok(false)
}

fn report_graph_error(body: &Value) {
    match GraphApiError::from_body(body) {
        Some(err) => {
            if let Some(message) = err.message.as_deref() {
                println!("  message: {message}");
            }
            if let Some(code) = err.code {
                println!("  code: {code}");
            }
            if let Some(hint) = err.hint() {
                println!("  hint: {hint}");
            }
        }
        None if !body.is_null() => println!("  body: {body}"),
        None => {}
    }
}

async fn send_test(creds: WhatsAppCredentials, to: &str, text: &str) -> bool {
    let transport = Arc::new(ReqwestSendTransport::new(reqwest::Client::new()));
    let client = DeliveryClient::new(transport, creds);
    let sent = client.send(to, &OutboundMessageSpec::text(text)).await;
    if sent {
        println!("Message sent to {to}.");
    } else {
        println!("Message to {to} was not delivered; rerun with RUST_LOG=info for attempt details.");
    }
    sent
}

async fn verify_webhook(url: &str, token: &str) -> Result<bool> {
    let challenge = uuid::Uuid::new_v4().simple().to_string();
    let separator = if url.contains('?') { '&' } else { '?' };
    let target = format!(
        "{url}{separator}hub.mode=subscribe&hub.verify_token={}&hub.challenge={challenge}",
        urlencoding::encode(token)
    );
    let response = http_client()?
        .get(&target)
        .send()
        .await
        .with_context(|| format!("could not reach {url}"))?;
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    match status {
        StatusCode::OK if body == challenge => {
            println!("Webhook verified: challenge echoed.");
            Ok(true)
        }
        StatusCode::OK => {
            println!("Webhook answered 200 but returned {body:?} instead of the challenge.");
            Ok(false)
        }
        StatusCode::FORBIDDEN => {
            println!("Webhook refused verification (403): the verify token does not match.");
            Ok(false)
        }
        StatusCode::NOT_FOUND => {
            println!("No handler at {url} (404): check the path.");
            Ok(false)
        }
        other => {
            println!("Unexpected status {other}: {body}");
            Ok(false)
        }
    }
}

async fn post_sample(url: &str, from: &str, text: &str) -> Result<bool> {
    let event = sample::inbound_event(from, text, &sample_message_id(), unix_now());
    let response = http_client()?
        .post(url)
        .json(&event)
        .send()
        .await
        .with_context(|| format!("could not reach {url}"))?;
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    if status == StatusCode::OK && body == "EVENT_RECEIVED" {
        println!("Webhook acknowledged the sample event.");
        Ok(true)
    } else {
        println!("Unexpected acknowledgment: {status} {body:?}");
        Ok(false)
    }
}

fn sample_message_id() -> String {
    format!("wamid.test.{}", uuid::Uuid::new_v4().simple())
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
