use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use civic_core::{DeliveryError, FAILURE_NOTICE, SendTransport, TransportResponse};
use civic_ingress_whatsapp::{AppConfig, AppState, DispatchReport, Dispatcher, build_router};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

type Responder = dyn Fn(&Value) -> Result<TransportResponse, DeliveryError> + Send + Sync;

struct RecordingTransport {
    respond: Box<Responder>,
    sent: Mutex<Vec<Value>>,
}

impl RecordingTransport {
    fn new(
        respond: impl Fn(&Value) -> Result<TransportResponse, DeliveryError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(respond),
            sent: Mutex::default(),
        })
    }

    fn accepting() -> Arc<Self> {
        Self::new(|_| ok())
    }

    fn sent(&self) -> Vec<Value> {
        self.sent.lock().unwrap().clone()
    }

    fn texts(&self) -> Vec<String> {
        self.sent()
            .iter()
            .filter_map(|body| body["text"]["body"].as_str().map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl SendTransport for RecordingTransport {
    async fn post_json(
        &self,
        _url: &str,
        _token: &str,
        body: &Value,
        _timeout: Duration,
    ) -> Result<TransportResponse, DeliveryError> {
        self.sent.lock().unwrap().push(body.clone());
        (self.respond)(body)
    }
}

struct HangingTransport;

#[async_trait]
impl SendTransport for HangingTransport {
    async fn post_json(
        &self,
        _url: &str,
        _token: &str,
        _body: &Value,
        _timeout: Duration,
    ) -> Result<TransportResponse, DeliveryError> {
        std::future::pending().await
    }
}

fn ok() -> Result<TransportResponse, DeliveryError> {
    Ok(TransportResponse {
        status: StatusCode::OK,
        body: json!({"messages": [{"id": "wamid.sent"}]}),
    })
}

fn server_error() -> Result<TransportResponse, DeliveryError> {
    Ok(TransportResponse {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: json!({"error": {"code": 1, "message": "unknown error"}}),
    })
}

fn config() -> AppConfig {
    let env: HashMap<&str, &str> = HashMap::from([
        ("WHATSAPP_API_KEY", "EAAG-test"),
        ("PHONE_NUMBER_ID", "555000"),
        ("VERIFY_TOKEN", "municipal-secret"),
        ("DELIVERY_RETRY_DELAY_MS", "0"),
    ]);
    AppConfig::from_lookup(|key| env.get(key).map(|v| v.to_string())).unwrap()
}

fn dispatcher(transport: Arc<dyn SendTransport>) -> Dispatcher {
    let cfg = config();
    Dispatcher::new(cfg.delivery_client(transport), cfg.reply_catalog())
}

fn text_message(from: &str, id: &str, body: &str) -> Value {
    json!({
        "from": from,
        "id": id,
        "timestamp": "1700000000",
        "type": "text",
        "text": {"body": body}
    })
}

fn event(messages: Vec<Value>) -> Value {
    json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "WABA",
            "changes": [{
                "field": "messages",
                "value": {
                    "messaging_product": "whatsapp",
                    "metadata": {"display_phone_number": "15550000", "phone_number_id": "555000"},
                    "contacts": [{"wa_id": "919800000001", "profile": {"name": "Asha"}}],
                    "messages": messages
                }
            }]
        }]
    })
}

async fn dispatch(transport: Arc<RecordingTransport>, payload: &Value) -> DispatchReport {
    dispatcher(transport)
        .handle_payload(payload.to_string().as_bytes())
        .await
}

#[tokio::test]
async fn other_objects_are_ignored() {
    let transport = RecordingTransport::accepting();
    let mut payload = event(vec![text_message("919800000001", "m1", "hi")]);
    payload["object"] = json!("page");

    let report = dispatch(transport.clone(), &payload).await;
    assert_eq!(report, DispatchReport::default());
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn status_updates_send_nothing() {
    let transport = RecordingTransport::accepting();
    let payload = json!({
        "object": "whatsapp_business_account",
        "entry": [{"id": "WABA", "changes": [{"field": "messages", "value": {
            "messaging_product": "whatsapp",
            "statuses": [{"id": "wamid.1", "status": "delivered"}]
        }}]}]
    });

    let report = dispatch(transport.clone(), &payload).await;
    assert_eq!(report.status_updates, 1);
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn undecodable_body_is_ignored() {
    let transport = RecordingTransport::accepting();
    let report = dispatcher(transport.clone())
        .handle_payload(b"not json at all")
        .await;
    assert_eq!(report, DispatchReport::default());
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn greeting_sends_service_list_with_contact_name() {
    let transport = RecordingTransport::accepting();
    let report = dispatch(
        transport.clone(),
        &event(vec![text_message("919800000001", "m1", "  Hi ")]),
    )
    .await;

    assert_eq!(report.replied, 1);
    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["to"], "919800000001");
    assert_eq!(sent[0]["type"], "interactive");
    assert_eq!(sent[0]["interactive"]["type"], "list");
    let body = sent[0]["interactive"]["body"]["text"].as_str().unwrap();
    assert!(body.contains("Hello Asha"));
}

#[tokio::test]
async fn greeting_degrades_to_text_when_list_is_refused() {
    let transport = RecordingTransport::new(|body| {
        if body["type"] == "interactive" {
            server_error()
        } else {
            ok()
        }
    });
    dispatch(
        transport.clone(),
        &event(vec![text_message("919800000001", "m1", "hello")]),
    )
    .await;

    let sent = transport.sent();
    assert_eq!(sent.len(), 4);
    let texts = transport.texts();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("• Property Tax Payment"));
}

#[tokio::test]
async fn property_id_reply_carries_payment_link() {
    let transport = RecordingTransport::accepting();
    dispatch(
        transport.clone(),
        &event(vec![text_message("919800000001", "m1", "919876")]),
    )
    .await;

    let texts = transport.texts();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("Property ID: 919876"));
    assert!(texts[0].ends_with("https://municipal.gov/pay-property/919876"));
}

#[tokio::test]
async fn list_selection_prompts_for_consumer_number() {
    let transport = RecordingTransport::accepting();
    let selection = json!({
        "from": "919800000001",
        "id": "m1",
        "type": "interactive",
        "interactive": {
            "type": "list_reply",
            "list_reply": {"id": "water_bill", "title": "Water Bill"}
        }
    });
    dispatch(transport.clone(), &event(vec![selection])).await;

    assert_eq!(
        transport.texts(),
        vec!["Please enter your Water Consumer Number.".to_string()]
    );
}

#[tokio::test]
async fn unsupported_types_are_skipped_silently() {
    let transport = RecordingTransport::accepting();
    let image = json!({"from": "919800000001", "id": "m1", "type": "image", "image": {"id": "media"}});
    let report = dispatch(transport.clone(), &event(vec![image])).await;

    assert_eq!(report.skipped, 1);
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn malformed_message_gets_failure_notice_and_batch_continues() {
    let transport = RecordingTransport::accepting();
    let broken = json!({"from": "919800000002", "id": "m1", "type": "text"});
    let report = dispatch(
        transport.clone(),
        &event(vec![broken, text_message("919800000001", "m2", "property")]),
    )
    .await;

    assert_eq!(report.failed, 1);
    assert_eq!(report.replied, 1);
    let sent = transport.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0]["to"], "919800000002");
    assert_eq!(sent[0]["text"]["body"], FAILURE_NOTICE);
    assert_eq!(sent[1]["to"], "919800000001");
    assert_eq!(sent[1]["text"]["body"], "Please enter your Property ID number.");
}

#[tokio::test]
async fn undecodable_selection_gets_notice_and_batch_continues() {
    let transport = RecordingTransport::accepting();
    let broken = json!({
        "from": "111",
        "id": "m1",
        "type": "interactive",
        "interactive": {"type": "list_reply", "list_reply": {}}
    });
    let report = dispatch(
        transport.clone(),
        &event(vec![broken, text_message("222", "m2", "property")]),
    )
    .await;

    assert_eq!(report.failed, 1);
    assert_eq!(report.replied, 1);
    let sent = transport.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0]["to"], "111");
    assert_eq!(sent[0]["text"]["body"], FAILURE_NOTICE);
    assert_eq!(sent[1]["to"], "222");
    assert_eq!(sent[1]["text"]["body"], "Please enter your Property ID number.");
}

#[tokio::test]
async fn wrongly_typed_fields_do_not_drop_the_batch() {
    let transport = RecordingTransport::accepting();
    let numeric_body = json!({"from": "111", "id": "m1", "type": "text", "text": {"body": 42}});
    let no_sender = json!({"from": {"wa": 1}, "id": "m2", "type": "text", "text": {"body": 7}});
    let report = dispatch(
        transport.clone(),
        &event(vec![numeric_body, no_sender, text_message("222", "m3", "water")]),
    )
    .await;

    assert_eq!(report.failed, 2);
    assert_eq!(report.replied, 1);
    let recipients: Vec<Value> = transport.sent().iter().map(|b| b["to"].clone()).collect();
    assert_eq!(recipients, vec![json!("111"), json!("222")]);
}

#[tokio::test]
async fn messages_are_answered_in_order() {
    let transport = RecordingTransport::accepting();
    dispatch(
        transport.clone(),
        &event(vec![
            text_message("919800000001", "m1", "water"),
            text_message("919800000001", "m2", "ABC12345"),
        ]),
    )
    .await;

    let texts = transport.texts();
    assert_eq!(texts.len(), 2);
    assert_eq!(texts[0], "Please enter your Water Consumer Number.");
    assert!(texts[1].contains("Consumer No: abc12345"));
}

#[tokio::test]
#[tracing_test::traced_test]
async fn processing_logs_carry_message_context() {
    let transport = RecordingTransport::accepting();
    dispatch(
        transport.clone(),
        &event(vec![text_message("919800000001", "wamid.ctx", "hi")]),
    )
    .await;

    assert!(logs_contain("classified message"));
    assert!(logs_contain("wamid.ctx"));
    assert!(!logs_contain("EAAG-test"));
}

fn app(transport: Arc<dyn SendTransport>) -> axum::Router {
    build_router(AppState::new(dispatcher(transport), "municipal-secret"))
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn post_acknowledges_before_delivery_finishes() {
    let payload = event(vec![text_message("919800000001", "m1", "hi")]);
    let response = app(Arc::new(HangingTransport))
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhook")
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "EVENT_RECEIVED");
}

#[tokio::test]
async fn post_acknowledges_garbage() {
    let response = app(RecordingTransport::accepting())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhook")
                .body(Body::from("{"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "EVENT_RECEIVED");
}

#[tokio::test]
async fn verification_echoes_challenge() {
    let response = app(RecordingTransport::accepting())
        .oneshot(
            Request::builder()
                .uri("/webhook?hub.mode=subscribe&hub.verify_token=municipal-secret&hub.challenge=42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "42");
}

#[tokio::test]
async fn verification_rejects_wrong_token_or_mode() {
    for query in [
        "hub.mode=subscribe&hub.verify_token=nope&hub.challenge=42",
        "hub.mode=unsubscribe&hub.verify_token=municipal-secret&hub.challenge=42",
        "hub.challenge=42",
    ] {
        let response = app(RecordingTransport::accepting())
            .oneshot(
                Request::builder()
                    .uri(format!("/webhook?{query}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{query}");
        assert!(body_string(response).await.is_empty());
    }
}

#[tokio::test]
async fn banner_and_health() {
    let response = app(RecordingTransport::accepting())
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_string(response).await,
        "Municipal Services WhatsApp Bot is running!"
    );

    let response = app(RecordingTransport::accepting())
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}
