//! The long-polling loop against a local stand-in for the Bot API.
//!
//! An axum server on 127.0.0.1 answers `getMe`, `getUpdates` and
//! `sendMessage` from scripted state; the model is an in-memory fake.

use async_trait::async_trait;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use edgequake_docbot::pipeline::format::Block;
use edgequake_docbot::{
    run_polling_until, AiGateway, Dispatcher, DocBotError, DocumentRenderer, Messages,
    ModelBackend, ModelRequest, PageRasterizer, Pipeline, PromptSet, SessionStore,
    TelegramClient,
};
use image::DynamicImage;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const TOKEN: &str = "TEST";
const CHAT: i64 = 42;
/// Upper bound for every polling run; the back-off alone is 3s.
const RUN_LIMIT: Duration = Duration::from_secs(10);

// ── Bot API stand-in ─────────────────────────────────────────────────────

#[derive(Default)]
struct BotApi {
    batches: Mutex<VecDeque<Vec<Value>>>,
    fail_polls: AtomicBool,
    reject_token: AtomicBool,
    offsets: Mutex<Vec<i64>>,
    sent: Mutex<Vec<(i64, String)>>,
}

impl BotApi {
    fn with_batch(updates: Vec<Value>) -> Arc<Self> {
        let api = Self::default();
        api.batches.lock().unwrap().push_back(updates);
        Arc::new(api)
    }

    fn polls(&self) -> usize {
        self.offsets.lock().unwrap().len()
    }

    fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }
}

fn api_error(code: u16, description: &str) -> Json<Value> {
    Json(json!({"ok": false, "error_code": code, "description": description}))
}

async fn get_me(State(api): State<Arc<BotApi>>) -> Json<Value> {
    if api.reject_token.load(Ordering::SeqCst) {
        return api_error(401, "Unauthorized");
    }
    Json(json!({
        "ok": true,
        "result": {"id": 1, "is_bot": true, "first_name": "DocBot", "username": "doc_bot"}
    }))
}

async fn get_updates(State(api): State<Arc<BotApi>>, Json(body): Json<Value>) -> Json<Value> {
    api.offsets
        .lock()
        .unwrap()
        .push(body["offset"].as_i64().unwrap_or(-1));

    if api.fail_polls.load(Ordering::SeqCst) {
        return api_error(502, "Bad Gateway");
    }
    let batch = api.batches.lock().unwrap().pop_front();
    match batch {
        Some(updates) => Json(json!({"ok": true, "result": updates})),
        None => {
            // A short long-poll with nothing to deliver.
            tokio::time::sleep(Duration::from_millis(20)).await;
            Json(json!({"ok": true, "result": []}))
        }
    }
}

async fn send_message(State(api): State<Arc<BotApi>>, Json(body): Json<Value>) -> Json<Value> {
    let chat = body["chat_id"].as_i64().unwrap_or_default();
    let text = body["text"].as_str().unwrap_or_default().to_string();
    api.sent.lock().unwrap().push((chat, text));
    Json(json!({"ok": true, "result": {"message_id": 1}}))
}

/// Serve `api` on an ephemeral port and return its base URL.
async fn serve(api: Arc<BotApi>) -> String {
    let app = Router::new()
        .route(&format!("/bot{TOKEN}/getMe"), post(get_me))
        .route(&format!("/bot{TOKEN}/getUpdates"), post(get_updates))
        .route(&format!("/bot{TOKEN}/sendMessage"), post(send_message))
        .with_state(api);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{addr}")
}

fn update(update_id: i64, text: &str) -> Value {
    json!({
        "update_id": update_id,
        "message": {
            "message_id": update_id,
            "from": {"id": 7, "is_bot": false, "first_name": "Ana"},
            "chat": {"id": CHAT, "type": "private"},
            "date": 0,
            "text": text
        }
    })
}

// ── Pipeline fakes ───────────────────────────────────────────────────────

struct EchoModel {
    delay: Duration,
}

#[async_trait]
impl ModelBackend for EchoModel {
    async fn complete(&self, request: ModelRequest) -> Result<String, DocBotError> {
        tokio::time::sleep(self.delay).await;
        Ok(format!("reply to: {}", request.prompt))
    }
}

struct NoPdfium;

#[async_trait]
impl PageRasterizer for NoPdfium {
    async fn rasterize(&self, _pdf_path: &Path) -> Result<Vec<DynamicImage>, DocBotError> {
        Err(DocBotError::Internal("not used by text events".into()))
    }
}

struct NoRenderer;

impl DocumentRenderer for NoRenderer {
    fn render(&self, _blocks: &[Block], _destination: &Path) -> Result<(), DocBotError> {
        Err(DocBotError::Internal("not used by text events".into()))
    }
}

async fn start(api: Arc<BotApi>, model_delay: Duration) -> (TelegramClient, Arc<Dispatcher>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("edgequake_docbot=debug")
        .with_test_writer()
        .try_init();

    let base = serve(api).await;
    let client = TelegramClient::new(TOKEN, 5).unwrap().with_api_base(base);

    let messages = Messages {
        welcome: "welcome".into(),
        chat_apology: "apology".into(),
        ..Messages::default()
    };
    let gateway = AiGateway::new(
        Arc::new(EchoModel { delay: model_delay }),
        Arc::new(PromptSet::default()),
        messages.chat_apology.clone(),
    );
    let pipeline = Pipeline::new(gateway, Arc::new(NoPdfium), Arc::new(NoRenderer));
    let dispatcher = Dispatcher::new(
        Arc::new(client.clone()),
        pipeline,
        SessionStore::new(10, 10),
        messages,
    );
    (client, Arc::new(dispatcher))
}

async fn wait_until(cond: impl Fn() -> bool) {
    while !cond() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn dispatches_updates_and_advances_offset() {
    let api = BotApi::with_batch(vec![
        update(10, "/start"),
        json!({"update_id": 11, "edited_message": {"message_id": 3, "chat": {"id": CHAT}, "text": "x"}}),
        update(12, "hello"),
        update(13, "/help"),
    ]);
    let (client, dispatcher) = start(api.clone(), Duration::ZERO).await;

    let watched = api.clone();
    let shutdown = async move { wait_until(|| watched.sent().len() >= 2 && watched.polls() >= 2).await };
    tokio::time::timeout(RUN_LIMIT, run_polling_until(&client, dispatcher, 1, shutdown))
        .await
        .expect("polling should stop on shutdown")
        .unwrap();

    let offsets = api.offsets.lock().unwrap().clone();
    assert_eq!(offsets[0], 0);
    assert!(
        offsets[1..].iter().all(|&o| o == 14),
        "offset must move past the last update id: {offsets:?}"
    );

    // Edited messages and unknown commands produce nothing.
    let mut sent = api.sent();
    sent.sort();
    assert_eq!(
        sent,
        vec![
            (CHAT, "reply to: hello".to_string()),
            (CHAT, "welcome".to_string()),
        ]
    );
}

#[tokio::test]
async fn shutdown_interrupts_error_backoff() {
    let api = Arc::new(BotApi::default());
    api.fail_polls.store(true, Ordering::SeqCst);
    let (client, dispatcher) = start(api.clone(), Duration::ZERO).await;

    let watched = api.clone();
    let shutdown = async move {
        wait_until(|| watched.polls() >= 1).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
    };
    // Well under the 3s back-off.
    tokio::time::timeout(
        Duration::from_secs(2),
        run_polling_until(&client, dispatcher, 1, shutdown),
    )
    .await
    .expect("back-off must not delay shutdown")
    .unwrap();

    assert_eq!(api.polls(), 1);
    assert!(api.sent().is_empty());
}

#[tokio::test]
async fn in_flight_events_finish_before_return() {
    let api = BotApi::with_batch(vec![update(1, "slow question")]);
    let (client, dispatcher) = start(api.clone(), Duration::from_millis(300)).await;

    let sent_at_shutdown = Arc::new(AtomicUsize::new(usize::MAX));
    let watched = api.clone();
    let record = sent_at_shutdown.clone();
    let shutdown = async move {
        wait_until(|| watched.polls() >= 2).await;
        record.store(watched.sent().len(), Ordering::SeqCst);
    };
    tokio::time::timeout(RUN_LIMIT, run_polling_until(&client, dispatcher, 1, shutdown))
        .await
        .expect("polling should stop on shutdown")
        .unwrap();

    assert_eq!(sent_at_shutdown.load(Ordering::SeqCst), 0);
    assert_eq!(api.sent(), vec![(CHAT, "reply to: slow question".to_string())]);
}

#[tokio::test]
async fn rejected_token_fails_at_start() {
    let api = Arc::new(BotApi::default());
    api.reject_token.store(true, Ordering::SeqCst);
    let (client, dispatcher) = start(api.clone(), Duration::ZERO).await;

    let err = run_polling_until(&client, dispatcher, 1, std::future::pending())
        .await
        .unwrap_err();

    assert!(matches!(err, DocBotError::PlatformApi { ref method, .. } if method == "getMe"));
    assert!(err.to_string().contains("Unauthorized"));
    assert_eq!(api.polls(), 0);
}
