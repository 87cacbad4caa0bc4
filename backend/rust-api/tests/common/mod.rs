#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use birthday_challenge_api::{
    config::Config,
    create_router,
    game::TokioScheduler,
    models::{email::ResultNotification, QuestionBank},
    services::{
        email_service::Notifier,
        results_store::{MemoryResultsStore, ResultsStore},
        AppState,
    },
};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

/// Captures notifications instead of sending mail.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<ResultNotification>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<ResultNotification> {
        self.sent.lock().unwrap().clone()
    }

    /// Gives the spawned notification task a chance to run.
    pub async fn wait_for(&self, count: usize) -> Vec<ResultNotification> {
        for _ in 0..50 {
            if self.sent.lock().unwrap().len() >= count {
                break;
            }
            tokio::task::yield_now().await;
        }
        self.sent()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &ResultNotification) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub notifier: Arc<RecordingNotifier>,
}

pub async fn create_test_app() -> TestApp {
    create_test_app_with_config(Config::default()).await
}

pub async fn create_test_app_with_config(config: Config) -> TestApp {
    build_test_app(config, Arc::new(MemoryResultsStore::new()))
}

pub async fn create_test_app_with_store(store: Arc<dyn ResultsStore>) -> TestApp {
    build_test_app(Config::default(), store)
}

fn build_test_app(config: Config, store: Arc<dyn ResultsStore>) -> TestApp {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let notifier = Arc::new(RecordingNotifier::default());
    let state = Arc::new(AppState::with_components(
        config,
        QuestionBank::default(),
        store,
        notifier.clone(),
        Arc::new(TokioScheduler::current()),
    ));

    TestApp {
        router: create_router(state.clone()),
        state,
        notifier,
    }
}

/// Sends a request and decodes the JSON body (`Null` when empty).
pub async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    send_request(app, request).await
}

pub async fn send_raw(app: &Router, method: &str, uri: &str, raw: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(raw.to_string()))
        .unwrap();

    send_request(app, request).await
}

async fn send_request(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();

    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            panic!(
                "non-JSON body (status {}): {}",
                status,
                String::from_utf8_lossy(&bytes)
            )
        })
    };

    (status, json)
}
