//! Test utilities for snapspend-core
//!
//! This module provides a mock Gemini server that replays scripted
//! responses and records every request it receives.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::IntoResponse,
    Router,
};
use tokio::sync::oneshot;

/// A request captured by the mock server
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub query: Option<String>,
    pub body: serde_json::Value,
}

#[derive(Default)]
struct ServerState {
    responses: Mutex<VecDeque<(u16, String)>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// Mock generateContent server for testing
///
/// Responses are served in the order given. Once the script runs out every
/// request gets a 500.
pub struct MockGeminiServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockGeminiServer {
    /// Start the mock server on an available port
    pub async fn start(responses: Vec<(u16, String)>) -> Self {
        let state = Arc::new(ServerState {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .fallback(handle_request)
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Every request received so far
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.requests.lock().unwrap().len()
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockGeminiServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn handle_request(
    State(state): State<Arc<ServerState>>,
    uri: Uri,
    body: String,
) -> impl IntoResponse {
    let body = serde_json::from_str(&body).unwrap_or(serde_json::Value::String(body));
    state.requests.lock().unwrap().push(RecordedRequest {
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        body,
    });

    let (status, body) = state
        .responses
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| (500, error_body(500, "No scripted response left", "INTERNAL")));

    (
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
}

/// Successful generateContent body carrying `text`
pub fn text_body(text: &str) -> String {
    serde_json::json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }]
    })
    .to_string()
}

/// Error envelope as the API sends it
pub fn error_body(code: u16, message: &str, status: &str) -> String {
    serde_json::json!({
        "error": {"code": code, "message": message, "status": status}
    })
    .to_string()
}

/// Scripted 200 response
pub fn ok(text: &str) -> (u16, String) {
    (200, text_body(text))
}

/// Scripted 429 response
pub fn rate_limited() -> (u16, String) {
    (
        429,
        error_body(429, "Resource has been exhausted (e.g. check quota).", "RESOURCE_EXHAUSTED"),
    )
}

/// Scripted 503 response
pub fn overloaded() -> (u16, String) {
    (503, error_body(503, "The model is overloaded. Please try again later.", "UNAVAILABLE"))
}
