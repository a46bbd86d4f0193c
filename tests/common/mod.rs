//! Local stand-in for the tutoring backend, shared by the integration tests

#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::extract::{Json, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tutor_session_sdk::ClientConfig;

/// Identity token the backend refuses to exchange
pub const REJECTED_CODE: &str = "bad-code";

/// Body streamed for an ordinary chat request
pub const CHAT_BODY: &str = "event: token\ndata: Hel\n\nevent: token\ndata: lo\n\nevent: done\ndata: [DONE]\n\n";

/// Recorded traffic and knobs of a [`TestBackend`]
#[derive(Default)]
pub struct BackendState {
    pub me_calls: AtomicUsize,
    pub exchange_calls: AtomicUsize,
    pub me_delay: Mutex<Duration>,
    pub last_exchange_body: Mutex<Option<Value>>,
    pub last_chat_auth: Mutex<Option<Option<String>>>,
    pub last_chat_accept: Mutex<Option<String>>,
    pub last_chat_query: Mutex<Option<HashMap<String, String>>>,
    /// Released by a test to let a gated chat body continue
    pub chat_gate: Notify,
}

impl BackendState {
    pub fn me_calls(&self) -> usize {
        self.me_calls.load(Ordering::SeqCst)
    }

    pub fn set_me_delay(&self, delay: Duration) {
        *self.me_delay.lock().unwrap() = delay;
    }

    pub fn chat_auth(&self) -> Option<String> {
        self.last_chat_auth
            .lock()
            .unwrap()
            .clone()
            .expect("no chat request recorded")
    }

    pub fn chat_query(&self) -> HashMap<String, String> {
        self.last_chat_query
            .lock()
            .unwrap()
            .clone()
            .expect("no chat request recorded")
    }
}

/// A running backend bound to an ephemeral local port
pub struct TestBackend {
    pub base_url: String,
    pub state: Arc<BackendState>,
}

impl TestBackend {
    pub async fn start() -> Self {
        init_tracing();

        let state = Arc::new(BackendState::default());
        let app = Router::new()
            .route("/auth/firebase", post(exchange))
            .route("/auth/me", get(current_user))
            .route("/chat", post(chat))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::builder()
            .api_base_url(self.base_url.clone())
            .timezone("Europe/Berlin")
            .request_timeout(Duration::from_secs(5))
            .build()
    }
}

/// Backend answering every request with one canned raw HTTP response
///
/// For status lines and framings the axum backend cannot produce.
pub async fn raw_backend(response: &'static str) -> ClientConfig {
    init_tracing();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    ClientConfig::builder()
        .api_base_url(format!("http://{addr}"))
        .build()
}

/// Config pointing at a port nothing listens on
pub fn unreachable_config() -> ClientConfig {
    ClientConfig::builder()
        .api_base_url("http://127.0.0.1:9")
        .request_timeout(Duration::from_secs(2))
        .build()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn exchange(State(state): State<Arc<BackendState>>, Json(body): Json<Value>) -> Response {
    state.exchange_calls.fetch_add(1, Ordering::SeqCst);
    *state.last_exchange_body.lock().unwrap() = Some(body.clone());

    let token = body["firebase_token"].as_str().unwrap_or_default().to_string();
    if token == REJECTED_CODE {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Invalid Firebase token" })),
        )
            .into_response();
    }

    Json(json!({
        "status": "success",
        "access_token": format!("sess-for-{token}"),
        "token_type": "bearer",
        "expires_in": 3600,
    }))
    .into_response()
}

async fn current_user(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    state.me_calls.fetch_add(1, Ordering::SeqCst);

    let delay = *state.me_delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Bearer sess-"));
    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Could not validate credentials" })),
        )
            .into_response();
    }

    Json(json!({
        "user": {
            "id": "u1",
            "email": "ada@example.edu",
            "name": "Ada",
            "role": "student",
        }
    }))
    .into_response()
}

async fn chat(
    State(state): State<Arc<BackendState>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let header_value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    *state.last_chat_auth.lock().unwrap() = Some(header_value(header::AUTHORIZATION));
    *state.last_chat_accept.lock().unwrap() = header_value(header::ACCEPT);
    let query = params.get("query").cloned().unwrap_or_default();
    *state.last_chat_query.lock().unwrap() = Some(params);

    match query.as_str() {
        "fail" => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        "empty" => (StatusCode::OK, "").into_response(),
        "gated" => {
            let state = Arc::clone(&state);
            let body = async_stream::stream! {
                yield Ok::<_, std::io::Error>("data: first\n\n".to_string());
                state.chat_gate.notified().await;
                yield Ok("data: second\n\n".to_string());
            };
            event_stream(Body::from_stream(body))
        }
        "broken" => {
            let body = async_stream::stream! {
                yield Ok::<_, std::io::Error>("data: partial\n\n".to_string());
                tokio::time::sleep(Duration::from_millis(20)).await;
                yield Err(std::io::Error::other("backend crashed"));
            };
            event_stream(Body::from_stream(body))
        }
        _ => event_stream(Body::from(CHAT_BODY)),
    }
}

fn event_stream(body: Body) -> Response {
    Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream")
        .body(body)
        .unwrap()
}
