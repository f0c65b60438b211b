//! In-process token endpoint for tests
//!
//! Binds an axum server on `127.0.0.1:0`, records every request it receives
//! and answers from a scripted list of replies. The last reply repeats once
//! the list is exhausted.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::post;
use tokio::net::TcpListener;

/// Address nothing listens on; connecting fails immediately.
pub(crate) const UNREACHABLE_ENDPOINT: &str = "http://127.0.0.1:1/oauth/v2/token";

#[derive(Debug, Clone)]
pub(crate) struct Reply {
    status: StatusCode,
    body: String,
    delay: Duration,
}

impl Reply {
    pub(crate) fn json(value: serde_json::Value) -> Self {
        Self {
            status: StatusCode::OK,
            body: value.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub(crate) fn token(access: &str, expires_in_sec: u64, refresh: Option<&str>) -> Self {
        let mut value = serde_json::json!({
            "access_token": access,
            "expires_in_sec": expires_in_sec,
            "token_type": "Bearer",
        });
        if let Some(refresh) = refresh {
            value["refresh_token"] = serde_json::Value::String(refresh.to_string());
        }
        Self::json(value)
    }

    pub(crate) fn raw(status: u16, body: &str) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap(),
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub(crate) fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// What the mock endpoint saw for one request.
#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub query: HashMap<String, String>,
    pub authorization: Option<String>,
    pub accept: Option<String>,
    pub content_type: Option<String>,
    pub body_len: usize,
}

#[derive(Clone)]
struct MockState {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

pub(crate) struct MockTokenEndpoint {
    pub url: String,
    state: MockState,
    _server: tokio::task::JoinHandle<()>,
}

impl MockTokenEndpoint {
    pub(crate) async fn start(replies: Vec<Reply>) -> Self {
        let state = MockState {
            replies: Arc::new(Mutex::new(replies.into())),
            requests: Arc::new(Mutex::new(Vec::new())),
        };
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let app = Router::new()
            .route("/oauth/v2/token", post(token_handler))
            .with_state(state.clone());
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{addr}/oauth/v2/token"),
            state,
            _server: server,
        }
    }

    /// Replace the remaining scripted replies.
    pub(crate) fn set_replies(&self, replies: Vec<Reply>) {
        *self.state.replies.lock().unwrap() = replies.into();
    }

    pub(crate) fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub(crate) fn hits(&self) -> usize {
        self.state.requests.lock().unwrap().len()
    }
}

async fn token_handler(
    State(state): State<MockState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> impl IntoResponse {
    let header_value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    state.requests.lock().unwrap().push(RecordedRequest {
        query,
        authorization: header_value(header::AUTHORIZATION),
        accept: header_value(header::ACCEPT),
        content_type: header_value(header::CONTENT_TYPE),
        body_len: body.len(),
    });

    let reply = {
        let mut replies = state.replies.lock().unwrap();
        if replies.len() > 1 {
            replies.pop_front().unwrap()
        } else {
            replies.front().cloned().unwrap()
        }
    };
    if !reply.delay.is_zero() {
        tokio::time::sleep(reply.delay).await;
    }
    (
        reply.status,
        [(header::CONTENT_TYPE, "application/json")],
        reply.body,
    )
}
