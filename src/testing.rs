//! In-process stand-in for the agent service, used by the client tests.

use crate::protocol::StagePayload;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Json;
use futures::StreamExt;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Clone, Copy, PartialEq, Eq)]
enum SessionMode {
    Ok,
    Failing,
    Malformed,
}

pub struct MockBackend {
    payloads: Vec<StagePayload>,
    hold_open: bool,
    session_mode: SessionMode,
}

struct BackendState {
    payloads: Vec<StagePayload>,
    hold_open: bool,
    session_mode: SessionMode,
    sessions: Mutex<HashSet<String>>,
    requested_engines: Mutex<Vec<Option<String>>>,
    stream_requests: Mutex<Vec<(String, String)>>,
}

pub struct RunningBackend {
    base_url: String,
    state: Arc<BackendState>,
}

impl MockBackend {
    pub fn new(payloads: Vec<StagePayload>) -> Self {
        Self {
            payloads,
            hold_open: false,
            session_mode: SessionMode::Ok,
        }
    }

    /// Keep the event stream open after the scripted payloads.
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    pub fn failing_session(mut self) -> Self {
        self.session_mode = SessionMode::Failing;
        self
    }

    pub fn malformed_session(mut self) -> Self {
        self.session_mode = SessionMode::Malformed;
        self
    }

    pub async fn start(self) -> RunningBackend {
        let state = Arc::new(BackendState {
            payloads: self.payloads,
            hold_open: self.hold_open,
            session_mode: self.session_mode,
            sessions: Mutex::new(HashSet::new()),
            requested_engines: Mutex::new(Vec::new()),
            stream_requests: Mutex::new(Vec::new()),
        });

        let app = axum::Router::new()
            .route("/api/session", post(create_session))
            .route("/api/agent-stream", get(agent_stream))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        RunningBackend {
            base_url: format!("http://{}", addr),
            state,
        }
    }
}

impl RunningBackend {
    pub fn base_url(&self) -> String {
        self.base_url.clone()
    }

    pub fn requested_engines(&self) -> Vec<Option<String>> {
        self.state.requested_engines.lock().unwrap().clone()
    }

    pub fn stream_requests(&self) -> Vec<(String, String)> {
        self.state.stream_requests.lock().unwrap().clone()
    }
}

async fn create_session(State(state): State<Arc<BackendState>>, body: String) -> Response {
    let engine = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|value| value.get("engine").and_then(|e| e.as_str()).map(String::from));
    state.requested_engines.lock().unwrap().push(engine.clone());

    match state.session_mode {
        SessionMode::Failing => {
            (StatusCode::INTERNAL_SERVER_ERROR, "backend down").into_response()
        }
        SessionMode::Malformed => Json(json!({ "id": "wrong-field" })).into_response(),
        SessionMode::Ok => {
            let session_id = Uuid::new_v4().to_string();
            state.sessions.lock().unwrap().insert(session_id.clone());
            Json(json!({
                "sessionId": session_id,
                "engine": engine.unwrap_or_else(|| "local_multi".to_string()),
                "availableEngines": ["api_single", "local_multi"],
            }))
            .into_response()
        }
    }
}

async fn agent_stream(
    State(state): State<Arc<BackendState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let session_id = params.get("sessionId").cloned().unwrap_or_default();
    let message = params.get("message").cloned().unwrap_or_default();
    if !state.sessions.lock().unwrap().contains(&session_id) {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "Unknown session" })))
            .into_response();
    }
    state
        .stream_requests
        .lock()
        .unwrap()
        .push((session_id, message));

    let events = state.payloads.clone().into_iter().map(|payload| {
        let data = serde_json::to_string(&payload).unwrap_or_default();
        Ok::<Event, Infallible>(Event::default().data(data))
    });
    let scripted = futures::stream::iter(events);

    if state.hold_open {
        Sse::new(scripted.chain(futures::stream::pending()).boxed()).into_response()
    } else {
        Sse::new(scripted.boxed()).into_response()
    }
}
