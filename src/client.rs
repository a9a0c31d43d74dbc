use crate::protocol::{SessionCreateRequest, SessionCreateResponse, StagePayload};
use crate::sse::SseDecoder;
use crate::stream::{StreamItem, Subscription};
use futures::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::{Client as HttpClient, RequestBuilder, Url};
use std::error::Error;
use tokio::sync::mpsc;

const STREAM_BUFFER: usize = 64;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub engine: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("session request returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("malformed session response: {0}")]
    Malformed(String),
}

#[derive(Clone)]
pub struct ClientSession {
    base_url: String,
    session_id: String,
    engine: Option<String>,
    requested_engine: Option<String>,
    available_engines: Vec<String>,
    http: HttpClient,
}

type ClientResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("base_url", &self.base_url)
            .field("session_id", &self.session_id)
            .field("engine", &self.engine)
            .finish()
    }
}

impl ClientSession {
    /// Bootstraps a session; the only request made before a prompt can be sent.
    pub async fn connect(config: &ClientConfig) -> Result<Self, SessionError> {
        let base_url = normalize_base_url(&config.base_url);
        let http = HttpClient::new();

        let mut request = http.post(format!("{}/api/session", base_url));
        if config.engine.is_some() {
            request = request.json(&SessionCreateRequest {
                engine: config.engine.clone(),
            });
        }
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SessionError::Status { status, body });
        }

        let text = response.text().await?;
        let body: SessionCreateResponse =
            serde_json::from_str(&text).map_err(|err| SessionError::Malformed(err.to_string()))?;
        if body.session_id.trim().is_empty() {
            return Err(SessionError::Malformed("empty sessionId".to_string()));
        }

        tracing::info!(
            session_id = %body.session_id,
            engine = body.engine.as_deref().unwrap_or("default"),
            "session created"
        );

        Ok(Self {
            base_url,
            session_id: body.session_id,
            engine: body.engine.or_else(|| config.engine.clone()),
            requested_engine: config.engine.clone(),
            available_engines: body.available_engines,
            http,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Engine the backend reports for this session, if any.
    pub fn engine(&self) -> Option<&str> {
        self.engine.as_deref()
    }

    pub fn available_engines(&self) -> &[String] {
        &self.available_engines
    }

    pub fn stream_url(&self, message: &str) -> ClientResult<Url> {
        let mut params = vec![
            ("sessionId", self.session_id.as_str()),
            ("message", message),
        ];
        if let Some(engine) = self.requested_engine.as_deref() {
            params.push(("engine", engine));
        }
        let url = Url::parse_with_params(&format!("{}/api/agent-stream", self.base_url), params)?;
        Ok(url)
    }

    /// Opens one event stream for `message`. Must be called within a tokio runtime.
    pub fn open_stream(&self, message: &str) -> ClientResult<Subscription> {
        let url = self.stream_url(message)?;
        tracing::debug!(%url, "opening agent stream");

        let request = self.http.get(url).header(ACCEPT, "text/event-stream");
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let pump = tokio::spawn(pump_events(request, tx));
        Ok(Subscription::new(rx, pump))
    }
}

async fn pump_events(request: RequestBuilder, tx: mpsc::Sender<StreamItem>) {
    let reason = match read_events(request, &tx).await {
        Ok(()) => "stream closed by server".to_string(),
        Err(err) => err.to_string(),
    };
    let _ = tx.send(StreamItem::Disconnected(reason)).await;
}

async fn read_events(request: RequestBuilder, tx: &mpsc::Sender<StreamItem>) -> ClientResult<()> {
    let response = request.send().await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(format!("Failed to open stream: {} - {}", status, body).into());
    }

    let mut stream = response.bytes_stream();
    let mut decoder = SseDecoder::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        for data in decoder.push(&chunk) {
            match serde_json::from_str::<StagePayload>(&data) {
                Ok(payload) => {
                    if tx.send(StreamItem::Payload(payload)).await.is_err() {
                        // Subscriber is gone; nothing left to deliver to.
                        return Ok(());
                    }
                }
                Err(err) => tracing::warn!(%err, %data, "skipping malformed stage payload"),
            }
        }
    }

    Ok(())
}

fn normalize_base_url(value: &str) -> String {
    value.trim_end_matches('/').to_string()
}
