//! Client side of the chat WebSocket, with bounded reconnects.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use crate::models::envelope::{ClientMessage, ServerMessage};

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("invalid server URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("unsupported URL scheme: {0}")]
    Scheme(String),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("could not encode or decode frame: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("gave up after {0} connection attempts")]
    Exhausted(u32),

    #[error("connection closed")]
    Closed,
}

#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server root, e.g. `ws://localhost:8000` or `http://localhost:8000`.
    pub base_url: String,
    pub max_attempts: u32,
    /// Delay before the n-th retry is `retry_delay * n`.
    pub retry_delay: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            base_url: "ws://localhost:8000".into(),
            max_attempts: 5,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// `{base}/ws/chat/{session_id}[?patient_id=...]`, with http(s) mapped to ws(s).
pub fn endpoint(base_url: &str, session_id: &str, patient_id: Option<&str>) -> Result<Url, ConnectionError> {
    let mut url = Url::parse(base_url)?;
    let scheme = match url.scheme() {
        "ws" | "http" => "ws",
        "wss" | "https" => "wss",
        other => return Err(ConnectionError::Scheme(other.to_string())),
    };
    if url.scheme() != scheme && url.set_scheme(scheme).is_err() {
        return Err(ConnectionError::Scheme(url.scheme().to_string()));
    }

    url.path_segments_mut()
        .map_err(|_| ConnectionError::Scheme(base_url.to_string()))?
        .pop_if_empty()
        .extend(["ws", "chat", session_id]);
    if let Some(patient_id) = patient_id {
        url.query_pairs_mut().append_pair("patient_id", patient_id);
    }
    Ok(url)
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct ChatConnection {
    url: Url,
    config: ConnectionConfig,
    socket: Socket,
}

impl ChatConnection {
    pub async fn connect(
        config: ConnectionConfig,
        session_id: &str,
        patient_id: Option<&str>,
    ) -> Result<Self, ConnectionError> {
        let url = endpoint(&config.base_url, session_id, patient_id)?;
        let socket = open(&url, &config).await?;
        Ok(Self {
            url,
            config,
            socket,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub async fn send(&mut self, message: &ClientMessage) -> Result<(), ConnectionError> {
        let text = serde_json::to_string(message)?;
        self.socket.send(Message::Text(text)).await?;
        Ok(())
    }

    /// Next server frame. `None` once the server has closed the connection.
    pub async fn next_frame(&mut self) -> Option<Result<ServerMessage, ConnectionError>> {
        loop {
            let message = match self.socket.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(e.into())),
            };
            match message {
                Message::Text(text) => {
                    return Some(serde_json::from_str(&text).map_err(ConnectionError::from));
                }
                Message::Close(frame) => {
                    debug!(?frame, "server closed the connection");
                    return None;
                }
                Message::Binary(_) => warn!("ignoring binary frame"),
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    /// Replace the socket with a fresh connection to the same endpoint.
    pub async fn reconnect(&mut self) -> Result<(), ConnectionError> {
        self.socket = open(&self.url, &self.config).await?;
        Ok(())
    }

    pub async fn close(mut self) -> Result<(), ConnectionError> {
        match self.socket.close(None).await {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

async fn open(url: &Url, config: &ConnectionConfig) -> Result<Socket, ConnectionError> {
    let attempts = config.max_attempts.max(1);
    for attempt in 1..=attempts {
        match connect_async(url.as_str()).await {
            Ok((socket, _)) => {
                info!(%url, attempt, "connected");
                return Ok(socket);
            }
            Err(e) if attempt < attempts => {
                let delay = config.retry_delay * attempt;
                warn!(%url, attempt, error = %e, ?delay, "connection failed, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                warn!(%url, attempt, error = %e, "connection failed");
            }
        }
    }
    Err(ConnectionError::Exhausted(attempts))
}
