//! WebSocket Transport
//!
//! Runs one tokio-tungstenite connection per [`Transport`] and pushes
//! everything that happens on it back to the panel's event loop as
//! [`SocketEvent`]s. The tasks spawned here never touch panel state.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, sleep_until};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

/// Close code reported when the connection ends without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// How long a close frame we sent may go unanswered before the connection
/// is reported closed with [`CLOSE_ABNORMAL`].
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Identifies one transport; every connect request gets a fresh id.
pub type ConnectionId = u32;

/// Transport events, tagged with the connection they belong to.
#[derive(Clone, Debug, PartialEq)]
pub enum SocketEvent {
    Open { id: ConnectionId },
    Message { id: ConnectionId, data: Vec<u8> },
    Error { id: ConnectionId, message: String },
    Closed { id: ConnectionId, code: u16, reason: String },
}

impl SocketEvent {
    pub fn id(&self) -> ConnectionId {
        match self {
            SocketEvent::Open { id }
            | SocketEvent::Message { id, .. }
            | SocketEvent::Error { id, .. }
            | SocketEvent::Closed { id, .. } => *id,
        }
    }
}

/// Failures detected before any network activity starts.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("unsupported URL scheme '{0}' (only ws:// is supported)")]
    UnsupportedScheme(String),

    #[error("URL '{0}' has no host")]
    MissingHost(String),
}

enum Outgoing {
    Text(String),
    Close,
}

/// Write side of a running connection.
pub struct Transport {
    id: ConnectionId,
    sender: mpsc::UnboundedSender<Outgoing>,
}

impl Transport {
    /// Validate the URL and spawn the connection task.
    ///
    /// Returns immediately; the outcome arrives as `Open` or as
    /// `Error` followed by `Closed`.
    pub fn connect(
        id: ConnectionId,
        url: &str,
        events: mpsc::UnboundedSender<SocketEvent>,
    ) -> Result<Self, TransportError> {
        let parsed = url::Url::parse(url).map_err(|source| TransportError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        if parsed.scheme() != "ws" {
            return Err(TransportError::UnsupportedScheme(parsed.scheme().to_string()));
        }
        let host = parsed
            .host_str()
            .ok_or_else(|| TransportError::MissingHost(url.to_string()))?;
        let addr = format!("{}:{}", host, parsed.port().unwrap_or(80));

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_connection(id, url.to_string(), addr, rx, events));

        Ok(Self { id, sender: tx })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a text frame. Fails only once the connection task has ended.
    pub fn send_text(&self, text: String) -> Result<(), String> {
        self.sender
            .send(Outgoing::Text(text))
            .map_err(|e| format!("Failed to send: {}", e))
    }

    /// Start the closing handshake; the peer's reply arrives as `Closed`.
    pub fn close(&self) {
        if self.sender.send(Outgoing::Close).is_err() {
            log::debug!("[WebSocket {}] Close requested after task ended", self.id);
        }
    }
}

fn emit(events: &mpsc::UnboundedSender<SocketEvent>, event: SocketEvent) {
    log::debug!("[WebSocket {}] Dispatching {:?}", event.id(), event);
    if events.send(event).is_err() {
        log::debug!("Event loop is gone, dropping socket event");
    }
}

fn fail(events: &mpsc::UnboundedSender<SocketEvent>, id: ConnectionId, message: String, reason: &str) {
    emit(events, SocketEvent::Error { id, message });
    emit(
        events,
        SocketEvent::Closed {
            id,
            code: CLOSE_ABNORMAL,
            reason: reason.to_string(),
        },
    );
}

async fn run_connection(
    id: ConnectionId,
    url: String,
    addr: String,
    mut rx: mpsc::UnboundedReceiver<Outgoing>,
    events: mpsc::UnboundedSender<SocketEvent>,
) {
    log::info!("[WebSocket {}] Connecting TCP to {}", id, addr);

    let tcp_stream = match TcpStream::connect(&addr).await {
        Ok(stream) => stream,
        Err(e) => {
            log::error!("[WebSocket {}] TCP connection failed: {}", id, e);
            fail(
                &events,
                id,
                format!("TCP connection failed: {}", e),
                "Connection failed",
            );
            return;
        }
    };

    let request = match url.as_str().into_client_request() {
        Ok(req) => req,
        Err(e) => {
            log::error!("[WebSocket {}] Failed to create request: {}", id, e);
            fail(&events, id, format!("Invalid request: {}", e), "Invalid request");
            return;
        }
    };

    let ws_stream = match tokio_tungstenite::client_async(request, tcp_stream).await {
        Ok((stream, response)) => {
            log::info!(
                "[WebSocket {}] Connected successfully (status: {})",
                id,
                response.status()
            );
            stream
        }
        Err(e) => {
            log::error!("[WebSocket {}] Handshake failed: {}", id, e);
            fail(&events, id, format!("Handshake failed: {}", e), "Handshake failed");
            return;
        }
    };

    emit(&events, SocketEvent::Open { id });

    let (mut write, mut read) = ws_stream.split();
    let (close_sent_tx, mut close_sent) = oneshot::channel::<()>();

    let send_task = tokio::spawn(async move {
        while let Some(outgoing) = rx.recv().await {
            let (message, closing) = match outgoing {
                Outgoing::Text(text) => (Message::Text(text.into()), false),
                Outgoing::Close => (
                    Message::Close(Some(CloseFrame {
                        code: CloseCode::Normal,
                        reason: "".into(),
                    })),
                    true,
                ),
            };
            if let Err(e) = write.send(message).await {
                log::error!("[WebSocket {}] Send error: {}", id, e);
                break;
            }
            if closing {
                log::info!("[WebSocket {}] Close frame sent", id);
                let _ = close_sent_tx.send(());
                break;
            }
        }
    });

    // Set once our close frame is out; the peer must answer before it passes.
    let mut close_deadline: Option<Instant> = None;
    let mut close_watched = false;

    let closed = loop {
        let next = tokio::select! {
            next = read.next() => next,
            sent = &mut close_sent, if !close_watched => {
                close_watched = true;
                if sent.is_ok() {
                    close_deadline = Some(Instant::now() + CLOSE_TIMEOUT);
                }
                continue;
            }
            _ = sleep_until(close_deadline.unwrap_or_else(Instant::now)), if close_deadline.is_some() => {
                log::warn!("[WebSocket {}] No close reply within {:?}", id, CLOSE_TIMEOUT);
                emit(
                    &events,
                    SocketEvent::Closed {
                        id,
                        code: CLOSE_ABNORMAL,
                        reason: "Close handshake timed out".to_string(),
                    },
                );
                break true;
            }
        };

        match next {
            Some(Ok(Message::Text(text))) => {
                emit(
                    &events,
                    SocketEvent::Message {
                        id,
                        data: text.as_str().as_bytes().to_vec(),
                    },
                );
            }
            Some(Ok(Message::Binary(data))) => {
                log::debug!("[WebSocket {}] Received binary ({} bytes)", id, data.len());
                emit(
                    &events,
                    SocketEvent::Message {
                        id,
                        data: data.to_vec(),
                    },
                );
            }
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                // Handled by tungstenite
            }
            Some(Ok(Message::Close(frame))) => {
                let (code, reason): (u16, String) = frame
                    .map(|f| (f.code.into(), f.reason.as_str().to_owned()))
                    .unwrap_or((1005, String::new()));
                log::info!("[WebSocket {}] Received close: {} {}", id, code, reason);
                emit(&events, SocketEvent::Closed { id, code, reason });

                // Polling on lets tungstenite flush its queued close reply.
                let drained = tokio::time::timeout(CLOSE_TIMEOUT, async {
                    while let Some(Ok(_)) = read.next().await {}
                })
                .await;
                if drained.is_err() {
                    log::debug!("[WebSocket {}] Peer kept the socket open after close", id);
                }
                break true;
            }
            Some(Ok(Message::Frame(_))) => {}
            Some(Err(e)) => {
                log::error!("[WebSocket {}] Read error: {}", id, e);
                fail(&events, id, e.to_string(), "Connection error");
                break true;
            }
            None => break false,
        }
    };

    if !closed {
        log::info!("[WebSocket {}] Stream ended without a close frame", id);
        emit(
            &events,
            SocketEvent::Closed {
                id,
                code: CLOSE_ABNORMAL,
                reason: "Connection lost".to_string(),
            },
        );
    }

    send_task.abort();
    log::info!("[WebSocket {}] Connection ended", id);
}
