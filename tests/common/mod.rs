//! In-process relay server and helpers shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use relay_panel::panel::Panel;
use relay_panel::socket::SocketEvent;

pub const WAIT: Duration = Duration::from_secs(5);

/// Text payloads that make the server misbehave on purpose.
pub const SEND_GARBAGE: &str = "__garbage__";
pub const SEND_ACK_OK: &str = "__ack_ok__";
pub const CLOSE_WITH_REASON: &str = "__close__";

/// A relay that answers like the reference server: settings for
/// `GET_SETTINGS_REQUEST`, a SUCCESS ack for action reports and an ERROR
/// for every other kind.
pub struct TestServer {
    pub url: String,
    shared: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    received: Mutex<Vec<Value>>,
    close_frames: AtomicUsize,
    swallow_close: bool,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::spawn(false).await
    }

    /// A relay that reads the client's close frame and never answers it.
    pub async fn start_swallowing_close() -> Self {
        Self::spawn(true).await
    }

    async fn spawn(swallow_close: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let shared = Arc::new(Shared {
            swallow_close,
            ..Shared::default()
        });

        let state = shared.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, state.clone()));
            }
        });

        Self { url, shared }
    }

    /// Every JSON message received so far, across connections.
    pub fn received(&self) -> Vec<Value> {
        self.shared.received.lock().unwrap().clone()
    }

    pub fn received_kinds(&self) -> Vec<String> {
        self.received()
            .iter()
            .filter_map(|m| m["type"].as_str().map(str::to_string))
            .collect()
    }

    /// Close frames received from clients, replies included.
    pub fn close_frames(&self) -> usize {
        self.shared.close_frames.load(Ordering::SeqCst)
    }
}

async fn serve(stream: TcpStream, shared: Arc<Shared>) {
    let Ok(mut ws) = accept_async(stream).await else {
        return;
    };

    while let Some(Ok(message)) = ws.next().await {
        let text = match message {
            Message::Text(text) => text.as_str().to_string(),
            Message::Close(_) => {
                shared.close_frames.fetch_add(1, Ordering::SeqCst);
                if shared.swallow_close {
                    std::future::pending::<()>().await;
                }
                // Keep polling so the close reply gets flushed.
                continue;
            }
            _ => continue,
        };

        let Ok(value) = serde_json::from_str::<Value>(&text) else {
            let reply = json!({ "type": "ERROR", "payload": { "message": "Invalid JSON format" }, "status": "FAILED" });
            let _ = ws.send(Message::text(reply.to_string())).await;
            continue;
        };
        shared.received.lock().unwrap().push(value.clone());

        let kind = value["type"].as_str().unwrap_or_default().to_string();
        let custom = value["payload"]["text"].as_str().unwrap_or_default();
        let reply = match (kind.as_str(), custom) {
            ("CUSTOM_TEXT_MESSAGE", SEND_GARBAGE) => Message::text("this is {not json"),
            ("CUSTOM_TEXT_MESSAGE", SEND_ACK_OK) => Message::text(
                json!({ "type": "ACK", "original_type": "CUSTOM_TEXT_MESSAGE", "status": "ok" }).to_string(),
            ),
            ("CUSTOM_TEXT_MESSAGE", CLOSE_WITH_REASON) => {
                let _ = ws
                    .close(Some(CloseFrame {
                        code: CloseCode::Library(4000),
                        reason: "bye".into(),
                    }))
                    .await;
                continue;
            }
            ("GET_SETTINGS_REQUEST", _) => Message::text(
                json!({
                    "type": "SETTINGS_RESPONSE",
                    "payload": { "obs_host": "localhost", "capture_delay": 100 }
                })
                .to_string(),
            ),
            ("WASM_ACTION_REPORT", _) => Message::text(
                json!({ "type": "ACK", "original_type": "WASM_ACTION_REPORT", "status": "SUCCESS" }).to_string(),
            ),
            _ => Message::text(
                json!({
                    "type": "ERROR",
                    "original_type": kind,
                    "payload": { "message": "Unknown message type received" },
                    "status": "FAILED"
                })
                .to_string(),
            ),
        };

        if ws.send(reply).await.is_err() {
            break;
        }
    }
}

/// Apply transport events until `done` holds, failing the test after [`WAIT`].
pub async fn pump_until(panel: &mut Panel, mut done: impl FnMut(&Panel) -> bool) {
    tokio::time::timeout(WAIT, async {
        while !done(&*panel) {
            panel.pump_socket().await.expect("socket event channel closed");
        }
    })
    .await
    .expect("timed out waiting for socket events");
}

/// Apply transport events until one matching `wanted` has been handled.
pub async fn pump_until_event(panel: &mut Panel, mut wanted: impl FnMut(&SocketEvent) -> bool) -> SocketEvent {
    tokio::time::timeout(WAIT, async {
        loop {
            let event = panel.pump_socket().await.expect("socket event channel closed");
            if wanted(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for socket event")
}
