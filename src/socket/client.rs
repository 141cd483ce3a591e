//! Messaging Client
//!
//! Owns the single connection handle and drives its state machine from the
//! panel's event loop. All output goes to a [`Surface`].

use serde_json::json;
use tokio::sync::mpsc;

use crate::panel::Surface;
use crate::socket::manager::{ConnectionId, SocketEvent, Transport};
use crate::socket::protocol::{OutboundMessage, ServerMessage, parse_frame};

/// Ready state of the connection handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Absent,
    Connecting,
    Open,
    Closing,
}

struct ConnectionHandle {
    transport: Transport,
    state: ConnectionState,
}

pub struct SocketClient {
    url: String,
    handle: Option<ConnectionHandle>,
    events: mpsc::UnboundedSender<SocketEvent>,
    next_id: ConnectionId,
}

impl SocketClient {
    /// Transport events for connections made by this client are delivered
    /// to `events`; feed them back through [`SocketClient::handle_event`].
    pub fn new(url: impl Into<String>, events: mpsc::UnboundedSender<SocketEvent>) -> Self {
        Self {
            url: url.into(),
            handle: None,
            events,
            next_id: 1,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.handle
            .as_ref()
            .map(|h| h.state)
            .unwrap_or(ConnectionState::Absent)
    }

    /// Id of the live connection, if any.
    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.handle.as_ref().map(|h| h.transport.id())
    }

    pub fn connect(&mut self, ui: &mut impl Surface) {
        if self.handle.is_some() {
            ui.log("Already connected or connecting.", None);
            return;
        }

        ui.log(&format!("Attempting to connect to {}...", self.url), None);

        let id = self.next_id;
        self.next_id += 1;

        match Transport::connect(id, &self.url, self.events.clone()) {
            Ok(transport) => {
                self.handle = Some(ConnectionHandle {
                    transport,
                    state: ConnectionState::Connecting,
                });
            }
            Err(e) => {
                log::error!("Error creating WebSocket: {}", e);
                ui.log(&format!("Error creating WebSocket: {}", e), None);
                ui.set_status(&format!("Error creating WebSocket: {}", e));
                ui.set_connected(false);
            }
        }
    }

    /// Ask the transport to close. State is cleaned up when the close
    /// event arrives.
    pub fn disconnect(&mut self, ui: &mut impl Surface) {
        match self.handle.as_mut() {
            Some(handle) if handle.state == ConnectionState::Open => {
                ui.log("Disconnecting WebSocket...", None);
                handle.state = ConnectionState::Closing;
                handle.transport.close();
            }
            _ => ui.log("WebSocket not connected or already closing.", None),
        }
    }

    /// Serialize and queue `message`. Returns whether it was handed to the
    /// transport; every failure is logged and swallowed.
    pub fn send(&mut self, message: &OutboundMessage, ui: &mut impl Surface) -> bool {
        let Some(handle) = self.handle.as_ref().filter(|h| h.state == ConnectionState::Open) else {
            ui.log("WebSocket not connected. Cannot send structured message.", None);
            return false;
        };

        let text = match serde_json::to_string(message) {
            Ok(text) => text,
            Err(e) => {
                log::error!("Error serializing message: {}", e);
                ui.log(&format!("Error serializing message: {}", e), None);
                return false;
            }
        };

        if let Err(e) = handle.transport.send_text(text) {
            log::error!("[WebSocket {}] {}", handle.transport.id(), e);
            ui.log(&format!("Error sending message: {}", e), None);
            return false;
        }

        let logged = serde_json::to_value(message).ok();
        ui.log("Sent structured message:", logged.as_ref());
        true
    }

    /// Apply one transport event. Events from connections other than the
    /// live one are ignored.
    pub fn handle_event(&mut self, event: SocketEvent, ui: &mut impl Surface) {
        if self.connection_id() != Some(event.id()) {
            log::debug!("Ignoring event for stale connection {}", event.id());
            return;
        }

        match event {
            SocketEvent::Open { .. } => self.on_open(ui),
            SocketEvent::Message { data, .. } => {
                dispatch(&data, ui);
            }
            SocketEvent::Error { message, .. } => self.on_error(&message, ui),
            SocketEvent::Closed { code, reason, .. } => self.on_close(code, &reason, ui),
        }
    }

    /// Close any live connection without waiting for the peer.
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.transport.close();
        }
    }

    fn on_open(&mut self, ui: &mut impl Surface) {
        if let Some(handle) = self.handle.as_mut() {
            if handle.state == ConnectionState::Connecting {
                handle.state = ConnectionState::Open;
            }
        }
        ui.log("WebSocket connection established.", None);
        ui.set_connected(true);
        ui.set_status("WebSocket connected.");
    }

    fn on_error(&mut self, message: &str, ui: &mut impl Surface) {
        ui.log(&format!("WebSocket error: {}", message), None);
        ui.set_status("WebSocket error.");
    }

    fn on_close(&mut self, code: u16, reason: &str, ui: &mut impl Surface) {
        let reason = if reason.is_empty() { "N/A" } else { reason };
        ui.log(
            &format!("WebSocket connection closed. Code: {}, Reason: \"{}\"", code, reason),
            None,
        );
        ui.set_connected(false);
        self.handle = None;
        ui.set_status(&format!("WebSocket disconnected. Code: {}, Reason: {}", code, reason));
    }
}

/// Decode an inbound frame and route it by kind. Never touches connection
/// state; returns the routed message, or `None` if the frame was unreadable.
pub fn dispatch(data: &[u8], ui: &mut impl Surface) -> Option<ServerMessage> {
    let raw = String::from_utf8_lossy(data);
    ui.log(&format!("Received raw: {}", raw), None);

    let value = match parse_frame(data) {
        Ok(value) => value,
        Err(e) => {
            log::warn!("Failed to parse frame from server: {}", e);
            ui.log(
                "Failed to parse JSON from server:",
                Some(&json!({ "error": e.to_string(), "raw": raw })),
            );
            return None;
        }
    };
    ui.log("Parsed ServerMessage:", Some(&value));
    let message = ServerMessage::classify(value);

    match &message {
        ServerMessage::SettingsResponse { payload } => {
            ui.log("Received SETTINGS_RESPONSE. Payload:", payload.as_ref());
        }
        ServerMessage::Ack {
            original_kind,
            status,
        } => {
            ui.log(
                &format!(
                    "Received ACK for original type: {}, Status: {}",
                    original_kind.as_deref().unwrap_or("N/A"),
                    status.as_deref().unwrap_or("N/A")
                ),
                None,
            );
        }
        ServerMessage::Error {
            original_kind,
            payload,
        } => {
            ui.log(
                &format!(
                    "Received ERROR from server. Original type: {}, Details:",
                    original_kind.as_deref().unwrap_or("N/A")
                ),
                payload.as_ref(),
            );
        }
        ServerMessage::Unknown(value) => {
            ui.log("Received unknown message type from server:", Some(value));
        }
    }

    Some(message)
}
