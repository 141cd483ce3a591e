//! Panel event loop
//!
//! One task owns the document, the socket client and the compute module.
//! UI events and transport events are handled strictly one at a time.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::bridge::{self, ComputeModule};
use crate::config::PanelConfig;
use crate::panel::document::{Document, Surface, ids};
use crate::socket::{ActionReport, ConnectionState, OutboundMessage, SocketClient, SocketEvent};

/// How long shutdown waits for the connection to report closed. Longer than
/// the transport's own close timeout.
pub const CLOSE_GRACE: Duration = Duration::from_secs(3);

/// Something the user did to an element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UiEvent {
    Click(String),
    Input { id: String, value: String },
    Key { id: String, key: String },
}

impl UiEvent {
    pub fn click(id: &str) -> Self {
        UiEvent::Click(id.to_string())
    }

    pub fn input(id: &str, value: impl Into<String>) -> Self {
        UiEvent::Input {
            id: id.to_string(),
            value: value.into(),
        }
    }

    pub fn key(id: &str, key: impl Into<String>) -> Self {
        UiEvent::Key {
            id: id.to_string(),
            key: key.into(),
        }
    }
}

/// Requests from a front end to the running panel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request {
    Ui(UiEvent),
    ShowStatus,
    ShowLog,
    Quit,
}

/// Output side of a front end.
pub trait Renderer {
    /// Called after every handled event.
    fn render(&mut self, document: &mut Document);
    fn show_status(&mut self, document: &Document);
    fn show_log(&mut self, document: &Document);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Trigger {
    Click,
    Enter,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Connect,
    Disconnect,
    SendText,
    GetSettings,
    Greet,
    Add,
}

pub struct Panel {
    document: Document,
    socket: SocketClient,
    socket_events: mpsc::UnboundedReceiver<SocketEvent>,
    bridge: Option<ComputeModule>,
    bindings: HashMap<(String, Trigger), Action>,
}

impl Panel {
    /// Initialize the compute module, then wire every control the page has.
    pub async fn start(config: &PanelConfig) -> Self {
        let missing: Vec<&str> = config.missing_elements.iter().map(String::as_str).collect();
        let mut document = Document::without(&missing);

        let bridge = bridge::initialize(&config.module, &config.start_hook, &mut document).await;

        let (tx, rx) = mpsc::unbounded_channel();
        let mut panel = Self {
            document,
            socket: SocketClient::new(config.ws_url.clone(), tx),
            socket_events: rx,
            bridge,
            bindings: HashMap::new(),
        };

        if panel.bridge.is_some() {
            panel.bind_compute_controls();
        }
        panel.bind_socket_controls();
        panel
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.socket.state()
    }

    pub fn socket(&self) -> &SocketClient {
        &self.socket
    }

    pub fn has_bridge(&self) -> bool {
        self.bridge.is_some()
    }

    /// The action bound to clicking `id`, if any.
    pub fn click_action(&self, id: &str) -> Option<Action> {
        self.bindings.get(&(id.to_string(), Trigger::Click)).copied()
    }

    fn bind(&mut self, id: &str, trigger: Trigger, action: Action) {
        self.bindings.insert((id.to_string(), trigger), action);
    }

    fn bind_compute_controls(&mut self) {
        let greet = [ids::NAME_INPUT, ids::GREET_BUTTON, ids::GREET_RESULT];
        if greet.iter().all(|id| self.document.has(id)) {
            self.bind(ids::GREET_BUTTON, Trigger::Click, Action::Greet);
        } else {
            log::error!("Greet UI elements not found.");
            self.document.set_status("Error: Greet UI elements missing.");
        }

        let add = [ids::NUM_A, ids::NUM_B, ids::ADD_BUTTON, ids::ADD_RESULT];
        if add.iter().all(|id| self.document.has(id)) {
            self.bind(ids::ADD_BUTTON, Trigger::Click, Action::Add);
        } else {
            log::error!("Add UI elements not found.");
            self.document.set_status("Error: Add UI elements missing.");
        }
    }

    fn bind_socket_controls(&mut self) {
        if self.document.has(ids::WS_CONNECT) {
            self.bind(ids::WS_CONNECT, Trigger::Click, Action::Connect);
        } else {
            log::error!("WebSocket connect button not found.");
        }

        if self.document.has(ids::WS_DISCONNECT) {
            self.bind(ids::WS_DISCONNECT, Trigger::Click, Action::Disconnect);
        } else {
            log::error!("WebSocket disconnect button not found.");
        }

        if self.document.has(ids::WS_SEND) && self.document.has(ids::WS_MESSAGE) {
            self.bind(ids::WS_SEND, Trigger::Click, Action::SendText);
            self.bind(ids::WS_MESSAGE, Trigger::Enter, Action::SendText);
        } else {
            log::error!("WebSocket send button or message input not found.");
        }

        if self.document.has(ids::GET_SETTINGS) {
            self.bind(ids::GET_SETTINGS, Trigger::Click, Action::GetSettings);
        } else {
            log::error!("Get settings button not found.");
        }

        self.document.set_connected(false);
    }

    /// Apply one UI event to completion.
    pub async fn handle_ui(&mut self, event: UiEvent) {
        let (id, trigger) = match event {
            UiEvent::Input { id, value } => {
                match self.document.element(&id).map(|e| e.enabled) {
                    Some(true) => {
                        self.document.set_value(&id, value);
                    }
                    Some(false) => log::debug!("Ignoring input to disabled element {}", id),
                    None => log::debug!("Ignoring input to missing element {}", id),
                }
                return;
            }
            UiEvent::Click(id) => (id, Trigger::Click),
            UiEvent::Key { id, key } if key == "Enter" => (id, Trigger::Enter),
            UiEvent::Key { .. } => return,
        };

        if !self.document.is_enabled(&id) {
            log::debug!("Ignoring {:?} on disabled or missing element {}", trigger, id);
            return;
        }

        let Some(action) = self.bindings.get(&(id.clone(), trigger)).copied() else {
            log::debug!("No handler for {:?} on {}", trigger, id);
            return;
        };

        self.perform(action).await;
    }

    /// Apply one transport event to completion.
    pub fn handle_socket(&mut self, event: SocketEvent) {
        self.socket.handle_event(event, &mut self.document);
    }

    /// Wait for the next transport event and apply it.
    pub async fn pump_socket(&mut self) -> Option<SocketEvent> {
        let event = self.socket_events.recv().await?;
        self.handle_socket(event.clone());
        Some(event)
    }

    /// Process requests until `Quit` or until the front end goes away.
    pub async fn run(mut self, mut requests: mpsc::UnboundedReceiver<Request>, renderer: &mut impl Renderer) {
        renderer.render(&mut self.document);

        loop {
            tokio::select! {
                request = requests.recv() => match request {
                    Some(Request::Ui(event)) => self.handle_ui(event).await,
                    Some(Request::ShowStatus) => renderer.show_status(&self.document),
                    Some(Request::ShowLog) => renderer.show_log(&self.document),
                    Some(Request::Quit) | None => break,
                },
                Some(event) = self.socket_events.recv() => self.handle_socket(event),
            }
            renderer.render(&mut self.document);
        }

        self.shutdown().await;
        renderer.render(&mut self.document);
    }

    /// Close any live connection, waiting up to [`CLOSE_GRACE`] for an open
    /// one to finish the close handshake.
    pub async fn shutdown(&mut self) {
        if self.socket.state() == ConnectionState::Open {
            log::info!("Closing connection on shutdown");
            self.socket.disconnect(&mut self.document);

            let closed = tokio::time::timeout(CLOSE_GRACE, async {
                while self.socket.state() != ConnectionState::Absent {
                    if self.pump_socket().await.is_none() {
                        break;
                    }
                }
            })
            .await;
            if closed.is_err() {
                log::warn!("Server did not complete the close handshake");
            }
        }
        self.socket.shutdown();
    }

    async fn perform(&mut self, action: Action) {
        log::debug!("Performing {:?}", action);
        match action {
            Action::Connect => self.socket.connect(&mut self.document),
            Action::Disconnect => self.socket.disconnect(&mut self.document),
            Action::SendText => self.send_text(),
            Action::GetSettings => {
                self.socket.send(&OutboundMessage::get_settings(), &mut self.document);
            }
            Action::Greet => self.greet().await,
            Action::Add => self.add().await,
        }
    }

    fn send_text(&mut self) {
        let text = self.document.value(ids::WS_MESSAGE).unwrap_or_default().to_string();
        if text.trim().is_empty() {
            self.document.log("Cannot send empty text message.", None);
            return;
        }
        self.socket
            .send(&OutboundMessage::custom_text(text), &mut self.document);
        self.document.set_value(ids::WS_MESSAGE, "");
    }

    /// Send an action report. Without an open connection this only logs the
    /// client's notice; the calling action still succeeds.
    fn report(&mut self, report: ActionReport) {
        self.socket
            .send(&OutboundMessage::action_report(&report), &mut self.document);
    }

    async fn greet(&mut self) {
        let Some(bridge) = self.bridge.as_ref() else {
            return;
        };

        let name = self.document.value(ids::NAME_INPUT).unwrap_or_default().to_string();
        if name.is_empty() {
            self.document.set_value(ids::GREET_RESULT, "Please enter a name.");
            return;
        }

        match bridge.compute_text(&name).await {
            Ok(result) => {
                self.document.set_value(ids::GREET_RESULT, result.as_str());
                self.document.set_status("Greet function called.");
                self.report(ActionReport::greet(&name, &result));
            }
            Err(e) => {
                log::error!("Error calling greet: {}", e);
                self.document.set_value(ids::GREET_RESULT, format!("Error: {}", e));
                self.document.set_status(&format!("Error calling greet: {}", e));
            }
        }
    }

    async fn add(&mut self) {
        let Some(bridge) = self.bridge.as_ref() else {
            return;
        };

        let a = self.document.value(ids::NUM_A).and_then(parse_int);
        let b = self.document.value(ids::NUM_B).and_then(parse_int);
        let (Some(a), Some(b)) = (a, b) else {
            self.document.set_value(ids::ADD_RESULT, "Please enter valid numbers.");
            return;
        };

        match bridge.compute_sum(a, b).await {
            Ok(result) => {
                self.document.set_value(ids::ADD_RESULT, result.to_string());
                self.document.set_status("Add function called.");
                self.report(ActionReport::add(a, b, result));
            }
            Err(e) => {
                log::error!("Error calling add: {}", e);
                self.document.set_value(ids::ADD_RESULT, format!("Error: {}", e));
                self.document.set_status(&format!("Error calling add: {}", e));
            }
        }
    }
}

/// Lenient integer parse: surrounding whitespace, an optional sign and the
/// leading decimal digits; anything after the digits is ignored.
pub fn parse_int(input: &str) -> Option<i32> {
    let s = input.trim();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let magnitude: i64 = rest[..digits].parse().ok()?;
    let value = if negative { -magnitude } else { magnitude };
    i32::try_from(value).ok()
}
