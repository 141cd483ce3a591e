use std::collections::BTreeMap;

use serde_json::Value;

/// Stable ids of the elements the panel knows how to wire.
pub mod ids {
    pub const WS_LOG: &str = "ws-log";
    pub const WS_CONNECT: &str = "ws-connect";
    pub const WS_DISCONNECT: &str = "ws-disconnect";
    pub const WS_MESSAGE: &str = "ws-message";
    pub const WS_SEND: &str = "ws-send";
    pub const GET_SETTINGS: &str = "get-settings";
    pub const STATUS: &str = "status";
    pub const NAME_INPUT: &str = "name-input";
    pub const GREET_BUTTON: &str = "greet-button";
    pub const GREET_RESULT: &str = "greet-result";
    pub const NUM_A: &str = "num-a";
    pub const NUM_B: &str = "num-b";
    pub const ADD_BUTTON: &str = "add-button";
    pub const ADD_RESULT: &str = "add-result";
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementKind {
    Button,
    Input,
    Output,
    Log,
    Status,
}

/// Every element of the full page, in display order.
pub const LAYOUT: &[(&str, ElementKind)] = &[
    (ids::STATUS, ElementKind::Status),
    (ids::NAME_INPUT, ElementKind::Input),
    (ids::GREET_BUTTON, ElementKind::Button),
    (ids::GREET_RESULT, ElementKind::Output),
    (ids::NUM_A, ElementKind::Input),
    (ids::NUM_B, ElementKind::Input),
    (ids::ADD_BUTTON, ElementKind::Button),
    (ids::ADD_RESULT, ElementKind::Output),
    (ids::WS_CONNECT, ElementKind::Button),
    (ids::WS_DISCONNECT, ElementKind::Button),
    (ids::WS_MESSAGE, ElementKind::Input),
    (ids::WS_SEND, ElementKind::Button),
    (ids::GET_SETTINGS, ElementKind::Button),
    (ids::WS_LOG, ElementKind::Log),
];

/// Controls that are only usable while a connection is open.
const CONNECTED_CONTROLS: &[&str] = &[ids::WS_DISCONNECT, ids::WS_MESSAGE, ids::WS_SEND, ids::GET_SETTINGS];

/// What handlers write to: the log area, the status indicator and the
/// connection-dependent controls.
pub trait Surface {
    /// Append an entry to the log area, with optional pretty-printed data.
    fn log(&mut self, message: &str, data: Option<&Value>);

    fn set_status(&mut self, text: &str);

    /// Enable or disable the controls that depend on an open connection.
    fn set_connected(&mut self, connected: bool);
}

#[derive(Clone, Debug)]
pub struct Element {
    pub kind: ElementKind,
    pub enabled: bool,
    pub value: String,
}

/// The page: a set of named elements plus the log area and status text.
#[derive(Debug, Default)]
pub struct Document {
    elements: BTreeMap<String, Element>,
    log: Vec<String>,
    rendered: usize,
    status_changed: bool,
}

impl Document {
    /// A page with every element of [`LAYOUT`].
    pub fn full() -> Self {
        Self::without(&[])
    }

    /// A page with every element except the given ids.
    pub fn without(missing: &[&str]) -> Self {
        let mut document = Self::default();
        for (id, kind) in LAYOUT {
            if !missing.contains(id) {
                document.insert(id, *kind);
            }
        }
        document
    }

    pub fn insert(&mut self, id: &str, kind: ElementKind) {
        self.elements.insert(
            id.to_string(),
            Element {
                kind,
                enabled: true,
                value: String::new(),
            },
        );
    }

    pub fn has(&self, id: &str) -> bool {
        self.elements.contains_key(id)
    }

    pub fn element(&self, id: &str) -> Option<&Element> {
        self.elements.get(id)
    }

    /// Ids of the present elements, in id order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.elements.keys().map(String::as_str)
    }

    pub fn value(&self, id: &str) -> Option<&str> {
        self.elements.get(id).map(|e| e.value.as_str())
    }

    /// Returns false when the element does not exist.
    pub fn set_value(&mut self, id: &str, value: impl Into<String>) -> bool {
        match self.elements.get_mut(id) {
            Some(element) => {
                element.value = value.into();
                if element.kind == ElementKind::Status {
                    self.status_changed = true;
                }
                true
            }
            None => false,
        }
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        self.elements.get(id).is_some_and(|e| e.enabled)
    }

    pub fn set_enabled(&mut self, id: &str, enabled: bool) {
        if let Some(element) = self.elements.get_mut(id) {
            element.enabled = enabled;
        }
    }

    pub fn status(&self) -> Option<&str> {
        self.value(ids::STATUS)
    }

    pub fn log_entries(&self) -> &[String] {
        &self.log
    }

    /// Log entries appended since the previous call.
    pub fn take_new_log_entries(&mut self) -> &[String] {
        let start = self.rendered;
        self.rendered = self.log.len();
        &self.log[start..]
    }

    /// The status text, if it changed since the previous call.
    pub fn take_status_change(&mut self) -> Option<&str> {
        if std::mem::take(&mut self.status_changed) {
            self.status()
        } else {
            None
        }
    }

    /// Whether any log entry contains `needle`.
    pub fn log_contains(&self, needle: &str) -> bool {
        self.log.iter().any(|entry| entry.contains(needle))
    }
}

impl Surface for Document {
    fn log(&mut self, message: &str, data: Option<&Value>) {
        let mut entry = message.to_string();
        if let Some(data) = data {
            let pretty = serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string());
            entry.push('\n');
            entry.push_str(&pretty);
        }

        if self.has(ids::WS_LOG) {
            log::debug!("[Panel] {}", entry);
            self.log.push(entry);
        } else {
            log::info!("[Panel] {}", entry);
        }
    }

    fn set_status(&mut self, text: &str) {
        if !self.set_value(ids::STATUS, text) {
            log::debug!("[Panel] status element missing, dropping: {}", text);
        }
    }

    fn set_connected(&mut self, connected: bool) {
        self.set_enabled(ids::WS_CONNECT, !connected);
        for id in CONNECTED_CONTROLS {
            self.set_enabled(id, connected);
        }
    }
}
