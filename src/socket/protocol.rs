//! Wire Protocol
//!
//! One JSON object per text frame, tagged by a `type` field.

use serde::Serialize;
use serde_json::{Value, json};

/// Outbound kind for reports of compute module calls.
pub const WASM_ACTION_REPORT: &str = "WASM_ACTION_REPORT";
/// Outbound kind for free text typed by the user.
pub const CUSTOM_TEXT_MESSAGE: &str = "CUSTOM_TEXT_MESSAGE";
/// Outbound kind asking the server for its settings.
pub const GET_SETTINGS_REQUEST: &str = "GET_SETTINGS_REQUEST";

pub const SETTINGS_RESPONSE: &str = "SETTINGS_RESPONSE";
pub const ACK: &str = "ACK";
pub const ERROR: &str = "ERROR";

/// A message sent to the server.
///
/// The kind is free text and is never checked against the kinds the server
/// understands.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OutboundMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl OutboundMessage {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn custom_text(text: impl Into<String>) -> Self {
        Self::new(CUSTOM_TEXT_MESSAGE).with_payload(json!({ "text": text.into() }))
    }

    pub fn get_settings() -> Self {
        Self::new(GET_SETTINGS_REQUEST)
    }

    pub fn action_report(report: &ActionReport) -> Self {
        Self {
            kind: WASM_ACTION_REPORT.to_string(),
            payload: serde_json::to_value(report).ok(),
        }
    }
}

/// Payload describing one successful compute module call.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ActionReport {
    #[serde(rename = "actionName")]
    pub action_name: String,
    pub input: Value,
    pub output: Value,
}

impl ActionReport {
    pub fn greet(name: &str, output: &str) -> Self {
        Self {
            action_name: "greet".to_string(),
            input: json!({ "name": name }),
            output: json!(output),
        }
    }

    pub fn add(a: i32, b: i32, output: i32) -> Self {
        Self {
            action_name: "add".to_string(),
            input: json!({ "a": a, "b": b }),
            output: json!(output),
        }
    }
}

/// A message received from the server, as loosely shaped as the wire allows.
///
/// Unknown fields are ignored and every field may be missing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InboundMessage {
    pub kind: Option<String>,
    pub payload: Option<Value>,
    /// The `original_type` field.
    pub original_kind: Option<String>,
    pub status: Option<String>,
}

impl InboundMessage {
    /// Read the known fields out of an arbitrary JSON document.
    ///
    /// Fields of the wrong JSON type are treated as absent; a non-object
    /// document yields an empty message.
    pub fn from_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::default();
        };
        let text = |key: &str| object.get(key).and_then(Value::as_str).map(str::to_owned);
        Self {
            kind: text("type"),
            payload: object.get("payload").filter(|v| !v.is_null()).cloned(),
            original_kind: text("original_type"),
            status: text("status"),
        }
    }
}

/// Inbound messages keyed by their `type` tag.
#[derive(Clone, Debug, PartialEq)]
pub enum ServerMessage {
    SettingsResponse {
        payload: Option<Value>,
    },
    Ack {
        original_kind: Option<String>,
        status: Option<String>,
    },
    Error {
        original_kind: Option<String>,
        payload: Option<Value>,
    },
    Unknown(Value),
}

impl ServerMessage {
    /// Classify a parsed JSON document. Never fails.
    pub fn classify(value: Value) -> Self {
        let message = InboundMessage::from_value(&value);
        match message.kind.as_deref() {
            Some(SETTINGS_RESPONSE) => ServerMessage::SettingsResponse {
                payload: message.payload,
            },
            Some(ACK) => ServerMessage::Ack {
                original_kind: message.original_kind,
                status: message.status,
            },
            Some(ERROR) => ServerMessage::Error {
                original_kind: message.original_kind,
                payload: message.payload,
            },
            _ => ServerMessage::Unknown(value),
        }
    }

    /// Decode a frame body: UTF-8 first, then JSON.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        parse_frame(bytes).map(Self::classify)
    }
}

/// Parse a frame body into a JSON document without classifying it.
pub fn parse_frame(bytes: &[u8]) -> Result<Value, FrameError> {
    let text = std::str::from_utf8(bytes)?;
    Ok(serde_json::from_str(text)?)
}

/// Why an inbound frame could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_text_serializes_exactly() {
        let text = serde_json::to_string(&OutboundMessage::custom_text("hello")).unwrap();
        assert_eq!(text, r#"{"type":"CUSTOM_TEXT_MESSAGE","payload":{"text":"hello"}}"#);
    }

    #[test]
    fn get_settings_omits_payload() {
        let text = serde_json::to_string(&OutboundMessage::get_settings()).unwrap();
        assert_eq!(text, r#"{"type":"GET_SETTINGS_REQUEST"}"#);
    }

    #[test]
    fn arbitrary_kinds_are_accepted() {
        let message = OutboundMessage::new("NOT_A_KNOWN_KIND").with_payload(json!([1, 2]));
        let text = serde_json::to_string(&message).unwrap();
        assert_eq!(text, r#"{"type":"NOT_A_KNOWN_KIND","payload":[1,2]}"#);
    }

    #[test]
    fn action_report_payload_shape() {
        let message = OutboundMessage::action_report(&ActionReport::add(2, 3, 5));
        assert_eq!(message.kind, WASM_ACTION_REPORT);
        assert_eq!(
            message.payload,
            Some(json!({ "actionName": "add", "input": { "a": 2, "b": 3 }, "output": 5 }))
        );

        let greet = OutboundMessage::action_report(&ActionReport::greet("world", "hi"));
        let payload = greet.payload.unwrap();
        assert_eq!(payload["actionName"], "greet");
        assert_eq!(payload["input"]["name"], "world");
    }

    #[test]
    fn classify_ack() {
        let message = ServerMessage::decode(
            br#"{"type":"ACK","original_type":"GET_SETTINGS_REQUEST","status":"ok"}"#,
        )
        .unwrap();
        assert_eq!(
            message,
            ServerMessage::Ack {
                original_kind: Some("GET_SETTINGS_REQUEST".into()),
                status: Some("ok".into()),
            }
        );
    }

    #[test]
    fn classify_settings_and_error() {
        let settings =
            ServerMessage::decode(br#"{"type":"SETTINGS_RESPONSE","payload":{"obs_host":"localhost"}}"#)
                .unwrap();
        assert_eq!(
            settings,
            ServerMessage::SettingsResponse {
                payload: Some(json!({ "obs_host": "localhost" }))
            }
        );

        let error = ServerMessage::decode(
            br#"{"type":"ERROR","original_type":"BOGUS","payload":{"message":"nope"},"extra":1}"#,
        )
        .unwrap();
        assert_eq!(
            error,
            ServerMessage::Error {
                original_kind: Some("BOGUS".into()),
                payload: Some(json!({ "message": "nope" })),
            }
        );
    }

    #[test]
    fn missing_or_odd_kinds_are_unknown() {
        for raw in [
            r#"{"payload":1}"#,
            r#"{"type":"PING"}"#,
            r#"{"type":7}"#,
            "42",
            r#"["ACK"]"#,
        ] {
            let message = ServerMessage::decode(raw.as_bytes()).unwrap();
            assert!(matches!(message, ServerMessage::Unknown(_)), "{raw}");
        }
    }

    #[test]
    fn wrongly_typed_fields_are_absent() {
        let message = ServerMessage::decode(br#"{"type":"ACK","original_type":3,"status":null}"#).unwrap();
        assert_eq!(
            message,
            ServerMessage::Ack {
                original_kind: None,
                status: None,
            }
        );
    }

    #[test]
    fn decode_failures() {
        assert!(matches!(ServerMessage::decode(b"{not json"), Err(FrameError::Json(_))));
        assert!(matches!(ServerMessage::decode(&[0xff, 0xfe]), Err(FrameError::Utf8(_))));
    }
}
