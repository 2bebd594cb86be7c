//! The chat event representation shared by the live and replay pipelines.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single chat event: a message, a ban, a room state change, a
/// subscription notice and so on.
///
/// Events are open-ended JSON objects. Twitch regularly introduces new tags
/// and notice parameters, and everything the backend sends is kept, under a
/// canonical name where one is known. The typed accessors cover the fields
/// most consumers need; anything else is reachable through [`ChatEvent::get`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ChatEvent(pub Map<String, Value>);

impl ChatEvent {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// The canonical event type, e.g. `text_message` or `ban_user`.
    pub fn message_type(&self) -> Option<&str> {
        self.get_str("message_type")
    }

    /// The message body, where the event carries one.
    pub fn message(&self) -> Option<&str> {
        self.get_str("message")
    }

    /// The author object, where the event carries one.
    pub fn author(&self) -> Option<&Map<String, Value>> {
        self.0.get("author").and_then(Value::as_object)
    }

    /// Event time in epoch microseconds.
    pub fn timestamp(&self) -> Option<i64> {
        self.0.get("timestamp").and_then(Value::as_i64)
    }

    /// Offset from the start of the video, in seconds. Replay events only.
    pub fn time_in_seconds(&self) -> Option<f64> {
        self.0.get("time_in_seconds").and_then(Value::as_f64)
    }

    /// Human-readable offset, e.g. `1:02:05`. Replay events only.
    pub fn time_text(&self) -> Option<&str> {
        self.get_str("time_text")
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for ChatEvent {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
