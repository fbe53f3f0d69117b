//! Conversation log types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::channel::ChannelState;

/// Which side of the conversation produced a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    User,
    Agent,
}

/// Payload carried by a log entry: plain text or a structured agent result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Text(String),
    Structured(serde_json::Value),
}

impl Payload {
    /// Build a payload from a result frame's `data` field. A JSON string
    /// becomes text; an object that is exactly `{"result": "<text>"}` is
    /// flattened to that text; anything else stays structured.
    pub fn from_result_data(data: serde_json::Value) -> Self {
        if let serde_json::Value::String(text) = data {
            return Payload::Text(text);
        }
        if let Some(object) = data.as_object() {
            if object.len() == 1 {
                if let Some(serde_json::Value::String(text)) = object.get("result") {
                    return Payload::Text(text.clone());
                }
            }
        }
        Payload::Structured(data)
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Text(text) => f.write_str(text),
            Payload::Structured(value) => write!(f, "{value}"),
        }
    }
}

/// One append-only entry in a conversation log.
///
/// `sequence` is assigned at append time, starts at 1, and is the sole
/// ordering key the view layer may rely on. The timestamp is display-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub origin: Origin,
    pub payload: Payload,
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
}

/// The message log and channel binding for one conversation.
///
/// Replaced, never mutated in place, when the user switches agents.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: String,
    pub agent_id: String,
    pub log: Vec<LogEntry>,
    pub channel_state: ChannelState,
}
