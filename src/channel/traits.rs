//! Channel lifecycle, frame codec, and transport traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::ChannelError;

/// Lifecycle of one duplex channel bound to a conversation.
///
/// `Closed` and `Failed` are terminal: a new channel must be constructed
/// for any further communication, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelState {
    Connecting,
    Open,
    Closing,
    Closed,
    Failed,
}

impl ChannelState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ChannelState::Closed | ChannelState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChannelState::Connecting => "connecting",
            ChannelState::Open => "open",
            ChannelState::Closing => "closing",
            ChannelState::Closed => "closed",
            ChannelState::Failed => "failed",
        }
    }
}

/// A frame queued for transmission. No acknowledgment is expected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundFrame {
    #[serde(rename = "type")]
    pub frame_type: String,
    pub data: serde_json::Value,
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Agent-produced result payload.
    Result(serde_json::Value),
    /// Transport status notice. Reported to diagnostics, never appended.
    Status(String),
}

/// Decode one inbound text frame.
///
/// The recognized shape is `{type, data | message}`: `result` frames carry
/// the agent payload in `data`, `status` frames carry a notice in
/// `message`. Anything else is malformed.
pub fn decode_frame(text: &str) -> Result<InboundFrame, ChannelError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| ChannelError::MalformedFrame(e.to_string()))?;

    let frame_type = value
        .get("type")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| ChannelError::MalformedFrame("missing frame type".to_string()))?;

    match frame_type {
        "result" => {
            let data = value
                .get("data")
                .cloned()
                .ok_or_else(|| ChannelError::MalformedFrame("result frame without data".to_string()))?;
            Ok(InboundFrame::Result(data))
        }
        "status" => {
            let message = value
                .get("message")
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| {
                    ChannelError::MalformedFrame("status frame without message".to_string())
                })?;
            Ok(InboundFrame::Status(message.to_string()))
        }
        other => Err(ChannelError::MalformedFrame(format!(
            "unrecognized frame type: {other}"
        ))),
    }
}

/// One duplex connection bound to a single conversation.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Current lifecycle state.
    fn state(&self) -> ChannelState;

    /// Enqueue a frame for transmission, without blocking or waiting for
    /// acknowledgment. Fails with [`ChannelError::NotOpen`] unless the
    /// channel is open.
    fn send(&self, frame: &OutboundFrame) -> Result<(), ChannelError>;

    /// Close the channel. Idempotent; after it returns no further inbound
    /// frames are delivered to the subscriber.
    async fn close(&self);
}

/// A freshly connected channel together with its inbound frame sequence.
///
/// The receiver is the single subscription: each received frame is
/// delivered exactly once, in transport arrival order, and the stream ends
/// permanently once the channel reaches a terminal state.
pub struct ChannelHandle {
    pub channel: Arc<dyn Channel>,
    pub inbound: mpsc::UnboundedReceiver<String>,
}

impl std::fmt::Debug for ChannelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelHandle")
            .field("channel_state", &self.channel.state())
            .finish()
    }
}

/// Establishes channels bound to conversation ids.
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    /// Establish a channel for the given conversation. Fails with
    /// [`ChannelError::Connect`] if the transport cannot be established;
    /// retry policy belongs to the caller.
    async fn connect(&self, conversation_id: &str) -> Result<ChannelHandle, ChannelError>;

    /// The name of this connector implementation.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_result_frame_with_string_data() {
        let frame = decode_frame(r#"{"type":"result","data":"Hi there"}"#).unwrap();
        assert_eq!(frame, InboundFrame::Result(serde_json::json!("Hi there")));
    }

    #[test]
    fn decodes_result_frame_with_structured_data() {
        let frame = decode_frame(r#"{"type":"result","data":{"result":"done","score":3}}"#).unwrap();
        assert_eq!(
            frame,
            InboundFrame::Result(serde_json::json!({"result":"done","score":3}))
        );
    }

    #[test]
    fn decodes_status_frame() {
        let frame = decode_frame(r#"{"type":"status","message":"connected"}"#).unwrap();
        assert_eq!(frame, InboundFrame::Status("connected".to_string()));
    }

    #[test]
    fn rejects_unrecognized_frame_type() {
        let err = decode_frame(r#"{"type":"telemetry","data":1}"#).unwrap_err();
        assert!(matches!(err, ChannelError::MalformedFrame(_)));
    }

    #[test]
    fn rejects_frames_missing_required_fields() {
        for text in [
            "not json",
            "[]",
            r#"{"data":"orphan"}"#,
            r#"{"type":"result"}"#,
            r#"{"type":"status"}"#,
            r#"{"type":42,"data":1}"#,
        ] {
            let err = decode_frame(text).unwrap_err();
            assert!(matches!(err, ChannelError::MalformedFrame(_)), "{text}");
        }
    }

    #[test]
    fn outbound_frame_serializes_with_wire_type_key() {
        let frame = OutboundFrame {
            frame_type: "result".to_string(),
            data: serde_json::json!({"ok": true}),
        };
        let text = serde_json::to_string(&frame).unwrap();
        assert_eq!(text, r#"{"type":"result","data":{"ok":true}}"#);
    }

    #[test]
    fn terminal_states() {
        assert!(ChannelState::Closed.is_terminal());
        assert!(ChannelState::Failed.is_terminal());
        assert!(!ChannelState::Open.is_terminal());
        assert!(!ChannelState::Connecting.is_terminal());
        assert!(!ChannelState::Closing.is_terminal());
    }
}
