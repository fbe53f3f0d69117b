//! Session event stream: every log append and channel lifecycle change is
//! published to subscribers.

use tokio::sync::broadcast;

use super::log::LogEntry;
use crate::channel::ChannelState;

/// Events published by a conversation session.
///
/// Every event is tagged with the conversation it belongs to; consumers
/// must ignore events for a conversation that is no longer current.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A log entry was appended (user or agent origin).
    LogAppended {
        conversation_id: String,
        entry: LogEntry,
    },
    /// The conversation's channel changed lifecycle state. `Failed` means
    /// the connection was lost; the session does not auto-reconnect.
    ChannelStateChanged {
        conversation_id: String,
        state: ChannelState,
    },
    /// A malformed inbound frame was dropped. The channel stays open.
    FrameDropped {
        conversation_id: String,
        reason: String,
    },
}

impl SessionEvent {
    /// The conversation this event belongs to.
    pub fn conversation_id(&self) -> &str {
        match self {
            SessionEvent::LogAppended {
                conversation_id, ..
            }
            | SessionEvent::ChannelStateChanged {
                conversation_id, ..
            }
            | SessionEvent::FrameDropped {
                conversation_id, ..
            } => conversation_id,
        }
    }
}

/// A read-only subscription to the session event stream.
pub struct EventSubscription {
    rx: broadcast::Receiver<SessionEvent>,
}

impl EventSubscription {
    pub(crate) fn new(rx: broadcast::Receiver<SessionEvent>) -> Self {
        Self { rx }
    }

    /// Receive the next event, or `None` once the session is gone.
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, "event subscriber lagged, events were dropped");
                }
            }
        }
    }
}
