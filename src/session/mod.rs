//! Conversation session: the correlation and ordering authority between
//! user intent and agent responses for exactly one conversation at a time.

pub mod events;
pub mod log;

pub use events::{EventSubscription, SessionEvent};
pub use log::{Conversation, LogEntry, Origin, Payload};

use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::backend::ChatBackend;
use crate::catalog::Agent;
use crate::channel::{decode_frame, Channel, ChannelConnector, ChannelHandle, ChannelState, InboundFrame};
use crate::error::SessionError;

const EVENT_CHANNEL_CAPACITY: usize = 256;

struct ActiveConversation {
    conversation: Conversation,
    channel: Arc<dyn Channel>,
    pump: JoinHandle<()>,
}

/// Owns the current conversation, its channel, and its ordered message log.
///
/// All public operations are expected to be invoked from one execution
/// context; state transitions and sequence assignment happen under a single
/// mutex, which is never held across an await. Inbound frames merge into
/// the log through the same mutex on a pumping task.
pub struct ConversationSession {
    backend: Arc<dyn ChatBackend>,
    connector: Arc<dyn ChannelConnector>,
    active: Arc<Mutex<Option<ActiveConversation>>>,
    events: broadcast::Sender<SessionEvent>,
}

impl ConversationSession {
    pub fn new(backend: Arc<dyn ChatBackend>, connector: Arc<dyn ChannelConnector>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            backend,
            connector,
            active: Arc::new(Mutex::new(None)),
            events,
        }
    }

    /// Subscribe to the log-append event stream.
    pub fn subscribe(&self) -> EventSubscription {
        EventSubscription::new(self.events.subscribe())
    }

    /// Snapshot of the current conversation, if any.
    pub fn current(&self) -> Option<Conversation> {
        self.active.lock().as_ref().map(|active| {
            let mut conversation = active.conversation.clone();
            conversation.channel_state = active.channel.state();
            conversation
        })
    }

    /// Start a conversation with `agent`, replacing any current one.
    ///
    /// The previous conversation's channel is closed and its subscription
    /// discarded before anything else happens, so a stale channel can never
    /// append to the new log. On any failure there is no active
    /// conversation afterwards.
    pub async fn start(
        &self,
        agent: &Agent,
        inputs: &serde_json::Value,
    ) -> Result<Conversation, SessionError> {
        self.retire_current().await;

        let conversation_id = self
            .backend
            .start_conversation(&agent.id, inputs)
            .await
            .map_err(SessionError::StartFailed)?;

        let ChannelHandle { channel, inbound } = self
            .connector
            .connect(&conversation_id)
            .await
            .map_err(SessionError::Connect)?;

        let conversation = Conversation {
            id: conversation_id.clone(),
            agent_id: agent.id.clone(),
            log: Vec::new(),
            channel_state: channel.state(),
        };

        let pump = tokio::spawn(pump_inbound(
            self.active.clone(),
            self.events.clone(),
            conversation_id.clone(),
            channel.clone(),
            inbound,
        ));

        *self.active.lock() = Some(ActiveConversation {
            conversation: conversation.clone(),
            channel,
            pump,
        });

        let _ = self.events.send(SessionEvent::ChannelStateChanged {
            conversation_id,
            state: conversation.channel_state,
        });
        tracing::info!(
            conversation_id = %conversation.id,
            agent_id = %agent.id,
            "conversation started"
        );

        Ok(conversation)
    }

    /// Append `text` as a user entry and submit it to the message service.
    ///
    /// The append is an optimistic local echo: it happens before the
    /// network call and is not rolled back if submission fails.
    pub async fn send(&self, text: &str) -> Result<LogEntry, SessionError> {
        let (conversation_id, agent_id, entry) = {
            let mut guard = self.active.lock();
            let active = guard.as_mut().ok_or(SessionError::NoActiveConversation)?;
            if active.channel.state() != ChannelState::Open {
                return Err(SessionError::NoActiveConversation);
            }
            let entry = append_entry(
                active,
                &self.events,
                Origin::User,
                Payload::Text(text.to_string()),
            );
            (
                active.conversation.id.clone(),
                active.conversation.agent_id.clone(),
                entry,
            )
        };

        self.backend
            .submit_message(&conversation_id, &agent_id, text)
            .await
            .map_err(SessionError::SendFailed)?;

        Ok(entry)
    }

    /// End the current conversation without starting a new one.
    pub async fn close(&self) {
        self.retire_current().await;
    }

    async fn retire_current(&self) {
        let previous = self.active.lock().take();
        if let Some(previous) = previous {
            previous.pump.abort();
            previous.channel.close().await;
            tracing::debug!(
                conversation_id = %previous.conversation.id,
                "previous conversation retired"
            );
        }
    }
}

/// Append one entry with the next sequence number and publish the event.
/// Callers hold the session mutex, which makes sequence assignment atomic
/// with the append.
fn append_entry(
    active: &mut ActiveConversation,
    events: &broadcast::Sender<SessionEvent>,
    origin: Origin,
    payload: Payload,
) -> LogEntry {
    let entry = LogEntry {
        origin,
        payload,
        sequence: active.conversation.log.len() as u64 + 1,
        timestamp: Utc::now(),
    };
    active.conversation.log.push(entry.clone());
    let _ = events.send(SessionEvent::LogAppended {
        conversation_id: active.conversation.id.clone(),
        entry: entry.clone(),
    });
    entry
}

/// Drain a channel's inbound frame sequence into the session log.
///
/// Frames are appended only while their conversation is still current; a
/// frame that races with an agent switch is discarded. Malformed frames
/// are dropped and reported, never fatal to the channel.
async fn pump_inbound(
    active: Arc<Mutex<Option<ActiveConversation>>>,
    events: broadcast::Sender<SessionEvent>,
    conversation_id: String,
    channel: Arc<dyn Channel>,
    mut inbound: mpsc::UnboundedReceiver<String>,
) {
    while let Some(text) = inbound.recv().await {
        match decode_frame(&text) {
            Ok(InboundFrame::Result(data)) => {
                let mut guard = active.lock();
                match guard.as_mut() {
                    Some(current) if current.conversation.id == conversation_id => {
                        append_entry(
                            current,
                            &events,
                            Origin::Agent,
                            Payload::from_result_data(data),
                        );
                    }
                    _ => {
                        tracing::debug!(
                            %conversation_id,
                            "dropping frame for retired conversation"
                        );
                    }
                }
            }
            Ok(InboundFrame::Status(message)) => {
                tracing::debug!(%conversation_id, %message, "channel status");
            }
            Err(error) => {
                tracing::warn!(%conversation_id, %error, "dropping malformed frame");
                let _ = events.send(SessionEvent::FrameDropped {
                    conversation_id: conversation_id.clone(),
                    reason: error.to_string(),
                });
            }
        }
    }

    // The inbound stream only ends on a terminal channel state. Surface a
    // transport failure on the conversation that is still current.
    if channel.state() == ChannelState::Failed {
        let mut guard = active.lock();
        if let Some(current) = guard.as_mut() {
            if current.conversation.id == conversation_id {
                current.conversation.channel_state = ChannelState::Failed;
                let _ = events.send(SessionEvent::ChannelStateChanged {
                    conversation_id,
                    state: ChannelState::Failed,
                });
            }
        }
    }
}
