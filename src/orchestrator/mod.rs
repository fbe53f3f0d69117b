//! Session orchestrator: mediates user intent into session calls and
//! renders log state to a view layer.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::catalog::{Agent, CatalogIndex, CatalogSource};
use crate::channel::ChannelState;
use crate::error::{CatalogError, SessionError};
use crate::session::{Conversation, ConversationSession, EventSubscription, LogEntry, SessionEvent};

/// Rendering surface the orchestrator drives. Every error kind maps to a
/// distinct call so hosts (and tests) can tell the paths apart.
pub trait ViewSink: Send + Sync {
    fn catalog_loaded(&self, index: &CatalogIndex);
    fn catalog_unavailable(&self, error: &CatalogError);
    fn conversation_started(&self, conversation: &Conversation, agent: &Agent);
    fn entry_appended(&self, entry: &LogEntry);
    fn channel_state(&self, state: ChannelState);
    fn frame_dropped(&self, reason: &str);
    fn session_error(&self, error: &SessionError);
}

/// Thin mediator between user intent, the conversation session, and the
/// view. Holds no state beyond the currently displayed conversation id,
/// which is used solely to filter events from conversations that are no
/// longer current.
pub struct Orchestrator {
    session: Arc<ConversationSession>,
    view: Arc<dyn ViewSink>,
    displayed: Mutex<Option<String>>,
}

impl Orchestrator {
    pub fn new(session: Arc<ConversationSession>, view: Arc<dyn ViewSink>) -> Self {
        Self {
            session,
            view,
            displayed: Mutex::new(None),
        }
    }

    /// Fetch the catalog once, rendering an empty catalog instead of
    /// failing when the service is unavailable.
    pub async fn load_catalog(source: &dyn CatalogSource, view: &dyn ViewSink) -> CatalogIndex {
        match source.fetch().await {
            Ok(index) => {
                view.catalog_loaded(&index);
                index
            }
            Err(error) => {
                tracing::warn!(%error, "agent catalog unavailable");
                view.catalog_unavailable(&error);
                CatalogIndex::empty()
            }
        }
    }

    /// Translate "agent selected" into a session start.
    pub async fn select_agent(
        &self,
        agent: &Agent,
        inputs: &serde_json::Value,
    ) -> Result<(), SessionError> {
        match self.session.start(agent, inputs).await {
            Ok(conversation) => {
                *self.displayed.lock() = Some(conversation.id.clone());
                self.view.conversation_started(&conversation, agent);
                Ok(())
            }
            Err(error) => {
                // Start failures leave no active conversation behind.
                *self.displayed.lock() = None;
                self.view.session_error(&error);
                Err(error)
            }
        }
    }

    /// Translate "send clicked" into a session send. The echo reaches the
    /// view through the event stream, not through this call.
    pub async fn submit(&self, text: &str) -> Result<(), SessionError> {
        match self.session.send(text).await {
            Ok(_) => Ok(()),
            Err(error) => {
                self.view.session_error(&error);
                Err(error)
            }
        }
    }

    /// End the current conversation and stop displaying it.
    pub async fn shutdown(&self) {
        self.session.close().await;
        *self.displayed.lock() = None;
    }

    /// Drive session events into the view until the stream ends. Events
    /// tagged with a conversation that is not the displayed one are
    /// ignored; that guards against a closing channel's in-flight frame
    /// arriving after the user has already moved on.
    pub async fn run_events(&self, mut subscription: EventSubscription) {
        while let Some(event) = subscription.recv().await {
            if self.displayed.lock().as_deref() != Some(event.conversation_id()) {
                tracing::debug!(
                    conversation_id = %event.conversation_id(),
                    "ignoring event for non-displayed conversation"
                );
                continue;
            }
            match event {
                SessionEvent::LogAppended { entry, .. } => self.view.entry_appended(&entry),
                SessionEvent::ChannelStateChanged { state, .. } => self.view.channel_state(state),
                SessionEvent::FrameDropped { reason, .. } => self.view.frame_dropped(&reason),
            }
        }
    }
}
