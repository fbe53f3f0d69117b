//! Scripted fakes shared by session and orchestrator tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::backend::ChatBackend;
use crate::channel::{Channel, ChannelConnector, ChannelHandle, ChannelState, OutboundFrame};
use crate::error::{BackendError, ChannelError};
use crate::session::{EventSubscription, SessionEvent};

/// Shared journal of backend/connector/channel operations, for asserting
/// the relative order of lifecycle steps.
#[derive(Clone, Default)]
pub(crate) struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

/// Backend fake that mints sequential conversation ids (c1, c2, ...).
pub(crate) struct FakeBackend {
    journal: Journal,
    counter: Mutex<u32>,
    pub fail_start: AtomicBool,
    pub fail_send: AtomicBool,
    pub submitted: Mutex<Vec<(String, String, String)>>,
}

impl FakeBackend {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            counter: Mutex::new(0),
            fail_start: AtomicBool::new(false),
            fail_send: AtomicBool::new(false),
            submitted: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ChatBackend for FakeBackend {
    async fn start_conversation(
        &self,
        agent_id: &str,
        _inputs: &serde_json::Value,
    ) -> Result<String, BackendError> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(BackendError::Request("scripted start failure".to_string()));
        }
        let mut counter = self.counter.lock();
        *counter += 1;
        let id = format!("c{}", *counter);
        self.journal.record(format!("start:{agent_id}:{id}"));
        Ok(id)
    }

    async fn submit_message(
        &self,
        conversation_id: &str,
        agent_id: &str,
        message: &str,
    ) -> Result<(), BackendError> {
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(BackendError::Request("scripted send failure".to_string()));
        }
        self.submitted.lock().push((
            conversation_id.to_string(),
            agent_id.to_string(),
            message.to_string(),
        ));
        Ok(())
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Channel fake that records sends and close ordering.
pub(crate) struct ScriptedChannel {
    conversation_id: String,
    journal: Journal,
    state: Mutex<ChannelState>,
    pub sent: Mutex<Vec<OutboundFrame>>,
}

impl ScriptedChannel {
    pub fn new(conversation_id: impl Into<String>, journal: Journal) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            journal,
            state: Mutex::new(ChannelState::Open),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Simulate a transport-level failure.
    pub fn fail(&self) {
        *self.state.lock() = ChannelState::Failed;
    }
}

#[async_trait]
impl Channel for ScriptedChannel {
    fn state(&self) -> ChannelState {
        *self.state.lock()
    }

    fn send(&self, frame: &OutboundFrame) -> Result<(), ChannelError> {
        let state = *self.state.lock();
        if state != ChannelState::Open {
            return Err(ChannelError::NotOpen { state });
        }
        self.sent.lock().push(frame.clone());
        Ok(())
    }

    async fn close(&self) {
        {
            let mut state = self.state.lock();
            if state.is_terminal() {
                return;
            }
            *state = ChannelState::Closed;
        }
        self.journal.record(format!("close:{}", self.conversation_id));
    }
}

/// One scripted channel plus the sender side of its inbound stream.
#[derive(Clone)]
pub(crate) struct Rig {
    pub channel: Arc<ScriptedChannel>,
    pub inbound: mpsc::UnboundedSender<String>,
}

impl Rig {
    /// Inject a raw inbound frame. Delivery failures (receiver already
    /// gone) are intentionally ignored: that is the stray-frame case.
    pub fn push(&self, text: &str) {
        let _ = self.inbound.send(text.to_string());
    }
}

/// Connector fake handing out scripted channels and keeping their rigs
/// around so tests can inject frames after the fact.
pub(crate) struct ScriptedConnector {
    journal: Journal,
    pub fail_connect: AtomicBool,
    rigs: Mutex<HashMap<String, Rig>>,
}

impl ScriptedConnector {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            fail_connect: AtomicBool::new(false),
            rigs: Mutex::new(HashMap::new()),
        }
    }

    pub fn rig(&self, conversation_id: &str) -> Rig {
        self.rigs
            .lock()
            .get(conversation_id)
            .cloned()
            .unwrap_or_else(|| panic!("no rig for conversation {conversation_id}"))
    }

    /// Simulate the transport dying: mark the channel failed and drop the
    /// inbound sender so the session's pump sees the stream end.
    pub fn sever(&self, conversation_id: &str) {
        let rig = self
            .rigs
            .lock()
            .remove(conversation_id)
            .unwrap_or_else(|| panic!("no rig for conversation {conversation_id}"));
        rig.channel.fail();
    }
}

#[async_trait]
impl ChannelConnector for ScriptedConnector {
    async fn connect(&self, conversation_id: &str) -> Result<ChannelHandle, ChannelError> {
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(ChannelError::Connect("scripted connect failure".to_string()));
        }
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let channel = Arc::new(ScriptedChannel::new(conversation_id, self.journal.clone()));
        self.journal.record(format!("connect:{conversation_id}"));
        self.rigs.lock().insert(
            conversation_id.to_string(),
            Rig {
                channel: channel.clone(),
                inbound: inbound_tx,
            },
        );
        Ok(ChannelHandle {
            channel,
            inbound: inbound_rx,
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Await the next session event, failing the test after a second.
pub(crate) async fn next_event(subscription: &mut EventSubscription) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(1), subscription.recv())
        .await
        .expect("timed out waiting for session event")
        .expect("event stream closed")
}
