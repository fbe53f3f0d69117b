//! WebSocket channel transport: one connection per conversation id.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use super::traits::{Channel, ChannelConnector, ChannelHandle, ChannelState, OutboundFrame};
use crate::error::ChannelError;

enum WsCommand {
    Frame(String),
    Close,
}

struct WsShared {
    state: Mutex<ChannelState>,
    outbound: mpsc::UnboundedSender<WsCommand>,
}

impl WsShared {
    /// Move to the right terminal state when the transport ends: an
    /// owner-initiated close acknowledges as `Closed`, anything else while
    /// live is `Failed`.
    fn mark_terminated(&self) {
        let mut state = self.state.lock();
        if !state.is_terminal() {
            *state = if *state == ChannelState::Closing {
                ChannelState::Closed
            } else {
                ChannelState::Failed
            };
        }
    }
}

/// A live WebSocket channel. Constructed by [`WsConnector`]; never reused
/// after reaching a terminal state.
pub struct WsChannel {
    shared: Arc<WsShared>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

#[async_trait]
impl Channel for WsChannel {
    fn state(&self) -> ChannelState {
        *self.shared.state.lock()
    }

    fn send(&self, frame: &OutboundFrame) -> Result<(), ChannelError> {
        let state = *self.shared.state.lock();
        if state != ChannelState::Open {
            return Err(ChannelError::NotOpen { state });
        }
        let text =
            serde_json::to_string(frame).map_err(|e| ChannelError::MalformedFrame(e.to_string()))?;
        // Fire and forget: the writer task owns actual transmission.
        let _ = self.shared.outbound.send(WsCommand::Frame(text));
        Ok(())
    }

    async fn close(&self) {
        {
            let mut state = self.shared.state.lock();
            if state.is_terminal() {
                return;
            }
            *state = ChannelState::Closing;
        }

        let _ = self.shared.outbound.send(WsCommand::Close);

        // Stopping the read pump before flipping to Closed is what
        // guarantees no inbound delivery after close() returns.
        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }

        let mut state = self.shared.state.lock();
        if *state == ChannelState::Closing {
            *state = ChannelState::Closed;
        }
    }
}

/// Connector for the duplex channel endpoint: `{endpoint}/{conversation_id}`.
pub struct WsConnector {
    endpoint: String,
}

impl WsConnector {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }

    fn conversation_url(&self, conversation_id: &str) -> String {
        format!("{}/{}", self.endpoint, conversation_id)
    }
}

#[async_trait]
impl ChannelConnector for WsConnector {
    async fn connect(&self, conversation_id: &str) -> Result<ChannelHandle, ChannelError> {
        let url = self.conversation_url(conversation_id);
        let (socket, _) = connect_async(url.as_str())
            .await
            .map_err(|e| ChannelError::Connect(e.to_string()))?;
        tracing::debug!(%conversation_id, %url, "conversation channel connected");

        let (mut sink, mut stream) = socket.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(WsShared {
            state: Mutex::new(ChannelState::Open),
            outbound: outbound_tx,
        });

        tokio::spawn(async move {
            while let Some(command) = outbound_rx.recv().await {
                match command {
                    WsCommand::Frame(text) => {
                        if sink.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    WsCommand::Close => {
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
        });

        let reader_shared = shared.clone();
        let reader_conversation = conversation_id.to_string();
        let reader = tokio::spawn(async move {
            loop {
                match stream.next().await {
                    Some(Ok(Message::Text(text))) => {
                        if inbound_tx.send(text).is_err() {
                            // Subscriber dropped; nothing left to deliver to.
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::debug!(
                            conversation_id = %reader_conversation,
                            "conversation channel closed by transport"
                        );
                        reader_shared.mark_terminated();
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(
                            conversation_id = %reader_conversation,
                            error = %e,
                            "conversation channel transport error"
                        );
                        reader_shared.mark_terminated();
                        break;
                    }
                }
            }
        });

        Ok(ChannelHandle {
            channel: Arc::new(WsChannel {
                shared,
                reader: Mutex::new(Some(reader)),
            }),
            inbound: inbound_rx,
        })
    }

    fn name(&self) -> &str {
        "websocket"
    }
}
