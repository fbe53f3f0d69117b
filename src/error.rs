//! Error types shared across the crate.
//!
//! Each enum covers one failure surface: catalog fetch, channel transport,
//! backend service calls, and session operations. Variants stay coarse so
//! the view layer can map each one to a distinct signal.

use thiserror::Error;

use crate::channel::ChannelState;

/// Failures raised by the catalog service client.
///
/// Either way the UI renders an empty catalog instead of crashing.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog service could not be reached or answered a failure status.
    #[error("catalog service unreachable: {0}")]
    Unreachable(String),

    /// The catalog service answered with a body this client cannot decode.
    #[error("catalog response malformed: {0}")]
    Malformed(String),
}

/// Failures on the duplex conversation channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The transport could not be established. No internal retry.
    #[error("failed to connect conversation channel: {0}")]
    Connect(String),

    /// A send was attempted while the channel was not open.
    #[error("channel is {state:?}, not open")]
    NotOpen { state: ChannelState },

    /// An inbound frame could not be interpreted. The frame is dropped;
    /// the channel stays open.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
}

/// Failures from the conversation-creation and message-submission services.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The service could not be reached or answered a failure status.
    #[error("chat service request failed: {0}")]
    Request(String),

    /// The service answered with a body this client cannot decode.
    #[error("chat service response malformed: {0}")]
    Response(String),
}

/// Failures surfaced by [`crate::session::ConversationSession`].
#[derive(Debug, Error)]
pub enum SessionError {
    /// Conversation creation failed. No conversation is active afterwards.
    #[error("failed to start conversation")]
    StartFailed(#[source] BackendError),

    /// The channel could not be opened for a freshly created conversation.
    /// No conversation is active afterwards.
    #[error("failed to open conversation channel")]
    Connect(#[source] ChannelError),

    /// There is no current conversation, or its channel is not open.
    #[error("no active conversation")]
    NoActiveConversation,

    /// Message submission failed. The optimistic log entry is kept; retry
    /// is a user-level action.
    #[error("failed to submit message")]
    SendFailed(#[source] BackendError),
}
