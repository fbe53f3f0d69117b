//! Client trait for the external conversation services.

use async_trait::async_trait;

use crate::error::BackendError;

/// Client for the conversation-creation and message-submission services.
///
/// Both calls are request/response only: the agent's actual reply always
/// arrives through the conversation channel, never here.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Ask the conversation-creation service for a new conversation id.
    async fn start_conversation(
        &self,
        agent_id: &str,
        inputs: &serde_json::Value,
    ) -> Result<String, BackendError>;

    /// Submit a user message for the given conversation. Fire-and-forget:
    /// a successful return only means the service accepted the message.
    async fn submit_message(
        &self,
        conversation_id: &str,
        agent_id: &str,
        message: &str,
    ) -> Result<(), BackendError>;

    /// The name of this backend implementation.
    fn name(&self) -> &str;
}
