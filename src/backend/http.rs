//! HTTP implementation of the conversation services client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::traits::ChatBackend;
use crate::error::BackendError;

#[derive(Serialize)]
struct StartRequest<'a> {
    agent_id: &'a str,
    inputs: &'a serde_json::Value,
}

#[derive(Deserialize)]
struct StartResponse {
    conversation_id: String,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    conversation_id: &'a str,
    agent_id: &'a str,
    message: &'a str,
}

/// Conversation services client over `POST {base_url}/chat/start` and
/// `POST {base_url}/chat/send`.
pub struct HttpChatBackend {
    http: reqwest::Client,
    base_url: String,
}

impl HttpChatBackend {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn post<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, BackendError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| BackendError::Request(e.to_string()))?;
        response
            .error_for_status()
            .map_err(|e| BackendError::Request(e.to_string()))
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn start_conversation(
        &self,
        agent_id: &str,
        inputs: &serde_json::Value,
    ) -> Result<String, BackendError> {
        let response = self
            .post("/chat/start", &StartRequest { agent_id, inputs })
            .await?;
        let parsed: StartResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Response(e.to_string()))?;
        Ok(parsed.conversation_id)
    }

    async fn submit_message(
        &self,
        conversation_id: &str,
        agent_id: &str,
        message: &str,
    ) -> Result<(), BackendError> {
        self.post(
            "/chat/send",
            &SendRequest {
                conversation_id,
                agent_id,
                message,
            },
        )
        .await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "http"
    }
}
