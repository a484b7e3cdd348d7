use crate::{
    errors::ChatbotError,
    providers::chatbot::{ChatbotProvider, ChatbotRequest},
};
use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[derive(Deserialize, Debug)]
struct ChatbotResponse {
    #[serde(default)]
    response: Option<String>,
}

/// Talks to the external LangGraph chatbot service (`POST {api_url}/chat`).
#[derive(Clone, Debug)]
pub struct LangGraphChatbot {
    client: ReqwestClient,
    api_url: String,
}

impl LangGraphChatbot {
    pub fn new(api_url: String, timeout: Duration) -> Result<Self, ChatbotError> {
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .build()
            .map_err(ChatbotError::ReqwestClientBuild)?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat", self.api_url)
    }
}

#[async_trait]
impl ChatbotProvider for LangGraphChatbot {
    async fn reply(&self, request: &ChatbotRequest) -> Result<String, ChatbotError> {
        debug!(
            user_id = %request.user_id,
            history = request.chat_history.len(),
            "Calling chatbot"
        );
        let response = self
            .client
            .post(self.endpoint())
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ChatbotError::Timeout
                } else {
                    ChatbotError::Request(e)
                }
            })?;

        if !response.status().is_success() {
            return Err(ChatbotError::Status(response.status().as_u16()));
        }

        let body: ChatbotResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ChatbotError::Timeout
            } else {
                ChatbotError::Deserialization(e)
            }
        })?;

        body.response
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .ok_or(ChatbotError::EmptyReply)
    }
}
