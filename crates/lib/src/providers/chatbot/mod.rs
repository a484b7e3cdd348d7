pub mod langgraph;

use crate::{
    constants::{
        CHATBOT_BUSY_REPLY, CHATBOT_EMPTY_REPLY, CHATBOT_ERROR_REPLY, CHATBOT_TIMEOUT_REPLY,
    },
    errors::ChatbotError,
};
use async_trait::async_trait;
use dyn_clone::DynClone;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use tracing::warn;

/// One prior turn of a chatbot conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Everything the chatbot needs to answer one message.
#[derive(Debug, Clone, Serialize)]
pub struct ChatbotRequest {
    pub message: String,
    pub user_id: String,
    pub session_id: String,
    pub chat_history: Vec<ChatTurn>,
}

/// A conversational assistant reachable over the network.
///
/// Implementations return the raw reply or a [`ChatbotError`]; callers that
/// must always answer the user go through [`reply_or_apologize`].
#[async_trait]
pub trait ChatbotProvider: Send + Sync + Debug + DynClone {
    async fn reply(&self, request: &ChatbotRequest) -> Result<String, ChatbotError>;
}

dyn_clone::clone_trait_object!(ChatbotProvider);

/// Fixed apology shown to the user for a failed chatbot call.
pub fn fallback_reply(error: &ChatbotError) -> &'static str {
    match error {
        ChatbotError::Timeout => CHATBOT_TIMEOUT_REPLY,
        ChatbotError::Status(_) => CHATBOT_BUSY_REPLY,
        ChatbotError::EmptyReply => CHATBOT_EMPTY_REPLY,
        ChatbotError::ReqwestClientBuild(_)
        | ChatbotError::Request(_)
        | ChatbotError::Deserialization(_) => CHATBOT_ERROR_REPLY,
    }
}

/// Asks the chatbot and never fails: errors become an apology string.
pub async fn reply_or_apologize(provider: &dyn ChatbotProvider, request: &ChatbotRequest) -> String {
    match provider.reply(request).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!(user_id = %request.user_id, "Chatbot call failed: {e}");
            fallback_reply(&e).to_string()
        }
    }
}
