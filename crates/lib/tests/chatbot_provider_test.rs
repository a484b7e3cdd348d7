//! # Chatbot Provider Tests
//!
//! Drives `LangGraphChatbot` against a mock HTTP server to check the wire
//! contract and the mapping of each failure to its apology text.

mod common;

use anyhow::Result;
use common::setup_tracing;
use httpmock::{Method, MockServer};
use medreturn::{
    constants::{CHATBOT_BUSY_REPLY, CHATBOT_EMPTY_REPLY, CHATBOT_TIMEOUT_REPLY},
    errors::ChatbotError,
    providers::chatbot::{reply_or_apologize, ChatTurn, ChatbotProvider, ChatbotRequest},
    LangGraphChatbot,
};
use serde_json::json;
use std::time::Duration;

fn request() -> ChatbotRequest {
    ChatbotRequest {
        message: "Thuốc hết hạn xử lý thế nào?".to_string(),
        user_id: "user-1".to_string(),
        session_id: "user_user-1".to_string(),
        chat_history: vec![
            ChatTurn::user("Xin chào"),
            ChatTurn::assistant("Chào bạn!"),
        ],
    }
}

#[tokio::test]
async fn test_reply_posts_contract_and_returns_response() -> Result<()> {
    // --- 1. Arrange ---
    setup_tracing();
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(Method::POST)
                .path("/chat")
                .json_body_partial(
                    json!({
                        "message": "Thuốc hết hạn xử lý thế nào?",
                        "user_id": "user-1",
                        "session_id": "user_user-1",
                        "chat_history": [
                            {"role": "user", "content": "Xin chào"},
                            {"role": "assistant", "content": "Chào bạn!"}
                        ]
                    })
                    .to_string(),
                );
            then.status(200)
                .json_body(json!({"response": "Hãy mang đến nhà thuốc gần nhất."}));
        })
        .await;
    let bot = LangGraphChatbot::new(server.base_url(), Duration::from_secs(5))?;

    // --- 2. Act ---
    let reply = bot.reply(&request()).await?;

    // --- 3. Assert ---
    mock.assert_async().await;
    assert_eq!(reply, "Hãy mang đến nhà thuốc gần nhất.");
    Ok(())
}

#[tokio::test]
async fn test_non_success_status_becomes_busy_apology() -> Result<()> {
    // --- 1. Arrange ---
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(Method::POST).path("/chat");
            then.status(503);
        })
        .await;
    let bot = LangGraphChatbot::new(format!("{}/", server.base_url()), Duration::from_secs(5))?;

    // --- 2. Act ---
    let raw = bot.reply(&request()).await;
    let text = reply_or_apologize(&bot, &request()).await;

    // --- 3. Assert ---
    assert!(matches!(raw, Err(ChatbotError::Status(503))));
    assert_eq!(text, CHATBOT_BUSY_REPLY);
    Ok(())
}

#[tokio::test]
async fn test_slow_service_times_out() -> Result<()> {
    // --- 1. Arrange ---
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(Method::POST).path("/chat");
            then.status(200)
                .delay(Duration::from_secs(2))
                .json_body(json!({"response": "quá muộn"}));
        })
        .await;
    let bot = LangGraphChatbot::new(server.base_url(), Duration::from_millis(200))?;

    // --- 2. Act ---
    let text = reply_or_apologize(&bot, &request()).await;

    // --- 3. Assert ---
    assert_eq!(text, CHATBOT_TIMEOUT_REPLY);
    Ok(())
}

#[tokio::test]
async fn test_missing_response_field_is_empty_reply() -> Result<()> {
    // --- 1. Arrange ---
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(Method::POST).path("/chat");
            then.status(200).json_body(json!({"answer": "sai trường"}));
        })
        .await;
    let bot = LangGraphChatbot::new(server.base_url(), Duration::from_secs(5))?;

    // --- 2. Act ---
    let raw = bot.reply(&request()).await;
    let text = reply_or_apologize(&bot, &request()).await;

    // --- 3. Assert ---
    assert!(matches!(raw, Err(ChatbotError::EmptyReply)));
    assert_eq!(text, CHATBOT_EMPTY_REPLY);
    Ok(())
}
