//! What each client frame does. Persistence lives in `medreturn::chat`; this
//! module routes the results to the right sockets.

use super::{registry::ConnectionId, ChatbotTurn, ClientFrame, ServerFrame};
use crate::state::AppState;
use core_access::User;
use medreturn::{chat, chat::MessageView, DomainError};
use tracing::{debug, warn};

/// Parses and dispatches one text frame. Failures are reported to the socket
/// that sent the frame and never close it.
pub async fn handle_text(
    app_state: &AppState,
    user: &User,
    connection_id: ConnectionId,
    text: &str,
) {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(user_id = %user.id, "Ignoring unreadable frame: {e}");
            return;
        }
    };
    if let Err(e) = dispatch(app_state, user, frame).await {
        warn!(user_id = %user.id, "Chat frame failed: {e}");
        app_state.connections.send_to_connection(
            &user.id,
            connection_id,
            ServerFrame::Error {
                message: e.to_string(),
            },
        );
    }
}

/// Pushes freshly stored messages: `new_message` to each recipient and
/// `message_sent` back to the sender.
pub fn deliver_sent(app_state: &AppState, sender_id: &str, sent: &[MessageView]) {
    for view in sent {
        if let Some(recipient_id) = view.message.recipient_id.as_deref() {
            let delivered = app_state.connections.send_to(
                recipient_id,
                &ServerFrame::NewMessage {
                    message: view.clone(),
                },
            );
            debug!(recipient_id, delivered, "Relayed chat message");
        }
        app_state.connections.send_to(
            sender_id,
            &ServerFrame::MessageSent {
                message: view.clone(),
            },
        );
    }
}

pub async fn dispatch(
    app_state: &AppState,
    user: &User,
    frame: ClientFrame,
) -> Result<(), DomainError> {
    match frame {
        ClientFrame::ChatMessage {
            content,
            recipient_id,
        } => {
            if content.trim().is_empty() {
                return Ok(());
            }
            let sent =
                chat::send_chat_message(&app_state.store, user, &content, recipient_id.as_deref())
                    .await?;
            deliver_sent(app_state, &user.id, &sent);
        }
        ClientFrame::ChatbotMessage { content } => {
            if content.trim().is_empty() {
                return Ok(());
            }
            let exchange = chat::chatbot_exchange(
                &app_state.store,
                app_state.chatbot.as_ref(),
                user,
                &content,
                app_state.config.chatbot.history_limit,
            )
            .await?;
            app_state.connections.send_to(
                &user.id,
                &ServerFrame::ChatbotResponse {
                    user_message: ChatbotTurn::from(&exchange.user_message),
                    bot_message: ChatbotTurn::from(&exchange.bot_message),
                },
            );
        }
        ClientFrame::Typing { recipient_id } => {
            if let Some(recipient_id) = recipient_id {
                app_state.connections.send_to(
                    &recipient_id,
                    &ServerFrame::Typing {
                        user_id: user.id.clone(),
                        user_name: user.full_name.clone(),
                    },
                );
            }
        }
        ClientFrame::MarkRead { message_ids } => {
            if message_ids.is_empty() {
                return Ok(());
            }
            let tx = app_state.store.write().await?;
            let marked = chat::mark_read(&tx, &user.id, &message_ids).await;
            let marked = tx.settle(marked).await?;
            debug!(user_id = %user.id, marked, "Marked messages read");
        }
    }
    Ok(())
}
