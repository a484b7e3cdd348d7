//! # Chat
//!
//! Persistence for the support chat and the chatbot conversation. Both live in
//! the `messages` table: support messages are `user_chat` rows addressed to one
//! recipient, chatbot turns are `chatbot` rows whose conversation id is the
//! user's id and whose bot replies carry the `[BOT] ` prefix.
//!
//! Socket delivery is not handled here; callers push the returned messages.

use crate::{
    constants::BOT_PREFIX,
    errors::DomainError,
    providers::chatbot::{reply_or_apologize, ChatTurn, ChatbotProvider, ChatbotRequest},
    store::{columns, Store},
    types::MessageKind,
};
use core_access::{Role, User};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use turso::{params, Connection, Row, Value};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    pub recipient_id: Option<String>,
    pub content: String,
    pub kind: String,
    pub conversation_id: String,
    pub created_at: String,
}

impl Message {
    pub fn is_bot(&self) -> bool {
        self.content.starts_with(BOT_PREFIX)
    }

    /// Content with the bot prefix removed.
    pub fn text(&self) -> &str {
        self.content.strip_prefix(BOT_PREFIX).unwrap_or(&self.content)
    }
}

const MESSAGE_COLUMNS: &str =
    "m.id, m.sender_id, m.recipient_id, m.content, m.kind, m.conversation_id, m.created_at";

impl TryFrom<&Row> for Message {
    type Error = DomainError;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        Ok(Message {
            id: columns::text(row, 0)?,
            sender_id: columns::text(row, 1)?,
            recipient_id: columns::opt_text(row, 2)?,
            content: columns::text(row, 3)?,
            kind: columns::text(row, 4)?,
            conversation_id: columns::text(row, 5)?,
            created_at: columns::text(row, 6)?,
        })
    }
}

/// A message as shown to one viewer.
#[derive(Debug, Clone, Serialize)]
pub struct MessageView {
    #[serde(flatten)]
    pub message: Message,
    pub sender_name: Option<String>,
    pub sender_role: Option<String>,
    pub recipient_name: Option<String>,
    pub is_read: bool,
}

const VIEW_SELECT: &str = "SELECT m.id, m.sender_id, m.recipient_id, m.content, m.kind, m.conversation_id, m.created_at,
        sender.full_name, sender.role, recipient.full_name, COALESCE(md.is_read, 0)
     FROM messages m
     LEFT JOIN users sender ON sender.id = m.sender_id
     LEFT JOIN users recipient ON recipient.id = m.recipient_id
     LEFT JOIN message_details md ON md.message_id = m.id AND md.user_id = ?";

fn view_from_row(row: &Row) -> Result<MessageView, DomainError> {
    Ok(MessageView {
        message: Message::try_from(row)?,
        sender_name: columns::opt_text(row, 7)?,
        sender_role: columns::opt_text(row, 8)?,
        recipient_name: columns::opt_text(row, 9)?,
        is_read: columns::boolean(row, 10)?,
    })
}

async fn collect_views(
    conn: &Connection,
    sql: &str,
    args: Vec<Value>,
) -> Result<Vec<MessageView>, DomainError> {
    let mut rows = conn.query(sql, args).await?;
    let mut views = Vec::new();
    while let Some(row) = rows.next().await? {
        views.push(view_from_row(&row)?);
    }
    Ok(views)
}

fn text_value(s: &str) -> Value {
    Value::Text(s.to_string())
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Reuses the conversation id already shared by the pair, in either
/// direction, or mints a new one.
pub async fn resolve_conversation_id(
    conn: &Connection,
    user_a: &str,
    user_b: &str,
) -> Result<String, DomainError> {
    let mut rows = conn
        .query(
            "SELECT conversation_id FROM messages WHERE ((sender_id = ? AND recipient_id = ?) OR (sender_id = ? AND recipient_id = ?)) AND kind = ? LIMIT 1",
            params![user_a, user_b, user_b, user_a, MessageKind::UserChat.as_str()],
        )
        .await?;
    match rows.next().await? {
        Some(row) => Ok(columns::text(&row, 0)?),
        None => Ok(Uuid::new_v4().to_string()),
    }
}

async fn insert_message(
    conn: &Connection,
    sender_id: &str,
    recipient_id: Option<&str>,
    content: &str,
    kind: MessageKind,
    conversation_id: &str,
) -> Result<Message, DomainError> {
    let message = Message {
        id: Uuid::new_v4().to_string(),
        sender_id: sender_id.to_string(),
        recipient_id: recipient_id.map(str::to_string),
        content: content.to_string(),
        kind: kind.as_str().to_string(),
        conversation_id: conversation_id.to_string(),
        created_at: columns::timestamp_now(),
    };
    conn.execute(
        "INSERT INTO messages (id, sender_id, recipient_id, content, kind, conversation_id, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        params![
            message.id.as_str(),
            sender_id,
            recipient_id,
            content,
            kind.as_str(),
            conversation_id,
            message.created_at.as_str()
        ],
    )
    .await?;
    Ok(message)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailMark {
    Delivered,
    Read,
}

/// Sets the delivered or read flag on the per-recipient detail row,
/// creating the row when it does not exist yet.
pub async fn upsert_detail(
    conn: &Connection,
    message_id: &str,
    user_id: &str,
    mark: DetailMark,
) -> Result<(), DomainError> {
    let exists = conn
        .query(
            "SELECT 1 FROM message_details WHERE message_id = ? AND user_id = ?",
            params![message_id, user_id],
        )
        .await?
        .next()
        .await?
        .is_some();
    let now = columns::timestamp_now();

    let sql = match (exists, mark) {
        (true, DetailMark::Delivered) => "UPDATE message_details SET is_delivered = 1, delivered_at = ? WHERE message_id = ? AND user_id = ?",
        (true, DetailMark::Read) => "UPDATE message_details SET is_read = 1, read_at = ? WHERE message_id = ? AND user_id = ?",
        (false, DetailMark::Delivered) => "INSERT INTO message_details (delivered_at, message_id, user_id, is_read, is_delivered) VALUES (?, ?, ?, 0, 1)",
        (false, DetailMark::Read) => "INSERT INTO message_details (read_at, message_id, user_id, is_read, is_delivered) VALUES (?, ?, ?, 1, 0)",
    };
    conn.execute(sql, params![now, message_id, user_id]).await?;
    Ok(())
}

/// ADMIN and CONGTACVIEN users: everyone who answers support chats.
pub async fn support_staff_ids(conn: &Connection) -> Result<Vec<String>, DomainError> {
    Ok(core_access::user_ids_with_roles(conn, &[Role::Admin, Role::Collaborator]).await?)
}

async fn send_in_tx(
    conn: &Connection,
    sender: &User,
    content: &str,
    recipient_id: Option<&str>,
) -> Result<Vec<MessageView>, DomainError> {
    let recipients: Vec<(String, Option<String>)> = match recipient_id {
        Some(recipient_id) if sender.is_admin() => {
            let recipient = core_access::find_user_by_id(conn, recipient_id)
                .await?
                .ok_or_else(|| DomainError::not_found("Không tìm thấy người dùng"))?;
            vec![(recipient.id, Some(recipient.full_name))]
        }
        _ => {
            let mut staff = Vec::new();
            for id in support_staff_ids(conn).await? {
                if id == sender.id {
                    continue;
                }
                let name = core_access::find_user_by_id(conn, &id)
                    .await?
                    .map(|u| u.full_name);
                staff.push((id, name));
            }
            if staff.is_empty() {
                return Err(DomainError::NoOneAvailable(
                    "Hiện chưa có quản trị viên khả dụng. Vui lòng thử lại sau.".to_string(),
                ));
            }
            staff
        }
    };

    let mut sent = Vec::with_capacity(recipients.len());
    for (recipient_id, recipient_name) in recipients {
        let conversation_id = resolve_conversation_id(conn, &sender.id, &recipient_id).await?;
        let message = insert_message(
            conn,
            &sender.id,
            Some(&recipient_id),
            content,
            MessageKind::UserChat,
            &conversation_id,
        )
        .await?;
        upsert_detail(conn, &message.id, &recipient_id, DetailMark::Delivered).await?;
        sent.push(MessageView {
            message,
            sender_name: Some(sender.full_name.clone()),
            sender_role: Some(sender.role.clone()),
            recipient_name,
            is_read: false,
        });
    }
    Ok(sent)
}

/// Sends a support chat message.
///
/// An admin naming a recipient writes one message to that user. Everyone
/// else writes one message to each support staff member, each in its own
/// conversation. Returns the stored messages, one per recipient.
pub async fn send_chat_message(
    store: &Store,
    sender: &User,
    content: &str,
    recipient_id: Option<&str>,
) -> Result<Vec<MessageView>, DomainError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(DomainError::validation("Nội dung tin nhắn không được để trống"));
    }
    let tx = store.write().await?;
    let result = send_in_tx(&tx, sender, content, recipient_id).await;
    let sent = tx.settle(result).await?;
    info!(sender_id = %sender.id, recipients = sent.len(), "Chat message stored");
    Ok(sent)
}

/// Which thread a message listing should show.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageQuery {
    pub user_id: Option<String>,
    pub conversation_type: Option<String>,
}

/// Messages visible to `viewer`, oldest first.
///
/// `conversation_type=chatbot` shows the viewer's chatbot turns. Otherwise an
/// admin must name the user to chat with, and anyone else sees their thread
/// with the support staff.
pub async fn list_messages(
    conn: &Connection,
    viewer: &User,
    query: &MessageQuery,
) -> Result<Vec<MessageView>, DomainError> {
    if query.conversation_type.as_deref() == Some(MessageKind::Chatbot.as_str()) {
        return chatbot_messages(conn, &viewer.id).await;
    }

    if viewer.is_admin() {
        let other = query.user_id.as_deref().ok_or_else(|| {
            DomainError::validation("Cần user_id hoặc conversation_type=chatbot")
        })?;
        let sql = format!(
            "{VIEW_SELECT} WHERE m.kind = ? AND ((m.sender_id = ? AND m.recipient_id = ?) OR (m.sender_id = ? AND m.recipient_id = ?)) ORDER BY m.created_at ASC"
        );
        let args = vec![
            text_value(&viewer.id),
            text_value(MessageKind::UserChat.as_str()),
            text_value(&viewer.id),
            text_value(other),
            text_value(other),
            text_value(&viewer.id),
        ];
        return collect_views(conn, &sql, args).await;
    }

    let staff = support_staff_ids(conn).await?;
    if staff.is_empty() {
        return Ok(Vec::new());
    }
    let marks = placeholders(staff.len());
    let sql = format!(
        "{VIEW_SELECT} WHERE m.kind = ? AND ((m.sender_id = ? AND m.recipient_id IN ({marks})) OR (m.recipient_id = ? AND m.sender_id IN ({marks}))) ORDER BY m.created_at ASC"
    );
    let mut args = vec![
        text_value(&viewer.id),
        text_value(MessageKind::UserChat.as_str()),
        text_value(&viewer.id),
    ];
    args.extend(staff.iter().map(|id| text_value(id)));
    args.push(text_value(&viewer.id));
    args.extend(staff.iter().map(|id| text_value(id)));
    collect_views(conn, &sql, args).await
}

/// The user's chatbot conversation, oldest first.
pub async fn chatbot_messages(
    conn: &Connection,
    user_id: &str,
) -> Result<Vec<MessageView>, DomainError> {
    let sql = format!(
        "{VIEW_SELECT} WHERE m.kind = ? AND m.sender_id = ? ORDER BY m.created_at ASC"
    );
    let args = vec![
        text_value(user_id),
        text_value(MessageKind::Chatbot.as_str()),
        text_value(user_id),
    ];
    collect_views(conn, &sql, args).await
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Conversation {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub user_id: Option<String>,
    pub last_message_at: Option<String>,
}

impl Conversation {
    fn fixed(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind: id.to_string(),
            user_id: None,
            last_message_at: None,
        }
    }
}

/// Conversation list for the chat sidebar.
///
/// Admins get the chatbot plus every non-admin user they have chatted with,
/// most recent first. Everyone else gets the fixed support and chatbot entries.
pub async fn list_conversations(
    conn: &Connection,
    viewer: &User,
) -> Result<Vec<Conversation>, DomainError> {
    let chatbot = Conversation::fixed("chatbot", "AI Chatbot");
    if !viewer.is_admin() {
        return Ok(vec![Conversation::fixed("admin", "Quản trị viên"), chatbot]);
    }

    let partners = {
        let mut rows = conn
            .query(
                "SELECT CASE WHEN sender_id = ? THEN recipient_id ELSE sender_id END AS partner, MAX(created_at) AS last_at
                 FROM messages
                 WHERE kind = ? AND (sender_id = ? OR recipient_id = ?)
                 GROUP BY partner
                 ORDER BY last_at DESC",
                params![
                    viewer.id.as_str(),
                    MessageKind::UserChat.as_str(),
                    viewer.id.as_str(),
                    viewer.id.as_str()
                ],
            )
            .await?;
        let mut partners = Vec::new();
        while let Some(row) = rows.next().await? {
            if let Some(partner) = columns::opt_text(&row, 0)? {
                partners.push((partner, columns::opt_text(&row, 1)?));
            }
        }
        partners
    };

    let mut conversations = vec![chatbot];
    for (partner_id, last_message_at) in partners {
        let Some(user) = core_access::find_user_by_id(conn, &partner_id).await? else {
            continue;
        };
        if user.is_admin() {
            continue;
        }
        conversations.push(Conversation {
            id: user.id.clone(),
            name: user.full_name,
            kind: "user".to_string(),
            user_id: Some(user.id),
            last_message_at,
        });
    }
    Ok(conversations)
}

/// Marks the listed messages read for `user_id`. Only existing detail rows
/// are touched. Returns the number updated.
pub async fn mark_read(
    conn: &Connection,
    user_id: &str,
    message_ids: &[String],
) -> Result<u64, DomainError> {
    if message_ids.is_empty() {
        return Ok(0);
    }
    let sql = format!(
        "UPDATE message_details SET is_read = 1, read_at = ? WHERE user_id = ? AND message_id IN ({})",
        placeholders(message_ids.len())
    );
    let mut args = vec![Value::Text(columns::timestamp_now()), text_value(user_id)];
    args.extend(message_ids.iter().map(|id| text_value(id)));
    Ok(conn.execute(&sql, args).await?)
}

/// Marks one message read, creating the detail row if needed.
pub async fn mark_message_read(
    conn: &Connection,
    user_id: &str,
    message_id: &str,
) -> Result<(), DomainError> {
    upsert_detail(conn, message_id, user_id, DetailMark::Read).await
}

/// The last `limit` chatbot turns, oldest first, labelled by role.
pub async fn chatbot_history(
    conn: &Connection,
    user_id: &str,
    limit: usize,
) -> Result<Vec<ChatTurn>, DomainError> {
    let sql = format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages m WHERE m.kind = ? AND m.conversation_id = ? ORDER BY m.created_at DESC LIMIT ?"
    );
    let mut rows = conn
        .query(
            &sql,
            params![MessageKind::Chatbot.as_str(), user_id, limit as i64],
        )
        .await?;
    let mut turns = Vec::new();
    while let Some(row) = rows.next().await? {
        let message = Message::try_from(&row)?;
        let turn = if message.is_bot() || message.sender_id != user_id {
            ChatTurn::assistant(message.text())
        } else {
            ChatTurn::user(message.text())
        };
        turns.push(turn);
    }
    turns.reverse();
    Ok(turns)
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatbotExchange {
    pub user_message: Message,
    pub bot_message: Message,
    /// Bot reply without the stored prefix.
    pub reply: String,
}

async fn store_turn(
    store: &Store,
    user_id: &str,
    content: &str,
) -> Result<Message, DomainError> {
    let tx = store.write().await?;
    let result = insert_message(&tx, user_id, None, content, MessageKind::Chatbot, user_id).await;
    tx.settle(result).await
}

/// One round trip with the chatbot.
///
/// The user turn is stored first, so the history sent along includes it. The
/// chatbot is called outside any transaction; a failed call still produces a
/// stored apology as the bot turn.
pub async fn chatbot_exchange(
    store: &Store,
    provider: &dyn ChatbotProvider,
    user: &User,
    content: &str,
    history_limit: usize,
) -> Result<ChatbotExchange, DomainError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(DomainError::validation("Nội dung tin nhắn không được để trống"));
    }

    let user_message = store_turn(store, &user.id, content).await?;
    let chat_history = {
        let conn = store.read().await?;
        chatbot_history(&conn, &user.id, history_limit).await?
    };
    debug!(user_id = %user.id, turns = chat_history.len(), "Loaded chatbot history");

    let request = ChatbotRequest {
        message: content.to_string(),
        user_id: user.id.clone(),
        session_id: format!("user_{}", user.id),
        chat_history,
    };
    let reply = reply_or_apologize(provider, &request).await;

    let bot_message = store_turn(store, &user.id, &format!("{BOT_PREFIX}{reply}")).await?;
    Ok(ChatbotExchange {
        user_message,
        bot_message,
        reply,
    })
}
