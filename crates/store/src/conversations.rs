use crate::connection::SqliteStore;
use rusqlite::{params, OptionalExtension};
use spaceduck_domain::model::{AttachmentRef, Conversation, ConversationMessage, Session};
use spaceduck_domain::tool::Role;
use spaceduck_domain::{Error, Result};

/// Conversation, message, and session persistence (§3, §4.8 `/api/conversations`).
#[async_trait::async_trait]
pub trait ConversationRepository: Send + Sync + 'static {
    async fn create_conversation(&self, title: Option<String>) -> Result<Conversation>;
    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>>;
    async fn list_conversations(&self) -> Result<Vec<Conversation>>;
    async fn delete_conversation(&self, id: &str) -> Result<()>;
    async fn touch_conversation(&self, id: &str) -> Result<()>;

    async fn append_message(&self, message: &ConversationMessage) -> Result<()>;
    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<ConversationMessage>>;

    async fn get_session(&self, channel: &str, sender: &str) -> Result<Option<Session>>;
    async fn upsert_session(&self, session: &Session) -> Result<()>;
}

#[async_trait::async_trait]
impl ConversationRepository for SqliteStore {
    async fn create_conversation(&self, title: Option<String>) -> Result<Conversation> {
        let conv = Conversation {
            id: uuid::Uuid::new_v4().to_string(),
            title,
            last_active_at: chrono::Utc::now(),
            created_at: chrono::Utc::now(),
        };
        let to_insert = conv.clone();
        self.run_blocking(move |conn| {
            conn.execute(
                "INSERT INTO conversations (id, title, created_at, last_active_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    to_insert.id,
                    to_insert.title,
                    to_insert.created_at,
                    to_insert.last_active_at
                ],
            )?;
            Ok(())
        })
        .await?;
        Ok(conv)
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>> {
        let id = id.to_string();
        self.run_blocking(move |conn| {
            conn.query_row(
                "SELECT id, title, created_at, last_active_at FROM conversations WHERE id = ?1",
                params![id],
                row_to_conversation,
            )
            .optional()
        })
        .await
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        self.run_blocking(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, created_at, last_active_at
                 FROM conversations ORDER BY last_active_at DESC",
            )?;
            stmt.query_map([], row_to_conversation)?.collect()
        })
        .await
    }

    async fn delete_conversation(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        let affected = self
            .run_blocking(move |conn| conn.execute("DELETE FROM conversations WHERE id = ?1", params![id]))
            .await?;
        if affected == 0 {
            return Err(Error::NotFound("conversation not found".into()));
        }
        Ok(())
    }

    async fn touch_conversation(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.run_blocking(move |conn| {
            conn.execute(
                "UPDATE conversations SET last_active_at = datetime('now') WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
    }

    async fn append_message(&self, message: &ConversationMessage) -> Result<()> {
        let message = message.clone();
        let attachments_json = serde_json::to_string(&message.attachments).unwrap_or_else(|_| "[]".into());
        let conversation_id = message.conversation_id.clone();
        self.run_blocking(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO messages (id, conversation_id, role, text, created_at, request_id, attachments_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    message.id,
                    message.conversation_id,
                    role_to_str(message.role),
                    message.text,
                    message.created_at,
                    message.request_id,
                    attachments_json
                ],
            )?;
            tx.execute(
                "UPDATE conversations SET last_active_at = ?1 WHERE id = ?2",
                params![message.created_at, conversation_id],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<ConversationMessage>> {
        let conversation_id = conversation_id.to_string();
        self.run_blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, role, text, created_at, request_id, attachments_json
                 FROM messages WHERE conversation_id = ?1 ORDER BY created_at ASC",
            )?;
            stmt.query_map(params![conversation_id], row_to_message)?.collect()
        })
        .await
    }

    async fn get_session(&self, channel: &str, sender: &str) -> Result<Option<Session>> {
        let channel = channel.to_string();
        let sender = sender.to_string();
        self.run_blocking(move |conn| {
            conn.query_row(
                "SELECT channel, sender, conversation_id, created_at, updated_at
                 FROM sessions WHERE channel = ?1 AND sender = ?2",
                params![channel, sender],
                row_to_session,
            )
            .optional()
        })
        .await
    }

    async fn upsert_session(&self, session: &Session) -> Result<()> {
        let session = session.clone();
        self.run_blocking(move |conn| {
            conn.execute(
                "INSERT INTO sessions (channel, sender, conversation_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(channel, sender) DO UPDATE SET
                    conversation_id = excluded.conversation_id,
                    updated_at = excluded.updated_at",
                params![
                    session.channel,
                    session.sender,
                    session.conversation_id,
                    session.created_at,
                    session.updated_at
                ],
            )?;
            Ok(())
        })
        .await
    }
}

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

fn str_to_role(s: &str) -> rusqlite::Result<Role> {
    match s {
        "system" => Ok(Role::System),
        "user" => Ok(Role::User),
        "assistant" => Ok(Role::Assistant),
        "tool" => Ok(Role::Tool),
        other => Err(rusqlite::Error::InvalidColumnType(
            0,
            format!("unknown role: {other}"),
            rusqlite::types::Type::Text,
        )),
    }
}

fn row_to_conversation(row: &rusqlite::Row) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        title: row.get(1)?,
        created_at: row.get(2)?,
        last_active_at: row.get(3)?,
    })
}

fn row_to_message(row: &rusqlite::Row) -> rusqlite::Result<ConversationMessage> {
    let role_str: String = row.get(2)?;
    let attachments_json: String = row.get(6)?;
    let attachments: Vec<AttachmentRef> = serde_json::from_str(&attachments_json).unwrap_or_default();
    Ok(ConversationMessage {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        role: str_to_role(&role_str)?,
        text: row.get(3)?,
        created_at: row.get(4)?,
        request_id: row.get(5)?,
        attachments,
    })
}

fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<Session> {
    Ok(Session {
        channel: row.get(0)?,
        sender: row.get(1)?,
        conversation_id: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}
