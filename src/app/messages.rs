use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::app::access::Caller;
use crate::app::error::{foreign_key_violation, require_text, ServiceError, ServiceResult};
use crate::domain::message::{Conversation, Message};
use crate::infra::db::Db;

const MAX_CONTENT_LEN: usize = 2000;

fn message_from_row(row: &PgRow) -> Message {
    Message {
        id: row.get("id"),
        sender_id: row.get("sender_id"),
        receiver_id: row.get("receiver_id"),
        content: row.get("content"),
        sent_at: row.get("sent_at"),
    }
}

#[derive(Clone)]
pub struct MessageService {
    db: Db,
}

impl MessageService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn send_message(
        &self,
        sender: &Caller,
        receiver_id: Uuid,
        content: &str,
    ) -> ServiceResult<Message> {
        if sender.user_id == receiver_id {
            return Err(ServiceError::validation("cannot send a message to yourself"));
        }
        let content = require_text("content", content, MAX_CONTENT_LEN)?;

        let row = sqlx::query(
            "INSERT INTO messages (sender_id, receiver_id, content) \
             VALUES ($1, $2, $3) \
             RETURNING id, sender_id, receiver_id, content, sent_at",
        )
        .bind(sender.user_id)
        .bind(receiver_id)
        .bind(content)
        .fetch_one(self.db.pool())
        .await
        .map_err(|err| match foreign_key_violation(&err) {
            Some(_) => ServiceError::NotFound("user"),
            None => ServiceError::Database(err),
        })?;

        Ok(message_from_row(&row))
    }

    /// One entry per counterpart holding the latest message exchanged with
    /// them, most recent conversation first.
    pub async fn list_conversations(&self, user: &Caller) -> ServiceResult<Vec<Conversation>> {
        let rows = sqlx::query(
            "SELECT latest.*, u.username AS counterpart_username \
             FROM ( \
                 SELECT DISTINCT ON (mine.counterpart_id) \
                        mine.id, mine.sender_id, mine.receiver_id, mine.content, \
                        mine.sent_at, mine.counterpart_id \
                 FROM ( \
                     SELECT m.*, \
                            CASE WHEN m.sender_id = $1 THEN m.receiver_id ELSE m.sender_id END \
                                AS counterpart_id \
                     FROM messages m \
                     WHERE m.sender_id = $1 OR m.receiver_id = $1 \
                 ) mine \
                 ORDER BY mine.counterpart_id, mine.sent_at DESC, mine.id DESC \
             ) latest \
             JOIN users u ON u.id = latest.counterpart_id \
             ORDER BY latest.sent_at DESC, latest.id DESC",
        )
        .bind(user.user_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let last_message = message_from_row(row);
                Conversation {
                    counterpart_id: row.get("counterpart_id"),
                    counterpart_username: row.get("counterpart_username"),
                    last_sent_at: last_message.sent_at,
                    last_message,
                }
            })
            .collect())
    }

    /// Both directions between the caller and `other_id`, oldest first.
    pub async fn get_thread(&self, user: &Caller, other_id: Uuid) -> ServiceResult<Vec<Message>> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(other_id)
            .fetch_one(self.db.pool())
            .await?;
        if !exists {
            return Err(ServiceError::NotFound("user"));
        }

        let rows = sqlx::query(
            "SELECT id, sender_id, receiver_id, content, sent_at \
             FROM messages \
             WHERE (sender_id = $1 AND receiver_id = $2) \
                OR (sender_id = $2 AND receiver_id = $1) \
             ORDER BY sent_at ASC, id ASC",
        )
        .bind(user.user_id)
        .bind(other_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(message_from_row).collect())
    }
}
