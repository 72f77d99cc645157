use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub sent_at: OffsetDateTime,
}

/// Latest message exchanged with one counterpart.
#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub counterpart_id: Uuid,
    pub counterpart_username: String,
    pub last_message: Message,
    #[serde(with = "time::serde::rfc3339")]
    pub last_sent_at: OffsetDateTime,
}
