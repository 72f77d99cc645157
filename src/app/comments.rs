use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::app::access::Caller;
use crate::app::announcements::visible_to;
use crate::app::error::{foreign_key_violation, require_text, ServiceError, ServiceResult};
use crate::domain::comment::{Comment, CommentWithAnnouncement};
use crate::infra::db::Db;

const MAX_CONTENT_LEN: usize = 1000;

fn comment_from_row(row: &PgRow) -> Comment {
    Comment {
        id: row.get("id"),
        announcement_id: row.get("announcement_id"),
        user_id: row.get("user_id"),
        author_username: row.get("author_username"),
        content: row.get("content"),
        sent_at: row.get("sent_at"),
    }
}

#[derive(Clone)]
pub struct CommentService {
    db: Db,
}

impl CommentService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn add(
        &self,
        author: &Caller,
        announcement_id: Uuid,
        content: &str,
    ) -> ServiceResult<Comment> {
        let content = require_text("content", content, MAX_CONTENT_LEN)?;
        if !visible_to(&self.db, announcement_id, Some(author)).await? {
            return Err(ServiceError::NotFound("announcement"));
        }

        let row = sqlx::query(
            "WITH inserted AS ( \
                 INSERT INTO comments (announcement_id, user_id, content) \
                 VALUES ($1, $2, $3) \
                 RETURNING id, announcement_id, user_id, content, sent_at \
             ) \
             SELECT i.id, i.announcement_id, i.user_id, i.content, i.sent_at, \
                    u.username AS author_username \
             FROM inserted i \
             JOIN users u ON u.id = i.user_id",
        )
        .bind(announcement_id)
        .bind(author.user_id)
        .bind(content)
        .fetch_one(self.db.pool())
        .await
        .map_err(|err| match foreign_key_violation(&err) {
            Some(constraint) if constraint.contains("user") => ServiceError::NotFound("user"),
            Some(_) => ServiceError::NotFound("announcement"),
            None => ServiceError::Database(err),
        })?;

        Ok(comment_from_row(&row))
    }

    /// Oldest first, so the thread reads top to bottom.
    pub async fn list_for_announcement(
        &self,
        announcement_id: Uuid,
        viewer: &Caller,
    ) -> ServiceResult<Vec<Comment>> {
        if !visible_to(&self.db, announcement_id, Some(viewer)).await? {
            return Err(ServiceError::NotFound("announcement"));
        }

        let rows = sqlx::query(
            "SELECT c.id, c.announcement_id, c.user_id, c.content, c.sent_at, \
                    u.username AS author_username \
             FROM comments c \
             JOIN users u ON u.id = c.user_id \
             WHERE c.announcement_id = $1 \
             ORDER BY c.sent_at ASC, c.id ASC",
        )
        .bind(announcement_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(comment_from_row).collect())
    }

    pub async fn owner_of(&self, comment_id: Uuid) -> ServiceResult<Option<Uuid>> {
        let owner = sqlx::query_scalar("SELECT user_id FROM comments WHERE id = $1")
            .bind(comment_id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(owner)
    }

    /// Callers must have passed the owner-or-admin guard.
    pub async fn delete(&self, comment_id: Uuid) -> ServiceResult<()> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(comment_id)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound("comment"));
        }
        Ok(())
    }

    pub async fn list_all(&self) -> ServiceResult<Vec<CommentWithAnnouncement>> {
        let rows = sqlx::query(
            "SELECT c.id, c.announcement_id, c.user_id, c.content, c.sent_at, \
                    u.username AS author_username, a.title AS announcement_title \
             FROM comments c \
             JOIN users u ON u.id = c.user_id \
             JOIN announcements a ON a.id = c.announcement_id \
             ORDER BY c.sent_at DESC, c.id DESC",
        )
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows
            .iter()
            .map(|row| CommentWithAnnouncement {
                comment: comment_from_row(row),
                announcement_title: row.get("announcement_title"),
            })
            .collect())
    }
}
