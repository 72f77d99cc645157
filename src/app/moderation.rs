use serde_json::{json, Value};
use sqlx::{Postgres, Row, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::access::{require_admin, Caller};
use crate::app::error::{ServiceError, ServiceResult};
use crate::domain::announcement::ModerationStatus;
use crate::domain::audit::AuditEntry;
use crate::infra::db::Db;

/// Appends an audit entry inside the caller's transaction.
pub(crate) async fn record_action(
    tx: &mut Transaction<'_, Postgres>,
    admin_id: Uuid,
    action: &str,
    target_type: &str,
    target_id: Option<Uuid>,
    details: Option<Value>,
) -> ServiceResult<()> {
    sqlx::query(
        "INSERT INTO audit_logs (admin_id, action, target_type, target_id, details) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(admin_id)
    .bind(action)
    .bind(target_type)
    .bind(target_id)
    .bind(details)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

#[derive(Clone)]
pub struct ModerationService {
    db: Db,
}

impl ModerationService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn approve(&self, admin: &Caller, announcement_id: Uuid) -> ServiceResult<()> {
        self.decide(admin, announcement_id, ModerationStatus::Approved)
            .await
    }

    pub async fn reject(&self, admin: &Caller, announcement_id: Uuid) -> ServiceResult<()> {
        self.decide(admin, announcement_id, ModerationStatus::Rejected)
            .await
    }

    /// Moves a pending announcement to `next` and logs it, atomically.
    pub async fn decide(
        &self,
        admin: &Caller,
        announcement_id: Uuid,
        next: ModerationStatus,
    ) -> ServiceResult<()> {
        require_admin(admin)?;
        if next == ModerationStatus::Pending {
            return Err(ServiceError::validation(
                "status must be one of: approved, rejected",
            ));
        }

        let mut tx = self.db.pool().begin().await?;
        let current: Option<String> =
            sqlx::query_scalar("SELECT status FROM announcements WHERE id = $1 FOR UPDATE")
                .bind(announcement_id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(current) = current else {
            tx.rollback().await?;
            return Err(ServiceError::NotFound("announcement"));
        };
        let current = ModerationStatus::from_db(&current)
            .ok_or_else(|| anyhow::anyhow!("unknown announcement status: {}", current))?;

        if !current.can_transition_to(next) {
            tx.rollback().await?;
            return Err(ServiceError::InvalidTransition {
                from: current,
                to: next,
            });
        }

        sqlx::query("UPDATE announcements SET status = $2 WHERE id = $1")
            .bind(announcement_id)
            .bind(next.as_db())
            .execute(&mut *tx)
            .await?;

        let action = match next {
            ModerationStatus::Approved => "approve",
            _ => "reject",
        };
        record_action(
            &mut tx,
            admin.user_id,
            action,
            "announcement",
            Some(announcement_id),
            None,
        )
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn delete_comment(&self, admin: &Caller, comment_id: Uuid) -> ServiceResult<()> {
        require_admin(admin)?;

        let mut tx = self.db.pool().begin().await?;
        let row = sqlx::query(
            "DELETE FROM comments WHERE id = $1 RETURNING announcement_id, user_id",
        )
        .bind(comment_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Err(ServiceError::NotFound("comment"));
        };
        let announcement_id: Uuid = row.get("announcement_id");
        let author_id: Uuid = row.get("user_id");

        record_action(
            &mut tx,
            admin.user_id,
            "delete",
            "comment",
            Some(comment_id),
            Some(json!({
                "announcement_id": announcement_id,
                "author_id": author_id,
            })),
        )
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn list_audit(
        &self,
        cursor: Option<(OffsetDateTime, Uuid)>,
        limit: i64,
    ) -> ServiceResult<Vec<AuditEntry>> {
        let rows = match cursor {
            Some((created_at, entry_id)) => {
                sqlx::query(
                    "SELECT id, admin_id, action, target_type, target_id, details, created_at \
                     FROM audit_logs \
                     WHERE (created_at < $1 OR (created_at = $1 AND id < $2)) \
                     ORDER BY created_at DESC, id DESC \
                     LIMIT $3",
                )
                .bind(created_at)
                .bind(entry_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, admin_id, action, target_type, target_id, details, created_at \
                     FROM audit_logs \
                     ORDER BY created_at DESC, id DESC \
                     LIMIT $1",
                )
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
        };

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push(AuditEntry {
                id: row.get("id"),
                admin_id: row.get("admin_id"),
                action: row.get("action"),
                target_type: row.get("target_type"),
                target_id: row.get("target_id"),
                details: row.get("details"),
                created_at: row.get("created_at"),
            });
        }

        Ok(entries)
    }
}
