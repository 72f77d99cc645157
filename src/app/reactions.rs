use anyhow::anyhow;
use sqlx::Row;
use uuid::Uuid;

use crate::app::access::Caller;
use crate::app::announcements::visible_to;
use crate::app::error::{foreign_key_violation, unique_violation, ServiceError, ServiceResult};
use crate::domain::reaction::{Reaction, ReactionSummary, ReactionTarget, ReactionType};
use crate::infra::db::Db;

#[derive(Clone)]
pub struct ReactionService {
    db: Db,
}

impl ReactionService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// One reaction per user and target; a second one is a conflict rather
    /// than a toggle.
    pub async fn add(
        &self,
        user: &Caller,
        target: ReactionTarget,
        kind: &str,
    ) -> ServiceResult<Reaction> {
        let kind = ReactionType::from_db(kind.trim())
            .ok_or_else(|| ServiceError::validation("type must be one of: like, dislike"))?;

        if !self.target_visible(target, Some(user)).await? {
            return Err(ServiceError::NotFound(target.kind()));
        }

        let row = sqlx::query(&format!(
            "INSERT INTO reactions (user_id, {}, type) VALUES ($1, $2, $3) \
             RETURNING id, created_at",
            target.column()
        ))
        .bind(user.user_id)
        .bind(target.id())
        .bind(kind.as_db())
        .fetch_one(self.db.pool())
        .await
        .map_err(|err| {
            if unique_violation(&err).is_some() {
                return ServiceError::conflict(format!(
                    "you already reacted to this {}",
                    target.kind()
                ));
            }
            match foreign_key_violation(&err) {
                Some(constraint) if constraint.contains("user") => ServiceError::NotFound("user"),
                // The target was deleted between the existence check and the insert.
                Some(_) => ServiceError::NotFound(target.kind()),
                None => ServiceError::Database(err),
            }
        })?;

        Ok(Reaction::new(
            row.get("id"),
            user.user_id,
            target,
            kind,
            row.get("created_at"),
        ))
    }

    /// Removing a reaction that does not exist is not an error.
    pub async fn remove(&self, user: &Caller, target: ReactionTarget) -> ServiceResult<()> {
        sqlx::query(&format!(
            "DELETE FROM reactions WHERE user_id = $1 AND {} = $2",
            target.column()
        ))
        .bind(user.user_id)
        .bind(target.id())
        .execute(self.db.pool())
        .await?;

        Ok(())
    }

    pub async fn summary(
        &self,
        target: ReactionTarget,
        viewer: Option<&Caller>,
    ) -> ServiceResult<ReactionSummary> {
        if !self.target_visible(target, viewer).await? {
            return Err(ServiceError::NotFound(target.kind()));
        }

        let row = sqlx::query(&format!(
            "SELECT \
                 COUNT(*) FILTER (WHERE type = 'like') AS likes, \
                 COUNT(*) FILTER (WHERE type = 'dislike') AS dislikes, \
                 MAX(type) FILTER (WHERE user_id = $2) AS own \
             FROM reactions \
             WHERE {} = $1",
            target.column()
        ))
        .bind(target.id())
        .bind(viewer.map(|caller| caller.user_id))
        .fetch_one(self.db.pool())
        .await?;

        let own = row
            .get::<Option<String>, _>("own")
            .map(|own| {
                ReactionType::from_db(&own).ok_or_else(|| anyhow!("unknown reaction type: {}", own))
            })
            .transpose()?;

        Ok(ReactionSummary {
            likes: row.get("likes"),
            dislikes: row.get("dislikes"),
            own,
        })
    }

    /// A comment is visible exactly when its announcement is.
    async fn target_visible(
        &self,
        target: ReactionTarget,
        viewer: Option<&Caller>,
    ) -> ServiceResult<bool> {
        let announcement_id = match target {
            ReactionTarget::Announcement(id) => id,
            ReactionTarget::Comment(id) => {
                let parent: Option<Uuid> =
                    sqlx::query_scalar("SELECT announcement_id FROM comments WHERE id = $1")
                        .bind(id)
                        .fetch_optional(self.db.pool())
                        .await?;
                match parent {
                    Some(parent) => parent,
                    None => return Ok(false),
                }
            }
        };
        visible_to(&self.db, announcement_id, viewer).await
    }
}
