use anyhow::anyhow;
use serde_json::json;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::app::access::{require_admin, Caller};
use crate::app::error::{ServiceError, ServiceResult};
use crate::app::moderation::record_action;
use crate::domain::user::{PublicUser, Role, User};
use crate::infra::db::Db;

pub(crate) const USER_COLUMNS: &str = "id, email, username, role, created_at";

pub(crate) fn user_from_row(row: &PgRow) -> ServiceResult<User> {
    let role: String = row.get("role");
    let role = Role::from_db(&role).ok_or_else(|| anyhow!("unknown role in database: {}", role))?;
    Ok(User {
        id: row.get("id"),
        email: row.get("email"),
        username: row.get("username"),
        role,
        created_at: row.get("created_at"),
    })
}

#[derive(Clone)]
pub struct UserService {
    db: Db,
}

impl UserService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn get_user(&self, user_id: Uuid) -> ServiceResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    pub async fn get_public(&self, user_id: Uuid) -> ServiceResult<PublicUser> {
        self.get_user(user_id)
            .await?
            .map(PublicUser::from)
            .ok_or(ServiceError::NotFound("user"))
    }

    pub async fn exists(&self, user_id: Uuid) -> ServiceResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(self.db.pool())
            .await?;
        Ok(exists)
    }

    pub async fn list(&self) -> ServiceResult<Vec<User>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM users ORDER BY created_at DESC, id DESC",
            USER_COLUMNS
        ))
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(user_from_row).collect()
    }

    pub async fn update_role(
        &self,
        admin: &Caller,
        user_id: Uuid,
        role: Role,
    ) -> ServiceResult<User> {
        require_admin(admin)?;
        if admin.user_id == user_id {
            return Err(ServiceError::validation("admins cannot change their own role"));
        }

        let mut tx = self.db.pool().begin().await?;
        let row = sqlx::query(&format!(
            "UPDATE users SET role = $2 WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(role.as_db())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Err(ServiceError::NotFound("user"));
        };
        let user = user_from_row(&row)?;

        record_action(
            &mut tx,
            admin.user_id,
            "update-role",
            "user",
            Some(user_id),
            Some(json!({ "role": role.as_db() })),
        )
        .await?;

        tx.commit().await?;
        Ok(user)
    }

    /// Removes the account; announcements, comments, messages and reactions
    /// go with it through `ON DELETE CASCADE` inside the same transaction.
    pub async fn delete_user(&self, admin: &Caller, user_id: Uuid) -> ServiceResult<()> {
        require_admin(admin)?;
        if admin.user_id == user_id {
            return Err(ServiceError::validation("admins cannot delete their own account"));
        }

        let mut tx = self.db.pool().begin().await?;
        let email: Option<String> =
            sqlx::query_scalar("DELETE FROM users WHERE id = $1 RETURNING email")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(email) = email else {
            tx.rollback().await?;
            return Err(ServiceError::NotFound("user"));
        };

        record_action(
            &mut tx,
            admin.user_id,
            "delete-user",
            "user",
            Some(user_id),
            Some(json!({ "email": email })),
        )
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Grants the admin role to an existing account. Returns false when no
    /// account uses that email.
    pub async fn promote_bootstrap_admin(&self, email: &str) -> ServiceResult<bool> {
        let result = sqlx::query("UPDATE users SET role = 'admin' WHERE email = $1")
            .bind(email.trim().to_lowercase())
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
