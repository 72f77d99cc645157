use serde_json::json;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::app::access::{require_admin, Caller};
use crate::app::error::{
    foreign_key_violation, require_text, unique_violation, ServiceError, ServiceResult,
};
use crate::app::moderation::record_action;
use crate::domain::category::Category;
use crate::infra::db::Db;

const MAX_NAME_LEN: usize = 100;

fn category_from_row(row: &PgRow) -> Category {
    Category {
        id: row.get("id"),
        name: row.get("name"),
        created_at: row.get("created_at"),
    }
}

fn name_taken(err: sqlx::Error) -> ServiceError {
    match unique_violation(&err) {
        Some(_) => ServiceError::conflict("category name already exists"),
        None => ServiceError::Database(err),
    }
}

#[derive(Clone)]
pub struct CategoryService {
    db: Db,
}

impl CategoryService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> ServiceResult<Vec<Category>> {
        let rows = sqlx::query("SELECT id, name, created_at FROM categories ORDER BY name")
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows.iter().map(category_from_row).collect())
    }

    pub async fn create(&self, admin: &Caller, name: &str) -> ServiceResult<Category> {
        require_admin(admin)?;
        let name = require_text("name", name, MAX_NAME_LEN)?;

        let mut tx = self.db.pool().begin().await?;
        let row = sqlx::query(
            "INSERT INTO categories (name) VALUES ($1) RETURNING id, name, created_at",
        )
        .bind(&name)
        .fetch_one(&mut *tx)
        .await
        .map_err(name_taken)?;
        let category = category_from_row(&row);

        record_action(
            &mut tx,
            admin.user_id,
            "create",
            "category",
            Some(category.id),
            Some(json!({ "name": name })),
        )
        .await?;

        tx.commit().await?;
        Ok(category)
    }

    pub async fn rename(&self, admin: &Caller, id: Uuid, name: &str) -> ServiceResult<Category> {
        require_admin(admin)?;
        let name = require_text("name", name, MAX_NAME_LEN)?;

        let mut tx = self.db.pool().begin().await?;
        let row = sqlx::query(
            "UPDATE categories SET name = $2 WHERE id = $1 RETURNING id, name, created_at",
        )
        .bind(id)
        .bind(&name)
        .fetch_optional(&mut *tx)
        .await
        .map_err(name_taken)?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Err(ServiceError::NotFound("category"));
        };
        let category = category_from_row(&row);

        record_action(
            &mut tx,
            admin.user_id,
            "update",
            "category",
            Some(id),
            Some(json!({ "name": name })),
        )
        .await?;

        tx.commit().await?;
        Ok(category)
    }

    pub async fn delete(&self, admin: &Caller, id: Uuid) -> ServiceResult<()> {
        require_admin(admin)?;

        let mut tx = self.db.pool().begin().await?;
        let name: Option<String> =
            sqlx::query_scalar("DELETE FROM categories WHERE id = $1 RETURNING name")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|err| match foreign_key_violation(&err) {
                    Some(_) => ServiceError::conflict("category is used by announcements"),
                    None => ServiceError::Database(err),
                })?;

        let Some(name) = name else {
            tx.rollback().await?;
            return Err(ServiceError::NotFound("category"));
        };

        record_action(
            &mut tx,
            admin.user_id,
            "delete",
            "category",
            Some(id),
            Some(json!({ "name": name })),
        )
        .await?;

        tx.commit().await?;
        Ok(())
    }
}
