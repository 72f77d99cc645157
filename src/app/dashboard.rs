use serde::Serialize;
use sqlx::Row;

use crate::app::error::ServiceResult;
use crate::infra::db::Db;

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub users: i64,
    pub announcements: i64,
    pub pending: i64,
    pub comments: i64,
    pub messages: i64,
}

#[derive(Clone)]
pub struct DashboardService {
    db: Db,
}

impl DashboardService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn stats(&self) -> ServiceResult<DashboardStats> {
        let row = sqlx::query(
            "SELECT \
                 (SELECT COUNT(*) FROM users) AS users, \
                 (SELECT COUNT(*) FROM announcements) AS announcements, \
                 (SELECT COUNT(*) FROM announcements WHERE status = 'pending') AS pending, \
                 (SELECT COUNT(*) FROM comments) AS comments, \
                 (SELECT COUNT(*) FROM messages) AS messages",
        )
        .fetch_one(self.db.pool())
        .await?;

        Ok(DashboardStats {
            users: row.get("users"),
            announcements: row.get("announcements"),
            pending: row.get("pending"),
            comments: row.get("comments"),
            messages: row.get("messages"),
        })
    }
}
