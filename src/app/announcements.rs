use anyhow::anyhow;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::app::access::Caller;
use crate::app::error::{foreign_key_violation, require_text, ServiceError, ServiceResult};
use crate::domain::announcement::{Announcement, AnnouncementWithAuthor, ModerationStatus};
use crate::infra::db::Db;

const MAX_TITLE_LEN: usize = 200;
const MAX_CONTENT_LEN: usize = 5000;
const MAX_TYPE_LEN: usize = 64;

const SELECT_ANNOUNCEMENT: &str = "SELECT a.id, a.user_id, a.title, a.content, a.category_id, \
            c.name AS category, a.type, a.status, a.created_at \
     FROM announcements a \
     JOIN categories c ON c.id = a.category_id";

/// Whether `viewer` may see announcement `id`: approved listings are public,
/// anything else only to its owner and admins. A missing row is not visible.
pub(crate) async fn visible_to(
    db: &Db,
    id: Uuid,
    viewer: Option<&Caller>,
) -> ServiceResult<bool> {
    let visible: bool = sqlx::query_scalar(
        "SELECT EXISTS( \
             SELECT 1 FROM announcements \
             WHERE id = $1 \
               AND (status = 'approved' OR user_id = $2 OR $3) \
         )",
    )
    .bind(id)
    .bind(viewer.map(|caller| caller.user_id))
    .bind(viewer.map_or(false, Caller::is_admin))
    .fetch_one(db.pool())
    .await?;
    Ok(visible)
}

fn announcement_from_row(row: &PgRow) -> ServiceResult<Announcement> {
    let status: String = row.get("status");
    let status = ModerationStatus::from_db(&status)
        .ok_or_else(|| anyhow!("unknown announcement status: {}", status))?;
    Ok(Announcement {
        id: row.get("id"),
        user_id: row.get("user_id"),
        title: row.get("title"),
        content: row.get("content"),
        category_id: row.get("category_id"),
        category: row.get("category"),
        kind: row.get("type"),
        status,
        created_at: row.get("created_at"),
    })
}

#[derive(Debug, Clone)]
pub struct NewAnnouncement {
    pub title: String,
    pub content: String,
    pub category: String,
    pub kind: String,
}

/// Fields left as `None` keep their current value.
#[derive(Debug, Clone, Default)]
pub struct AnnouncementChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AnnouncementFilter {
    pub category: Option<String>,
    pub kind: Option<String>,
}

#[derive(Clone)]
pub struct AnnouncementService {
    db: Db,
}

impl AnnouncementService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        author: &Caller,
        input: NewAnnouncement,
    ) -> ServiceResult<Announcement> {
        let title = require_text("title", &input.title, MAX_TITLE_LEN)?;
        let content = require_text("content", &input.content, MAX_CONTENT_LEN)?;
        let kind = require_text("type", &input.kind, MAX_TYPE_LEN)?;
        let category_id = self.resolve_category(&input.category).await?;

        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO announcements (user_id, title, content, category_id, type) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id",
        )
        .bind(author.user_id)
        .bind(title)
        .bind(content)
        .bind(category_id)
        .bind(kind)
        .fetch_one(self.db.pool())
        .await
        .map_err(|err| match foreign_key_violation(&err) {
            // The author's account disappeared while their token is still valid.
            Some(_) => ServiceError::NotFound("user"),
            None => ServiceError::Database(err),
        })?;

        self.fetch(id).await?.ok_or(ServiceError::NotFound("announcement"))
    }

    /// Approved announcements, newest first.
    pub async fn list_public(&self, filter: &AnnouncementFilter) -> ServiceResult<Vec<Announcement>> {
        let rows = sqlx::query(&format!(
            "{} \
             WHERE a.status = 'approved' \
               AND ($1::text IS NULL OR c.name = $1) \
               AND ($2::text IS NULL OR a.type = $2) \
             ORDER BY a.created_at DESC, a.id DESC",
            SELECT_ANNOUNCEMENT
        ))
        .bind(filter.category.as_deref())
        .bind(filter.kind.as_deref())
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(announcement_from_row).collect()
    }

    /// Anyone may read approved announcements; the rest are visible only to
    /// their owner and to admins.
    pub async fn get(&self, id: Uuid, viewer: Option<&Caller>) -> ServiceResult<Announcement> {
        let announcement = self
            .fetch(id)
            .await?
            .ok_or(ServiceError::NotFound("announcement"))?;

        let visible = announcement.status == ModerationStatus::Approved
            || viewer.map_or(false, |caller| caller.may_manage(announcement.user_id));
        if !visible {
            return Err(ServiceError::NotFound("announcement"));
        }

        Ok(announcement)
    }

    pub async fn list_by_user(
        &self,
        user_id: Uuid,
        viewer: &Caller,
    ) -> ServiceResult<Vec<Announcement>> {
        let all_statuses = viewer.may_manage(user_id);
        let rows = sqlx::query(&format!(
            "{} \
             WHERE a.user_id = $1 \
               AND ($2 OR a.status = 'approved') \
             ORDER BY a.created_at DESC, a.id DESC",
            SELECT_ANNOUNCEMENT
        ))
        .bind(user_id)
        .bind(all_statuses)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(announcement_from_row).collect()
    }

    pub async fn owner_of(&self, id: Uuid) -> ServiceResult<Option<Uuid>> {
        let owner = sqlx::query_scalar("SELECT user_id FROM announcements WHERE id = $1")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(owner)
    }

    /// Callers must have passed the owner-or-admin guard.
    pub async fn update(
        &self,
        id: Uuid,
        changes: AnnouncementChanges,
    ) -> ServiceResult<Announcement> {
        let title = changes
            .title
            .map(|title| require_text("title", &title, MAX_TITLE_LEN))
            .transpose()?;
        let content = changes
            .content
            .map(|content| require_text("content", &content, MAX_CONTENT_LEN))
            .transpose()?;
        let kind = changes
            .kind
            .map(|kind| require_text("type", &kind, MAX_TYPE_LEN))
            .transpose()?;
        let category_id = match changes.category {
            Some(category) => Some(self.resolve_category(&category).await?),
            None => None,
        };

        let result = sqlx::query(
            "UPDATE announcements \
             SET title = COALESCE($2, title), \
                 content = COALESCE($3, content), \
                 category_id = COALESCE($4, category_id), \
                 type = COALESCE($5, type) \
             WHERE id = $1",
        )
        .bind(id)
        .bind(title)
        .bind(content)
        .bind(category_id)
        .bind(kind)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound("announcement"));
        }

        self.fetch(id).await?.ok_or(ServiceError::NotFound("announcement"))
    }

    /// Comments and reactions are removed by the database cascade.
    pub async fn delete(&self, id: Uuid) -> ServiceResult<()> {
        let result = sqlx::query("DELETE FROM announcements WHERE id = $1")
            .bind(id)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound("announcement"));
        }
        Ok(())
    }

    pub async fn list_for_admin(
        &self,
        status: Option<ModerationStatus>,
    ) -> ServiceResult<Vec<AnnouncementWithAuthor>> {
        let rows = sqlx::query(
            "SELECT a.id, a.user_id, a.title, a.content, a.category_id, \
                    c.name AS category, a.type, a.status, a.created_at, \
                    u.email AS author_email, u.username AS author_username \
             FROM announcements a \
             JOIN categories c ON c.id = a.category_id \
             JOIN users u ON u.id = a.user_id \
             WHERE ($1::text IS NULL OR a.status = $1) \
             ORDER BY a.created_at DESC, a.id DESC",
        )
        .bind(status.map(|status| status.as_db()))
        .fetch_all(self.db.pool())
        .await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(AnnouncementWithAuthor {
                announcement: announcement_from_row(&row)?,
                author_email: row.get("author_email"),
                author_username: row.get("author_username"),
            });
        }
        Ok(items)
    }

    async fn fetch(&self, id: Uuid) -> ServiceResult<Option<Announcement>> {
        let row = sqlx::query(&format!("{} WHERE a.id = $1", SELECT_ANNOUNCEMENT))
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;

        row.as_ref().map(announcement_from_row).transpose()
    }

    async fn resolve_category(&self, name: &str) -> ServiceResult<Uuid> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::validation("category cannot be empty"));
        }
        let id: Option<Uuid> = sqlx::query_scalar("SELECT id FROM categories WHERE name = $1")
            .bind(name)
            .fetch_optional(self.db.pool())
            .await?;

        id.ok_or_else(|| ServiceError::validation(format!("unknown category: {}", name)))
    }
}
