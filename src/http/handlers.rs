use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::access::require_owner_or_admin;
use crate::app::announcements::{AnnouncementChanges, AnnouncementFilter, NewAnnouncement};
use crate::app::dashboard::DashboardStats;
use crate::domain::announcement::{Announcement, AnnouncementWithAuthor, ModerationStatus};
use crate::domain::audit::AuditEntry;
use crate::domain::category::Category;
use crate::domain::comment::{Comment, CommentWithAnnouncement};
use crate::domain::message::{Conversation, Message};
use crate::domain::reaction::{Reaction, ReactionSummary, ReactionTarget};
use crate::domain::user::{PublicUser, RegisteredUser, Role, User};
use crate::http::extract::{IdPath, JsonBody, QueryParams};
use crate::http::{AdminUser, AppError, AuthUser};
use crate::AppState;

const DEFAULT_AUDIT_LIMIT: i64 = 50;
const MAX_AUDIT_LIMIT: i64 = 200;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

#[derive(Deserialize)]
pub struct PaginationQuery {
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

#[derive(Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

fn parse_cursor(cursor: Option<String>) -> Result<Option<(OffsetDateTime, Uuid)>, AppError> {
    let Some(cursor) = cursor else {
        return Ok(None);
    };

    let (timestamp, id) = cursor
        .split_once('/')
        .ok_or_else(|| AppError::bad_request("invalid cursor"))?;

    let timestamp = OffsetDateTime::parse(timestamp, &Rfc3339)
        .map_err(|_| AppError::bad_request("invalid cursor"))?;
    let id = Uuid::parse_str(id).map_err(|_| AppError::bad_request("invalid cursor"))?;

    Ok(Some((timestamp, id)))
}

fn encode_cursor(cursor: Option<(OffsetDateTime, Uuid)>) -> Option<String> {
    let (timestamp, id) = cursor?;
    let timestamp = timestamp.format(&Rfc3339).ok()?;
    Some(format!("{}/{}", timestamp, id))
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db = state.db.ping().await.is_ok();
    let redis = state.cache.ping().await.is_ok();
    let status = if db && redis { "ok" } else { "degraded" };

    Json(HealthResponse { status })
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub username: String,
}

pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisteredUser>), AppError> {
    let user = state
        .auth
        .register(&payload.email, &payload.password, &payload.username)
        .await
        .map_err(|err| AppError::from_service(err, "register user"))?;

    tracing::info!(user_id = %user.id, "user registered");
    Ok((StatusCode::CREATED, Json(user)))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    pub user: User,
}

pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(AppError::bad_request("email and password are required"));
    }

    let session = state
        .auth
        .login(&payload.email, &payload.password)
        .await
        .map_err(|err| AppError::from_service(err, "login"))?;

    Ok(Json(LoginResponse {
        token: session.access.token,
        expires_at: session.access.expires_at,
        user: session.user,
    }))
}

pub async fn get_current_user(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<User>, AppError> {
    let user = state
        .auth
        .current_user(auth.user_id)
        .await
        .map_err(|err| AppError::from_service(err, "fetch current user"))?;

    match user {
        Some(user) => Ok(Json(user)),
        None => Err(AppError::not_found("user not found")),
    }
}

pub async fn get_user(
    IdPath(id): IdPath<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<PublicUser>, AppError> {
    let user = state
        .users
        .get_public(id)
        .await
        .map_err(|err| AppError::from_service(err, "fetch user"))?;
    Ok(Json(user))
}

pub async fn list_user_announcements(
    IdPath(id): IdPath<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Announcement>>, AppError> {
    let exists = state
        .users
        .exists(id)
        .await
        .map_err(|err| AppError::from_service(err, "fetch user"))?;
    if !exists {
        return Err(AppError::not_found("user not found"));
    }

    let announcements = state
        .announcements
        .list_by_user(id, &auth.caller())
        .await
        .map_err(|err| AppError::from_service(err, "list user announcements"))?;
    Ok(Json(announcements))
}

pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<Category>>, AppError> {
    let categories = state
        .categories
        .list()
        .await
        .map_err(|err| AppError::from_service(err, "list categories"))?;
    Ok(Json(categories))
}

pub async fn admin_list_categories(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Category>>, AppError> {
    list_categories(State(state)).await
}

#[derive(Deserialize)]
pub struct CategoryRequest {
    pub name: String,
}

pub async fn create_category(
    admin: AdminUser,
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CategoryRequest>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    let category = state
        .categories
        .create(&admin.caller(), &payload.name)
        .await
        .map_err(|err| AppError::from_service(err, "create category"))?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn rename_category(
    IdPath(id): IdPath<Uuid>,
    admin: AdminUser,
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CategoryRequest>,
) -> Result<Json<Category>, AppError> {
    let category = state
        .categories
        .rename(&admin.caller(), id, &payload.name)
        .await
        .map_err(|err| AppError::from_service(err, "rename category"))?;
    Ok(Json(category))
}

pub async fn delete_category(
    IdPath(id): IdPath<Uuid>,
    admin: AdminUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    state
        .categories
        .delete(&admin.caller(), id)
        .await
        .map_err(|err| AppError::from_service(err, "delete category"))?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct AnnouncementQuery {
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

pub async fn list_announcements(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<AnnouncementQuery>,
) -> Result<Json<Vec<Announcement>>, AppError> {
    let filter = AnnouncementFilter {
        category: query.category.filter(|value| !value.trim().is_empty()),
        kind: query.kind.filter(|value| !value.trim().is_empty()),
    };
    let announcements = state
        .announcements
        .list_public(&filter)
        .await
        .map_err(|err| AppError::from_service(err, "list announcements"))?;
    Ok(Json(announcements))
}

#[derive(Deserialize)]
pub struct CreateAnnouncementRequest {
    pub title: String,
    pub content: String,
    pub category: String,
    #[serde(rename = "type")]
    pub kind: String,
}

pub async fn create_announcement(
    auth: AuthUser,
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CreateAnnouncementRequest>,
) -> Result<(StatusCode, Json<Announcement>), AppError> {
    let announcement = state
        .announcements
        .create(
            &auth.caller(),
            NewAnnouncement {
                title: payload.title,
                content: payload.content,
                category: payload.category,
                kind: payload.kind,
            },
        )
        .await
        .map_err(|err| AppError::from_service(err, "create announcement"))?;

    tracing::info!(
        announcement_id = %announcement.id,
        user_id = %auth.user_id,
        "announcement created"
    );
    Ok((StatusCode::CREATED, Json(announcement)))
}

pub async fn get_announcement(
    IdPath(id): IdPath<Uuid>,
    auth: Option<AuthUser>,
    State(state): State<AppState>,
) -> Result<Json<Announcement>, AppError> {
    let viewer = auth.map(|auth| auth.caller());
    let announcement = state
        .announcements
        .get(id, viewer.as_ref())
        .await
        .map_err(|err| AppError::from_service(err, "fetch announcement"))?;
    Ok(Json(announcement))
}

#[derive(Deserialize)]
pub struct UpdateAnnouncementRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

pub async fn update_announcement(
    IdPath(id): IdPath<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<UpdateAnnouncementRequest>,
) -> Result<Json<Announcement>, AppError> {
    require_owner_or_admin(&auth.caller(), "announcement", || {
        state.announcements.owner_of(id)
    })
    .await
    .map_err(|err| AppError::from_service(err, "update announcement"))?;

    let announcement = state
        .announcements
        .update(
            id,
            AnnouncementChanges {
                title: payload.title,
                content: payload.content,
                category: payload.category,
                kind: payload.kind,
            },
        )
        .await
        .map_err(|err| AppError::from_service(err, "update announcement"))?;
    Ok(Json(announcement))
}

pub async fn delete_announcement(
    IdPath(id): IdPath<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    require_owner_or_admin(&auth.caller(), "announcement", || {
        state.announcements.owner_of(id)
    })
    .await
    .map_err(|err| AppError::from_service(err, "delete announcement"))?;

    state
        .announcements
        .delete(id)
        .await
        .map_err(|err| AppError::from_service(err, "delete announcement"))?;

    tracing::info!(announcement_id = %id, user_id = %auth.user_id, "announcement deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct CommentRequest {
    pub content: String,
}

pub async fn list_comments(
    IdPath(id): IdPath<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Comment>>, AppError> {
    let comments = state
        .comments
        .list_for_announcement(id, &auth.caller())
        .await
        .map_err(|err| AppError::from_service(err, "list comments"))?;
    Ok(Json(comments))
}

pub async fn add_comment(
    IdPath(id): IdPath<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CommentRequest>,
) -> Result<(StatusCode, Json<Comment>), AppError> {
    let comment = state
        .comments
        .add(&auth.caller(), id, &payload.content)
        .await
        .map_err(|err| AppError::from_service(err, "add comment"))?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn delete_comment(
    IdPath(id): IdPath<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    require_owner_or_admin(&auth.caller(), "comment", || state.comments.owner_of(id))
        .await
        .map_err(|err| AppError::from_service(err, "delete comment"))?;

    state
        .comments
        .delete(id)
        .await
        .map_err(|err| AppError::from_service(err, "delete comment"))?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct ReactionRequest {
    #[serde(rename = "type")]
    pub kind: String,
}

async fn add_reaction(
    state: &AppState,
    auth: &AuthUser,
    target: ReactionTarget,
    kind: &str,
) -> Result<(StatusCode, Json<Reaction>), AppError> {
    let reaction = state
        .reactions
        .add(&auth.caller(), target, kind)
        .await
        .map_err(|err| AppError::from_service(err, "add reaction"))?;
    Ok((StatusCode::CREATED, Json(reaction)))
}

async fn remove_reaction(
    state: &AppState,
    auth: &AuthUser,
    target: ReactionTarget,
) -> Result<StatusCode, AppError> {
    state
        .reactions
        .remove(&auth.caller(), target)
        .await
        .map_err(|err| AppError::from_service(err, "remove reaction"))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn reaction_summary(
    state: &AppState,
    auth: &AuthUser,
    target: ReactionTarget,
) -> Result<Json<ReactionSummary>, AppError> {
    let summary = state
        .reactions
        .summary(target, Some(&auth.caller()))
        .await
        .map_err(|err| AppError::from_service(err, "summarize reactions"))?;
    Ok(Json(summary))
}

pub async fn react_to_announcement(
    IdPath(id): IdPath<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<ReactionRequest>,
) -> Result<(StatusCode, Json<Reaction>), AppError> {
    add_reaction(&state, &auth, ReactionTarget::Announcement(id), &payload.kind).await
}

pub async fn unreact_to_announcement(
    IdPath(id): IdPath<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    remove_reaction(&state, &auth, ReactionTarget::Announcement(id)).await
}

pub async fn announcement_reactions(
    IdPath(id): IdPath<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ReactionSummary>, AppError> {
    reaction_summary(&state, &auth, ReactionTarget::Announcement(id)).await
}

pub async fn react_to_comment(
    IdPath(id): IdPath<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<ReactionRequest>,
) -> Result<(StatusCode, Json<Reaction>), AppError> {
    add_reaction(&state, &auth, ReactionTarget::Comment(id), &payload.kind).await
}

pub async fn unreact_to_comment(
    IdPath(id): IdPath<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    remove_reaction(&state, &auth, ReactionTarget::Comment(id)).await
}

pub async fn comment_reactions(
    IdPath(id): IdPath<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ReactionSummary>, AppError> {
    reaction_summary(&state, &auth, ReactionTarget::Comment(id)).await
}

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub receiver_id: Uuid,
    pub content: String,
}

pub async fn send_message(
    auth: AuthUser,
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<SendMessageRequest>,
) -> Result<(StatusCode, Json<Message>), AppError> {
    let message = state
        .messages
        .send_message(&auth.caller(), payload.receiver_id, &payload.content)
        .await
        .map_err(|err| AppError::from_service(err, "send message"))?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn list_conversations(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Conversation>>, AppError> {
    let conversations = state
        .messages
        .list_conversations(&auth.caller())
        .await
        .map_err(|err| AppError::from_service(err, "list conversations"))?;
    Ok(Json(conversations))
}

pub async fn get_thread(
    IdPath(with_user_id): IdPath<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Message>>, AppError> {
    let thread = state
        .messages
        .get_thread(&auth.caller(), with_user_id)
        .await
        .map_err(|err| AppError::from_service(err, "fetch thread"))?;
    Ok(Json(thread))
}

pub async fn list_users(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<User>>, AppError> {
    let users = state
        .users
        .list()
        .await
        .map_err(|err| AppError::from_service(err, "list users"))?;
    Ok(Json(users))
}

#[derive(Deserialize)]
pub struct RoleRequest {
    pub role: String,
}

pub async fn update_user_role(
    IdPath(id): IdPath<Uuid>,
    admin: AdminUser,
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RoleRequest>,
) -> Result<Json<User>, AppError> {
    let role = Role::from_db(payload.role.trim())
        .ok_or_else(|| AppError::bad_request("role must be one of: user, admin"))?;

    let user = state
        .users
        .update_role(&admin.caller(), id, role)
        .await
        .map_err(|err| AppError::from_service(err, "update role"))?;

    tracing::info!(admin_id = %admin.0.user_id, user_id = %id, role = role.as_db(), "role updated");
    Ok(Json(user))
}

pub async fn delete_user(
    IdPath(id): IdPath<Uuid>,
    admin: AdminUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    state
        .users
        .delete_user(&admin.caller(), id)
        .await
        .map_err(|err| AppError::from_service(err, "delete user"))?;

    tracing::info!(admin_id = %admin.0.user_id, user_id = %id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct StatusQuery {
    pub status: Option<String>,
}

fn parse_status(value: &str) -> Result<ModerationStatus, AppError> {
    ModerationStatus::from_db(value.trim()).ok_or_else(|| {
        AppError::bad_request("status must be one of: pending, approved, rejected")
    })
}

pub async fn list_admin_announcements(
    _admin: AdminUser,
    State(state): State<AppState>,
    QueryParams(query): QueryParams<StatusQuery>,
) -> Result<Json<Vec<AnnouncementWithAuthor>>, AppError> {
    let status = query.status.as_deref().map(parse_status).transpose()?;
    let announcements = state
        .announcements
        .list_for_admin(status)
        .await
        .map_err(|err| AppError::from_service(err, "list announcements"))?;
    Ok(Json(announcements))
}

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

pub async fn set_announcement_status(
    IdPath(id): IdPath<Uuid>,
    admin: AdminUser,
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<StatusRequest>,
) -> Result<Json<Announcement>, AppError> {
    let next = parse_status(&payload.status)?;
    let caller = admin.caller();

    state
        .moderation
        .decide(&caller, id, next)
        .await
        .map_err(|err| AppError::from_service(err, "moderate announcement"))?;

    tracing::info!(
        admin_id = %caller.user_id,
        announcement_id = %id,
        status = next.as_db(),
        "announcement moderated"
    );

    let announcement = state
        .announcements
        .get(id, Some(&caller))
        .await
        .map_err(|err| AppError::from_service(err, "fetch announcement"))?;
    Ok(Json(announcement))
}

pub async fn list_admin_comments(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<CommentWithAnnouncement>>, AppError> {
    let comments = state
        .comments
        .list_all()
        .await
        .map_err(|err| AppError::from_service(err, "list comments"))?;
    Ok(Json(comments))
}

pub async fn moderate_comment(
    IdPath(id): IdPath<Uuid>,
    admin: AdminUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    state
        .moderation
        .delete_comment(&admin.caller(), id)
        .await
        .map_err(|err| AppError::from_service(err, "delete comment"))?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn dashboard(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Result<Json<DashboardStats>, AppError> {
    let stats = state
        .dashboard
        .stats()
        .await
        .map_err(|err| AppError::from_service(err, "load dashboard"))?;
    Ok(Json(stats))
}

pub async fn list_audit(
    _admin: AdminUser,
    State(state): State<AppState>,
    QueryParams(query): QueryParams<PaginationQuery>,
) -> Result<Json<ListResponse<AuditEntry>>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_AUDIT_LIMIT);
    if !(1..=MAX_AUDIT_LIMIT).contains(&limit) {
        return Err(AppError::bad_request("limit must be between 1 and 200"));
    }
    let cursor = parse_cursor(query.cursor)?;

    let mut entries = state
        .moderation
        .list_audit(cursor, limit + 1)
        .await
        .map_err(|err| AppError::from_service(err, "list audit log"))?;

    let next_cursor = if entries.len() > limit as usize {
        entries.truncate(limit as usize);
        entries.last().map(|last| (last.created_at, last.id))
    } else {
        None
    };

    Ok(Json(ListResponse {
        items: entries,
        next_cursor: encode_cursor(next_cursor),
    }))
}
