use axum::{routing::delete, routing::get, routing::post, routing::put, Router};

use crate::http::handlers;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn auth() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/me", get(handlers::get_current_user))
}

pub fn users() -> Router<AppState> {
    Router::new()
        .route("/users/:id", get(handlers::get_user))
        .route(
            "/users/:id/announcements",
            get(handlers::list_user_announcements),
        )
}

pub fn announcements() -> Router<AppState> {
    Router::new()
        .route("/categories", get(handlers::list_categories))
        .route(
            "/announcements",
            get(handlers::list_announcements).post(handlers::create_announcement),
        )
        .route(
            "/announcements/:id",
            get(handlers::get_announcement)
                .put(handlers::update_announcement)
                .delete(handlers::delete_announcement),
        )
        .route(
            "/announcements/:id/comments",
            get(handlers::list_comments).post(handlers::add_comment),
        )
        .route(
            "/announcements/:id/reactions",
            get(handlers::announcement_reactions)
                .post(handlers::react_to_announcement)
                .delete(handlers::unreact_to_announcement),
        )
        .route("/comments/:id", delete(handlers::delete_comment))
        .route(
            "/comments/:id/reactions",
            get(handlers::comment_reactions)
                .post(handlers::react_to_comment)
                .delete(handlers::unreact_to_comment),
        )
}

pub fn messages() -> Router<AppState> {
    Router::new()
        .route("/messages", post(handlers::send_message))
        .route("/messages/conversations", get(handlers::list_conversations))
        .route("/messages/:with_user_id", get(handlers::get_thread))
}

pub fn admin() -> Router<AppState> {
    Router::new()
        .route(
            "/admin/categories",
            get(handlers::admin_list_categories).post(handlers::create_category),
        )
        .route(
            "/admin/categories/:id",
            put(handlers::rename_category).delete(handlers::delete_category),
        )
        .route("/admin/users", get(handlers::list_users))
        .route("/admin/users/:id/role", put(handlers::update_user_role))
        .route("/admin/users/:id", delete(handlers::delete_user))
        .route(
            "/admin/announcements",
            get(handlers::list_admin_announcements),
        )
        .route(
            "/admin/announcements/:id/status",
            put(handlers::set_announcement_status),
        )
        .route("/admin/comments", get(handlers::list_admin_comments))
        .route("/admin/comments/:id", delete(handlers::moderate_comment))
        .route("/admin/dashboard", get(handlers::dashboard))
        .route("/admin/audit", get(handlers::list_audit))
}
