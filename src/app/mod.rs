pub mod access;
pub mod announcements;
pub mod auth;
pub mod categories;
pub mod comments;
pub mod dashboard;
pub mod error;
pub mod messages;
pub mod moderation;
pub mod rate_limiter;
pub mod reactions;
pub mod users;
