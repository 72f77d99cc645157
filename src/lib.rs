pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;

use crate::app::announcements::AnnouncementService;
use crate::app::auth::{AuthService, TokenSigner};
use crate::app::categories::CategoryService;
use crate::app::comments::CommentService;
use crate::app::dashboard::DashboardService;
use crate::app::messages::MessageService;
use crate::app::moderation::ModerationService;
use crate::app::rate_limiter::RateLimiter;
use crate::app::reactions::ReactionService;
use crate::app::users::UserService;
use crate::config::AppConfig;
use crate::infra::{cache::RedisCache, db::Db};

/// Shared handles, built once at start-up and cloned into every request.
#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub cache: RedisCache,
    pub auth: AuthService,
    pub users: UserService,
    pub announcements: AnnouncementService,
    pub comments: CommentService,
    pub reactions: ReactionService,
    pub messages: MessageService,
    pub categories: CategoryService,
    pub moderation: ModerationService,
    pub dashboard: DashboardService,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    pub fn new(db: Db, cache: RedisCache, config: &AppConfig) -> Self {
        let signer = TokenSigner::new(config.paseto_access_key, config.access_ttl_minutes);
        Self {
            auth: AuthService::new(db.clone(), signer),
            users: UserService::new(db.clone()),
            announcements: AnnouncementService::new(db.clone()),
            comments: CommentService::new(db.clone()),
            reactions: ReactionService::new(db.clone()),
            messages: MessageService::new(db.clone()),
            categories: CategoryService::new(db.clone()),
            moderation: ModerationService::new(db.clone()),
            dashboard: DashboardService::new(db.clone()),
            rate_limiter: RateLimiter::new(cache.clone(), config.auth_attempts_per_hour),
            db,
            cache,
        }
    }
}
