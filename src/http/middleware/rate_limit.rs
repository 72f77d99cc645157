use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use std::net::SocketAddr;

use crate::config::rate_limits::AuthAction;
use crate::http::AppError;
use crate::AppState;

/// Per-IP throttle for the unauthenticated auth endpoints.
pub async fn ip_rate_limit_middleware(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(action) = AuthAction::from_request(request.uri().path(), request.method().as_str())
    else {
        return Ok(next.run(request).await);
    };

    let ip = addr.ip().to_string();
    let info = state
        .rate_limiter
        .hit_ip(&ip, action)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to check IP rate limit");
            AppError::internal("failed to check rate limit")
        })?;

    if info.limited {
        tracing::warn!(ip = %ip, action = action.as_key(), limit = info.limit, "IP rate limit exceeded");
        return Err(AppError::rate_limited(
            "too many attempts from your IP address, try again later",
        ));
    }

    Ok(next.run(request).await)
}
