use anyhow::{anyhow, Context};
use axum::http::{HeaderValue, Method};
use axum::Router;
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agora::config::AppConfig;
use agora::infra::{cache::RedisCache, db::Db};
use agora::{http, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    let db = Db::connect(&config).await?;

    match config.app_mode.as_str() {
        "api" => {
            let cache = RedisCache::connect(&config.redis_url).await?;
            let state = AppState::new(db, cache, &config);

            if let Some(email) = config.bootstrap_admin_email.as_deref() {
                let promoted = state
                    .users
                    .promote_bootstrap_admin(email)
                    .await
                    .context("failed to promote bootstrap admin")?;
                if promoted {
                    tracing::info!(email, "bootstrap admin promoted");
                } else {
                    tracing::warn!(email, "bootstrap admin account does not exist yet");
                }
            }

            let app: Router = http::router(state)
                .layer(cors_layer(config.cors_allow_origin.as_deref())?)
                .layer(TraceLayer::new_for_http());
            let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
            tracing::info!("listening on {}", config.http_addr);

            // Client addresses feed the per-IP auth rate limit.
            let app = app.into_make_service_with_connect_info::<SocketAddr>();

            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
        "migrate" => {
            let applied = db.run_migrations(&config.migrations_dir).await?;
            tracing::info!(applied, "migrations complete");
        }
        other => return Err(anyhow!("unknown APP_MODE: {}", other)),
    }

    Ok(())
}

fn cors_layer(allow_origin: Option<&str>) -> anyhow::Result<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    Ok(match allow_origin {
        Some("*") | None => layer.allow_origin(Any),
        Some(origin) => {
            let origin = HeaderValue::from_str(origin)
                .with_context(|| format!("invalid CORS_ALLOW_ORIGIN: {}", origin))?;
            layer.allow_origin(origin)
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
