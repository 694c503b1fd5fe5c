use std::sync::Arc;

use anyhow::Context;
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use common_auth::JwtVerifier;
use map_service::app::{build_router, SERVICE_NAME};
use map_service::app_state::AppState;
use map_service::config::{load_service_config, ServiceConfig, StoreConfig};
use map_service::repo::{InMemoryMapRepository, MapRepository, PgMapRepository};
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

async fn build_repository(config: &ServiceConfig) -> anyhow::Result<Arc<dyn MapRepository>> {
    match &config.store {
        StoreConfig::Postgres { database_url } => {
            let db = PgPool::connect(database_url)
                .await
                .context("Failed to connect to DATABASE_URL")?;
            let repo = PgMapRepository::new(db);
            // Ensure database schema is up to date before serving traffic
            repo.migrate().await.context("Failed to run migrations")?;
            Ok(Arc::new(repo))
        }
        StoreConfig::Memory => {
            warn!("MAP_STORE=memory: maps are lost on restart");
            Ok(Arc::new(InMemoryMapRepository::new()))
        }
    }
}

async fn build_jwt_verifier(config: &ServiceConfig) -> anyhow::Result<Arc<JwtVerifier>> {
    let verifier = JwtVerifier::builder(config.jwt.clone())
        .with_jwks_url(config.jwks_url.clone())
        .with_cache_ttl(config.jwks_cache_ttl)
        .with_http_timeout(config.jwks_http_timeout)
        .build()
        .context("Failed to build JWT verifier")?;

    // A cold or unreachable JWKS is retried by the first authenticated request.
    match verifier.prewarm().await {
        Ok(count) => info!(jwks_url = %config.jwks_url, count, "JWKS prewarmed"),
        Err(err) => warn!(jwks_url = %config.jwks_url, error = %err, "JWKS prewarm failed"),
    }
    Ok(Arc::new(verifier))
}

fn cors_layer(config: &ServiceConfig) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(
            config
                .cors_allowed_origins
                .iter()
                .filter_map(|origin| origin.parse::<HeaderValue>().ok())
                .collect::<Vec<_>>(),
        ))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([ACCEPT, CONTENT_TYPE, AUTHORIZATION])
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_service_config()?;
    let repo = build_repository(&config).await?;
    let jwt_verifier = build_jwt_verifier(&config).await?;
    let state = AppState::new(repo, jwt_verifier);

    let app = build_router(state).layer(cors_layer(&config));

    info!(addr = %config.addr, "starting {SERVICE_NAME}");
    let listener = TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
