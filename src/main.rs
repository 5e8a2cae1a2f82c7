mod app;
mod auth;
mod config;
mod db;
mod state;
mod users;

use crate::{config::AppConfig, state::AppState};

fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "userbase=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::var("ENVIRONMENT").as_deref() != Ok("production") {
        dotenvy::dotenv().ok();
    }
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        environment = %config.environment,
        production = config.is_production(),
        port = config.port,
        jwt_ttl_minutes = config.jwt.ttl_minutes,
        cache_ttl_seconds = config.cache_ttl_seconds,
        "configuration loaded"
    );

    let (app_state, pool) = AppState::init(config).await?;
    db::migrate(&pool).await;

    let config = app_state.config.clone();
    let app = app::build_app(app_state);
    app::serve(app, &config).await
}
