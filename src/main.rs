mod ai;
mod app;
mod auth;
mod config;
mod creations;
mod db;
mod error;
mod gate;
mod payment;
mod state;
mod storage;
#[cfg(test)]
mod testing;

use crate::{config::AppConfig, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "creatorly=debug,axum=info,tower_http=info".to_string());
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

    let config = AppConfig::from_env()?;
    let pool = db::connect(&config.database_url, config.db_max_connections).await?;
    db::migrate(&pool).await?;

    let state = AppState::init(config, pool.clone()).await?;
    if state.config.plan_override_enabled {
        tracing::warn!("plan override is enabled; users can change plans without paying");
    }

    app::serve(app::build_app(state)).await?;

    pool.close().await;
    tracing::info!("shutdown complete");
    Ok(())
}
