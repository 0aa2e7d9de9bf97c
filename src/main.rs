use std::sync::Arc;

use anyhow::Context;
use chatrelay::{app, db, relay::Reaper, AppState, Config};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("chatrelay=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    let db_pool = db::connect(&config.database_url)
        .await
        .with_context(|| format!("opening {}", config.database_url))?;

    let app_state = AppState::new(db_pool, &config);
    let _reaper = Reaper::spawn(Arc::clone(&app_state.registry), config.reap_interval);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    tracing::info!(
        addr = %listener.local_addr()?,
        idle_threshold = ?config.idle_threshold,
        "chatrelay listening"
    );

    axum::serve(listener, app(app_state)).await?;
    Ok(())
}
