//! Storefront - Self-hosted storefront service

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront::{config::Config, http, publisher::EventPublisher, store, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();

    let config = Config::from_env()?;
    let db = store::connect(&config.database_url, config.max_connections).await?;
    store::migrate(&db).await?;
    let events = EventPublisher::connect(config.nats_url.as_deref()).await;
    if config.admin_token.is_none() {
        tracing::warn!("ADMIN_TOKEN is not set; admin routes will answer 403");
    }

    let port = config.port;
    let state = AppState::new(store::Store::new(db, &config.currency), events, config);
    let app = http::router(state);

    tracing::info!("Storefront listening on 0.0.0.0:{}", port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?, app).await?;
    Ok(())
}
