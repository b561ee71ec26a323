//! mealwise - a meal-planning backend for African cuisine.
//!
//! # Configuration
//!
//! - `MEALWISE_PORT` (default: 3000)
//! - `MEALWISE_DATABASE_URL` (default: `sqlite:mealwise.db?mode=rwc`)
//! - `MEALWISE_AI_BASE_URL` (default: `https://api.openai.com/v1`)
//! - `MEALWISE_AI_API_KEY` (optional; without it AI routes serve fallbacks)
//! - `MEALWISE_AI_MODEL` (default: `gpt-4`)
//! - `MEALWISE_AI_TIMEOUT_SECS` (default: 30)

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use mealwise::ai::{AiGateway, OpenAiClient};
use mealwise::api::{AppState, router};
use mealwise::config::Config;
use mealwise::storage::Storage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Default level is INFO; profile contents are never logged at any level
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("mealwise=info".parse()?))
        .init();

    let config = Config::from_env();
    info!(
        port = config.port,
        db_url = %config.database_url,
        ai_model = %config.ai_model,
        "Starting mealwise server"
    );

    let storage = Storage::new(&config.database_url).await?;
    info!("Database initialized");

    if config.ai_api_key.is_none() {
        warn!("MEALWISE_AI_API_KEY is not set; AI routes will serve fallback responses");
    }
    let model = OpenAiClient::new(
        &config.ai_base_url,
        config.ai_api_key.clone(),
        &config.ai_model,
        config.ai_timeout,
    )?;
    let ai = AiGateway::new(Arc::new(model), storage.clone(), config.ai_timeout);

    let app = router(AppState { storage, ai }).layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;

    info!(%addr, "mealwise is listening");

    axum::serve(listener, app).await?;

    Ok(())
}
