//! Pipeline Health API - dashboard projections over ClickHouse pipeline tables.

mod api;
mod cards;
mod charts;
mod config;
mod dates;
mod decoder;
mod error;
mod schema;
mod statements;
mod store;

use std::sync::Arc;

use api::AppState;
use config::AppConfig;
use store::clickhouse::ClickHouseStore;
use store::PipelineStore;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "pipeline_health_api=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    info!(
        "Tables: overview={} ({:?}), health_kpi={}, quarterly={}",
        config.catalog.overview.name,
        config.catalog.layout,
        config.catalog.health_kpi.name,
        config.catalog.quarterly.name
    );
    info!(
        "Row decoding: {:?}, chart axis order: {:?}",
        config.decode_mode, config.axis_order
    );

    let store: Arc<dyn PipelineStore> = Arc::new(ClickHouseStore::new(&config.store)?);
    info!("Store backend initialized: {}", store.name());

    let state = AppState::new(store, config.catalog, config.decode_mode, config.axis_order);
    let app = api::router(state);

    // Run server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Server listening on http://{}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
