//! REST server over the five sales shards
//!
//! Environment:
//! - `SALES_GLOBAL_DATABASE_URL`, `SALES_LOCAL1_DATABASE_URL` .. `SALES_LOCAL4_DATABASE_URL`
//!   (each falls back to `DATABASE_URL`)
//! - `SALES_DB_POOL_SIZE`, `SALES_DB_ACQUIRE_TIMEOUT_SECS`
//! - `SALES_SERVER_PORT` (default 8081)
//! - `SALES_INSTALL_SCHEMA=1` creates missing tables at startup

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sales_federation::{
    api::build_router, FederationConfig, SalesFederation, SalesPort, ShardRegistry,
};

const DEFAULT_PORT: u16 = 8081;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("sales_federation=info,tower_http=debug")),
        )
        .init();

    let config = FederationConfig::from_env().context("loading shard configuration")?;
    let registry = ShardRegistry::connect(&config)
        .await
        .context("connecting shard pools")?;

    if std::env::var("SALES_INSTALL_SCHEMA").is_ok_and(|v| v == "1" || v == "true") {
        registry
            .install_schema()
            .await
            .context("installing shard schema")?;
    }

    for stats in registry.stats() {
        info!("{}", stats);
    }

    let port: Arc<dyn SalesPort> = Arc::new(SalesFederation::new(registry.clone()));
    let app = build_router(port);

    let listen_port = match std::env::var("SALES_SERVER_PORT") {
        Ok(value) => value
            .parse::<u16>()
            .with_context(|| format!("invalid SALES_SERVER_PORT '{}'", value))?,
        Err(_) => DEFAULT_PORT,
    };
    let addr = format!("0.0.0.0:{}", listen_port);
    info!("Starting sales server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await?;

    registry.close().await;
    Ok(())
}
