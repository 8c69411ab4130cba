//! Charity tracker entry point.
//!
//! Loads configuration, builds the RPC gateway, shared read cache and
//! aggregator, and serves the read API until Ctrl-C.

use std::sync::Arc;

use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use charity_tracker::aggregator::ContractDataAggregator;
use charity_tracker::api::{self, ApiState};
use charity_tracker::cache::ReadCache;
use charity_tracker::config::Config;
use charity_tracker::format::format_address;
use charity_tracker::rpc::RpcGateway;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    let client = Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()?;

    let gateway = Arc::new(RpcGateway::new(
        client,
        config.rpc_url.clone(),
        config.wallet_address,
        config.read_retries,
    ));
    let cache = Arc::new(ReadCache::new(config.cache_ttl()));
    let aggregator = ContractDataAggregator::new(gateway, cache, config.contract_address)
        .with_max_batch_items(config.max_batch_items);

    info!(
        "Tracking contract {} via {} (wallet: {})",
        format_address(&config.contract_address.to_string()),
        config.rpc_url,
        config
            .wallet_address
            .map(|w| format_address(&w.to_string()))
            .unwrap_or_else(|| "not connected".to_string())
    );

    // Warm the cache and surface a broken RPC early; the API still starts.
    let projects = aggregator.all_projects().await;
    match &projects.error {
        Some(e) => error!("Initial project read failed: {e}"),
        None => info!("{} projects on-chain", projects.data.len()),
    }

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutting down");
            }
            shutdown.cancel();
        }
    });

    let app = api::router(Arc::new(ApiState { aggregator }))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    Ok(())
}
