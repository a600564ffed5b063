// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pebloq_holdings_server::{
    api::router,
    auth::JwtVerifier,
    blockchain::AlloyChainClient,
    config::{AppConfig, LogFormat, DEFAULT_LOG_FILTER},
    discovery,
    holdings::{DexScreenerClient, HoldingsService, NftMetadataClient},
    state::{AppState, TipSettings},
    storage::HoldingsDb,
};

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            std::process::exit(2);
        }
    };
    init_tracing(config.log_format);

    if let Err(e) = run(config).await {
        error!(error = %e, "Server failed");
        std::process::exit(1);
    }
}

async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(&config.data_dir)?;
    let db = Arc::new(HoldingsDb::open(&config.db_path())?);
    info!(path = %config.db_path().display(), "Database opened");

    let rpc = Arc::new(AlloyChainClient::new(config.network.clone(), config.rpc_timeout)?);
    info!(
        network = %rpc.network().name,
        chain_id = rpc.network().chain_id,
        "Chain client ready"
    );
    let prices = Arc::new(DexScreenerClient::new(
        config.price_api_url.clone(),
        config.price_chain_id.clone(),
    )?);
    let metadata = Arc::new(NftMetadataClient::new(config.ipfs_gateway.clone())?);

    let shutdown = CancellationToken::new();
    let (sink, writer) = discovery::channel(db.clone(), discovery::DEFAULT_CHANNEL_CAPACITY);
    let writer_task = tokio::spawn(writer.run(shutdown.clone()));

    let holdings = HoldingsService::new(
        rpc.clone(),
        prices,
        metadata,
        db.clone(),
        sink,
        config.holdings.clone(),
    );
    let verifier = JwtVerifier::new(&config.auth);
    if !verifier.is_production() {
        tracing::warn!("AUTH_JWT_SECRET not set: bearer tokens are NOT signature-checked");
    }
    let state = AppState::new(
        db,
        rpc,
        holdings,
        verifier,
        TipSettings {
            min_confirmations: config.tip_min_confirmations,
            network: config.network.clone(),
        },
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(
        addr = %config.bind_addr,
        "PeBloq holdings server listening (docs at /docs)"
    );

    let signal = shutdown.clone();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown signal received");
            signal.cancel();
        })
        .await?;

    shutdown.cancel();
    if let Err(e) = writer_task.await {
        error!(error = %e, "Discovered-token writer task failed");
    }
    info!("Server stopped");
    Ok(())
}
