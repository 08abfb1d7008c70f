// ABOUTME: Server binary wiring configuration, database, LLM gateway, and routes
// ABOUTME: Serves the chat API over HTTP with graceful shutdown
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Parley Contributors

//! # Parley Chat Server Binary
//!
//! Starts the HTTP API: loads environment configuration, connects the SQLite
//! database (creating the schema if needed), constructs the LLM gateway
//! client, and serves the chat routes until ctrl-c.

use anyhow::Result;
use clap::Parser;
use parley_chat_server::{
    config::ServerConfig,
    database::Database,
    llm::{LlmProvider, OpenAiCompatibleProvider},
    logging,
    resources::ServerResources,
    routes,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "parley-server")]
#[command(about = "Parley - conversation backend with streaming LLM turns")]
pub struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Handle container environments where clap may not work properly
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Argument parsing failed: {e}");
            eprintln!("Using default configuration");
            Args { http_port: None }
        }
    };

    // Load configuration from environment
    let mut config = ServerConfig::from_env()?;

    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }

    // Initialize production logging
    logging::init_from_env()?;

    info!("Starting Parley Chat Server");
    info!("{}", config.summary());

    // Connect database and run idempotent migrations
    let database = Database::new(&config.database.url).await?;
    info!("Database initialized: {}", config.database.url);

    // Construct the LLM gateway client
    let provider: Arc<dyn LlmProvider> =
        Arc::new(OpenAiCompatibleProvider::new(config.llm.clone())?);
    info!(
        "LLM gateway: {} (model: {})",
        provider.display_name(),
        provider.default_model()
    );

    // A failed probe is not fatal; the gateway may come up later
    match provider.health_check().await {
        Ok(true) => info!("LLM gateway reachable"),
        Ok(false) => warn!("LLM gateway responded unhealthy; turns will fail until it recovers"),
        Err(e) => warn!("LLM gateway unreachable: {e}"),
    }

    let http_port = config.http_port;
    let resources = Arc::new(ServerResources::new(database, provider, config));

    let app = routes::router(resources)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", http_port)).await?;
    info!("Listening on port {http_port}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");

    Ok(())
}

/// Resolve when ctrl-c is received
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install ctrl-c handler: {e}");
        // Fall back to never resolving; the server runs until killed
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
