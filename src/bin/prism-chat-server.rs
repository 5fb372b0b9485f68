// ABOUTME: Production entrypoint binding config, storage, and the HTTP server
// ABOUTME: Environment-driven configuration with CLI overrides for port and database
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Prism Labs

//! # Prism Chat Server Binary
//!
//! Loads configuration from the environment, connects storage, and serves
//! the HTTP API until shutdown.

use anyhow::Result;
use clap::Parser;
use prism_chat_server::{
    config::ServerConfig,
    database::Database,
    logging::{init_logging, LoggingConfig},
    server::{serve, ServerResources},
};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "prism-chat-server")]
#[command(about = "Prism - multi-tenant AI chat backend with credit-metered completions")]
pub struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,

    /// Override database URL
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }
    if let Some(database_url) = args.database_url {
        config.database_url = database_url;
    }

    init_logging(&LoggingConfig::from_env())?;
    info!(port = config.http_port, "Starting Prism chat server");

    let database = Database::new(&config.database_url).await?;
    info!("Database ready: {}", config.database_url);

    let resources = Arc::new(ServerResources::new(config, database)?);
    serve(resources).await?;

    info!("Server stopped");
    Ok(())
}
