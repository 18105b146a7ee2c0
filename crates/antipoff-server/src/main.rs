//! # antipoff-server
//!
//! HTTP backend for cadastral number history checks.
//!
//! This binary provides:
//! - **Query pipeline**: records each submitted cadastral number, asks the
//!   external history oracle about it and stores the verdict
//! - **History lookups** by cadastral number or query id
//! - **Accounts** with cookie sessions (access + refresh tokens)
//! - **Admin API** to browse and prune every table
//! - An optional **stub oracle** for local development

mod admin;
mod api;
mod auth;
mod config;
mod db;
mod error;
mod identity;
mod oracle;
mod pipeline;
mod session;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::config::{ServerConfig, DEV_SECRET_KEY};
use crate::db::DbPool;
use crate::oracle::HttpOracle;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,antipoff_server=debug")),
        )
        .init();

    info!("Starting Antipoff server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");
    if config.secret_key == DEV_SECRET_KEY {
        warn!("Session tokens are signed with the development secret; set SECRET_KEY");
    }

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------
    let db = DbPool::open(&config.database)?;

    let oracle = HttpOracle::new(config.oracle_url.clone(), config.oracle_timeout)?;
    info!(
        url = oracle.url(),
        timeout = ?config.oracle_timeout,
        stub = config.stub_oracle,
        "History oracle configured"
    );

    let http_addr = config.http_addr;
    let app_state = AppState::new(config, db, Arc::new(oracle))?;

    // -----------------------------------------------------------------------
    // 4. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
