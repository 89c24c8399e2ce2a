//! # Promo Screen Entry Point
//!
//! Runs the signage server: carousel rotation, sponsor polling, the clock and
//! configuration hot reload, all pushed to connected displays over SSE.
//!
//! The application can be launched with optional command-line arguments:
//!
//! - First argument: Port number (defaults to 3000)
//! - Second argument: Path to configuration file (defaults to "config.json5")
//!
//! ## Example Usage
//!
//! ```bash
//! # Run with default settings (port 3000, default config)
//! cargo run
//!
//! # Run with a specific port and configuration file
//! cargo run 8080 lobby.json5
//! ```
//!
//! Log levels can be controlled through the `RUST_LOG` environment variable.

use promo_screen::{error::PromoScreenError, server};
use std::env;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Main entry point for the promo screen
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or the server fails to start
#[tokio::main]
async fn main() -> Result<(), PromoScreenError> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let port = env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(3000);

    let config_file_path = env::args().nth(2).map(PathBuf::from);

    tracing::info!("Starting promo screen");

    let cancel_token = CancellationToken::new();
    tokio::spawn({
        let cancel_token = cancel_token.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Shutdown signal received");
                    cancel_token.cancel();
                }
                Err(e) => tracing::error!("Failed to listen for shutdown signal: {e}"),
            }
        }
    });

    server::run(port, config_file_path, cancel_token).await?;

    tracing::info!("Promo screen shutting down");
    Ok(())
}
