use crate::api;
use crate::config::{Config, CONFIG_FILE};
use crate::display::{render_index, zmanim_today};
use crate::error::{PromoScreenError, Result};
use crate::events::event_stream;
use crate::state::AppState;
use crate::{tasks, watcher};
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;

/// Build the application router.
///
/// Anything not matched by a route is served from `public_dir`.
pub fn router(state: Arc<AppState>, public_dir: &Path) -> Router {
    Router::new()
        .route("/", get(render_index))
        .route("/events", get(event_stream))
        .route("/api/carousel", get(api::carousel))
        .route("/api/carousel/advance", post(api::advance_carousel))
        .route("/api/sponsors", get(api::sponsors))
        .route("/api/sponsors/refresh", post(api::refresh_sponsors))
        .route("/api/sponsors/debug", get(api::sponsor_debug))
        .route("/api/sponsors/cache", delete(api::clear_sponsor_cache))
        .route("/api/zmanim", get(zmanim_today))
        .fallback_service(ServeDir::new(public_dir))
        .with_state(state)
}

/// Run the display server on the specified port.
///
/// # Arguments
///
/// * `port` - The port number to bind the server to
/// * `config_file_path` - Configuration file, `config.json5` when `None`
/// * `shutdown_token` - Cancel to stop the server and every background task
///
/// # Errors
///
/// Returns an error if:
/// - The configuration file exists but cannot be parsed or validated
/// - The configuration watcher cannot be started
/// - The server fails to bind to the specified address
pub async fn run(
    port: u16,
    config_file_path: Option<PathBuf>,
    shutdown_token: CancellationToken,
) -> Result<()> {
    tracing::info!("Initializing server");

    let config_file_path = config_file_path.unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
    let config = Config::load(Some(&config_file_path))?;
    let public_dir = config.public_dir.clone();
    tracing::info!(
        "Loaded configuration for {} (carousel window {}, every {}ms)",
        config.site_name,
        config.carousel.window_size,
        config.carousel.interval_ms
    );

    let state = AppState::new(config, config_file_path, shutdown_token.clone())?;
    let mut handles = tasks::spawn_all(&state);
    if let Some(handle) = watcher::spawn_config_watcher(state.clone())? {
        handles.push(handle);
    }

    let app = router(state, &public_dir);
    tracing::debug!("Routes configured");

    let addr: SocketAddr = format!("0.0.0.0:{port}").parse()?;
    tracing::info!("Binding server to address: {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Display launched on: http://{addr}");

    let serve_result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_token.clone().cancelled_owned())
        .await;

    // stop background tasks even when the server exits on its own
    shutdown_token.cancel();
    for handle in handles {
        if let Err(e) = handle.await {
            tracing::warn!("Background task ended abnormally: {e}");
        }
    }

    if let Err(e) = serve_result {
        return Err(PromoScreenError::Generic(format!("Server error: {e}")));
    }
    tracing::info!("Server shutdown complete");
    Ok(())
}
