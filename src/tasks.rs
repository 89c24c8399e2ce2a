//! Background timers driving the display
//!
//! Three independent loops run for the lifetime of the server: carousel rotation,
//! the on-screen clock, and sponsor polling. Each one only touches its own slice
//! of [`AppState`] and exits as soon as the shutdown token is cancelled.

use crate::config::{DEFAULT_ROTATION_INTERVAL_MS, DEFAULT_SPONSOR_REFRESH_SECS};
use crate::events::DisplayEvent;
use crate::state::AppState;
use crate::utils::current_time_string;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Start the rotation, clock and sponsor loops
pub fn spawn_all(state: &Arc<AppState>) -> Vec<JoinHandle<()>> {
    vec![
        tokio::spawn(rotation_loop(state.clone())),
        tokio::spawn(clock_loop(state.clone())),
        tokio::spawn(sponsor_loop(state.clone())),
    ]
}

/// Advance the carousel every `carousel.interval_ms`, re-read on each tick so a
/// config reload takes effect without a restart
pub async fn rotation_loop(state: Arc<AppState>) {
    info!("Starting carousel rotation");
    loop {
        let interval_ms = state
            .config_snapshot()
            .map_or(DEFAULT_ROTATION_INTERVAL_MS, |c| c.carousel.interval_ms);

        tokio::select! {
            () = state.shutdown_token.cancelled() => break,
            () = tokio::time::sleep(Duration::from_millis(interval_ms)) => {}
        }

        if let Err(e) = state.advance_carousel() {
            error!("Failed to advance carousel: {e}");
        }
    }
    info!("Carousel rotation stopped");
}

/// Publish the formatted clock once a second while a clock is configured
pub async fn clock_loop(state: Arc<AppState>) {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            () = state.shutdown_token.cancelled() => break,
            _ = interval.tick() => {}
        }

        let Ok(config) = state.config_snapshot() else {
            continue;
        };
        if let Some(time) = current_time_string(config.clock, &chrono::Local::now()) {
            state.publish(DisplayEvent::Clock { time });
        }
    }
    debug!("Clock stopped");
}

/// Resolve sponsors immediately, then every `sponsor_refresh_secs` or whenever a
/// refresh is requested
pub async fn sponsor_loop(state: Arc<AppState>) {
    info!("Starting sponsor polling");
    loop {
        tokio::select! {
            () = state.shutdown_token.cancelled() => break,
            result = state.refresh_sponsors() => match result {
                Ok(report) => debug!("Sponsor refresh finished: {:?}", report.status),
                Err(e) => error!("Sponsor refresh failed: {e}"),
            },
        }

        let refresh_secs = state
            .config_snapshot()
            .map_or(DEFAULT_SPONSOR_REFRESH_SECS, |c| c.sponsor_refresh_secs);

        tokio::select! {
            () = state.shutdown_token.cancelled() => break,
            () = tokio::time::sleep(Duration::from_secs(refresh_secs)) => {}
            () = state.refresh.notified() => debug!("Sponsor refresh requested"),
        }
    }
    info!("Sponsor polling stopped");
}
