use crate::error::Result;
use crate::sponsors::{FetchReport, SponsorDebugInfo};
use crate::state::AppState;
use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

fn internal_error(context: &str, e: &crate::error::PromoScreenError) -> axum::response::Response {
    error!("{context}: {e}");
    (StatusCode::INTERNAL_SERVER_ERROR, format!("{context}: {e}")).into_response()
}

/// Current carousel window
pub async fn carousel(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.carousel_snapshot() {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => internal_error("Failed to read carousel", &e),
    }
}

/// Rotate one position immediately; used by the prev/next buttons
pub async fn advance_carousel(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.advance_carousel() {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => internal_error("Failed to advance carousel", &e),
    }
}

#[derive(Debug, Serialize)]
pub struct SponsorsResponse {
    pub items: Vec<crate::slides::SlideItem>,
    pub report: Option<FetchReport>,
}

/// Sponsor list currently on screen and how it was obtained
pub async fn sponsors(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let result = (|| -> Result<SponsorsResponse> {
        Ok(SponsorsResponse {
            items: state.sponsors()?,
            report: state.last_report()?,
        })
    })();

    match result {
        Ok(response) => Json(response).into_response(),
        Err(e) => internal_error("Failed to read sponsors", &e),
    }
}

/// Run the fallback chain now and return its report
pub async fn refresh_sponsors(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    info!("Sponsor refresh requested over HTTP");
    match state.refresh_sponsors().await {
        Ok(report) => Json(report).into_response(),
        Err(e) => internal_error("Failed to refresh sponsors", &e),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SponsorDebugResponse {
    #[serde(flatten)]
    pub info: SponsorDebugInfo,
    pub last_report: Option<FetchReport>,
}

/// Endpoint, cache and recent log entries for troubleshooting
pub async fn sponsor_debug(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let result = (|| -> Result<SponsorDebugResponse> {
        Ok(SponsorDebugResponse {
            info: state.resolver()?.debug_info_at(Utc::now()),
            last_report: state.last_report()?,
        })
    })();

    match result {
        Ok(response) => Json(response).into_response(),
        Err(e) => internal_error("Failed to gather sponsor debug info", &e),
    }
}

/// Drop the sponsor cache and debug log; the next resolution goes back to the source
pub async fn clear_sponsor_cache(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.resolver().and_then(|resolver| resolver.clear_cache()) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => internal_error("Failed to clear sponsor cache", &e),
    }
}
