use crate::carousel::CarouselSnapshot;
use crate::slides::{ticker_text, SlideItem};
use crate::state::AppState;
use crate::utils::current_time_string;
use crate::zmanim::{display_entries, load_for_date, ZmanEntry, ZmanimRecord};
use askama::Template;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Json},
};
use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// Zmanim panel contents for one day
pub struct ZmanimView {
    pub gregorian_date: String,
    pub hebrew_date: String,
    pub city: String,
    pub country: String,
    pub entries: Vec<ZmanEntry>,
}

impl ZmanimView {
    fn new(record: &ZmanimRecord, now: NaiveDateTime) -> Self {
        Self {
            gregorian_date: record.gregorian_date.clone(),
            hebrew_date: record.hebrew_date.clone(),
            city: record.location.city.clone(),
            country: record.location.country.clone(),
            entries: display_entries(record, now),
        }
    }
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub site_name: String,
    /// `24hour`, `12hour` or `noclock`, used as a CSS class and by the script
    pub clock: String,
    pub current_time: Option<String>,
    pub carousel: CarouselSnapshot,
    pub ticker: String,
    pub sponsors: Vec<SlideItem>,
    pub zmanim: Option<ZmanimView>,
}

/// Today's record from `dir`, if one was generated
#[must_use]
pub fn today_zmanim(dir: &Path) -> Option<ZmanimRecord> {
    load_for_date(dir, Local::now().date_naive())
}

fn build_index(state: &AppState) -> crate::error::Result<IndexTemplate> {
    let config = state.config_snapshot()?;
    let sponsors = state.sponsors()?;
    let now = Local::now();

    Ok(IndexTemplate {
        site_name: config.site_name.clone(),
        clock: config.clock.to_string(),
        current_time: current_time_string(config.clock, &now),
        carousel: state.carousel_snapshot()?,
        ticker: ticker_text(&sponsors),
        sponsors,
        zmanim: today_zmanim(&config.zmanim_dir())
            .map(|record| ZmanimView::new(&record, now.naive_local())),
    })
}

/// Render the signage page with the current carousel window, sponsors and zmanim
pub async fn render_index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    tracing::debug!("Rendering display page");

    let template = match build_index(&state) {
        Ok(template) => template,
        Err(e) => {
            tracing::error!("Failed to gather display state: {e}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Display state error").into_response();
        }
    };

    match template.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!("Template rendering error: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Template rendering error").into_response()
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ZmanimResponse {
    pub record: ZmanimRecord,
    pub entries: Vec<ZmanEntry>,
}

/// Today's zmanim with highlight states, or `null` when no file exists for today
pub async fn zmanim_today(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let dir = match state.config_snapshot() {
        Ok(config) => config.zmanim_dir(),
        Err(e) => {
            tracing::error!("{e}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Configuration read lock error")
                .into_response();
        }
    };

    let now = Local::now().naive_local();
    let response = today_zmanim(&dir).map(|record| ZmanimResponse {
        entries: display_entries(&record, now),
        record,
    });
    Json(response).into_response()
}
