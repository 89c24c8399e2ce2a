//! Sponsor data resolution
//!
//! Sponsors come from a spreadsheet-backed endpoint, but the display has to keep
//! showing something when that endpoint is down, unconfigured, or returns junk.
//! [`SponsorResolver::resolve`] walks a fixed chain and always produces a list:
//!
//! 1. cached data younger than an hour
//! 2. the bundled sample file, when the endpoint is still a placeholder
//! 3. the remote endpoint
//! 4. cached data of any age
//! 5. a built-in two-item placeholder list
//!
//! Each call returns a [`FetchReport`] describing which source won and what was
//! tried along the way.

use crate::cache::{CacheStore, DebugEntry};
use crate::config::{is_endpoint_configured, Config};
use crate::error::{PromoScreenError, Result};
use crate::slides::SlideItem;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Number of numbered placeholder images cycled through for rows without an image
pub const FALLBACK_IMAGE_POOL: usize = 20;

/// Timeout for the remote sponsor request
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Persisted debug entries surfaced by [`SponsorResolver::debug_info_at`]
const RECENT_LOG_ENTRIES: usize = 10;

/// Placeholder image for the `index`-th surviving row
#[must_use]
pub fn fallback_image(index: usize) -> String {
    format!("/images/numbered/{}.png", index % FALLBACK_IMAGE_POOL + 1)
}

/// Collapse newlines and runs of whitespace into single spaces
#[must_use]
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Spreadsheet cells arrive as strings, numbers or booleans
fn cell_text(cell: Option<&Value>) -> String {
    match cell {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// A row in the Apps Script `{ data: [...] }` format
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SponsorRow {
    #[serde(default)]
    pub heading: Value,
    #[serde(default)]
    pub content: Value,
    #[serde(default, rename = "imageUrl")]
    pub image_url: Value,
}

/// The two payload shapes a sponsor source may return
#[derive(Debug, Clone)]
pub enum SponsorPayload {
    /// `{ data: [{ heading, content, imageUrl? }, ...] }`
    Rows(Vec<SponsorRow>),
    /// `{ values: [[header...], [heading, content, imageUrl?], ...] }`
    SheetValues(Vec<Vec<Value>>),
}

impl SponsorPayload {
    /// Decode a raw JSON body into one of the known shapes.
    ///
    /// A malformed row (not an object in `data`, not an array in `values`) decodes
    /// as an empty row and is dropped later like any other incomplete row.
    ///
    /// # Errors
    ///
    /// Returns [`PromoScreenError::UnrecognizedPayload`] when neither a `data` nor a
    /// `values` array is present
    pub fn decode(body: Value) -> Result<Self> {
        let Value::Object(mut fields) = body else {
            return Err(PromoScreenError::UnrecognizedPayload);
        };
        match (fields.remove("data"), fields.remove("values")) {
            (Some(Value::Array(rows)), _) => Ok(Self::Rows(
                rows.into_iter()
                    .map(|row| serde_json::from_value(row).unwrap_or_default())
                    .collect(),
            )),
            (_, Some(Value::Array(values))) => Ok(Self::SheetValues(
                values
                    .into_iter()
                    .map(|row| match row {
                        Value::Array(cells) => cells,
                        _ => Vec::new(),
                    })
                    .collect(),
            )),
            _ => Err(PromoScreenError::UnrecognizedPayload),
        }
    }

    /// Turn the payload into slides, dropping rows without a heading or content.
    ///
    /// # Errors
    ///
    /// Returns [`PromoScreenError::EmptyPayload`] when no row survives
    pub fn into_slides(self) -> Result<Vec<SlideItem>> {
        let cells: Vec<[String; 3]> = match self {
            Self::Rows(rows) => rows
                .iter()
                .map(|row| {
                    [
                        cell_text(Some(&row.heading)),
                        cell_text(Some(&row.content)),
                        cell_text(Some(&row.image_url)),
                    ]
                })
                .collect(),
            Self::SheetValues(values) => values
                .iter()
                .skip(1)
                .map(|row| [cell_text(row.first()), cell_text(row.get(1)), cell_text(row.get(2))])
                .collect(),
        };

        let slides: Vec<SlideItem> = cells
            .into_iter()
            .filter_map(|[heading, content, image]| {
                let title = clean_text(&heading);
                let html = clean_text(&content);
                (!title.is_empty() && !html.is_empty()).then(|| (title, html, image))
            })
            .enumerate()
            .map(|(index, (title, html, image))| {
                let image = image.trim();
                let image_url = if image.is_empty() {
                    fallback_image(index)
                } else {
                    image.to_string()
                };
                SlideItem::new(image_url, title, html)
            })
            .collect();

        if slides.is_empty() {
            return Err(PromoScreenError::EmptyPayload);
        }
        Ok(slides)
    }
}

/// Which source produced the resolved list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    CacheHit,
    SampleData,
    Remote,
    CacheFallback,
    DefaultData,
}

/// Outcome of one resolution
#[derive(Debug, Clone, Serialize)]
pub struct FetchReport {
    pub attempted_at: DateTime<Utc>,
    pub status: FetchStatus,
    pub endpoint: Option<String>,
    pub configured: bool,
    pub item_count: usize,
    pub log: Vec<DebugEntry>,
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub items: Vec<SlideItem>,
    pub report: FetchReport,
}

/// Snapshot of resolver and cache state for troubleshooting a screen
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SponsorDebugInfo {
    pub endpoint: Option<String>,
    pub is_configured: bool,
    pub cache: CacheSummary,
    pub recent_logs: Vec<DebugEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSummary {
    pub valid: bool,
    pub timestamp: Option<DateTime<Utc>>,
    pub item_count: usize,
    pub data: Option<Vec<SlideItem>>,
}

/// Per-call step log, mirrored to tracing
#[derive(Default)]
struct StepLog {
    entries: Vec<DebugEntry>,
}

impl StepLog {
    fn record(&mut self, message: impl Into<String>, data: Option<Value>) {
        let message = message.into();
        match &data {
            Some(data) => debug!("{message} {data}"),
            None => debug!("{message}"),
        }
        self.entries.push(DebugEntry {
            timestamp: Utc::now().to_rfc3339(),
            message,
            data,
        });
    }
}

#[derive(Debug, Clone)]
pub struct SponsorResolver {
    client: reqwest::Client,
    endpoint: Option<String>,
    sample_path: PathBuf,
    store: CacheStore,
}

impl SponsorResolver {
    pub fn new(
        client: reqwest::Client,
        endpoint: Option<String>,
        sample_path: impl Into<PathBuf>,
        store: CacheStore,
    ) -> Self {
        Self {
            client,
            endpoint,
            sample_path: sample_path.into(),
            store,
        }
    }

    pub fn from_config(config: &Config, client: reqwest::Client) -> Self {
        Self::new(
            client,
            config.sponsor_endpoint.clone(),
            config.sample_data_path(),
            CacheStore::new(&config.cache_file),
        )
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        is_endpoint_configured(self.endpoint.as_deref())
    }

    #[must_use]
    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Resolve the sponsor list now
    pub async fn resolve(&self) -> Resolution {
        self.resolve_at(Utc::now()).await
    }

    /// Resolve the sponsor list as if the current time were `now`.
    ///
    /// Never fails: every error along the chain is logged and the next source tried.
    pub async fn resolve_at(&self, now: DateTime<Utc>) -> Resolution {
        let now_ms = now.timestamp_millis();
        let configured = self.is_configured();
        let mut log = StepLog::default();
        log.record(
            "Starting sponsor data fetch",
            Some(json!({ "endpoint": self.endpoint, "isConfigured": configured })),
        );

        if let Some(record) = self.store.load() {
            if record.is_valid_at(now_ms) && !record.data.is_empty() {
                let age_minutes = record.timestamp.map_or(0, |ts| (now_ms - ts) / 60_000);
                log.record(
                    "Using cached sponsor data",
                    Some(json!({
                        "itemCount": record.data.len(),
                        "cacheAge": format!("{age_minutes} minutes"),
                    })),
                );
                return self.finish(record.data, FetchStatus::CacheHit, now, log);
            }
        }

        if !configured {
            log.record("Sponsor endpoint not configured, trying local sample data", None);
            match self.load_sample().await {
                Ok(items) => {
                    self.save(&items, now_ms, &mut log);
                    log.record(
                        "Local sample data loaded",
                        Some(json!({ "itemCount": items.len() })),
                    );
                    return self.finish(items, FetchStatus::SampleData, now, log);
                }
                Err(e) => {
                    warn!("Failed to load local sample data: {e}");
                    log.record(
                        "Failed to load local sample data",
                        Some(json!({ "error": e.to_string() })),
                    );
                }
            }
        }

        match self.fetch_remote(&mut log).await {
            Ok(items) => {
                self.save(&items, now_ms, &mut log);
                log.record(
                    "Sponsor data fetched and cached",
                    Some(json!({ "itemCount": items.len() })),
                );
                return self.finish(items, FetchStatus::Remote, now, log);
            }
            Err(e) => {
                if configured {
                    warn!("Failed to fetch sponsor data: {e}");
                }
                log.record(
                    "Failed to fetch remote sponsor data",
                    Some(json!({ "error": e.to_string() })),
                );
            }
        }

        if let Some(record) = self.store.load().filter(|r| !r.data.is_empty()) {
            log.record(
                "Using cached sponsor data as fallback",
                Some(json!({ "itemCount": record.data.len() })),
            );
            return self.finish(record.data, FetchStatus::CacheFallback, now, log);
        }

        log.record(
            "Using default sponsor data",
            Some(json!({ "reason": "all_sources_failed" })),
        );
        self.finish(SlideItem::default_sponsors(), FetchStatus::DefaultData, now, log)
    }

    async fn load_sample(&self) -> Result<Vec<SlideItem>> {
        let raw = tokio::fs::read_to_string(&self.sample_path).await?;
        let body: Value = serde_json::from_str(&raw)?;
        SponsorPayload::decode(body)?.into_slides()
    }

    async fn fetch_remote(&self, log: &mut StepLog) -> Result<Vec<SlideItem>> {
        let endpoint = match &self.endpoint {
            Some(endpoint) if self.is_configured() => endpoint,
            _ => return Err(PromoScreenError::from("Sponsor endpoint not configured")),
        };

        log.record("Fetching remote sponsor data", Some(json!({ "url": endpoint })));
        let response = self
            .client
            .get(endpoint)
            .header(ACCEPT, "application/json")
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .send()
            .await?;

        let status = response.status();
        log.record(
            "Remote response received",
            Some(json!({ "status": status.as_u16() })),
        );
        if !status.is_success() {
            return Err(PromoScreenError::from(format!(
                "Sponsor endpoint responded with status {status}"
            )));
        }

        let body: Value = response.json().await?;
        SponsorPayload::decode(body)?.into_slides()
    }

    fn save(&self, items: &[SlideItem], now_ms: i64, log: &mut StepLog) {
        if let Err(e) = self.store.save(items, now_ms) {
            tracing::error!("Failed to save sponsor data to cache: {e}");
            log.record(
                "Failed to save to cache",
                Some(json!({ "error": e.to_string() })),
            );
        }
    }

    fn finish(
        &self,
        items: Vec<SlideItem>,
        status: FetchStatus,
        now: DateTime<Utc>,
        log: StepLog,
    ) -> Resolution {
        if let Err(e) = self.store.append_debug(&log.entries) {
            debug!("Failed to persist sponsor debug log: {e}");
        }
        info!("Resolved {} sponsor items ({status:?})", items.len());

        Resolution {
            report: FetchReport {
                attempted_at: now,
                status,
                endpoint: self.endpoint.clone(),
                configured: self.is_configured(),
                item_count: items.len(),
                log: log.entries,
            },
            items,
        }
    }

    /// Inspect cache and recent log entries as of `now`
    #[must_use]
    pub fn debug_info_at(&self, now: DateTime<Utc>) -> SponsorDebugInfo {
        let record = self.store.load();
        let mut recent_logs = self.store.debug_log();
        if recent_logs.len() > RECENT_LOG_ENTRIES {
            recent_logs.drain(..recent_logs.len() - RECENT_LOG_ENTRIES);
        }

        SponsorDebugInfo {
            endpoint: self.endpoint.clone(),
            is_configured: self.is_configured(),
            cache: CacheSummary {
                valid: record
                    .as_ref()
                    .is_some_and(|r| r.is_valid_at(now.timestamp_millis())),
                timestamp: record
                    .as_ref()
                    .and_then(|r| r.timestamp)
                    .and_then(|ts| Utc.timestamp_millis_opt(ts).single()),
                item_count: record.as_ref().map_or(0, |r| r.data.len()),
                data: record.map(|r| r.data),
            },
            recent_logs,
        }
    }

    /// Drop cached sponsor data and the debug log.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be rewritten
    pub fn clear_cache(&self) -> Result<()> {
        self.store.clear()?;
        info!("Sponsor cache cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_decode_rows_drops_incomplete() {
        let body = json!({
            "data": [
                { "heading": "Sponsor 1", "content": "Content 1" },
                { "heading": "Sponsor 2" },
                { "heading": "Sponsor 3", "content": "Content 3", "imageUrl": "/images/own.png" }
            ]
        });
        let slides = SponsorPayload::decode(body).unwrap().into_slides().unwrap();
        assert_eq!(slides.len(), 2);
        assert_eq!(slides[0], SlideItem::new("/images/numbered/1.png", "Sponsor 1", "Content 1"));
        assert_eq!(slides[1].title, "Sponsor 3");
        assert_eq!(slides[1].image_url, "/images/own.png");
    }

    #[test]
    fn test_decode_sheet_values_skips_header() {
        let body = json!({
            "values": [
                ["Heading", "Content", "Image"],
                ["A", "First"],
                ["B", "Second", ""],
                ["", "orphan content"]
            ]
        });
        let slides = SponsorPayload::decode(body).unwrap().into_slides().unwrap();
        assert_eq!(slides.len(), 2);
        assert_eq!(slides[0].title, "A");
        assert_eq!(slides[1].image_url, "/images/numbered/2.png");
    }

    #[test]
    fn test_text_is_cleaned() {
        let body = json!({
            "data": [{ "heading": "  Acme\r\nCorp ", "content": "line one\n\nline   two" }]
        });
        let slides = SponsorPayload::decode(body).unwrap().into_slides().unwrap();
        assert_eq!(slides[0].title, "Acme Corp");
        assert_eq!(slides[0].html, "line one line two");
    }

    #[test]
    fn test_malformed_data_row_is_dropped() {
        let body = json!({ "data": [{ "heading": "A", "content": "B" }, "junk", null, 7] });
        let slides = SponsorPayload::decode(body).unwrap().into_slides().unwrap();
        assert_eq!(slides, vec![SlideItem::new("/images/numbered/1.png", "A", "B")]);
    }

    #[test]
    fn test_malformed_sheet_row_is_dropped() {
        let body = json!({ "values": [["h", "c"], ["A", "B"], null, "junk"] });
        let slides = SponsorPayload::decode(body).unwrap().into_slides().unwrap();
        assert_eq!(slides.len(), 1);
        assert_eq!(slides[0].title, "A");
    }

    #[test]
    fn test_numeric_cells_are_kept() {
        let body = json!({ "values": [["h", "c"], [2026, true]] });
        let slides = SponsorPayload::decode(body).unwrap().into_slides().unwrap();
        assert_eq!(slides[0].title, "2026");
        assert_eq!(slides[0].html, "true");
    }

    #[test]
    fn test_whitespace_only_row_is_dropped() {
        let body = json!({ "data": [{ "heading": "   ", "content": "x" }] });
        let err = SponsorPayload::decode(body).unwrap().into_slides().unwrap_err();
        assert!(matches!(err, PromoScreenError::EmptyPayload));
    }

    #[test]
    fn test_unrecognized_shape() {
        for body in [json!({ "rows": [] }), json!([1, 2]), json!({ "data": "nope" })] {
            let err = SponsorPayload::decode(body).unwrap_err();
            assert!(matches!(err, PromoScreenError::UnrecognizedPayload));
        }
    }

    #[test]
    fn test_empty_array_is_empty_not_unrecognized() {
        let err = SponsorPayload::decode(json!({ "data": [] }))
            .unwrap()
            .into_slides()
            .unwrap_err();
        assert!(matches!(err, PromoScreenError::EmptyPayload));
    }

    #[test]
    fn test_fallback_image_cycles() {
        assert_eq!(fallback_image(0), "/images/numbered/1.png");
        assert_eq!(fallback_image(19), "/images/numbered/20.png");
        assert_eq!(fallback_image(20), "/images/numbered/1.png");
    }

    fn offline_resolver(dir: &std::path::Path) -> SponsorResolver {
        SponsorResolver::new(
            reqwest::Client::new(),
            Some("https://script.google.com/macros/s/YOUR_DEPLOYMENT_ID/exec".to_string()),
            dir.join("sample-data.json"),
            CacheStore::new(dir.join("cache.json")),
        )
    }

    #[tokio::test]
    async fn test_unconfigured_uses_sample_data() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("sample-data.json"),
            r#"{"data":[{"heading":"Sample","content":"From disk"}]}"#,
        )
        .unwrap();
        let resolver = offline_resolver(dir.path());

        let resolution = resolver.resolve().await;
        assert_eq!(resolution.report.status, FetchStatus::SampleData);
        assert!(!resolution.report.configured);
        assert_eq!(resolution.items[0].title, "Sample");

        let cached = resolver.store().load().unwrap();
        assert_eq!(cached.data, resolution.items);
    }

    #[tokio::test]
    async fn test_unconfigured_without_sample_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let resolver = offline_resolver(dir.path());

        let resolution = resolver.resolve().await;
        assert_eq!(resolution.report.status, FetchStatus::DefaultData);
        assert_eq!(resolution.items, SlideItem::default_sponsors());
        assert!(!resolution.report.log.is_empty());
    }

    #[tokio::test]
    async fn test_stale_cache_used_when_sources_fail() {
        let dir = tempdir().unwrap();
        let resolver = offline_resolver(dir.path());
        let stale = vec![SlideItem::new("/images/1.png", "Cached 1", "Content 1")];
        let now = Utc::now();
        resolver
            .store()
            .save(&stale, now.timestamp_millis() - 2 * 60 * 60 * 1000)
            .unwrap();

        let resolution = resolver.resolve_at(now).await;
        assert_eq!(resolution.report.status, FetchStatus::CacheFallback);
        assert_eq!(resolution.items, stale);
    }

    #[tokio::test]
    async fn test_debug_info_reflects_cache() {
        let dir = tempdir().unwrap();
        let resolver = offline_resolver(dir.path());
        let now = Utc::now();
        resolver
            .store()
            .save(&SlideItem::default_sponsors(), now.timestamp_millis())
            .unwrap();

        let info = resolver.debug_info_at(now);
        assert!(info.cache.valid);
        assert_eq!(info.cache.item_count, 2);
        assert!(!info.is_configured);

        resolver.clear_cache().unwrap();
        let info = resolver.debug_info_at(now);
        assert!(!info.cache.valid);
        assert_eq!(info.cache.item_count, 0);
        assert!(info.recent_logs.is_empty());
    }
}
