use crate::error::{PromoScreenError, Result};
use crate::slides::SlideItem;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

/// Default configuration file, relative to the working directory
pub const CONFIG_FILE: &str = "config.json5";

/// Environment variable that overrides `sponsor_endpoint`
pub const SPONSOR_ENDPOINT_ENV: &str = "PROMO_SPONSOR_ENDPOINT";

/// Number of slides visible at once
pub const DEFAULT_WINDOW_SIZE: usize = 6;

/// Delay between automatic carousel advances
pub const DEFAULT_ROTATION_INTERVAL_MS: u64 = 3000;

/// Delay between sponsor data refreshes
pub const DEFAULT_SPONSOR_REFRESH_SECS: u64 = 300;

/// Markers left in an endpoint URL that was never deployed
pub const PLACEHOLDER_MARKERS: [&str; 2] = ["YOUR_DEPLOYMENT_ID", "DEPLOY_APPS_SCRIPT"];

/// Application configuration structure
///
/// Every field has a default, so a partial (or empty) config file is valid.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Name shown in the page title and header
    pub site_name: String,
    /// Clock format to use (24-hour, 12-hour, or no clock)
    pub clock: Clock,
    /// Remote sponsor endpoint (Apps Script web app or Sheets API URL)
    pub sponsor_endpoint: Option<String>,
    /// Seconds between sponsor refreshes
    pub sponsor_refresh_secs: u64,
    /// Directory served as static files (`assets/`, `images/`)
    pub public_dir: PathBuf,
    /// JSON file backing the sponsor cache
    pub cache_file: PathBuf,
    /// Carousel behaviour
    pub carousel: CarouselConfig,
    /// Slides for the carousel; the built-in list is used when empty
    pub slides: Vec<SlideItem>,
    /// Location used when generating zmanim files
    pub location: Location,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site_name: "Mercaz Daf Yomi".to_string(),
            clock: Clock::default(),
            sponsor_endpoint: None,
            sponsor_refresh_secs: DEFAULT_SPONSOR_REFRESH_SECS,
            public_dir: PathBuf::from("public"),
            cache_file: PathBuf::from("data/sponsor-cache.json"),
            carousel: CarouselConfig::default(),
            slides: Vec::new(),
            location: Location::default(),
        }
    }
}

/// Carousel settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CarouselConfig {
    /// Number of visible slides
    pub window_size: usize,
    /// Milliseconds between automatic advances
    pub interval_ms: u64,
    /// Where the carousel items come from
    pub source: CarouselSource,
}

impl Default for CarouselConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            interval_ms: DEFAULT_ROTATION_INTERVAL_MS,
            source: CarouselSource::default(),
        }
    }
}

/// Source of the carousel items
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CarouselSource {
    /// Configured or built-in slides
    #[default]
    Static,
    /// Whatever the sponsor resolver last produced
    Sponsors,
}

/// Geographic location for zmanim calculation
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Location {
    pub city: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
    /// IANA timezone id, e.g. `Asia/Jerusalem`
    pub timezone: String,
    /// Meters above sea level
    pub elevation: f64,
}

impl Default for Location {
    fn default() -> Self {
        Self {
            city: "Bet Shemesh".to_string(),
            country: "Israel".to_string(),
            latitude: 31.7453,
            longitude: 34.9897,
            timezone: "Asia/Jerusalem".to_string(),
            elevation: 400.0,
        }
    }
}

impl Config {
    /// Load the application configuration.
    ///
    /// Falls back to [`CONFIG_FILE`] when no path is given. A missing file yields the
    /// default configuration so the display can start unattended.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed, or validated
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.unwrap_or_else(|| Path::new(CONFIG_FILE));
        tracing::debug!("Loading application configuration from {}", path.display());

        let mut config = if path.exists() {
            let config_str = fs::read_to_string(path)?;
            json5::from_str::<Config>(&config_str)?
        } else {
            tracing::warn!(
                "Configuration file {} not found, using defaults",
                path.display()
            );
            Config::default()
        };

        config.apply_endpoint_override(std::env::var(SPONSOR_ENDPOINT_ENV).ok());
        config.validate()?;

        tracing::info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Replace the sponsor endpoint when an override is present and non-blank
    pub fn apply_endpoint_override(&mut self, endpoint: Option<String>) {
        if let Some(endpoint) = endpoint.filter(|e| !e.trim().is_empty()) {
            tracing::debug!("Sponsor endpoint overridden from {SPONSOR_ENDPOINT_ENV}");
            self.sponsor_endpoint = Some(endpoint);
        }
    }

    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error for a zero window size or interval, or for a configured
    /// endpoint that is not a valid URL
    pub fn validate(&self) -> Result<()> {
        if self.carousel.window_size == 0 {
            return Err(PromoScreenError::from("Carousel window size must be at least 1"));
        }
        if self.carousel.interval_ms == 0 {
            return Err(PromoScreenError::from("Carousel interval must be positive"));
        }
        if self.sponsor_refresh_secs == 0 {
            return Err(PromoScreenError::from("Sponsor refresh interval must be positive"));
        }
        if self.sponsor_endpoint_configured() {
            if let Some(endpoint) = &self.sponsor_endpoint {
                if Url::parse(endpoint).is_err() {
                    return Err(PromoScreenError::from(format!(
                        "Invalid sponsor endpoint URL: {endpoint}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Whether the sponsor endpoint points at a real deployment
    #[must_use]
    pub fn sponsor_endpoint_configured(&self) -> bool {
        is_endpoint_configured(self.sponsor_endpoint.as_deref())
    }

    /// Bundled sample sponsor payload
    #[must_use]
    pub fn sample_data_path(&self) -> PathBuf {
        self.public_dir
            .join("assets")
            .join("sponsors")
            .join("sample-data.json")
    }

    /// Directory holding one zmanim file per day
    #[must_use]
    pub fn zmanim_dir(&self) -> PathBuf {
        self.public_dir.join("assets").join("zmanim")
    }
}

/// An endpoint counts as configured when present, non-blank and free of placeholder ids
#[must_use]
pub fn is_endpoint_configured(endpoint: Option<&str>) -> bool {
    match endpoint {
        Some(url) if !url.trim().is_empty() => {
            !PLACEHOLDER_MARKERS.iter().any(|marker| url.contains(marker))
        }
        _ => false,
    }
}

/// Clock format options
///
/// Defines the format in which to display the time on the display
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum Clock {
    /// 24-hour format (e.g., 13:00)
    TwentyFourHour,
    /// 12-hour format with AM/PM (e.g., 1:00 PM)
    TwelveHour,
    /// No clock displayed
    #[default]
    NoClock,
}

impl std::fmt::Display for Clock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Clock::TwentyFourHour => f.write_str("24hour"),
            Clock::TwelveHour => f.write_str("12hour"),
            Clock::NoClock => f.write_str("noclock"),
        }
    }
}
