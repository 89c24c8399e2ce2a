//! # Zmanim Generator
//!
//! Fetches a year of halachic times for the configured location from Hebcal and
//! writes one `YYYY-MM-DD.json` file per day into the display's zmanim directory.
//!
//! - First argument: Number of days starting today (defaults to 365)
//! - Second argument: Path to configuration file (defaults to "config.json5")
//!
//! ```bash
//! cargo run --bin fetch_zmanim 30 lobby.json5
//! ```

use chrono::{Days, Local};
use promo_screen::{
    config::Config,
    error::PromoScreenError,
    zmanim::{fetch_record, save_record, HEBCAL_ZMANIM_API},
};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_DAYS: u64 = 365;

/// Pause between requests to stay polite to the API
const REQUEST_DELAY: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> Result<(), PromoScreenError> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let days = env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_DAYS);
    let config_path = env::args().nth(2).map(PathBuf::from);

    let config = Config::load(config_path.as_deref())?;
    let location = &config.location;
    let output_dir = config.zmanim_dir();
    std::fs::create_dir_all(&output_dir)?;

    tracing::info!(
        "Fetching {days} days of zmanim for {}, {} ({}, {}, {})",
        location.city,
        location.country,
        location.latitude,
        location.longitude,
        location.timezone
    );
    tracing::info!("Output directory: {}", output_dir.display());

    let client = reqwest::Client::new();
    let today = Local::now().date_naive();
    let mut success_count = 0;
    let mut error_count = 0;

    for offset in 0..days {
        let Some(date) = today.checked_add_days(Days::new(offset)) else {
            break;
        };

        match fetch_record(&client, HEBCAL_ZMANIM_API, date, location).await {
            Ok(record) => match save_record(&output_dir, &record) {
                Ok(path) => {
                    tracing::info!("Saved {}", path.display());
                    success_count += 1;
                }
                Err(e) => {
                    tracing::error!("Failed to save zmanim for {date}: {e}");
                    error_count += 1;
                }
            },
            Err(e) => {
                tracing::error!("Failed to fetch zmanim for {date}: {e}");
                error_count += 1;
            }
        }

        tokio::time::sleep(REQUEST_DELAY).await;
    }

    tracing::info!(
        "Done: {success_count} days saved, {error_count} failed, in {}",
        output_dir.display()
    );
    Ok(())
}
