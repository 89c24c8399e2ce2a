//! Daily halachic times
//!
//! One JSON file per calendar day is generated ahead of time by the
//! `fetch_zmanim` binary and read back by the display. A missing or unreadable
//! file simply means there is nothing to show for that day.

use crate::config::Location;
use crate::error::{PromoScreenError, Result};
use crate::utils::{classify_proximity, format_time_12h, Proximity};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Public zmanim API, computed with the KosherZmanim library
pub const HEBCAL_ZMANIM_API: &str = "https://www.hebcal.com/zmanim";

/// Zman keys as returned by Hebcal, with English and Hebrew display names.
/// The last entry is not shown on screen but is kept in the generated files.
pub const ZMANIM: [(&str, &str, &str); 13] = [
    ("alotHaShachar", "Dawn", "עלות השחר"),
    ("misheyakir", "Earliest Tallit & Tefillin", "משיכיר"),
    ("sunrise", "Sunrise", "הנץ החמה"),
    ("sofZmanShma", "Latest Shema (MGA)", "סוף זמן ק\"ש מג\"א"),
    ("sofZmanShmaGRA", "Latest Shema (GRA)", "סוף זמן ק\"ש גר\"א"),
    ("sofZmanTfilla", "Latest Shacharit", "סוף זמן תפילה"),
    ("chatzot", "Chatzot", "חצות היום"),
    ("minchaGedola", "Earliest Mincha", "מנחה גדולה"),
    ("minchaKetana", "Mincha Ketana", "מנחה קטנה"),
    ("plagHamincha", "Plag Hamincha", "פלג המנחה"),
    ("sunset", "Sunset", "שקיעה"),
    ("tzeit", "Tzet Hakochavim", "צאת הכוכבים"),
    ("chatzotNight", "Chatzot Halailah", "חצות הלילה"),
];

/// Number of leading [`ZMANIM`] entries shown on the display
const DISPLAYED_ZMANIM: usize = 12;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZmanimRecord {
    /// `YYYY-MM-DD`
    pub date: String,
    pub gregorian_date: String,
    #[serde(default)]
    pub hebrew_date: String,
    pub location: Location,
    pub times: HashMap<String, Zman>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Zman {
    pub name: String,
    pub hebrew: String,
    /// `H:MM AM/PM`
    pub time: Option<String>,
    pub iso: Option<String>,
}

/// A zman ready for display, with its highlight state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZmanEntry {
    pub name: String,
    pub hebrew: String,
    pub time: String,
    pub proximity: Option<Proximity>,
}

impl ZmanEntry {
    /// CSS class for the highlight state, empty when not highlighted
    #[must_use]
    pub fn proximity_class(&self) -> &'static str {
        self.proximity.map_or("", Proximity::as_str)
    }
}

/// File holding the record for `date`
#[must_use]
pub fn record_path(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!("{}.json", date.format("%Y-%m-%d")))
}

/// Load the record for `date`, or `None` if there is none to show
#[must_use]
pub fn load_for_date(dir: &Path, date: NaiveDate) -> Option<ZmanimRecord> {
    let path = record_path(dir, date);
    let raw = match std::fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::debug!("No zmanim file at {}: {e}", path.display());
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!("Ignoring malformed zmanim file {}: {e}", path.display());
            None
        }
    }
}

/// The daytime zmanim in display order, skipping those without a time
#[must_use]
pub fn display_entries(record: &ZmanimRecord, now: NaiveDateTime) -> Vec<ZmanEntry> {
    ZMANIM
        .iter()
        .take(DISPLAYED_ZMANIM)
        .filter_map(|(key, _, _)| record.times.get(*key))
        .filter_map(|zman| {
            let time = zman.time.clone().filter(|t| !t.is_empty())?;
            Some(ZmanEntry {
                name: zman.name.clone(),
                hebrew: zman.hebrew.clone(),
                proximity: classify_proximity(&time, now),
                time,
            })
        })
        .collect()
}

/// Build the Hebcal request URL for one day
///
/// # Errors
///
/// Returns an error if the base URL cannot be parsed
pub fn hebcal_url(base: &str, date: NaiveDate, location: &Location) -> Result<url::Url> {
    let mut url = url::Url::parse(base)
        .map_err(|e| PromoScreenError::from(format!("Invalid zmanim API URL {base}: {e}")))?;
    url.query_pairs_mut()
        .append_pair("cfg", "json")
        .append_pair("date", &date.format("%Y-%m-%d").to_string())
        .append_pair("latitude", &location.latitude.to_string())
        .append_pair("longitude", &location.longitude.to_string())
        .append_pair("tzid", &location.timezone)
        .append_pair("elevation", &location.elevation.to_string());
    Ok(url)
}

/// Build a record from a Hebcal zmanim response.
///
/// Times are shown in the offset carried by each ISO timestamp, i.e. the
/// location's local time. Missing or unparseable times become `null`.
#[must_use]
pub fn build_record(date: NaiveDate, location: &Location, response: &Value) -> ZmanimRecord {
    let times = ZMANIM
        .iter()
        .map(|(key, name, hebrew)| {
            let iso = response
                .get("times")
                .and_then(|times| times.get(*key))
                .and_then(Value::as_str)
                .map(str::to_string);
            let time = iso
                .as_deref()
                .and_then(|iso| DateTime::parse_from_rfc3339(iso).ok())
                .map(|instant| format_time_12h(&instant.naive_local()));
            (
                (*key).to_string(),
                Zman {
                    name: (*name).to_string(),
                    hebrew: (*hebrew).to_string(),
                    time,
                    iso,
                },
            )
        })
        .collect();

    let hebrew_date = response
        .get("date")
        .and_then(|d| d.get("hebrew"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    ZmanimRecord {
        date: date.format("%Y-%m-%d").to_string(),
        gregorian_date: date.format("%A, %B %-d, %Y").to_string(),
        hebrew_date,
        location: location.clone(),
        times,
    }
}

/// Fetch and convert the record for one day
///
/// # Errors
///
/// Returns an error on transport failures or a non-success status
pub async fn fetch_record(
    client: &reqwest::Client,
    base: &str,
    date: NaiveDate,
    location: &Location,
) -> Result<ZmanimRecord> {
    let url = hebcal_url(base, date, location)?;
    tracing::debug!("Fetching zmanim for {date} from {url}");
    let response: Value = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(build_record(date, location, &response))
}

/// Write a record as `{dir}/{date}.json`
///
/// # Errors
///
/// Returns an error if the file cannot be serialized or written
pub fn save_record(dir: &Path, record: &ZmanimRecord) -> Result<PathBuf> {
    let path = dir.join(format!("{}.json", record.date));
    std::fs::write(&path, serde_json::to_string_pretty(record)?)?;
    Ok(path)
}
