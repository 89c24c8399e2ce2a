use crate::config::Clock;
use chrono::{DateTime, NaiveDateTime, NaiveTime, TimeZone, Timelike};
use serde::Serialize;

/// Minutes on either side of a zman that get highlighted
pub const PROXIMITY_WINDOW_MINUTES: i64 = 15;

/// How close the current time is to a displayed zman
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Proximity {
    /// The zman is at most 15 minutes away
    Upcoming,
    /// The zman passed at most 15 minutes ago
    Active,
}

impl Proximity {
    /// CSS class used by the display
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Proximity::Upcoming => "upcoming",
            Proximity::Active => "active",
        }
    }
}

/// Format a time as `H:MM AM` / `H:MM PM`, hours without a leading zero.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use promo_screen::utils::format_time_12h;
///
/// let time = NaiveDate::from_ymd_opt(2026, 10, 16)
///     .unwrap()
///     .and_hms_opt(0, 5, 0)
///     .unwrap();
/// assert_eq!(format_time_12h(&time), "12:05 AM");
/// ```
#[must_use]
pub fn format_time_12h<T: Timelike>(time: &T) -> String {
    let (is_pm, hour) = time.hour12();
    let marker = if is_pm { "PM" } else { "AM" };
    format!("{hour}:{:02} {marker}", time.minute())
}

/// Render the on-screen clock for `now`, or `None` when the clock is disabled
#[must_use]
pub fn current_time_string<Tz: TimeZone>(clock: Clock, now: &DateTime<Tz>) -> Option<String>
where
    Tz::Offset: std::fmt::Display,
{
    match clock {
        Clock::TwelveHour => Some(format_time_12h(&now.time())),
        Clock::TwentyFourHour => Some(now.format("%H:%M").to_string()),
        Clock::NoClock => None,
    }
}

/// Parse `H:MM AM` / `H:MM PM` (case-insensitive) into a time of day
#[must_use]
pub fn parse_time_12h(text: &str) -> Option<NaiveTime> {
    let (clock, marker) = text.trim().split_once(' ')?;
    let (hour, minute) = clock.split_once(':')?;
    let hour: u32 = hour.parse().ok()?;
    let minute: u32 = minute.parse().ok()?;
    if !(1..=12).contains(&hour) || minute > 59 {
        return None;
    }

    let hour = match marker.trim().to_ascii_uppercase().as_str() {
        "AM" if hour == 12 => 0,
        "AM" => hour,
        "PM" if hour == 12 => 12,
        "PM" => hour + 12,
        _ => return None,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Classify a zman time against the current wall-clock time.
///
/// `upcoming` when the zman is up to 15 minutes ahead, `active` when it passed up
/// to 15 minutes ago. Malformed times are never classified.
#[must_use]
pub fn classify_proximity(zman_time: &str, now: NaiveDateTime) -> Option<Proximity> {
    let target = now.date().and_time(parse_time_12h(zman_time)?);
    let diff_secs = (target - now).num_seconds();
    let window_secs = PROXIMITY_WINDOW_MINUTES * 60;

    if diff_secs > 0 && diff_secs <= window_secs {
        Some(Proximity::Upcoming)
    } else if diff_secs < 0 && diff_secs >= -window_secs {
        Some(Proximity::Active)
    } else {
        None
    }
}
