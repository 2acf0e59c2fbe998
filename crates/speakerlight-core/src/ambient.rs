//! Ambient status line: date, time of day, location and weather.
//!
//! Shown above the timer and refreshed once per second by the front end.
//! Location and weather are static text from the config file.

use chrono::{DateTime, TimeZone};

use crate::storage::AmbientConfig;

/// `Wednesday, Dec 10, 2025 | 05:46:58 AM`
pub fn clock_line<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    now.format("%A, %b %-d, %Y | %I:%M:%S %p").to_string()
}

/// Clock line followed by location and weather, skipping empty fields.
pub fn status_lines<Tz: TimeZone>(now: &DateTime<Tz>, config: &AmbientConfig) -> Vec<String>
where
    Tz::Offset: std::fmt::Display,
{
    if !config.enabled {
        return Vec::new();
    }
    let mut lines = vec![clock_line(now)];
    if !config.location.is_empty() {
        lines.push(format!("Location: {}", config.location));
    }
    if !config.weather.is_empty() {
        lines.push(format!("Weather: {}", config.weather));
    }
    lines
}
