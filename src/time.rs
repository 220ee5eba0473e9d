use chrono::{DateTime, TimeZone, Utc};
use tracing::warn;

const CLOCK_FORMAT: &str = "%I:%M %p";

/// Wall-clock label (`03:07 PM`) in the configured timezone.
///
/// Falls back to UTC if tz parsing fails.
pub fn clock_label(tz: &str) -> String {
    format_clock(Utc::now(), tz)
}

pub fn format_clock(now: DateTime<Utc>, tz: &str) -> String {
    match tz.parse::<chrono_tz::Tz>() {
        Ok(tz) => tz.from_utc_datetime(&now.naive_utc()).format(CLOCK_FORMAT).to_string(),
        Err(_) => {
            warn!(tz, "invalid tz, using UTC");
            now.format(CLOCK_FORMAT).to_string()
        }
    }
}
