//! Small time-axis helpers shared by the stats handlers: converting a
//! client-supplied Unix timestamp into the `YYYY-MM-DD` date used to build
//! counter keys, and into the human-readable label that closes every
//! response header (spec.md §8: "a human date").

use chrono::{Local, TimeZone};

/// `YYYY-MM-DD` in local time, as stored in counter keys.
pub fn date_of(timestamp: i64) -> Option<String> {
    Local
        .timestamp_opt(timestamp, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d").to_string())
}

/// `(year, month)` in local time, used to anchor the day-filter grammar
/// ("the month of the last listed date", spec.md §4.7).
pub fn year_month_of(timestamp: i64) -> Option<(i32, u32)> {
    Local
        .timestamp_opt(timestamp, 0)
        .single()
        .map(|dt| (dt.format("%Y").to_string().parse().unwrap(), {
            use chrono::Datelike;
            dt.month()
        }))
}

/// `"Friday 19 August"`-style label for the `intra`/`day` response header.
pub fn human_date(timestamp: i64) -> String {
    Local
        .timestamp_opt(timestamp, 0)
        .single()
        .map(|dt| dt.format("%A %d %B").to_string())
        .unwrap_or_default()
}

/// `"August 2011"`-style label for the `week`/`month` response header —
/// both report the coarser `%B %Y` format and the fixed label `"month"`
/// (not `"week"`; the original's week handler reuses the month label
/// verbatim, and this crate follows suit rather than inventing one).
pub fn human_month(timestamp: i64) -> String {
    Local
        .timestamp_opt(timestamp, 0)
        .single()
        .map(|dt| dt.format("%B %Y").to_string())
        .unwrap_or_default()
}

/// `HH` zero-padded hour-of-day in local time.
pub fn hour_of(timestamp: i64) -> Option<u32> {
    use chrono::Timelike;
    Local.timestamp_opt(timestamp, 0).single().map(|dt| dt.hour())
}
