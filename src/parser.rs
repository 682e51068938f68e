//! Combined-style access-log line parser (C4). Extracts a [`VisitFact`] or
//! decides to drop the line; see SPEC_FULL.md §4.4 for the exact steps.

use crate::config::FilterConfig;
use crate::models::visit::{VisitFact, VisitType};

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Parses one access-log line. Returns `None` for any of the defined drop
/// conditions; never panics on malformed input.
pub fn parse_line(line: &str, config: &FilterConfig) -> Option<VisitFact> {
    if line.len() < 10 {
        return None;
    }

    let tokens: Vec<&str> = line.split(' ').collect();
    if tokens.len() <= 10 {
        return None;
    }

    let url = tokens[6];
    let app = extract_app(url)?;
    let group = extract_group(url, config)?;
    let vtype = classify_response(line, config)?;
    let (date, hour, ten_min, minute) = parse_date_token(tokens[3])?;
    let response_size = parse_size(tokens[9])?;
    let response_duration = tokens[10].parse::<u64>().ok()?;

    Some(VisitFact {
        app,
        group,
        vtype,
        date,
        hour,
        ten_min,
        minute,
        response_size,
        response_duration,
    })
}

/// First path segment of the URL. Drops when there's no second `/` after
/// position 0 (e.g. `/robots.txt`'s extension has no module to attribute
/// it to).
fn extract_app(url: &str) -> Option<String> {
    if !url.starts_with('/') || url.len() < 2 {
        return None;
    }
    let slash_offset = url[1..].find('/')?;
    Some(url[1..1 + slash_offset].to_string())
}

/// Everything from the first `.` to the first `?` (exclusive), lower-cased,
/// looked up in the configured extension->group mapping.
fn extract_group(url: &str, config: &FilterConfig) -> Option<String> {
    let dot = url.find('.')?;
    let end = url[dot..]
        .find('?')
        .map(|i| dot + i)
        .unwrap_or(url.len());
    let ext = url[dot..end].to_lowercase();
    config.extension_groups.get(&ext).cloned()
}

fn classify_response(line: &str, config: &FilterConfig) -> Option<VisitType> {
    if line.contains(&config.url1) {
        Some(VisitType::Ok)
    } else if line.contains(&config.url2) {
        Some(VisitType::Found)
    } else if config.enable_404 && line.contains(&config.url3) {
        Some(VisitType::Other)
    } else {
        None
    }
}

/// Parses `[DD/Mon/YYYY:HH:MM:SS` into `(date, hour, ten_min, minute)`, all
/// zero-padded. Returns `None` on any malformed component rather than
/// aborting the whole batch (spec.md §4.4 step 5 / §7).
fn parse_date_token(token: &str) -> Option<(String, String, String, String)> {
    let token = token.strip_prefix('[').unwrap_or(token);
    let mut parts = token.splitn(2, ':');
    let date_part = parts.next()?;
    let time_part = parts.next()?;

    let mut date_fields = date_part.split('/');
    let day: u32 = date_fields.next()?.parse().ok()?;
    let mon_str = date_fields.next()?;
    let year: i32 = date_fields.next()?.parse().ok()?;

    let month = MONTHS
        .iter()
        .position(|m| m.eq_ignore_ascii_case(mon_str))
        .map(|i| i as u32 + 1)?;

    let mut time_fields = time_part.split(':');
    let hour: u32 = time_fields.next()?.parse().ok()?;
    let minute_n: u32 = time_fields.next()?.parse().ok()?;
    let _second: u32 = time_fields.next()?.parse().ok()?;

    if hour > 23 || minute_n > 59 {
        return None;
    }

    let date = format!("{year:04}-{month:02}-{day:02}");
    let hour_s = format!("{hour:02}");
    let ten_min = format!("{hour:02}{}", minute_n / 10);
    let minute = format!("{hour:02}{minute_n:02}");

    Some((date, hour_s, ten_min, minute))
}

fn parse_size(token: &str) -> Option<u64> {
    if token == "-" {
        Some(0)
    } else {
        token.parse::<u64>().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config() -> FilterConfig {
        let mut extension_groups = HashMap::new();
        extension_groups.insert(".do".to_string(), "w".to_string());
        extension_groups.insert(".html".to_string(), "w".to_string());
        FilterConfig {
            path: String::new(),
            ssl: String::new(),
            extension_groups,
            url1: " 200 ".to_string(),
            url2: " 302 ".to_string(),
            url3: " 404 ".to_string(),
            enable_404: false,
            exclude_mod: String::new(),
        }
    }

    fn sample_line() -> String {
        "127.0.0.1 - - [19/Aug/2011:12:34:56 +0000] \"GET /calendar/view.do HTTP/1.1\" 200 1234 50"
            .to_string()
    }

    #[test]
    fn parses_the_worked_example_from_spec() {
        let fact = parse_line(&sample_line(), &config()).expect("should parse");
        assert_eq!(fact.app, "calendar");
        assert_eq!(fact.group, "w");
        assert_eq!(fact.vtype, VisitType::Ok);
        assert_eq!(fact.date, "2011-08-19");
        assert_eq!(fact.hour, "12");
        assert_eq!(fact.ten_min, "123");
        assert_eq!(fact.minute, "1234");
        assert_eq!(fact.response_size, 1234);
        assert_eq!(fact.response_duration, 50);
    }

    #[test]
    fn line_under_ten_bytes_is_dropped() {
        assert!(parse_line("short", &config()).is_none());
    }

    #[test]
    fn line_exactly_ten_bytes_is_dropped() {
        let line = "0123456789"; // length 10, but not a real log line either way
        assert!(parse_line(line, &config()).is_none());
    }

    #[test]
    fn unmapped_extension_is_dropped() {
        let line =
            "127.0.0.1 - - [19/Aug/2011:12:34:56 +0000] \"GET /calendar/view.xyz HTTP/1.1\" 200 1234 50";
        assert!(parse_line(line, &config()).is_none());
    }

    #[test]
    fn non_200_302_is_dropped_when_404_disabled() {
        let line =
            "127.0.0.1 - - [19/Aug/2011:12:34:56 +0000] \"GET /calendar/view.do HTTP/1.1\" 404 1234 50";
        assert!(parse_line(line, &config()).is_none());
    }

    #[test]
    fn dash_size_maps_to_zero() {
        let line =
            "127.0.0.1 - - [19/Aug/2011:12:34:56 +0000] \"GET /calendar/view.do HTTP/1.1\" 200 - 50";
        let fact = parse_line(line, &config()).unwrap();
        assert_eq!(fact.response_size, 0);
    }

    #[test]
    fn missing_second_slash_is_dropped() {
        let line =
            "127.0.0.1 - - [19/Aug/2011:12:34:56 +0000] \"GET /robots.txt HTTP/1.1\" 200 1234 50";
        assert!(parse_line(line, &config()).is_none());
    }

    #[test]
    fn parse_is_idempotent() {
        let line = sample_line();
        let a = parse_line(&line, &config());
        let b = parse_line(&line, &config());
        assert_eq!(a, b);
    }
}
