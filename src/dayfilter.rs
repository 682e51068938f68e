//! Day-filter grammar used by the `week` and `month` query handlers
//! (SPEC_FULL.md / spec.md §4.7): comma-separated items, each either `N`
//! or `N-M`. The default `1-31` means "no filter".

use std::collections::BTreeSet;

use chrono::NaiveDate;

/// Expands a day-filter string into the set of `YYYY-MM-DD` dates it names
/// within `year`/`month`. Malformed tokens are skipped rather than
/// aborting the whole filter — query handlers never 500 on a bad filter.
pub fn expand(spec: &str, year: i32, month: u32) -> BTreeSet<String> {
    let mut days: BTreeSet<u32> = BTreeSet::new();
    for item in spec.split(',') {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        if let Some((a, b)) = item.split_once('-') {
            if let (Ok(a), Ok(b)) = (a.trim().parse::<u32>(), b.trim().parse::<u32>()) {
                let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
                days.extend(lo..=hi);
            }
        } else if let Ok(d) = item.parse::<u32>() {
            days.insert(d);
        }
    }

    days.into_iter()
        .filter_map(|d| NaiveDate::from_ymd_opt(year, month, d))
        .map(|d| d.format("%Y-%m-%d").to_string())
        .collect()
}

/// The default filter, meaning "no filter" (spec.md §4.7).
pub const DEFAULT_FILTER: &str = "1-31";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_covers_whole_month() {
        let set = expand(DEFAULT_FILTER, 2011, 8);
        assert_eq!(set.len(), 31);
    }

    #[test]
    fn comma_and_range_items_combine() {
        let set = expand("1-3,10", 2011, 8);
        assert_eq!(
            set,
            BTreeSet::from([
                "2011-08-01".to_string(),
                "2011-08-02".to_string(),
                "2011-08-03".to_string(),
                "2011-08-10".to_string(),
            ])
        );
    }

    #[test]
    fn out_of_range_day_is_dropped_not_fatal() {
        // February has no 30th — the invalid day is silently skipped.
        let set = expand("1,30", 2011, 2);
        assert_eq!(set, BTreeSet::from(["2011-02-01".to_string()]));
    }

    #[test]
    fn day_5_suppressed_when_not_in_filter() {
        let set = expand("1-3,10", 2011, 8);
        assert!(!set.contains("2011-08-05"));
    }
}
