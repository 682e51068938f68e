//! Retention/compaction worker (C8). Wakes up, compares wall-clock time to
//! a next-fire time that starts at the next 03:00 local and advances by
//! 24h after every pass, sleeping 20 minutes between checks. One pass
//! walks calendar days from `dateLast` (initially 1 January of the current
//! year) up to today, rolling each day's hourly counters into a day total
//! and deleting counters past their configured retention horizon, then
//! purges any tombstoned app outright. The whole pass runs under one
//! writer-mutex hold, checking for cancellation between days. `dateLast`
//! only advances to `today - Dd` once the pass finishes, so the trailing
//! window is deliberately reprocessed every day — cheap, and it means a
//! crash mid-pass loses no more than one day's redundant work rather than
//! corrupting state (SPEC_FULL.md §4.8).

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, Duration as ChronoDuration, Local, NaiveDate, TimeZone};

use crate::config::RetentionConfig;
use crate::keys;
use crate::modules::Registry;
use crate::store::Store;

const DATE_LAST_KEY: &str = "compaction/date-last";
const POLL_INTERVAL: Duration = Duration::from_secs(20 * 60);
const DAILY_HOUR: u32 = 3;

pub async fn run(store: Store, retention: RetentionConfig, running: Arc<AtomicBool>) {
    let mut next_fire = next_three_am(Local::now());
    while running.load(Ordering::SeqCst) {
        if Local::now() >= next_fire {
            if let Err(e) = run_once(&store, &retention, &running).await {
                tracing::warn!("compaction pass failed: {e}");
            }
            next_fire += ChronoDuration::hours(24);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

fn next_three_am(now: DateTime<Local>) -> DateTime<Local> {
    let naive = now.date_naive().and_hms_opt(DAILY_HOUR, 0, 0).unwrap();
    let today_fire = Local.from_local_datetime(&naive).single().unwrap_or(now);
    if now < today_fire {
        today_fire
    } else {
        today_fire + ChronoDuration::days(1)
    }
}

async fn run_once(
    store: &Store,
    retention: &RetentionConfig,
    running: &Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let _guard = store.lock_writer().await;

    let today = Local::now().date_naive();
    let last = load_date_last(store)?.unwrap_or_else(|| NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap());

    let mut day = last + ChronoDuration::days(1);
    while day < today && running.load(Ordering::SeqCst) {
        let date_str = day.format("%Y-%m-%d").to_string();

        let modules = Registry::load(store, "")?;
        for app in &modules {
            process_day(store, app, &date_str, today, retention)?;
        }

        let tombstoned = Registry::load_deleted(store)?;
        for app in &tombstoned {
            purge_app(store, app)?;
        }
        if !tombstoned.is_empty() {
            Registry::save_deleted(store, &BTreeSet::new())?;
        }

        tracing::info!("compaction: processed {date_str}");
        day += ChronoDuration::days(1);
    }

    store.compact()?;
    let new_date_last = today - ChronoDuration::days(retention.days_for_details as i64);
    if new_date_last > last {
        save_date_last(store, &new_date_last.format("%Y-%m-%d").to_string())?;
    }

    Ok(())
}

/// Rolls `app`'s hourly counters for `date` into a day total (one per
/// `group`/`vtype` combination actually seen that day) and deletes
/// counters whose granularity has aged past its retention horizon.
fn process_day(
    store: &Store,
    app: &str,
    date: &str,
    today: NaiveDate,
    retention: &RetentionConfig,
) -> anyhow::Result<()> {
    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d")?;
    let age = (today - day).num_days();

    let rows = store.scan_prefix(&format!("{app}/"))?;
    let mut day_totals: HashMap<(String, String), u64> = HashMap::new();
    let mut to_delete = Vec::new();

    for (key, value) in &rows {
        let segs: Vec<&str> = key.split('/').collect();
        if segs.len() < 5 || segs[3] != date {
            continue;
        }
        let slot = segs[4];
        match slot.len() {
            2 => {
                let count: u64 = value.parse().unwrap_or(0);
                *day_totals
                    .entry((segs[1].to_string(), segs[2].to_string()))
                    .or_insert(0) += count;
                if age >= retention.days_for_hours as i64 {
                    to_delete.push(key.clone());
                }
            }
            3 => {
                if age >= retention.days_for_details as i64 {
                    to_delete.push(key.clone());
                }
            }
            4 => {
                if age >= retention.days_for_minutes as i64 {
                    to_delete.push(key.clone());
                }
            }
            _ => {}
        }
    }

    for ((group, vtype), total) in day_totals {
        let key = keys::day_key(app, &group, &vtype, date);
        store.put(&key, &total.to_string())?;
    }
    for key in to_delete {
        store.delete(&key)?;
    }

    Ok(())
}

fn purge_app(store: &Store, app: &str) -> anyhow::Result<()> {
    for (key, _) in store.scan_prefix(&format!("{app}/"))? {
        store.delete(&key)?;
    }
    Ok(())
}

fn load_date_last(store: &Store) -> anyhow::Result<Option<NaiveDate>> {
    match store.get(DATE_LAST_KEY)? {
        Some(s) => Ok(NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
        None => Ok(None),
    }
}

fn save_date_last(store: &Store, date: &str) -> anyhow::Result<()> {
    store.put(DATE_LAST_KEY, date)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_day_sums_hours_into_day_total() {
        let store = Store::open_temp().unwrap();
        store.put("calendar/w/1/2011-08-19/00", "3").unwrap();
        store.put("calendar/w/1/2011-08-19/12", "5").unwrap();
        let today = NaiveDate::from_ymd_opt(2011, 8, 25).unwrap();
        let retention = RetentionConfig {
            days_for_minutes: 3,
            days_for_details: 7,
            days_for_hours: 31,
        };
        process_day(&store, "calendar", "2011-08-19", today, &retention).unwrap();
        assert_eq!(
            store.get("calendar/w/1/2011-08-19").unwrap(),
            Some("8".to_string())
        );
    }

    #[test]
    fn stale_minute_keys_are_deleted_past_horizon() {
        let store = Store::open_temp().unwrap();
        store.put("calendar/w/1/2011-08-19/1234", "2").unwrap();
        let today = NaiveDate::from_ymd_opt(2011, 8, 25).unwrap();
        let retention = RetentionConfig {
            days_for_minutes: 3,
            days_for_details: 7,
            days_for_hours: 31,
        };
        process_day(&store, "calendar", "2011-08-19", today, &retention).unwrap();
        assert_eq!(store.get("calendar/w/1/2011-08-19/1234").unwrap(), None);
    }

    #[test]
    fn minute_key_exactly_at_horizon_is_deleted() {
        let store = Store::open_temp().unwrap();
        store.put("calendar/w/1/2011-08-19/1234", "2").unwrap();
        // age == days_for_minutes must be purged, not kept one day too long.
        let today = NaiveDate::from_ymd_opt(2011, 8, 22).unwrap();
        let retention = RetentionConfig {
            days_for_minutes: 3,
            days_for_details: 7,
            days_for_hours: 31,
        };
        process_day(&store, "calendar", "2011-08-19", today, &retention).unwrap();
        assert_eq!(store.get("calendar/w/1/2011-08-19/1234").unwrap(), None);
    }

    #[test]
    fn recent_minute_keys_survive() {
        let store = Store::open_temp().unwrap();
        store.put("calendar/w/1/2011-08-19/1234", "2").unwrap();
        let today = NaiveDate::from_ymd_opt(2011, 8, 20).unwrap();
        let retention = RetentionConfig {
            days_for_minutes: 3,
            days_for_details: 7,
            days_for_hours: 31,
        };
        process_day(&store, "calendar", "2011-08-19", today, &retention).unwrap();
        assert_eq!(
            store.get("calendar/w/1/2011-08-19/1234").unwrap(),
            Some("2".to_string())
        );
    }

    #[test]
    fn purge_app_removes_every_key() {
        let store = Store::open_temp().unwrap();
        store.put("stale/w/1/2011-08-19", "1").unwrap();
        store.put("stale/w/1/2011-08-19/12", "1").unwrap();
        purge_app(&store, "stale").unwrap();
        assert!(store.scan_prefix("stale/").unwrap().is_empty());
    }

    #[test]
    fn next_three_am_rolls_to_tomorrow_once_past() {
        use chrono::TimeZone;
        let afternoon = Local.with_ymd_and_hms(2024, 6, 1, 15, 0, 0).unwrap();
        let next = next_three_am(afternoon);
        assert_eq!(next.date_naive(), NaiveDate::from_ymd_opt(2024, 6, 2).unwrap());
    }

    #[test]
    fn next_three_am_stays_today_before_fire_time() {
        use chrono::TimeZone;
        let early = Local.with_ymd_and_hms(2024, 6, 1, 1, 0, 0).unwrap();
        let next = next_three_am(early);
        assert_eq!(next.date_naive(), NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
    }
}
