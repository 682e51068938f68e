//! Response-size/response-time summariser (C9). Every tick, finds minute
//! buckets whose raw `sz`/`rt` sample lists are old enough that no further
//! writes can land in them (a 2-minute grace window past the bucket's own
//! minute), computes mean/median/p90, writes the summary, and deletes the
//! raw list. Work fans out across a small worker pool — sized to the CPU
//! count, or pinned to one worker for deterministic test runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveDate, TimeZone};
use tokio::task::JoinSet;

use crate::modules::Registry;
use crate::store::Store;

const TICK_INTERVAL: Duration = Duration::from_secs(20);
const GRACE: i64 = 2; // minutes

pub async fn run(store: Store, deterministic_workers: bool, running: Arc<AtomicBool>) {
    let workers = if deterministic_workers {
        1
    } else {
        num_cpus::get().max(1)
    };

    while running.load(Ordering::SeqCst) {
        if let Err(e) = tick(&store, workers).await {
            tracing::warn!("summariser tick failed: {e}");
        }
        tokio::time::sleep(TICK_INTERVAL).await;
    }
}

async fn tick(store: &Store, workers: usize) -> anyhow::Result<()> {
    let Some(_guard) = store.try_lock_writer().await else {
        return Ok(()); // contested; skip this tick rather than block
    };

    let modules = Registry::load(store, "")?;
    let now = Local::now();

    let mut candidates = Vec::new();
    for app in &modules {
        for (key, _) in store.scan_prefix(&format!("{app}/"))? {
            if let Some(base) = key.strip_suffix("/sz/values") {
                candidates.push(base.to_string());
            }
        }
    }

    for chunk in candidates.chunks(workers.max(1)) {
        let mut set = JoinSet::new();
        for base in chunk {
            let store = store.clone();
            let base = base.clone();
            set.spawn(async move { process_bucket(&store, &base, now) });
        }
        while let Some(res) = set.join_next().await {
            if let Ok(Err(e)) = res {
                tracing::warn!("summariser: {e}");
            }
        }
    }

    Ok(())
}

fn bucket_time(base: &str) -> Option<DateTime<Local>> {
    let segs: Vec<&str> = base.split('/').collect();
    if segs.len() != 5 {
        return None;
    }
    let date = segs[3];
    let slot = segs[4];
    if slot.len() != 4 {
        return None;
    }
    let hour: u32 = slot[0..2].parse().ok()?;
    let minute: u32 = slot[2..4].parse().ok()?;
    let naive_date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    let naive = naive_date.and_hms_opt(hour, minute, 0)?;
    Local.from_local_datetime(&naive).single()
}

fn process_bucket(store: &Store, base: &str, now: DateTime<Local>) -> anyhow::Result<()> {
    let Some(bucket) = bucket_time(base) else {
        return Ok(());
    };
    if now.signed_duration_since(bucket) < ChronoDuration::minutes(GRACE) {
        return Ok(()); // still within the window new samples can land in
    }

    for metric in ["sz", "rt"] {
        let values_key = format!("{base}/{metric}/values");
        let Some(raw) = store.get(&values_key)? else {
            continue;
        };
        let mut values: Vec<f64> = raw.split(',').filter_map(|s| s.parse::<f64>().ok()).collect();
        if values.is_empty() {
            store.delete(&values_key)?;
            continue;
        }
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());

        // all three summary fields are integers: mean truncates sum/n,
        // median/p90 truncate their interpolated value.
        let mean = values.iter().sum::<f64>() as u64 / values.len() as u64;
        let median = percentile(&values, 0.5) as u64;
        let p90 = percentile(&values, 0.9) as u64;

        let summary_key = format!("{base}/{metric}");
        store.put(&summary_key, &format!("{mean}/{median}/{p90}"))?;
        store.delete(&values_key)?;
    }

    Ok(())
}

/// Linear-interpolation percentile over an already-sorted slice. At
/// `p=0.5` this reduces to the middle element (odd `n`) or the mean of the
/// two middle elements (even `n`) — the nth-element median definition.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = p * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_of_single_value_is_itself() {
        assert_eq!(percentile(&[42.0], 0.9), 42.0);
    }

    #[test]
    fn median_of_odd_count_is_middle_value() {
        assert_eq!(percentile(&[1.0, 2.0, 3.0], 0.5), 2.0);
    }

    #[test]
    fn p90_interpolates_between_neighbors() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let p90 = percentile(&values, 0.9);
        assert!(p90 > 4.0 && p90 <= 5.0);
    }

    #[test]
    fn bucket_within_grace_window_is_skipped() {
        let store = Store::open_temp().unwrap();
        let now = Local::now();
        let base = format!(
            "calendar/w/1/{}/{:02}{:02}",
            now.format("%Y-%m-%d"),
            now.format("%H"),
            now.format("%M")
        );
        store.put(&format!("{base}/sz/values"), "10,20,30").unwrap();
        process_bucket(&store, &base, now).unwrap();
        assert_eq!(
            store.get(&format!("{base}/sz/values")).unwrap(),
            Some("10,20,30".to_string())
        );
    }

    #[test]
    fn bucket_past_grace_window_is_summarised() {
        let store = Store::open_temp().unwrap();
        let now = Local::now();
        let past = now - ChronoDuration::minutes(10);
        let base = format!(
            "calendar/w/1/{}/{:02}{:02}",
            past.format("%Y-%m-%d"),
            past.format("%H"),
            past.format("%M")
        );
        store.put(&format!("{base}/sz/values"), "10,20,30").unwrap();
        process_bucket(&store, &base, now).unwrap();
        assert_eq!(store.get(&format!("{base}/sz/values")).unwrap(), None);
        assert!(store.get(&format!("{base}/sz")).unwrap().is_some());
    }
}
