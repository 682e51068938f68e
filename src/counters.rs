//! Counter updater (C6): at-most-once increment of a KV counter and
//! append of raw size/time samples, all under the writer mutex held by
//! the caller.

use crate::error::StoreResult;
use crate::keys;
use crate::models::visit::VisitFact;
use crate::store::Store;

/// Applies one accepted [`VisitFact`]: increments the hour, 10-minute, and
/// minute counters, and appends to the minute-level `sz`/`rt` sample
/// lists. Returns `true` exactly when the minute counter transitioned from
/// absent to `1` — the signal C5 uses to know a new app must be
/// registered.
pub fn apply_visit(store: &Store, fact: &VisitFact) -> StoreResult<bool> {
    let vtype = fact.vtype.as_str();

    let hour_key = keys::hour_key(&fact.app, &fact.group, vtype, &fact.date, &fact.hour);
    let ten_min_key = keys::ten_min_key(&fact.app, &fact.group, vtype, &fact.date, &fact.ten_min);
    let minute_key = keys::minute_key(&fact.app, &fact.group, vtype, &fact.date, &fact.minute);

    increment(store, &hour_key)?;
    increment(store, &ten_min_key)?;
    let new_minute_count = increment(store, &minute_key)?;

    append_sample(store, &keys::sz_values_key(&minute_key), fact.response_size)?;
    append_sample(store, &keys::rt_values_key(&minute_key), fact.response_duration)?;

    Ok(new_minute_count == 1)
}

/// Reads a decimal counter, parses it (a parse failure at an existing key
/// is treated as 0, not an error), adds one, writes it back. Not
/// compare-and-swap — race-free only because the caller holds the writer
/// mutex.
fn increment(store: &Store, key: &str) -> StoreResult<u64> {
    let current: u64 = store
        .get(key)?
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);
    let next = current + 1;
    store.put(key, &next.to_string())?;
    Ok(next)
}

fn append_sample(store: &Store, key: &str, value: u64) -> StoreResult<()> {
    let mut list = store.get(key)?.unwrap_or_default();
    if !list.is_empty() {
        list.push(',');
    }
    list.push_str(&value.to_string());
    store.put(key, &list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::visit::VisitType;

    fn fact() -> VisitFact {
        VisitFact {
            app: "calendar".to_string(),
            group: "w".to_string(),
            vtype: VisitType::Ok,
            date: "2011-08-19".to_string(),
            hour: "12".to_string(),
            ten_min: "123".to_string(),
            minute: "1234".to_string(),
            response_size: 1234,
            response_duration: 50,
        }
    }

    #[test]
    fn first_visit_writes_ones_and_values() {
        let store = Store::open_temp().unwrap();
        let f = fact();
        let is_new = apply_visit(&store, &f).unwrap();
        assert!(is_new);
        assert_eq!(store.get("calendar/w/1/2011-08-19/12").unwrap(), Some("1".into()));
        assert_eq!(store.get("calendar/w/1/2011-08-19/123").unwrap(), Some("1".into()));
        assert_eq!(store.get("calendar/w/1/2011-08-19/1234").unwrap(), Some("1".into()));
        assert_eq!(
            store.get("calendar/w/1/2011-08-19/1234/sz/values").unwrap(),
            Some("1234".into())
        );
        assert_eq!(
            store.get("calendar/w/1/2011-08-19/1234/rt/values").unwrap(),
            Some("50".into())
        );
    }

    #[test]
    fn duplicate_visit_accumulates() {
        let store = Store::open_temp().unwrap();
        let f = fact();
        assert!(apply_visit(&store, &f).unwrap());
        assert!(!apply_visit(&store, &f).unwrap());
        assert_eq!(store.get("calendar/w/1/2011-08-19/12").unwrap(), Some("2".into()));
        assert_eq!(store.get("calendar/w/1/2011-08-19/1234").unwrap(), Some("2".into()));
        assert_eq!(
            store.get("calendar/w/1/2011-08-19/1234/sz/values").unwrap(),
            Some("1234,1234".into())
        );
        assert_eq!(
            store.get("calendar/w/1/2011-08-19/1234/rt/values").unwrap(),
            Some("50,50".into())
        );
    }

    #[test]
    fn round_trip_n_facts_equal_across_granularities() {
        let store = Store::open_temp().unwrap();
        let f = fact();
        for _ in 0..7 {
            apply_visit(&store, &f).unwrap();
        }
        for key in [
            "calendar/w/1/2011-08-19/12",
            "calendar/w/1/2011-08-19/123",
            "calendar/w/1/2011-08-19/1234",
        ] {
            assert_eq!(store.get(key).unwrap(), Some("7".into()));
        }
    }
}
