//! Module registry (C3): the persistent set of known applications and the
//! parallel tombstone set of applications scheduled for removal.

use std::collections::BTreeSet;

use crate::error::StoreResult;
use crate::keys::{MODULES_DELETED_KEY, MODULES_KEY};
use crate::store::Store;

pub struct Registry;

impl Registry {
    /// Loads the `modules` set, dropping empty tokens and any app whose
    /// name contains `exclude`.
    pub fn load(store: &Store, exclude: &str) -> StoreResult<BTreeSet<String>> {
        load_set(store, MODULES_KEY, exclude)
    }

    /// Loads the `modules-deleted` tombstone set (never exclude-filtered —
    /// compaction needs the full set to purge surviving keys).
    pub fn load_deleted(store: &Store) -> StoreResult<BTreeSet<String>> {
        load_set(store, MODULES_DELETED_KEY, "")
    }

    pub fn save(store: &Store, set: &BTreeSet<String>) -> StoreResult<()> {
        save_set(store, MODULES_KEY, set)
    }

    pub fn save_deleted(store: &Store, set: &BTreeSet<String>) -> StoreResult<()> {
        save_set(store, MODULES_DELETED_KEY, set)
    }

    /// Inserts `app` into `modules` if it's new. Returns `true` if it was
    /// actually added (used by C5 after an ingestion batch).
    pub fn insert(store: &Store, exclude: &str, app: &str) -> StoreResult<bool> {
        let mut set = Self::load(store, exclude)?;
        if set.contains(app) {
            return Ok(false);
        }
        set.insert(app.to_string());
        Self::save(store, &set)?;
        Ok(true)
    }

    /// Subtracts `to_remove` from `modules` and rewrites the key.
    pub fn remove(store: &Store, exclude: &str, to_remove: &BTreeSet<String>) -> StoreResult<()> {
        let mut set = Self::load(store, exclude)?;
        for app in to_remove {
            set.remove(app);
        }
        Self::save(store, &set)
    }

    /// Admin op: move `app` from `modules` to `modules-deleted` for C8 to
    /// purge on its next pass (spec.md §4.7 `mergein="del"`).
    pub fn tombstone(store: &Store, app: &str) -> StoreResult<()> {
        let mut modules = load_set(store, MODULES_KEY, "")?;
        modules.remove(app);
        save_set(store, MODULES_KEY, &modules)?;

        let mut deleted = Self::load_deleted(store)?;
        deleted.insert(app.to_string());
        Self::save_deleted(store, &deleted)
    }

    /// Admin op: folds every key under `from` into the matching key under
    /// `into` (spec.md §4.7 `mergein=<other module>`). Counters add;
    /// `sz`/`rt` sample lists concatenate. Already-computed `sz`/`rt`
    /// summary triples aren't arithmetically mergeable, so they're just
    /// dropped — C9 recomputes `into`'s summary once its values key next
    /// closes. `from` is removed from `modules` once every key has moved.
    pub fn merge(store: &Store, from: &str, into: &str) -> StoreResult<()> {
        for (key, value) in store.scan_prefix(&format!("{from}/"))? {
            let rest = &key[from.len()..];
            let target = format!("{into}{rest}");

            if key.ends_with("/sz/values") || key.ends_with("/rt/values") {
                let existing = store.get(&target)?.unwrap_or_default();
                let merged = if existing.is_empty() {
                    value
                } else {
                    format!("{existing},{value}")
                };
                store.put(&target, &merged)?;
            } else if key.ends_with("/sz") || key.ends_with("/rt") {
                // Summary triples aren't merged; left for C9 to rebuild.
            } else if let Ok(n) = value.parse::<u64>() {
                let existing: u64 = store
                    .get(&target)?
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0);
                store.put(&target, &(existing + n).to_string())?;
            }

            store.delete(&key)?;
        }

        let mut modules = load_set(store, MODULES_KEY, "")?;
        modules.remove(from);
        save_set(store, MODULES_KEY, &modules)
    }
}

fn load_set(store: &Store, key: &str, exclude: &str) -> StoreResult<BTreeSet<String>> {
    let raw = store.get(key)?.unwrap_or_default();
    Ok(raw
        .split('/')
        .filter(|s| !s.is_empty())
        .filter(|s| exclude.is_empty() || !s.contains(exclude))
        .map(|s| s.to_string())
        .collect())
}

fn save_set(store: &Store, key: &str, set: &BTreeSet<String>) -> StoreResult<()> {
    let joined = set.iter().cloned().collect::<Vec<_>>().join("/");
    store.put(key, &joined)
}
