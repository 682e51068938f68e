//! Shared response assembly for the `intra`/`day`/`week`/`month` handlers
//! (C7): reads counters through a caller-supplied key function, computes
//! the `Others` residual and the `All` summation row, and serializes the
//! `[{header}, [label, {index: count}], ...]` shape (spec.md §4.7, §8).

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};

use crate::error::StoreResult;
use crate::models::query::{AppSpec, Mode};
use crate::store::Store;

pub type Row = (String, BTreeMap<i64, u64>);

/// Builds the rows for a stats response: one per requested [`AppSpec`],
/// plus `Others` (mode `all` only) and `All` (when more than one row
/// results).
///
/// `key_fn(app, module, index)` returns the counter key to read for that
/// module at that index, or `None` if the index is out of scope for this
/// app (e.g. suppressed by a day filter) — treated as a contribution of 0.
pub fn assemble<F>(
    store: &Store,
    mode: Mode,
    apps: &[AppSpec],
    indices: &[i64],
    all_modules: &BTreeSet<String>,
    key_fn: F,
) -> StoreResult<Vec<Row>>
where
    F: Fn(&AppSpec, &str, i64) -> Option<String>,
{
    let mut rows: Vec<Row> = Vec::with_capacity(apps.len() + 1);
    let mut cited: BTreeSet<String> = BTreeSet::new();

    for app in apps {
        let mut counts = BTreeMap::new();
        for &i in indices {
            let mut sum = 0u64;
            for module in &app.modules {
                if let Some(key) = key_fn(app, module, i) {
                    sum += store
                        .get(&key)?
                        .and_then(|s| s.parse::<u64>().ok())
                        .unwrap_or(0);
                }
            }
            counts.insert(i, sum);
        }
        cited.extend(app.modules.iter().cloned());
        rows.push((app.label.clone(), counts));
    }

    if mode == Mode::All {
        let residual: Vec<String> = all_modules.difference(&cited).cloned().collect();
        if !residual.is_empty() {
            let others = AppSpec {
                label: "Others".to_string(),
                modules: residual,
                day_filter: None,
            };
            let mut counts = BTreeMap::new();
            for &i in indices {
                let mut sum = 0u64;
                for module in &others.modules {
                    if let Some(key) = key_fn(&others, module, i) {
                        sum += store
                            .get(&key)?
                            .and_then(|s| s.parse::<u64>().ok())
                            .unwrap_or(0);
                    }
                }
                counts.insert(i, sum);
            }
            rows.push((others.label, counts));
        }
    }

    if rows.len() > 1 {
        let mut total = BTreeMap::new();
        for &i in indices {
            let sum: u64 = rows.iter().map(|(_, c)| c.get(&i).copied().unwrap_or(0)).sum();
            total.insert(i, sum);
        }
        rows.insert(0, ("All".to_string(), total));
    }

    Ok(rows)
}

/// Serializes `header` (already populated with the positional `d_i` /
/// label / date entries) followed by each row as `[label, {i: count}]`.
pub fn to_json(header: Map<String, Value>, rows: Vec<Row>) -> Value {
    let mut arr: Vec<Value> = Vec::with_capacity(rows.len() + 1);
    arr.push(Value::Object(header));
    for (label, counts) in rows {
        let obj: Map<String, Value> = counts
            .into_iter()
            .map(|(i, c)| (i.to_string(), Value::from(c)))
            .collect();
        arr.push(Value::Array(vec![Value::String(label), Value::Object(obj)]));
    }
    Value::Array(arr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[test]
    fn others_row_sums_uncited_modules() {
        let store = Store::open_temp().unwrap();
        store.put("a/w/1/2011-08-19/12", "1").unwrap();
        store.put("b/w/1/2011-08-19/12", "2").unwrap();
        store.put("c/w/1/2011-08-19/12", "3").unwrap();

        let apps = vec![AppSpec {
            label: "X".to_string(),
            modules: vec!["a".to_string()],
            day_filter: None,
        }];
        let all_modules: BTreeSet<String> =
            ["a", "b", "c"].iter().map(|s| s.to_string()).collect();

        let rows = assemble(&store, Mode::All, &apps, &[0], &all_modules, |_, module, _| {
            Some(format!("{module}/w/1/2011-08-19/12"))
        })
        .unwrap();

        let others = rows.iter().find(|(label, _)| label == "Others").unwrap();
        assert_eq!(others.1[&0], 5);
    }

    #[test]
    fn all_row_is_only_added_when_multiple_rows() {
        let store = Store::open_temp().unwrap();
        store.put("a/w/1/2011-08-19/12", "1").unwrap();
        let apps = vec![AppSpec {
            label: "X".to_string(),
            modules: vec!["a".to_string()],
            day_filter: None,
        }];
        let all_modules: BTreeSet<String> = ["a"].iter().map(|s| s.to_string()).collect();
        let rows = assemble(&store, Mode::All, &apps, &[0], &all_modules, |_, module, _| {
            Some(format!("{module}/w/1/2011-08-19/12"))
        })
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, "X");
    }
}
