use std::collections::{BTreeSet, HashMap};

use axum::extract::{Query, State};

use crate::httpresp::JsonReply;
use crate::modules::Registry;
use crate::AppState;

/// `GET /stats_modules_list?mode=all|grouped[&modules=N&m_i=…]`. `grouped`
/// excludes the explicitly listed `m_i` modules from the returned set —
/// the same "already accounted for" residual logic as the `Others` row in
/// C7, applied to the module listing itself.
pub async fn stats_modules_list(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> JsonReply {
    let callback = params.get("callback").map(|s| s.as_str());
    let mut modules = match Registry::load(&state.store, &state.config.filters.exclude_mod) {
        Ok(set) => set,
        Err(e) => return JsonReply::new(format!("store error: {e}"), callback),
    };

    if params.get("mode").map(String::as_str) == Some("grouped") {
        let n: usize = params
            .get("modules")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        for i in 0..n {
            if let Some(m) = params.get(&format!("m_{i}")) {
                modules.remove(m);
            }
        }
    }

    let body = serde_json::to_string(&modules).unwrap_or_else(|_| "[]".to_string());
    JsonReply::new(body, callback)
}

/// `GET /stats_admin_list_mergemodules`: the tombstone set awaiting
/// compaction cleanup.
pub async fn stats_admin_list_mergemodules(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> JsonReply {
    let callback = params.get("callback").map(|s| s.as_str());
    let deleted = match Registry::load_deleted(&state.store) {
        Ok(set) => set,
        Err(e) => return JsonReply::new(format!("store error: {e}"), callback),
    };
    let body = serde_json::to_string(&deleted).unwrap_or_else(|_| "[]".to_string());
    JsonReply::new(body, callback)
}

/// `GET /stats_admin_do_mergemodules?module=X&mergein=Y|del`. `del`
/// tombstones `X` for C8 to purge; any other value folds `X`'s counters
/// into that module immediately (spec.md §4.7). Holds the writer mutex for
/// the whole operation — it touches the same keys C8 and C9 do.
pub async fn stats_admin_do_mergemodules(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> JsonReply {
    let callback = params.get("callback").map(|s| s.as_str());
    let module = match params.get("module") {
        Some(m) if !m.is_empty() => m,
        _ => return JsonReply::new("Missing parameter: module".to_string(), callback),
    };
    let mergein = match params.get("mergein") {
        Some(m) if !m.is_empty() => m,
        _ => return JsonReply::new("Missing parameter: mergein".to_string(), callback),
    };

    let _guard = state.store.lock_writer().await;
    let result = if mergein == "del" {
        Registry::tombstone(&state.store, module)
    } else {
        Registry::merge(&state.store, module, mergein)
    };

    match result {
        Ok(()) => JsonReply::new("ok".to_string(), callback),
        Err(e) => JsonReply::new(format!("store error: {e}"), callback),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[test]
    fn tombstone_removes_from_live_set() {
        let store = Store::open_temp().unwrap();
        Registry::insert(&store, "", "calendar").unwrap();
        Registry::tombstone(&store, "calendar").unwrap();
        let live: BTreeSet<String> = Registry::load(&store, "").unwrap();
        assert!(!live.contains("calendar"));
    }
}
