use std::collections::BTreeSet;

use axum::extract::State;

use crate::handlers::params::StatsQuery;
use crate::httpresp::JsonReply;
use crate::keys;
use crate::models::query;
use crate::modules::Registry;
use crate::render;
use crate::timeaxis;
use crate::AppState;

/// `GET|POST /stats_app_intra`. Keys are 10-minute slots, or minute slots
/// when `detailed=yes` (spec.md §4.7). The axis increments by 10 per hour
/// (100 in detailed mode); see SPEC_FULL.md §4.7 / §9 — the formula is
/// preserved verbatim, not generalised.
pub async fn stats_app_intra(
    State(state): State<AppState>,
    StatsQuery(params): StatsQuery,
) -> JsonReply {
    let callback = params.get("callback").map(|s| s.as_str());

    let parsed = match query::parse(&params) {
        Ok(p) => p,
        Err(e) => return JsonReply::new(e, callback),
    };

    let all_modules: BTreeSet<String> = match Registry::load(&state.store, &state.config.filters.exclude_mod) {
        Ok(set) => set,
        Err(e) => return JsonReply::new(format!("store error: {e}"), callback),
    };

    let block_width: i64 = if parsed.detailed { 100 } else { 10 };

    let rows = render::assemble(
        &state.store,
        parsed.mode,
        &parsed.apps,
        &parsed.indices,
        &all_modules,
        |_app, module, i| {
            let ts = *parsed.timestamps.get(&i)?;
            let date = timeaxis::date_of(ts)?;
            let hour = i / block_width;
            let sub = i % block_width;
            if !(0..24).contains(&hour) {
                return None;
            }
            let slot = if parsed.detailed {
                format!("{hour:02}{sub:02}")
            } else {
                format!("{hour:02}{sub}")
            };
            Some(if parsed.detailed {
                keys::minute_key(module, &parsed.group, &parsed.vtype, &date, &slot)
            } else {
                keys::ten_min_key(module, &parsed.group, &parsed.vtype, &date, &slot)
            })
        },
    );

    let rows = match rows {
        Ok(r) => r,
        Err(e) => return JsonReply::new(format!("store error: {e}"), callback),
    };

    let mut header = serde_json::Map::new();
    for &i in &parsed.indices {
        if let Some(ts) = parsed.timestamps.get(&i) {
            header.insert(i.to_string(), serde_json::Value::String(ts.to_string()));
        }
    }
    let label_index = parsed.offset + parsed.dates;
    header.insert(
        label_index.to_string(),
        serde_json::Value::String("intra".to_string()),
    );
    let last_ts = parsed.indices.last().and_then(|i| parsed.timestamps.get(i)).copied();
    header.insert(
        (label_index + 1).to_string(),
        serde_json::Value::String(last_ts.map(timeaxis::human_date).unwrap_or_default()),
    );

    let body = render::to_json(header, rows).to_string();
    JsonReply::new(body, callback)
}
