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

/// `GET|POST /stats_app_day`. Keys are hourly slots for a single day,
/// anchored to `d_0` (spec.md §4.7) — unlike `intra`/`week`/`month`, every
/// index shares one date.
pub async fn stats_app_day(
    State(state): State<AppState>,
    StatsQuery(params): StatsQuery,
) -> JsonReply {
    let callback = params.get("callback").map(|s| s.as_str());

    let parsed = match query::parse(&params) {
        Ok(p) => p,
        Err(e) => return JsonReply::new(e, callback),
    };

    let anchor_ts = match parsed.timestamps.get(&parsed.offset) {
        Some(ts) => *ts,
        None => return JsonReply::new(query::missing("d_0"), callback),
    };
    let date = match timeaxis::date_of(anchor_ts) {
        Some(d) => d,
        None => return JsonReply::new("invalid d_0".to_string(), callback),
    };

    let all_modules: BTreeSet<String> = match Registry::load(&state.store, &state.config.filters.exclude_mod) {
        Ok(set) => set,
        Err(e) => return JsonReply::new(format!("store error: {e}"), callback),
    };

    let rows = render::assemble(
        &state.store,
        parsed.mode,
        &parsed.apps,
        &parsed.indices,
        &all_modules,
        |_app, module, i| {
            let hour = ((i - parsed.offset).rem_euclid(24)) as u32;
            Some(keys::hour_key(
                module,
                &parsed.group,
                &parsed.vtype,
                &date,
                &format!("{hour:02}"),
            ))
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
        serde_json::Value::String("day".to_string()),
    );
    header.insert(
        (label_index + 1).to_string(),
        serde_json::Value::String(timeaxis::human_date(anchor_ts)),
    );

    let body = render::to_json(header, rows).to_string();
    JsonReply::new(body, callback)
}
