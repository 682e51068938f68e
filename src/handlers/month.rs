use std::collections::BTreeSet;

use axum::extract::State;

use crate::dayfilter::{self, DEFAULT_FILTER};
use crate::handlers::params::StatsQuery;
use crate::httpresp::JsonReply;
use crate::keys;
use crate::models::query;
use crate::modules::Registry;
use crate::render;
use crate::timeaxis;
use crate::AppState;

/// `GET|POST /stats_app_month`. Same key shape as `week`, but indices
/// ordinarily span a full month rather than a handful of days.
pub async fn stats_app_month(
    State(state): State<AppState>,
    StatsQuery(params): StatsQuery,
) -> JsonReply {
    let callback = params.get("callback").map(|s| s.as_str());

    let parsed = match query::parse(&params) {
        Ok(p) => p,
        Err(e) => return JsonReply::new(e, callback),
    };

    let last_ts = parsed.indices.last().and_then(|i| parsed.timestamps.get(i)).copied();
    let (year, month) = match last_ts.and_then(timeaxis::year_month_of) {
        Some(ym) => ym,
        None => return JsonReply::new(query::missing("d_i"), callback),
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
        |app, module, i| {
            let ts = *parsed.timestamps.get(&i)?;
            let date = timeaxis::date_of(ts)?;
            let filter = app.day_filter.as_deref().unwrap_or(DEFAULT_FILTER);
            let allowed = dayfilter::expand(filter, year, month);
            if !allowed.contains(&date) {
                return None;
            }
            Some(keys::day_key(module, &parsed.group, &parsed.vtype, &date))
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
        serde_json::Value::String("month".to_string()),
    );
    header.insert(
        (label_index + 1).to_string(),
        serde_json::Value::String(last_ts.map(timeaxis::human_month).unwrap_or_default()),
    );

    let body = render::to_json(header, rows).to_string();
    JsonReply::new(body, callback)
}
