//! Query parameter shapes shared by the `intra`/`day`/`week`/`month`
//! handlers (C7). Parameter names are dynamic (`d_0`, `m_1_2`, ...), so
//! requests are parsed from a flat `field -> value` map rather than a
//! fixed `#[derive(Deserialize)]` struct.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    All,
    App,
}

/// One requested row: a display label, the underlying modules whose
/// counters feed it, and (for `week`/`month`) an optional day filter.
#[derive(Debug, Clone)]
pub struct AppSpec {
    pub label: String,
    pub modules: Vec<String>,
    pub day_filter: Option<String>,
}

/// The parameter set common to all four stats endpoints.
#[derive(Debug, Clone)]
pub struct StatsParams {
    pub mode: Mode,
    pub dates: i64,
    pub offset: i64,
    pub indices: Vec<i64>,
    /// `d_i` for each index in `indices`, when present.
    pub timestamps: HashMap<i64, i64>,
    pub apps: Vec<AppSpec>,
    pub vtype: String,
    pub group: String,
    pub detailed: bool,
    pub callback: Option<String>,
}

/// Returns the standard "missing parameter" error body for `name`.
pub fn missing(name: &str) -> String {
    format!("Missing parameter: {name}")
}

fn get<'a>(params: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    params.get(key).map(|s| s.as_str())
}

fn get_required<'a>(params: &'a HashMap<String, String>, key: &str) -> Result<&'a str, String> {
    get(params, key).ok_or_else(|| missing(key))
}

fn get_i64(params: &HashMap<String, String>, key: &str) -> Result<i64, String> {
    get_required(params, key)?
        .parse::<i64>()
        .map_err(|_| missing(key))
}

/// Parses the common parameter set. `type` and `group` default to `"1"`
/// and `""` respectively when absent (both are read-side filters, not
/// structurally required).
pub fn parse(params: &HashMap<String, String>) -> Result<StatsParams, String> {
    let mode = match get_required(params, "mode")? {
        "all" => Mode::All,
        "app" => Mode::App,
        other => return Err(format!("invalid mode: {other}")),
    };

    let dates = get_i64(params, "dates")?;
    let offset = get_i64(params, "offset")?;
    let indices: Vec<i64> = (offset..offset + dates).collect();

    let mut timestamps = HashMap::new();
    for &i in &indices {
        if let Some(v) = get(params, &format!("d_{i}")) {
            if let Ok(ts) = v.parse::<i64>() {
                timestamps.insert(i, ts);
            }
        }
    }

    let count_param = if mode == Mode::All { "apps" } else { "modules" };
    let a: usize = get_required(params, count_param)?
        .parse()
        .map_err(|_| missing(count_param))?;

    let mut apps = Vec::with_capacity(a);
    for i in 0..a {
        let label = get_required(params, &format!("p_{i}"))?.to_string();
        let day_filter = get(params, &format!("p_{i}_d")).map(|s| s.to_string());

        let modules = match mode {
            Mode::App => vec![label.clone()],
            Mode::All => {
                let m: usize = get(params, &format!("m_{i}"))
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0);
                (0..m)
                    .filter_map(|j| get(params, &format!("m_{i}_{j}")).map(|s| s.to_string()))
                    .collect()
            }
        };

        apps.push(AppSpec {
            label,
            modules,
            day_filter,
        });
    }

    let vtype = get(params, "type").unwrap_or("1").to_string();
    let group = get(params, "group").unwrap_or("").to_string();
    let detailed = get(params, "detailed") == Some("yes");
    let callback = get(params, "callback").map(|s| s.to_string());

    Ok(StatsParams {
        mode,
        dates,
        offset,
        indices,
        timestamps,
        apps,
        vtype,
        group,
        detailed,
        callback,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_dates_is_reported_by_name() {
        let mut params = HashMap::new();
        params.insert("mode".to_string(), "all".to_string());
        let err = parse(&params).unwrap_err();
        assert_eq!(err, "Missing parameter: dates");
    }

    #[test]
    fn others_example_from_spec_parses() {
        let mut params = HashMap::new();
        params.insert("mode".to_string(), "all".to_string());
        params.insert("dates".to_string(), "1".to_string());
        params.insert("offset".to_string(), "0".to_string());
        params.insert("d_0".to_string(), "1303639200".to_string());
        params.insert("apps".to_string(), "1".to_string());
        params.insert("p_0".to_string(), "X".to_string());
        params.insert("m_0".to_string(), "1".to_string());
        params.insert("m_0_0".to_string(), "a".to_string());
        let parsed = parse(&params).unwrap();
        assert_eq!(parsed.apps.len(), 1);
        assert_eq!(parsed.apps[0].label, "X");
        assert_eq!(parsed.apps[0].modules, vec!["a".to_string()]);
    }
}
