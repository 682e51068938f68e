//! Aggregation key schema (C2). All keys are `/`-delimited strings; see
//! SPEC_FULL.md §4.2 for the canonical forms.

pub const MODULES_KEY: &str = "modules";
pub const MODULES_DELETED_KEY: &str = "modules-deleted";

pub fn day_key(app: &str, group: &str, vtype: &str, date: &str) -> String {
    format!("{app}/{group}/{vtype}/{date}")
}

pub fn hour_key(app: &str, group: &str, vtype: &str, date: &str, hour: &str) -> String {
    format!("{app}/{group}/{vtype}/{date}/{hour}")
}

pub fn ten_min_key(app: &str, group: &str, vtype: &str, date: &str, ten_min: &str) -> String {
    format!("{app}/{group}/{vtype}/{date}/{ten_min}")
}

pub fn minute_key(app: &str, group: &str, vtype: &str, date: &str, minute: &str) -> String {
    format!("{app}/{group}/{vtype}/{date}/{minute}")
}

pub fn sz_values_key(minute_key: &str) -> String {
    format!("{minute_key}/sz/values")
}

pub fn rt_values_key(minute_key: &str) -> String {
    format!("{minute_key}/rt/values")
}

pub fn sz_summary_key(minute_key: &str) -> String {
    format!("{minute_key}/sz")
}

pub fn rt_summary_key(minute_key: &str) -> String {
    format!("{minute_key}/rt")
}

/// The 144 valid 10-minute slot strings (`HHt`, `HH` 00..23, `t` 0..5),
/// used as the iteration alphabet during roll-up. The original's
/// `DB_TIMES` table enumerated extra dead entries (spec.md §9 Open
/// Questions) — only the 144 slots that are ever written are generated
/// here.
pub fn ten_min_slots() -> Vec<String> {
    let mut slots = Vec::with_capacity(144);
    for hour in 0..24u32 {
        for tenth in 0..6u32 {
            slots.push(format!("{hour:02}{tenth}"));
        }
    }
    slots
}

/// `HH` zero-padded hour strings, `00`..`23`.
pub fn hour_slots() -> Vec<String> {
    (0..24u32).map(|h| format!("{h:02}")).collect()
}
