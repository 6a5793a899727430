//! Versioned persistence format and migration of older stored shapes.
//!
//! Version 1 (unversioned) stored planned hours as bare numbers per project
//! and actual hours as bare numbers, `{total}`, `{totalHours}` or
//! `{dailyHours, totalHours}` objects. Version 2 is [`StoredState`].

use crate::error::{ReconcilerError, Result};
use crate::schema::{
    ActualHours, ActualRecord, DailyBreakdown, PlannedAllocation, PlannedAllocations, PlannedWeek,
    ReportDateRange, META_KEY,
};
use crate::utils::{coerce_hours, parse_leading_number};
use chrono::NaiveDate;
use log::{debug, info, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const STORE_VERSION: u32 = 2;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct StoredState {
    pub version: u32,

    #[serde(default)]
    pub planned: PlannedAllocations,

    #[serde(default)]
    pub actual: ActualHours,
}

impl Default for StoredState {
    fn default() -> Self {
        Self::new(PlannedAllocations::new(), ActualHours::default())
    }
}

impl StoredState {
    pub fn new(planned: PlannedAllocations, actual: ActualHours) -> Self {
        Self {
            version: STORE_VERSION,
            planned,
            actual,
        }
    }

    pub fn json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(StoredState)
    }
}

/// Loads persisted state of any known version, upgrading older shapes.
pub fn load_state(json: &str) -> Result<StoredState> {
    let value: Value = serde_json::from_str(json)?;

    match value.get("version").and_then(Value::as_u64) {
        Some(version) if version == STORE_VERSION as u64 => {
            let mut state: StoredState = serde_json::from_value(value)?;
            for plan in state.planned.values_mut() {
                plan.normalize_weeks();
            }
            for record in state.actual.projects.values_mut() {
                normalize_record(record);
            }
            Ok(state)
        }
        Some(version) if version > STORE_VERSION as u64 => Err(
            ReconcilerError::UnsupportedStoreVersion(u32::try_from(version).unwrap_or(u32::MAX)),
        ),
        _ => {
            info!("Migrating unversioned store to version {}", STORE_VERSION);
            let empty = Value::Object(Map::new());
            Ok(StoredState::new(
                migrate_planned(value.get("plannedHours").unwrap_or(&empty)),
                migrate_actuals(value.get("actualHours").unwrap_or(&empty)),
            ))
        }
    }
}

/// Recomputes `totalHours` from the daily series and clamps bad totals to 0.
fn normalize_record(record: &mut ActualRecord) {
    *record = match record {
        ActualRecord::Total(hours) => ActualRecord::Total(coerce_hours(*hours)),
        ActualRecord::Daily(breakdown) => ActualRecord::Daily(DailyBreakdown::from_daily(
            std::mem::take(&mut breakdown.daily_hours),
        )),
    };
}

pub fn save_state(state: &StoredState) -> Result<String> {
    Ok(serde_json::to_string_pretty(state)?)
}

/// Reads planned hours from any stored shape. Entries that cannot be read
/// are skipped; unreadable figures become 0.
pub fn migrate_planned(value: &Value) -> PlannedAllocations {
    let Some(entries) = value.as_object() else {
        warn!("Planned hours are not an object; starting empty");
        return PlannedAllocations::new();
    };

    entries
        .iter()
        .filter(|(name, _)| !name.trim().is_empty() && name.as_str() != META_KEY)
        .filter_map(|(name, entry)| {
            let plan = migrate_planned_entry(entry);
            if plan.is_none() {
                debug!("Skipping unreadable planned entry '{}'", name);
            }
            plan.map(|plan| (name.clone(), plan))
        })
        .collect()
}

fn migrate_planned_entry(entry: &Value) -> Option<PlannedAllocation> {
    match entry {
        Value::Number(_) | Value::String(_) => {
            Some(PlannedAllocation::monthly(read_hours(entry).unwrap_or(0.0)))
        }
        Value::Object(fields) => {
            let mode = fields
                .get("mode")
                .and_then(Value::as_str)
                .map(|m| m.eq_ignore_ascii_case("weekly"))
                .unwrap_or(false);

            if mode {
                let weeks = fields
                    .get("weeks")
                    .and_then(Value::as_array)
                    .map(|weeks| weeks.iter().filter_map(read_week).collect())
                    .unwrap_or_default();
                Some(PlannedAllocation::weekly(weeks))
            } else {
                let total = fields.get("total").and_then(read_hours).unwrap_or(0.0);
                Some(PlannedAllocation::monthly(total))
            }
        }
        _ => None,
    }
}

fn read_week(value: &Value) -> Option<PlannedWeek> {
    let start = read_date(value.get("start")?)?;
    let end = read_date(value.get("end")?)?;
    if start > end {
        return None;
    }
    let hours = value.get("hours").and_then(read_hours).unwrap_or(0.0);
    Some(PlannedWeek { start, end, hours })
}

/// Reads actual hours from any stored shape into the canonical collection.
pub fn migrate_actuals(value: &Value) -> ActualHours {
    let Some(entries) = value.as_object() else {
        warn!("Actual hours are not an object; starting empty");
        return ActualHours::default();
    };

    let mut actual = ActualHours::default();
    for (name, entry) in entries {
        if name == META_KEY {
            actual.meta = read_meta(entry);
            continue;
        }
        if name.trim().is_empty() {
            continue;
        }
        match migrate_actual_entry(entry) {
            Some(record) => {
                actual.projects.insert(name.clone(), record);
            }
            None => debug!("Skipping unreadable actual entry '{}'", name),
        }
    }
    actual
}

fn migrate_actual_entry(entry: &Value) -> Option<ActualRecord> {
    match entry {
        Value::Number(_) | Value::String(_) => {
            Some(ActualRecord::Total(coerce_hours(read_hours(entry)?)))
        }
        Value::Object(fields) => {
            if let Some(daily) = fields.get("dailyHours").and_then(Value::as_object) {
                let series: BTreeMap<NaiveDate, f64> = daily
                    .iter()
                    .filter_map(|(day, hours)| {
                        Some((NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()?, read_hours(hours)?))
                    })
                    .collect();
                return Some(ActualRecord::Daily(DailyBreakdown::from_daily(series)));
            }
            fields
                .get("total")
                .or_else(|| fields.get("totalHours"))
                .and_then(read_hours)
                .map(|hours| ActualRecord::Total(coerce_hours(hours)))
        }
        _ => None,
    }
}

fn read_meta(value: &Value) -> Option<ReportDateRange> {
    let start = read_date(value.get("startDate")?)?;
    let end = read_date(value.get("endDate")?)?;
    ReportDateRange::new(start, end).ok()
}

fn read_date(value: &Value) -> Option<NaiveDate> {
    let text = value.as_str()?;
    NaiveDate::parse_from_str(text.get(..10).unwrap_or(text), "%Y-%m-%d").ok()
}

fn read_hours(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => parse_leading_number(text),
        _ => None,
    }
}
