use crate::schema::{PlanMode, PlannedAllocation, PlannedAllocations, META_KEY};
use chrono::NaiveDate;
use log::{debug, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// An ordered batch of edits to the planned-hours collection.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
pub struct PlanAdjustments {
    #[schemars(description = "Applied in order; later edits see the result of earlier ones.")]
    #[serde(default)]
    pub adjustments: Vec<PlanAdjustment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlanAdjustment {
    /// Add (or replace) a project with a flat monthly budget.
    AddMonthlyProject {
        #[schemars(description = "Canonical project name.")]
        name: String,
        hours: f64,
    },

    /// Add a project that will be planned week by week.
    AddWeeklyProject { name: String },

    RemoveProject { name: String },

    /// Change the monthly figure. A weekly project becomes monthly.
    SetMonthlyHours { name: String, hours: f64 },

    AddWeek {
        name: String,
        #[schemars(description = "YYYY-MM-DD, inclusive.")]
        start: NaiveDate,
        #[schemars(description = "YYYY-MM-DD, inclusive.")]
        end: NaiveDate,
        hours: f64,
    },

    /// Remove the week that starts on `start`.
    RemoveWeek { name: String, start: NaiveDate },

    /// Switch planning mode. Existing figures are discarded.
    SwitchMode { name: String, mode: PlanMode },
}

impl PlanAdjustments {
    pub fn new(adjustments: Vec<PlanAdjustment>) -> Self {
        Self { adjustments }
    }

    /// Applies the edits to a copy of `base`. The caller's collection is
    /// left untouched.
    pub fn apply(&self, base: &PlannedAllocations) -> PlannedAllocations {
        let mut planned = base.clone();
        for adjustment in &self.adjustments {
            apply_single_adjustment(&mut planned, adjustment);
        }
        planned
    }

    pub fn schema_as_json() -> serde_json::Result<String> {
        let schema = schemars::schema_for!(PlanAdjustments);
        serde_json::to_string_pretty(&schema)
    }
}

fn apply_single_adjustment(planned: &mut PlannedAllocations, adjustment: &PlanAdjustment) {
    match adjustment {
        PlanAdjustment::AddMonthlyProject { name, hours } => {
            if let Some(name) = usable_name(name) {
                planned.insert(name, PlannedAllocation::monthly(*hours));
            }
        }

        PlanAdjustment::AddWeeklyProject { name } => {
            if let Some(name) = usable_name(name) {
                planned.insert(name, PlannedAllocation::weekly(Vec::new()));
            }
        }

        PlanAdjustment::RemoveProject { name } => {
            if planned.remove(name).is_none() {
                debug!("Remove skipped: no planned project '{}'", name);
            }
        }

        PlanAdjustment::SetMonthlyHours { name, hours } => {
            if let Some(plan) = find_mut(planned, name) {
                plan.set_monthly_hours(*hours);
            }
        }

        PlanAdjustment::AddWeek {
            name,
            start,
            end,
            hours,
        } => {
            if let Some(plan) = find_mut(planned, name) {
                if let Err(e) = plan.add_week(*start, *end, *hours) {
                    warn!("Week not added to '{}': {}", name, e);
                }
            }
        }

        PlanAdjustment::RemoveWeek { name, start } => {
            if let Some(plan) = find_mut(planned, name) {
                if !plan.remove_week(*start) {
                    debug!("No week starting {} planned for '{}'", start, name);
                }
            }
        }

        PlanAdjustment::SwitchMode { name, mode } => {
            if let Some(plan) = find_mut(planned, name) {
                plan.switch_mode(*mode);
            }
        }
    }
}

fn usable_name(name: &str) -> Option<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed == META_KEY {
        warn!("Ignoring planned project with reserved or empty name '{}'", name);
        return None;
    }
    Some(trimmed.to_string())
}

fn find_mut<'a>(planned: &'a mut PlannedAllocations, name: &str) -> Option<&'a mut PlannedAllocation> {
    let plan = planned.get_mut(name);
    if plan.is_none() {
        debug!("Adjustment skipped: no planned project '{}'", name);
    }
    plan
}
