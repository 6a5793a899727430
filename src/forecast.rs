use crate::calendar::{
    is_working_day, last_day_of_month, remaining_working_days, working_days_elapsed,
};
use crate::utils::{coerce_hours, format_hours, format_short_date};
use chrono::{Datelike, Days, NaiveDate};
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tolerance band, in hours, inside which a projection counts as on track.
pub const DEFAULT_BUFFER_HOURS: f64 = 2.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub enum ForecastStatus {
    /// Nothing logged this month.
    NoData,
    /// Hours logged against a project with no planned budget.
    Unplanned,
    OnTrack,
    /// Projected to finish the month with budget left over.
    Over,
    /// Projected to exhaust the budget before month end.
    Under,
    /// Already past the budget.
    RanOut,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ForecastResult {
    pub status: ForecastStatus,

    /// Planned hours minus hours logged so far minus hours projected for the
    /// rest of the month. Positive means budget left unused.
    pub projected_remaining_hours: f64,

    /// When the budget ran out (`RanOut`) or is projected to (`Under`).
    pub exhaustion_date: Option<NaiveDate>,

    /// Supporting figure for the status: the extra hours per working day
    /// needed to use the budget (`Over`), the projected overrun when no date
    /// can be given (`Under`), or the overage so far (`RanOut` without a date).
    pub detail_hours: Option<f64>,
}

impl ForecastResult {
    fn bare(status: ForecastStatus) -> Self {
        Self {
            status,
            projected_remaining_hours: 0.0,
            exhaustion_date: None,
            detail_hours: None,
        }
    }

    pub fn describe(&self) -> String {
        match self.status {
            ForecastStatus::NoData => "No data yet".to_string(),
            ForecastStatus::Unplanned => "Unplanned".to_string(),
            ForecastStatus::OnTrack => "On track".to_string(),
            ForecastStatus::RanOut => match (self.exhaustion_date, self.detail_hours) {
                (Some(date), _) => format!("Ran out on {}", format_short_date(date)),
                (None, Some(over)) => format!("Over budget by {}", format_hours(over)),
                (None, None) => "Over budget".to_string(),
            },
            ForecastStatus::Over => match self.detail_hours {
                Some(per_day) => {
                    format!("Increase consumption by {} hrs/day", format_hours(per_day))
                }
                None => format!(
                    "{} hrs left unused",
                    format_hours(self.projected_remaining_hours)
                ),
            },
            ForecastStatus::Under => match (self.exhaustion_date, self.detail_hours) {
                (Some(date), _) => format!("Run out by {}", format_short_date(date)),
                (_, Some(short)) => format!("Will overrun by {} hrs", format_hours(short)),
                (None, None) => "Will overrun".to_string(),
            },
        }
    }
}

/// Month-end forecasting from partial-month consumption.
///
/// Everything is computed fresh from the inputs on each call; `today` is
/// always supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ForecastEngine {
    pub buffer_hours: f64,
}

impl Default for ForecastEngine {
    fn default() -> Self {
        Self {
            buffer_hours: DEFAULT_BUFFER_HOURS,
        }
    }
}

impl ForecastEngine {
    pub fn new(buffer_hours: f64) -> Self {
        Self { buffer_hours }
    }

    /// Average hours per logged working day this month, up to and including
    /// `today`. Days without an entry do not dilute the rate.
    pub fn daily_rate(&self, daily: &BTreeMap<NaiveDate, f64>, today: NaiveDate) -> f64 {
        let (sum, days) = month_to_date(daily, today)
            .filter(|(date, _)| is_working_day(*date))
            .fold((0.0, 0u32), |(sum, days), (_, hours)| (sum + hours, days + 1));

        if days > 0 {
            sum / days as f64
        } else {
            0.0
        }
    }

    /// All hours logged this month up to and including `today`, weekends included.
    pub fn month_to_date_actual(&self, daily: &BTreeMap<NaiveDate, f64>, today: NaiveDate) -> f64 {
        month_to_date(daily, today).map(|(_, hours)| hours).sum()
    }

    pub fn forecast(
        &self,
        daily: &BTreeMap<NaiveDate, f64>,
        planned: f64,
        today: NaiveDate,
    ) -> ForecastResult {
        let planned = coerce_hours(planned);
        let rate = self.daily_rate(daily, today);
        let current = self.month_to_date_actual(daily, today);

        if rate == 0.0 && current == 0.0 {
            return ForecastResult::bare(ForecastStatus::NoData);
        }
        if planned == 0.0 {
            return ForecastResult::bare(ForecastStatus::Unplanned);
        }

        let ran_out_on = if current > planned && rate > 0.0 {
            exhausted_on(daily, planned, today)
        } else {
            None
        };

        self.classify(planned, current, rate, today, ran_out_on)
    }

    /// Forecast for a bare month-to-date total with no daily breakdown. The
    /// rate is spread evenly over the working days elapsed so far, and no
    /// historical exhaustion date can be recovered.
    pub fn forecast_total(&self, actual: f64, planned: f64, today: NaiveDate) -> ForecastResult {
        let planned = coerce_hours(planned);
        let actual = coerce_hours(actual);

        if actual == 0.0 {
            return ForecastResult::bare(ForecastStatus::NoData);
        }
        if planned == 0.0 {
            return ForecastResult::bare(ForecastStatus::Unplanned);
        }

        let elapsed = working_days_elapsed(today.year(), today.month(), today);
        if elapsed == 0 {
            return ForecastResult::bare(ForecastStatus::NoData);
        }

        let rate = actual / elapsed as f64;
        self.classify(planned, actual, rate, today, None)
    }

    fn classify(
        &self,
        planned: f64,
        current: f64,
        rate: f64,
        today: NaiveDate,
        ran_out_on: Option<NaiveDate>,
    ) -> ForecastResult {
        let remaining_days = remaining_working_days(today.year(), today.month(), today);
        let projected = planned - current - rate * remaining_days as f64;

        debug!(
            "Forecast inputs: planned={:.2} current={:.2} rate={:.2} remaining_days={} projected={:.2}",
            planned, current, rate, remaining_days, projected
        );

        let mut result = ForecastResult {
            status: ForecastStatus::OnTrack,
            projected_remaining_hours: projected,
            exhaustion_date: None,
            detail_hours: None,
        };

        if current > planned && rate > 0.0 {
            result.status = ForecastStatus::RanOut;
            result.exhaustion_date = ran_out_on;
            if ran_out_on.is_none() {
                result.detail_hours = Some(current - planned);
            }
        } else if projected > self.buffer_hours {
            result.status = ForecastStatus::Over;
            if remaining_days > 0 {
                result.detail_hours = Some(projected / remaining_days as f64);
            }
        } else if projected < -self.buffer_hours {
            result.status = ForecastStatus::Under;
            result.exhaustion_date = projected_exhaustion(planned - current, rate, today);
            if result.exhaustion_date.is_none() {
                result.detail_hours = Some(projected.abs());
            }
        }

        result
    }
}

fn month_to_date(
    daily: &BTreeMap<NaiveDate, f64>,
    today: NaiveDate,
) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
    let first = today.with_day(1).unwrap_or(today);
    daily
        .range(first..=today)
        .filter(|(_, hours)| hours.is_finite())
        .map(|(date, hours)| (*date, *hours))
}

/// First working day this month on which cumulative working-day hours
/// reached `planned`. Weekend entries are not counted.
fn exhausted_on(
    daily: &BTreeMap<NaiveDate, f64>,
    planned: f64,
    today: NaiveDate,
) -> Option<NaiveDate> {
    let first = today.with_day(1)?;
    let mut consumed = 0.0;

    first
        .iter_days()
        .take_while(|date| *date <= today)
        .filter(|date| is_working_day(*date))
        .find(|date| {
            consumed += daily.get(date).copied().unwrap_or(0.0);
            consumed >= planned
        })
}

/// Walks the rest of the month from tomorrow, burning `rate` hours per
/// working day, and returns the first day nothing is left.
fn projected_exhaustion(hours_left: f64, rate: f64, today: NaiveDate) -> Option<NaiveDate> {
    if rate <= 0.0 {
        return None;
    }
    let month_end = last_day_of_month(today.year(), today.month())?;
    let mut left = hours_left;

    today
        .checked_add_days(Days::new(1))?
        .iter_days()
        .take_while(|date| *date <= month_end)
        .filter(|date| is_working_day(*date))
        .find(|_| {
            left -= rate;
            left <= 0.0
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// `hours` on each of the first `days` working days of August 2024
    /// (a 22 working-day month starting on a Thursday).
    fn linear_august(days: usize, hours: f64) -> BTreeMap<NaiveDate, f64> {
        date(2024, 8, 1)
            .iter_days()
            .filter(|d| is_working_day(*d))
            .take(days)
            .map(|d| (d, hours))
            .collect()
    }

    // Wednesday 14 August 2024 is the 10th working day; 12 remain.
    fn tenth_working_day() -> NaiveDate {
        date(2024, 8, 14)
    }

    #[test]
    fn test_no_data_regardless_of_plan() {
        let engine = ForecastEngine::default();
        let empty = BTreeMap::new();
        assert_eq!(
            engine.forecast(&empty, 40.0, tenth_working_day()).status,
            ForecastStatus::NoData
        );
        assert_eq!(
            engine.forecast(&empty, 0.0, tenth_working_day()).status,
            ForecastStatus::NoData
        );
    }

    #[test]
    fn test_unplanned_when_budget_is_zero() {
        let engine = ForecastEngine::default();
        let result = engine.forecast(&linear_august(3, 2.0), 0.0, tenth_working_day());
        assert_eq!(result.status, ForecastStatus::Unplanned);
        assert_eq!(result.describe(), "Unplanned");
    }

    #[test]
    fn test_daily_rate_ignores_other_months_future_days_and_weekends() {
        let engine = ForecastEngine::default();
        let mut daily = linear_august(10, 4.0);
        daily.insert(date(2024, 7, 31), 100.0);
        daily.insert(date(2024, 8, 20), 100.0);
        daily.insert(date(2024, 8, 10), 6.0);

        let today = tenth_working_day();
        assert!((engine.daily_rate(&daily, today) - 4.0).abs() < 1e-9);
        assert!((engine.month_to_date_actual(&daily, today) - 46.0).abs() < 1e-9);
    }

    #[test]
    fn test_overspend_reports_the_day_the_budget_ran_out() {
        let engine = ForecastEngine::default();
        let result = engine.forecast(&linear_august(10, 5.5), 40.0, tenth_working_day());

        assert_eq!(result.status, ForecastStatus::RanOut);
        // 7 days is 38.5 hours, the 8th working day (Mon 12th) reaches 44
        assert_eq!(result.exhaustion_date, Some(date(2024, 8, 12)));
        assert_eq!(result.describe(), "Ran out on Mon 12th");
    }

    #[test]
    fn test_overspend_driven_by_weekend_hours_has_no_date() {
        let engine = ForecastEngine::default();
        let mut daily = BTreeMap::new();
        daily.insert(date(2024, 8, 3), 8.0);
        daily.insert(date(2024, 8, 5), 4.0);

        let result = engine.forecast(&daily, 10.0, tenth_working_day());
        assert_eq!(result.status, ForecastStatus::RanOut);
        assert_eq!(result.exhaustion_date, None);
        assert_eq!(result.detail_hours, Some(2.0));
        assert_eq!(result.describe(), "Over budget by 2.00");
    }

    #[test]
    fn test_under_consumption_suggests_daily_increase() {
        let engine = ForecastEngine::default();
        let result = engine.forecast(&linear_august(10, 2.0), 100.0, tenth_working_day());

        assert_eq!(result.status, ForecastStatus::Over);
        assert!((result.projected_remaining_hours - 56.0).abs() < 1e-9);
        let per_day = result.detail_hours.unwrap();
        assert!((per_day - 56.0 / 12.0).abs() < 1e-9);
        assert_eq!(result.describe(), "Increase consumption by 4.67 hrs/day");
    }

    #[test]
    fn test_projected_overrun_gives_future_exhaustion_date() {
        let engine = ForecastEngine::default();
        let result = engine.forecast(&linear_august(10, 3.0), 40.0, tenth_working_day());

        assert_eq!(result.status, ForecastStatus::Under);
        assert!((result.projected_remaining_hours + 26.0).abs() < 1e-9);
        // 10 hours left at 3/day: Thu 15 -> 7, Fri 16 -> 4, Mon 19 -> 1, Tue 20 -> -2
        assert_eq!(result.exhaustion_date, Some(date(2024, 8, 20)));
        assert_eq!(result.describe(), "Run out by Tue 20th");
    }

    #[test]
    fn test_overrun_without_working_day_rate_reports_shortfall() {
        let engine = ForecastEngine::default();
        let mut daily = BTreeMap::new();
        daily.insert(date(2024, 8, 10), 8.0);

        let result = engine.forecast(&daily, 5.0, tenth_working_day());
        assert_eq!(result.status, ForecastStatus::Under);
        assert_eq!(result.exhaustion_date, None);
        assert_eq!(result.detail_hours, Some(3.0));
    }

    #[test]
    fn test_on_track_inside_buffer() {
        let engine = ForecastEngine::default();
        // 20 logged + 2/day * 12 remaining = 44
        let exact = engine.forecast(&linear_august(10, 2.0), 44.0, tenth_working_day());
        assert_eq!(exact.status, ForecastStatus::OnTrack);

        let within = engine.forecast(&linear_august(10, 2.0), 45.5, tenth_working_day());
        assert_eq!(within.status, ForecastStatus::OnTrack);

        let narrow = ForecastEngine::new(1.0);
        let outside = narrow.forecast(&linear_august(10, 2.0), 45.5, tenth_working_day());
        assert_eq!(outside.status, ForecastStatus::Over);
    }

    #[test]
    fn test_forecast_is_repeatable() {
        let engine = ForecastEngine::default();
        let daily = linear_august(10, 3.0);
        assert_eq!(
            engine.forecast(&daily, 40.0, tenth_working_day()),
            engine.forecast(&daily, 40.0, tenth_working_day())
        );
    }

    #[test]
    fn test_forecast_total_matches_plan_at_month_end() {
        let engine = ForecastEngine::default();
        let result = engine.forecast_total(40.0, 40.0, date(2024, 8, 30));
        assert_eq!(result.status, ForecastStatus::OnTrack);
        assert!(result.projected_remaining_hours.abs() < 1e-9);
    }

    #[test]
    fn test_forecast_total_branches() {
        let engine = ForecastEngine::default();
        let today = tenth_working_day();

        assert_eq!(engine.forecast_total(0.0, 40.0, today).status, ForecastStatus::NoData);
        assert_eq!(engine.forecast_total(5.0, 0.0, today).status, ForecastStatus::Unplanned);

        let over_budget = engine.forecast_total(55.0, 40.0, today);
        assert_eq!(over_budget.status, ForecastStatus::RanOut);
        assert_eq!(over_budget.detail_hours, Some(15.0));

        // 30 hours in 10 days: 3/day for 12 more days overruns a 40 hour budget
        let overrun = engine.forecast_total(30.0, 40.0, today);
        assert_eq!(overrun.status, ForecastStatus::Under);
        assert_eq!(overrun.exhaustion_date, Some(date(2024, 8, 20)));

        // Weekend before the first working day of September 2024
        assert_eq!(
            engine.forecast_total(5.0, 40.0, date(2024, 9, 1)).status,
            ForecastStatus::NoData
        );
    }
}
