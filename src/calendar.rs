use crate::error::{ReconcilerError, Result};
use chrono::{Datelike, Days, NaiveDate, Weekday};

pub fn first_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
}

pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    if !(1..=12).contains(&month) {
        return None;
    }

    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.checked_sub_days(Days::new(1))
}

pub fn validate_month(month: u32) -> Result<()> {
    if !(1..=12).contains(&month) {
        return Err(ReconcilerError::InvalidMonth(month));
    }
    Ok(())
}

/// Monday through Friday. There is no holiday calendar.
pub fn is_working_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

pub fn is_in_month(date: NaiveDate, year: i32, month: u32) -> bool {
    date.year() == year && date.month() == month
}

/// Counts the weekdays of a calendar month. Returns 0 for an invalid month.
pub fn working_days_in_month(year: i32, month: u32) -> u32 {
    match last_day_of_month(year, month) {
        Some(last) => count_working_days(year, month, last.day()),
        None => 0,
    }
}

/// Working days of `(year, month)` that have elapsed as of `as_of`, inclusive.
///
/// A month before `as_of`'s month is fully elapsed; a month after it has
/// not started.
pub fn working_days_elapsed(year: i32, month: u32, as_of: NaiveDate) -> u32 {
    let target = (year, month);
    let current = (as_of.year(), as_of.month());

    if target < current {
        return working_days_in_month(year, month);
    }
    if target > current {
        return 0;
    }

    count_working_days(year, month, as_of.day())
}

pub fn remaining_working_days(year: i32, month: u32, as_of: NaiveDate) -> u32 {
    working_days_in_month(year, month).saturating_sub(working_days_elapsed(year, month, as_of))
}

/// Monday and Sunday of the week containing `date`.
pub fn week_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let offset = date.weekday().num_days_from_monday() as u64;
    let monday = date.checked_sub_days(Days::new(offset)).unwrap_or(date);
    let sunday = monday.checked_add_days(Days::new(6)).unwrap_or(monday);
    (monday, sunday)
}

fn count_working_days(year: i32, month: u32, through_day: u32) -> u32 {
    (1..=through_day)
        .filter_map(|day| NaiveDate::from_ymd_opt(year, month, day))
        .filter(|date| is_working_day(*date))
        .count() as u32
}
