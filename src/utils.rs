use chrono::{Datelike, Days, NaiveDate};

/// Day zero of the spreadsheet serial-date convention.
pub fn serial_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or(NaiveDate::MIN)
}

/// Converts a spreadsheet day serial into a calendar date, dropping any
/// time-of-day fraction. Serials of 1 or less are not treated as dates.
pub fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial <= 1.0 {
        return None;
    }
    serial_epoch().checked_add_days(Days::new(serial.floor() as u64))
}

/// Parses the `DD/MM/YYYY` token at the start of `text`. Anything after the
/// first space (a time of day, usually) is ignored.
pub fn parse_dmy_prefix(text: &str) -> Option<NaiveDate> {
    let token = text.trim().split(' ').next()?;
    let parts: Vec<&str> = token.split('/').collect();
    if parts.len() != 3 {
        return None;
    }

    let day = parts[0].trim().parse::<u32>().ok()?;
    let month = parts[1].trim().parse::<u32>().ok()?;
    let year = parts[2].trim().parse::<i32>().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Parses a leading ISO `YYYY-MM-DD` date, as written by JSON sheet exports
/// (`2024-08-01` or `2024-08-01T00:00:00.000Z`).
pub fn parse_iso_prefix(text: &str) -> Option<NaiveDate> {
    let trimmed = text.trim();
    let day = trimmed.get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Reads the longest numeric prefix of `text`, the way timesheet cells such as
/// `"7.5"`, `" 8 "` or `"4h"` are meant to be read. Returns `None` when the
/// text does not start with a number.
pub fn parse_leading_number(text: &str) -> Option<f64> {
    let s = text.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }

    if digits == 0 {
        return None;
    }

    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().ok()
}

/// Clamps a stored hour figure to a finite, non-negative value.
pub fn coerce_hours(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Two decimal places, rounding halves up.
pub fn format_hours(hours: f64) -> String {
    if !hours.is_finite() {
        return "0.00".to_string();
    }
    let rounded = (((hours + f64::EPSILON) * 100.0) + 0.5).floor() / 100.0;
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    format!("{:.2}", rounded)
}

/// Like [`format_hours`] but positive values carry a leading `+`.
pub fn format_signed_hours(hours: f64) -> String {
    let formatted = format_hours(hours);
    if hours > 0.0 && formatted != "0.00" {
        format!("+{}", formatted)
    } else {
        formatted
    }
}

/// Short weekday and ordinal day, e.g. `"Tue 12th"`.
pub fn format_short_date(date: NaiveDate) -> String {
    let day = date.day();
    let suffix = match day {
        1 | 21 | 31 => "st",
        2 | 22 => "nd",
        3 | 23 => "rd",
        _ => "th",
    };
    format!("{} {}{}", date.format("%a"), day, suffix)
}
