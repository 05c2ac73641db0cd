use chrono::{Datelike, LocalResult, NaiveDate, TimeZone};
use chrono_tz::Tz;

/// Renders `[start, end)` with both bounds formatted in `tz`.
pub fn format_time_range(start_millis: i64, end_millis: i64, format: &str, tz: Tz) -> String {
    format!(
        "[{}, {})",
        format_millis(start_millis, format, tz),
        format_millis(end_millis, format, tz)
    )
}

pub fn format_millis(millis: i64, format: &str, tz: Tz) -> String {
    match tz.timestamp_millis_opt(millis) {
        LocalResult::Single(dt) => dt.format(format).to_string(),
        LocalResult::Ambiguous(dt, _) => dt.format(format).to_string(),
        LocalResult::None => millis.to_string(),
    }
}

/// First day of the month `months` after the month containing `date`.
pub fn add_months(date: NaiveDate, months: i32) -> NaiveDate {
    let total = date.year() * 12 + date.month0() as i32 + months;
    let year = total.div_euclid(12);
    let month0 = total.rem_euclid(12) as u32;
    NaiveDate::from_ymd_opt(year, month0 + 1, 1).unwrap_or(date)
}

/// Midnight of `date` in `tz`, in epoch milliseconds.
pub fn start_of_day_millis(date: NaiveDate, tz: Tz) -> i64 {
    let midnight = date.and_hms_opt(0, 0, 0).unwrap_or_default();
    match tz.from_local_datetime(&midnight) {
        LocalResult::Single(dt) => dt.timestamp_millis(),
        LocalResult::Ambiguous(dt, _) => dt.timestamp_millis(),
        LocalResult::None => midnight.and_utc().timestamp_millis(),
    }
}
