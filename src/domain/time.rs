//! Wall-clock helpers shared by the expander, the conflict detector and the views.
//!
//! Times are minutes since midnight on a local, timezone-free clock. `24:00` is accepted
//! as an end-of-day marker so an interval can run up to midnight.

use crate::domain::error::{ScheduleError, ScheduleResult};
use chrono::{Datelike, Duration, NaiveDate, Weekday};

pub const MINUTES_PER_DAY: u32 = 24 * 60;
pub const MONTH_GRID_CELLS: usize = 42;

pub fn parse_date(value: &str) -> ScheduleResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ScheduleError::parse("date", value))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Minutes since midnight for a canonical 24h `HH:MM` string.
pub fn to_minutes(value: &str) -> ScheduleResult<u32> {
    parse_hhmm(value.trim()).ok_or_else(|| ScheduleError::parse("time", value))
}

/// Like [`to_minutes`], but the `24:00` end-of-day marker is not a valid start.
pub fn to_start_minutes(value: &str) -> ScheduleResult<u32> {
    ensure_start_of_day(to_minutes(value)?, value)
}

/// Rejects start minutes at or past midnight.
pub fn ensure_start_of_day(minutes: u32, value: &str) -> ScheduleResult<u32> {
    if minutes >= MINUTES_PER_DAY {
        return Err(ScheduleError::Range(format!(
            "start time {} must be before 24:00",
            value.trim()
        )));
    }
    Ok(minutes)
}

/// Accepts either canonical `HH:MM` or a 12h rendering such as `9:30 AM`.
pub fn parse_time(value: &str) -> ScheduleResult<u32> {
    let trimmed = value.trim();
    if let Some(minutes) = parse_hhmm(trimmed) {
        return Ok(minutes);
    }
    parse_12h(trimmed).ok_or_else(|| ScheduleError::parse("time", value))
}

pub fn minutes_to_time(minutes: u32) -> String {
    let minutes = minutes.min(MINUTES_PER_DAY);
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Normalizes any accepted time rendering to canonical `HH:MM`.
pub fn format_time(value: &str) -> ScheduleResult<String> {
    parse_time(value).map(minutes_to_time)
}

pub fn format_time_12h(value: &str) -> ScheduleResult<String> {
    parse_time(value).map(format_minutes_12h)
}

pub fn format_minutes_12h(minutes: u32) -> String {
    let minutes = minutes % MINUTES_PER_DAY;
    let hour = minutes / 60;
    let suffix = if hour < 12 { "AM" } else { "PM" };
    let display_hour = match hour % 12 {
        0 => 12,
        other => other,
    };
    format!("{display_hour}:{:02} {suffix}", minutes % 60)
}

/// Adds minutes to a time, saturating at the end of the day.
pub fn add_minutes(value: &str, minutes: u32) -> ScheduleResult<String> {
    let start = to_minutes(value)?;
    Ok(minutes_to_time(start.saturating_add(minutes)))
}

/// Half-open overlap test: intervals that only touch do not overlap.
pub fn overlaps(a_start: u32, a_end: u32, b_start: u32, b_end: u32) -> bool {
    a_start < b_end && b_start < a_end
}

pub fn start_of_week(date: NaiveDate, first_weekday: Weekday) -> NaiveDate {
    let offset = (date.weekday().num_days_from_monday() + 7 - first_weekday.num_days_from_monday()) % 7;
    date - Duration::days(i64::from(offset))
}

pub fn end_of_week(date: NaiveDate, first_weekday: Weekday) -> NaiveDate {
    start_of_week(date, first_weekday) + Duration::days(6)
}

pub fn start_of_month(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.day0()))
}

pub fn end_of_month(date: NaiveDate) -> NaiveDate {
    let first = start_of_month(date);
    first + Duration::days(i64::from(days_in_month(date.year(), date.month())) - 1)
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        2 if is_leap_year(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Six full weeks covering the month of `date`, padded with adjacent-month days.
pub fn days_in_month_grid(date: NaiveDate, first_weekday: Weekday) -> Vec<NaiveDate> {
    let grid_start = start_of_week(start_of_month(date), first_weekday);
    (0..MONTH_GRID_CELLS as i64)
        .map(|offset| grid_start + Duration::days(offset))
        .collect()
}

/// Inclusive list of dates; empty when `end` precedes `start`.
pub fn dates_between(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|date| *date <= end).collect()
}

/// Whole calendar months from `from` to `to` (negative when `to` is earlier).
pub fn month_distance(from: NaiveDate, to: NaiveDate) -> i32 {
    (to.year() - from.year()) * 12 + to.month() as i32 - from.month() as i32
}

/// Weekday as 0 = Sunday .. 6 = Saturday.
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

pub fn parse_weekday(value: &str) -> Option<Weekday> {
    match value.trim().to_ascii_lowercase().as_str() {
        "monday" | "mon" => Some(Weekday::Mon),
        "tuesday" | "tue" => Some(Weekday::Tue),
        "wednesday" | "wed" => Some(Weekday::Wed),
        "thursday" | "thu" => Some(Weekday::Thu),
        "friday" | "fri" => Some(Weekday::Fri),
        "saturday" | "sat" => Some(Weekday::Sat),
        "sunday" | "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

pub fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

fn parse_hhmm(value: &str) -> Option<u32> {
    let (hour_str, minute_str) = value.split_once(':')?;
    if hour_str.is_empty() || hour_str.len() > 2 || minute_str.len() != 2 {
        return None;
    }
    if !hour_str.bytes().all(|b| b.is_ascii_digit()) || !minute_str.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hour = hour_str.parse::<u32>().ok()?;
    let minute = minute_str.parse::<u32>().ok()?;
    match (hour, minute) {
        (24, 0) => Some(MINUTES_PER_DAY),
        (0..=23, 0..=59) => Some(hour * 60 + minute),
        _ => None,
    }
}

fn parse_12h(value: &str) -> Option<u32> {
    let upper = value.to_ascii_uppercase();
    let (clock, is_pm) = if let Some(rest) = upper.strip_suffix("PM") {
        (rest.trim_end(), true)
    } else if let Some(rest) = upper.strip_suffix("AM") {
        (rest.trim_end(), false)
    } else {
        return None;
    };

    let (hour, minute) = match clock.split_once(':') {
        Some((hour, minute)) if minute.len() == 2 => {
            (hour.parse::<u32>().ok()?, minute.parse::<u32>().ok()?)
        }
        Some(_) => return None,
        None => (clock.parse::<u32>().ok()?, 0),
    };
    if !(1..=12).contains(&hour) || minute > 59 {
        return None;
    }

    let hour = match (hour, is_pm) {
        (12, false) => 0,
        (12, true) => 12,
        (hour, true) => hour + 12,
        (hour, false) => hour,
    };
    Some(hour * 60 + minute)
}
