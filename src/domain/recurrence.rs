//! Materializes templates into dated occurrences.
//!
//! Matching is computed arithmetically from the anchor date, so expanding the same
//! template on the same date always yields the same occurrence and the same identifier.

use crate::domain::error::{ScheduleError, ScheduleResult};
use crate::domain::models::{EventTemplate, RecurrencePattern, RecurrenceType};
use crate::domain::occurrence::Occurrence;
use crate::domain::time::{
    dates_between, days_in_month, month_distance, parse_date, to_minutes, to_start_minutes,
    weekday_index, MINUTES_PER_DAY,
};
use chrono::{Datelike, Duration, NaiveDate};
use std::collections::BTreeSet;

pub const DEFAULT_DURATION_MINUTES: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecurrenceExpander {
    default_duration_minutes: u32,
}

impl Default for RecurrenceExpander {
    fn default() -> Self {
        Self {
            default_duration_minutes: DEFAULT_DURATION_MINUTES,
        }
    }
}

impl RecurrenceExpander {
    pub fn new(default_duration_minutes: u32) -> Self {
        Self {
            default_duration_minutes: default_duration_minutes.max(1),
        }
    }

    /// The occurrence of `template` on `date`, if its pattern produces one.
    pub fn expand(
        &self,
        template: &EventTemplate,
        date: NaiveDate,
    ) -> ScheduleResult<Option<Occurrence>> {
        let due = parse_date(&template.due_date)?;
        let (start_minute, end_minute) = self.resolve_minutes(template)?;

        let matches = match &template.recurrence_pattern {
            None => date == due,
            Some(pattern) => series_index(pattern, due, date)?.is_some(),
        };
        if !matches {
            return Ok(None);
        }

        Ok(Some(Occurrence::from_template(
            template,
            date,
            start_minute,
            end_minute,
        )))
    }

    /// Dates in `[start, end]` on which `template` produces an occurrence.
    pub fn occurrence_dates(
        &self,
        template: &EventTemplate,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ScheduleResult<Vec<NaiveDate>> {
        let due = parse_date(&template.due_date)?;
        let Some(pattern) = &template.recurrence_pattern else {
            return Ok(if due >= start && due <= end {
                vec![due]
            } else {
                Vec::new()
            });
        };

        let mut upper = end;
        if let Some(end_date) = &pattern.end_date {
            upper = upper.min(parse_date(end_date)?);
        }
        let mut dates = Vec::new();
        for date in dates_between(start.max(due), upper) {
            if series_index(pattern, due, date)?.is_some() {
                dates.push(date);
            }
        }
        Ok(dates)
    }

    pub fn expand_range(
        &self,
        template: &EventTemplate,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ScheduleResult<Vec<Occurrence>> {
        let (start_minute, end_minute) = self.resolve_minutes(template)?;
        Ok(self
            .occurrence_dates(template, start, end)?
            .into_iter()
            .map(|date| Occurrence::from_template(template, date, start_minute, end_minute))
            .collect())
    }

    /// Start and end minute. An explicit end time wins over the duration.
    pub fn resolve_minutes(&self, template: &EventTemplate) -> ScheduleResult<(u32, u32)> {
        let start = to_start_minutes(&template.start_time)?;
        let end = match &template.end_time {
            Some(end_time) => {
                let end = to_minutes(end_time)?;
                if end <= start {
                    return Err(ScheduleError::Range(format!(
                        "end_time {end_time} is not after start_time {}",
                        template.start_time
                    )));
                }
                end
            }
            None => start
                .saturating_add(template.duration.unwrap_or(self.default_duration_minutes))
                .min(MINUTES_PER_DAY),
        };
        Ok((start, end))
    }
}

/// Cheap pre-filter: `false` only when `template` certainly has no occurrence on `date`.
/// Unreadable templates pass so the expander can report them.
pub fn can_occur_on(template: &EventTemplate, date: NaiveDate) -> bool {
    let Ok(due) = parse_date(&template.due_date) else {
        return true;
    };
    let Some(pattern) = &template.recurrence_pattern else {
        return date == due;
    };
    if date < due {
        return false;
    }
    if let Some(end) = pattern.end_date.as_deref().and_then(|raw| parse_date(raw).ok()) {
        if date > end {
            return false;
        }
    }
    match pattern.kind {
        RecurrenceType::Weekly => weekly_days(pattern, due).contains(&weekday_index(date)),
        RecurrenceType::Monthly => {
            date.day() == due.day().min(days_in_month(date.year(), date.month()))
        }
        RecurrenceType::Daily => true,
    }
}

/// 0-based position of `date` within the series, or `None` when the series skips it.
pub fn series_index(
    pattern: &RecurrencePattern,
    due: NaiveDate,
    date: NaiveDate,
) -> ScheduleResult<Option<u64>> {
    if date < due {
        return Ok(None);
    }
    if let Some(end_date) = &pattern.end_date {
        if date > parse_date(end_date)? {
            return Ok(None);
        }
    }

    let interval = i64::from(pattern.effective_interval());
    let days = (date - due).num_days();
    let index = match pattern.kind {
        RecurrenceType::Daily => (days % interval == 0).then(|| days / interval),
        RecurrenceType::Weekly => {
            let days_of_week = weekly_days(pattern, due);
            let weeks = days / 7;
            if !days_of_week.contains(&weekday_index(date)) || weeks % interval != 0 {
                None
            } else {
                // Each period of `interval` weeks starts with one active week holding every
                // selected weekday exactly once.
                let period = 7 * interval;
                let earlier_in_period = (0..days % period)
                    .filter(|offset| {
                        days_of_week.contains(&weekday_index(due + Duration::days(*offset)))
                    })
                    .count() as i64;
                Some((days / period) * days_of_week.len() as i64 + earlier_in_period)
            }
        }
        RecurrenceType::Monthly => {
            let months = i64::from(month_distance(due, date));
            let target_day = due.day().min(days_in_month(date.year(), date.month()));
            (months % interval == 0 && date.day() == target_day).then(|| months / interval)
        }
    };

    let Some(index) = index.map(|index| index as u64) else {
        return Ok(None);
    };
    if let Some(count) = pattern.occurrence_count {
        if index >= u64::from(count) {
            return Ok(None);
        }
    }
    Ok(Some(index))
}

fn weekly_days(pattern: &RecurrencePattern, due: NaiveDate) -> BTreeSet<u8> {
    match &pattern.days_of_week {
        Some(days) if !days.is_empty() => days.clone(),
        _ => BTreeSet::from([weekday_index(due)]),
    }
}
