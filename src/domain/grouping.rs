//! View-shaped groupings over already annotated occurrences.

use crate::domain::error::ScheduleResult;
use crate::domain::occurrence::Occurrence;
use crate::domain::time::{parse_date, to_minutes};
use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeOfDayBoundaries {
    pub afternoon_start: u32,
    pub evening_start: u32,
}

impl Default for TimeOfDayBoundaries {
    fn default() -> Self {
        Self {
            afternoon_start: 12 * 60,
            evening_start: 17 * 60,
        }
    }
}

impl TimeOfDayBoundaries {
    pub fn parse(afternoon_start: &str, evening_start: &str) -> ScheduleResult<Self> {
        Ok(Self {
            afternoon_start: to_minutes(afternoon_start)?,
            evening_start: to_minutes(evening_start)?,
        })
    }

    pub fn bucket(&self, start_minute: u32) -> TimeOfDay {
        if start_minute < self.afternoon_start {
            TimeOfDay::Morning
        } else if start_minute < self.evening_start {
            TimeOfDay::Afternoon
        } else {
            TimeOfDay::Evening
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct TimeOfDayGroups {
    pub morning: Vec<Occurrence>,
    pub afternoon: Vec<Occurrence>,
    pub evening: Vec<Occurrence>,
}

impl TimeOfDayGroups {
    pub fn get(&self, bucket: TimeOfDay) -> &[Occurrence] {
        match bucket {
            TimeOfDay::Morning => &self.morning,
            TimeOfDay::Afternoon => &self.afternoon,
            TimeOfDay::Evening => &self.evening,
        }
    }
}

/// Buckets by start time, preserving input order inside each bucket.
pub fn group_by_time_of_day(
    occurrences: &[Occurrence],
    boundaries: TimeOfDayBoundaries,
) -> TimeOfDayGroups {
    let mut groups = TimeOfDayGroups::default();
    for occurrence in occurrences {
        let target = match boundaries.bucket(occurrence.start_minute) {
            TimeOfDay::Morning => &mut groups.morning,
            TimeOfDay::Afternoon => &mut groups.afternoon,
            TimeOfDay::Evening => &mut groups.evening,
        };
        target.push(occurrence.clone());
    }
    groups
}

/// Groups by the weekday of each occurrence's date. Occurrences with unreadable dates are dropped.
pub fn group_by_weekday(occurrences: &[Occurrence]) -> HashMap<Weekday, Vec<Occurrence>> {
    let mut groups: HashMap<Weekday, Vec<Occurrence>> = HashMap::new();
    for occurrence in occurrences {
        if let Ok(date) = parse_date(&occurrence.date) {
            groups
                .entry(date.weekday())
                .or_default()
                .push(occurrence.clone());
        }
    }
    groups
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DaySchedule {
    pub date: NaiveDate,
    pub weekday: Weekday,
    pub occurrences: Vec<Occurrence>,
}

impl DaySchedule {
    pub fn new(date: NaiveDate, occurrences: Vec<Occurrence>) -> Self {
        Self {
            date,
            weekday: date.weekday(),
            occurrences,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MonthCell {
    pub date: NaiveDate,
    pub in_current_month: bool,
    pub occurrences: Vec<Occurrence>,
}

impl MonthCell {
    pub fn has_conflict(&self) -> bool {
        self.occurrences.iter().any(|occurrence| occurrence.has_conflict)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MonthGrid {
    pub year: i32,
    pub month: u32,
    pub cells: Vec<MonthCell>,
}

impl MonthGrid {
    /// Rows of seven cells, top to bottom.
    pub fn weeks(&self) -> impl Iterator<Item = &[MonthCell]> {
        self.cells.chunks(7)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct ScheduleSummary {
    pub total: usize,
    pub completed: usize,
    pub conflicted: usize,
}

impl ScheduleSummary {
    pub fn remaining(&self) -> usize {
        self.total - self.completed
    }
}

pub fn summarize(occurrences: &[Occurrence]) -> ScheduleSummary {
    occurrences
        .iter()
        .fold(ScheduleSummary::default(), |mut summary, occurrence| {
            summary.total += 1;
            if occurrence.is_completed {
                summary.completed += 1;
            }
            if occurrence.has_conflict {
                summary.conflicted += 1;
            }
            summary
        })
}
