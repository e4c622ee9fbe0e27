use crate::domain::error::{ScheduleError, ScheduleResult};
use crate::domain::time::{parse_date, to_minutes, to_start_minutes};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Medication,
    Appointment,
    Task,
    Therapy,
    Meal,
    Other,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Medication,
        Category::Appointment,
        Category::Task,
        Category::Therapy,
        Category::Meal,
        Category::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Medication => "medication",
            Self::Appointment => "appointment",
            Self::Task => "task",
            Self::Therapy => "therapy",
            Self::Meal => "meal",
            Self::Other => "other",
        }
    }

    /// Display label used by views.
    pub fn label(self) -> &'static str {
        match self {
            Self::Medication => "Medication",
            Self::Appointment => "Appointment",
            Self::Task => "Task",
            Self::Therapy => "Therapy",
            Self::Meal => "Meal",
            Self::Other => "Other",
        }
    }
}

impl FromStr for Category {
    type Err = ScheduleError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == normalized)
            .ok_or_else(|| ScheduleError::parse("category", value))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

impl FromStr for Priority {
    type Err = ScheduleError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|priority| priority.as_str() == normalized)
            .ok_or_else(|| ScheduleError::parse("priority", value))
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TemplateStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceType {
    Daily,
    Weekly,
    Monthly,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RecurrencePattern {
    #[serde(rename = "type")]
    pub kind: RecurrenceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<u32>,
    /// 0 = Sunday .. 6 = Saturday.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_of_week: Option<BTreeSet<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occurrence_count: Option<u32>,
}

impl RecurrencePattern {
    pub fn new(kind: RecurrenceType) -> Self {
        Self {
            kind,
            interval: None,
            days_of_week: None,
            end_date: None,
            occurrence_count: None,
        }
    }

    pub fn daily() -> Self {
        Self::new(RecurrenceType::Daily)
    }

    pub fn weekly(days_of_week: impl IntoIterator<Item = u8>) -> Self {
        let days = days_of_week.into_iter().collect::<BTreeSet<_>>();
        Self {
            days_of_week: (!days.is_empty()).then_some(days),
            ..Self::new(RecurrenceType::Weekly)
        }
    }

    pub fn monthly() -> Self {
        Self::new(RecurrenceType::Monthly)
    }

    pub fn with_interval(mut self, interval: u32) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn with_end_date(mut self, end_date: impl Into<String>) -> Self {
        self.end_date = Some(end_date.into());
        self
    }

    pub fn with_occurrence_count(mut self, count: u32) -> Self {
        self.occurrence_count = Some(count);
        self
    }

    pub fn effective_interval(&self) -> u32 {
        self.interval.unwrap_or(1).max(1)
    }

    fn validate(&self, due_date: &str) -> ScheduleResult<()> {
        if self.interval == Some(0) {
            return Err(ScheduleError::Range(
                "recurrence.interval must be > 0".to_string(),
            ));
        }
        if self.occurrence_count == Some(0) {
            return Err(ScheduleError::Range(
                "recurrence.occurrence_count must be > 0".to_string(),
            ));
        }
        if let Some(days) = &self.days_of_week {
            if let Some(day) = days.iter().find(|day| **day > 6) {
                return Err(ScheduleError::Range(format!(
                    "recurrence.days_of_week contains {day}, expected 0..=6"
                )));
            }
        }
        if let Some(end_date) = &self.end_date {
            let end = parse_date(end_date)?;
            let start = parse_date(due_date)?;
            if end < start {
                return Err(ScheduleError::Range(format!(
                    "recurrence.end_date {end} is before due_date {start}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EventTemplate {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: Category,
    /// Canonical 24h `HH:MM`.
    pub start_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    /// Anchor date for single templates, series start for recurring ones.
    pub due_date: String,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub created_by: String,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub status: TemplateStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence_pattern: Option<RecurrencePattern>,
}

impl EventTemplate {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        category: Category,
        due_date: impl Into<String>,
        start_time: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            category,
            start_time: start_time.into(),
            end_time: None,
            duration: None,
            due_date: due_date.into(),
            assigned_to: None,
            created_by: String::new(),
            priority: Priority::Medium,
            location: None,
            status: TemplateStatus::Pending,
            recurrence_pattern: None,
        }
    }

    pub fn with_end_time(mut self, end_time: impl Into<String>) -> Self {
        self.end_time = Some(end_time.into());
        self
    }

    pub fn with_duration(mut self, minutes: u32) -> Self {
        self.duration = Some(minutes);
        self
    }

    pub fn assigned_to(mut self, assignee: impl Into<String>) -> Self {
        self.assigned_to = Some(assignee.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn recurring(mut self, pattern: RecurrencePattern) -> Self {
        self.recurrence_pattern = Some(pattern);
        self
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence_pattern.is_some()
    }

    pub fn with_status(mut self, status: TemplateStatus) -> Self {
        self.status = status;
        self
    }

    /// Completion implied by `status` when no per-occurrence record exists.
    /// Only single templates carry it; a series never inherits its template's status.
    pub fn completed_by_status(&self) -> bool {
        !self.is_recurring() && self.status == TemplateStatus::Completed
    }

    /// Creation-time checks. Malformed strings are parse errors, violated bounds are range errors.
    pub fn validate(&self) -> ScheduleResult<()> {
        validate_non_empty(&self.id, "template.id")?;
        validate_non_empty(&self.title, "template.title")?;
        if self.id.contains(':') {
            return Err(ScheduleError::parse("template.id", &self.id));
        }
        parse_date(&self.due_date)?;
        let start = to_start_minutes(&self.start_time)?;
        if let Some(end_time) = &self.end_time {
            let end = to_minutes(end_time)?;
            if end <= start {
                return Err(ScheduleError::Range(format!(
                    "template.end_time {end_time} must be after start_time {}",
                    self.start_time
                )));
            }
        }
        if self.duration == Some(0) {
            return Err(ScheduleError::Range(
                "template.duration must be > 0".to_string(),
            ));
        }
        if let Some(pattern) = &self.recurrence_pattern {
            pattern.validate(&self.due_date)?;
        }
        Ok(())
    }
}

fn validate_non_empty(value: &str, field_name: &'static str) -> ScheduleResult<()> {
    if value.trim().is_empty() {
        return Err(ScheduleError::parse(field_name, value));
    }
    Ok(())
}
