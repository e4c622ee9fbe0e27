use crate::domain::models::{Category, EventTemplate, Priority};
use crate::domain::time::minutes_to_time;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identifier of the occurrence of `template_id` on `date`.
pub fn occurrence_id(template_id: &str, date: NaiveDate) -> String {
    format!("{template_id}:{}", date.format("%Y-%m-%d"))
}

/// Splits an occurrence identifier into template id and ISO date.
/// Template ids never contain `:`, so the date is everything after the last one.
pub fn split_occurrence_id(occurrence_id: &str) -> Option<(&str, &str)> {
    let (template_id, date) = occurrence_id.rsplit_once(':')?;
    if template_id.trim().is_empty() || date.trim().is_empty() {
        return None;
    }
    Some((template_id, date))
}

/// One template materialized on one date. Recomputed on every query, never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Occurrence {
    pub id: String,
    pub template_id: String,
    pub date: String,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub start_time: String,
    pub end_time: String,
    pub start_minute: u32,
    pub end_minute: u32,
    pub duration: u32,
    pub assigned_to: Option<String>,
    pub created_by: String,
    pub priority: Priority,
    pub location: Option<String>,
    pub is_recurring: bool,
    pub is_overridden: bool,
    pub has_conflict: bool,
    pub is_completed: bool,
}

impl Occurrence {
    pub(crate) fn from_template(
        template: &EventTemplate,
        date: NaiveDate,
        start_minute: u32,
        end_minute: u32,
    ) -> Self {
        Self {
            id: occurrence_id(&template.id, date),
            template_id: template.id.clone(),
            date: date.format("%Y-%m-%d").to_string(),
            title: template.title.clone(),
            description: template.description.clone(),
            category: template.category,
            start_time: minutes_to_time(start_minute),
            end_time: minutes_to_time(end_minute),
            start_minute,
            end_minute,
            duration: end_minute.saturating_sub(start_minute),
            assigned_to: template.assigned_to.clone(),
            created_by: template.created_by.clone(),
            priority: template.priority,
            location: template.location.clone(),
            is_recurring: template.is_recurring(),
            is_overridden: false,
            has_conflict: false,
            is_completed: false,
        }
    }

    pub fn set_times(&mut self, start_minute: u32, end_minute: u32) {
        self.start_minute = start_minute;
        self.end_minute = end_minute;
        self.start_time = minutes_to_time(start_minute);
        self.end_time = minutes_to_time(end_minute);
        self.duration = end_minute.saturating_sub(start_minute);
    }
}
