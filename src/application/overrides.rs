//! Per-occurrence field deltas layered over series-wide template content.

use crate::domain::error::{ScheduleError, ScheduleResult};
use crate::domain::occurrence::{split_occurrence_id, Occurrence};
use crate::domain::time::{ensure_start_of_day, parse_date, parse_time, MINUTES_PER_DAY};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::kv_store::KeyValueStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

pub const OVERRIDES_KEY: &str = "occurrence_overrides";

/// Fields left as `None` keep the template's value. An empty `assigned_to` unassigns.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OccurrenceOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub cancelled: bool,
}

impl OccurrenceOverride {
    pub fn cancelled() -> Self {
        Self {
            cancelled: true,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Applies the deltas. Moving only the start keeps the occurrence's length, up to midnight.
    pub fn apply(&self, occurrence: &mut Occurrence) -> ScheduleResult<()> {
        let start = match &self.start_time {
            Some(value) => ensure_start_of_day(parse_time(value)?, value)?,
            None => occurrence.start_minute,
        };
        let end = match &self.end_time {
            Some(value) => parse_time(value)?,
            None if self.start_time.is_some() => start
                .saturating_add(occurrence.duration)
                .min(MINUTES_PER_DAY),
            None => occurrence.end_minute,
        };
        if end <= start {
            return Err(ScheduleError::Range(format!(
                "override for {} ends before it starts",
                occurrence.id
            )));
        }
        occurrence.set_times(start, end);

        if let Some(title) = &self.title {
            occurrence.title = title.clone();
        }
        if let Some(assignee) = &self.assigned_to {
            let assignee = assignee.trim();
            occurrence.assigned_to = (!assignee.is_empty()).then(|| assignee.to_string());
        }
        if let Some(location) = &self.location {
            occurrence.location = Some(location.clone());
        }
        occurrence.is_overridden = true;
        Ok(())
    }
}

pub struct OverrideStore<K: KeyValueStore> {
    store: Arc<K>,
}

impl<K: KeyValueStore> OverrideStore<K> {
    pub fn new(store: Arc<K>) -> Self {
        Self { store }
    }

    /// Stored overrides for display. Unreadable storage reads as empty.
    pub fn all(&self) -> BTreeMap<String, OccurrenceOverride> {
        self.records().unwrap_or_else(|error| {
            warn!(%error, "occurrence overrides unavailable, ignoring them");
            BTreeMap::new()
        })
    }

    /// Stored overrides, failing on unreadable or malformed storage.
    pub fn records(&self) -> ScheduleResult<BTreeMap<String, OccurrenceOverride>> {
        let Some(raw) = self.store.get(OVERRIDES_KEY)? else {
            return Ok(BTreeMap::new());
        };
        Ok(serde_json::from_value(raw).map_err(InfraError::from)?)
    }

    pub fn get(&self, occurrence_id: &str) -> Option<OccurrenceOverride> {
        self.all().remove(occurrence_id)
    }

    /// Validates the identifier and any times before storing. An empty override clears.
    pub fn set(&self, occurrence_id: &str, deltas: OccurrenceOverride) -> ScheduleResult<()> {
        let (_, date) = split_occurrence_id(occurrence_id)
            .ok_or_else(|| ScheduleError::parse("occurrence_id", occurrence_id))?;
        parse_date(date)?;
        if let Some(start) = &deltas.start_time {
            ensure_start_of_day(parse_time(start)?, start)?;
        }
        if let Some(end) = &deltas.end_time {
            parse_time(end)?;
        }
        if deltas.is_empty() {
            return self.clear(occurrence_id);
        }
        let mut records = self.records()?;
        records.insert(occurrence_id.to_string(), deltas);
        self.write(&records)
    }

    pub fn clear(&self, occurrence_id: &str) -> ScheduleResult<()> {
        let mut records = self.records()?;
        if records.remove(occurrence_id).is_none() {
            return Ok(());
        }
        self.write(&records)
    }

    fn write(&self, records: &BTreeMap<String, OccurrenceOverride>) -> ScheduleResult<()> {
        if records.is_empty() {
            self.store.remove(OVERRIDES_KEY)?;
        } else {
            let value: Value = serde_json::to_value(records).map_err(InfraError::from)?;
            self.store.save(OVERRIDES_KEY, &value)?;
        }
        Ok(())
    }
}
