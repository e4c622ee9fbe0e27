//! Per-occurrence completion state, kept apart from template content.

use crate::domain::error::ScheduleResult;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::kv_store::KeyValueStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

pub const COMPLETION_KEY: &str = "completed_occurrences";

pub struct CompletionOverlay<K: KeyValueStore> {
    store: Arc<K>,
}

impl<K: KeyValueStore> CompletionOverlay<K> {
    pub fn new(store: Arc<K>) -> Self {
        Self { store }
    }

    /// Current records for display. Unreadable storage reads as empty.
    pub fn snapshot(&self) -> BTreeMap<String, bool> {
        self.records().unwrap_or_else(|error| {
            warn!(%error, "completion records unavailable, treating as empty");
            BTreeMap::new()
        })
    }

    /// Current records, failing on unreadable or malformed storage.
    pub fn records(&self) -> ScheduleResult<BTreeMap<String, bool>> {
        let Some(raw) = self.store.get(COMPLETION_KEY)? else {
            return Ok(BTreeMap::new());
        };
        Ok(serde_json::from_value(raw).map_err(InfraError::from)?)
    }

    /// Stored value, if any.
    pub fn get(&self, occurrence_id: &str) -> Option<bool> {
        self.snapshot().get(occurrence_id).copied()
    }

    pub fn is_completed(&self, occurrence_id: &str) -> bool {
        self.get(occurrence_id).unwrap_or(false)
    }

    /// Flips the stored value (absent reads as `false`) and returns the new value.
    pub fn toggle(&self, occurrence_id: &str) -> ScheduleResult<bool> {
        let mut records = self.records()?;
        let next = !records.get(occurrence_id).copied().unwrap_or(false);
        records.insert(occurrence_id.to_string(), next);
        self.write(&records)?;
        Ok(next)
    }

    pub fn set(&self, occurrence_id: &str, completed: bool) -> ScheduleResult<()> {
        let mut records = self.records()?;
        records.insert(occurrence_id.to_string(), completed);
        self.write(&records)
    }

    pub fn clear(&self, occurrence_id: &str) -> ScheduleResult<()> {
        let mut records = self.records()?;
        if records.remove(occurrence_id).is_none() {
            return Ok(());
        }
        self.write(&records)
    }

    fn write(&self, records: &BTreeMap<String, bool>) -> ScheduleResult<()> {
        if records.is_empty() {
            self.store.remove(COMPLETION_KEY)?;
        } else {
            let value = serde_json::to_value(records).map_err(InfraError::from)?;
            self.store.save(COMPLETION_KEY, &value)?;
        }
        Ok(())
    }
}
