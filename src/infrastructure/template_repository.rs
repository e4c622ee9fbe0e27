use crate::domain::models::EventTemplate;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::kv_store::KeyValueStore;
use std::sync::{Arc, Mutex};

pub const TEMPLATES_KEY: &str = "event_templates";

/// Whole-list persistence for templates.
pub trait TemplateRepository: Send + Sync {
    fn load(&self) -> Result<Vec<EventTemplate>, InfraError>;
    fn save(&self, templates: &[EventTemplate]) -> Result<(), InfraError>;
}

#[derive(Debug, Default)]
pub struct InMemoryTemplateRepository {
    templates: Mutex<Vec<EventTemplate>>,
}

impl InMemoryTemplateRepository {
    pub fn with_templates(templates: Vec<EventTemplate>) -> Self {
        Self {
            templates: Mutex::new(templates),
        }
    }
}

impl TemplateRepository for InMemoryTemplateRepository {
    fn load(&self) -> Result<Vec<EventTemplate>, InfraError> {
        let templates = self
            .templates
            .lock()
            .map_err(|error| InfraError::LockPoisoned(format!("template repository: {error}")))?;
        Ok(templates.clone())
    }

    fn save(&self, templates: &[EventTemplate]) -> Result<(), InfraError> {
        let mut stored = self
            .templates
            .lock()
            .map_err(|error| InfraError::LockPoisoned(format!("template repository: {error}")))?;
        *stored = templates.to_vec();
        Ok(())
    }
}

/// Stores the template list as one JSON array under [`TEMPLATES_KEY`].
pub struct KeyValueTemplateRepository<K: KeyValueStore> {
    store: Arc<K>,
}

impl<K: KeyValueStore> KeyValueTemplateRepository<K> {
    pub fn new(store: Arc<K>) -> Self {
        Self { store }
    }
}

impl<K: KeyValueStore> TemplateRepository for KeyValueTemplateRepository<K> {
    fn load(&self) -> Result<Vec<EventTemplate>, InfraError> {
        let Some(raw) = self.store.get(TEMPLATES_KEY)? else {
            return Ok(Vec::new());
        };
        Ok(serde_json::from_value(raw)?)
    }

    fn save(&self, templates: &[EventTemplate]) -> Result<(), InfraError> {
        let value = serde_json::to_value(templates)?;
        self.store.save(TEMPLATES_KEY, &value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Category, RecurrencePattern};
    use crate::infrastructure::kv_store::InMemoryKeyValueStore;

    fn sample_templates() -> Vec<EventTemplate> {
        vec![
            EventTemplate::new("meds", "Evening meds", Category::Medication, "2024-01-01", "20:00")
                .assigned_to("james")
                .recurring(RecurrencePattern::daily()),
            EventTemplate::new("gp", "GP visit", Category::Appointment, "2024-01-09", "10:30")
                .with_end_time("11:15"),
        ]
    }

    #[test]
    fn key_value_repository_persists_template_list() {
        let store = Arc::new(InMemoryKeyValueStore::default());
        let repository = KeyValueTemplateRepository::new(Arc::clone(&store));
        assert!(repository.load().expect("load empty").is_empty());

        repository.save(&sample_templates()).expect("save");
        let reloaded = KeyValueTemplateRepository::new(store)
            .load()
            .expect("load saved");
        assert_eq!(reloaded, sample_templates());
    }

    #[test]
    fn key_value_repository_reports_corrupt_payload() {
        let store = Arc::new(InMemoryKeyValueStore::default());
        store
            .save(TEMPLATES_KEY, &serde_json::json!({"not": "a list"}))
            .expect("seed corrupt payload");
        let repository = KeyValueTemplateRepository::new(store);
        assert!(matches!(repository.load(), Err(InfraError::Json(_))));
    }

    #[test]
    fn in_memory_repository_replaces_on_save() {
        let repository = InMemoryTemplateRepository::with_templates(sample_templates());
        repository.save(&sample_templates()[..1]).expect("save");
        assert_eq!(repository.load().expect("load").len(), 1);
    }
}
