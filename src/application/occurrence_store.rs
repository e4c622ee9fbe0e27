use crate::domain::error::{ScheduleError, ScheduleResult};
use crate::domain::models::EventTemplate;
use crate::domain::recurrence::can_occur_on;
use crate::domain::time::{minutes_to_time, parse_date, parse_time, to_minutes};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::template_repository::TemplateRepository;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

/// Source of truth for template content: an in-memory index written through to the repository.
pub struct OccurrenceStore<R: TemplateRepository> {
    repository: Arc<R>,
    templates: Mutex<BTreeMap<String, EventTemplate>>,
}

impl<R: TemplateRepository> OccurrenceStore<R> {
    pub fn load(repository: Arc<R>) -> ScheduleResult<Self> {
        let mut templates = BTreeMap::new();
        for template in repository.load()? {
            if let Some(previous) = templates.insert(template.id.clone(), template) {
                warn!(template_id = %previous.id, "duplicate template id in storage, keeping the last one");
            }
        }
        Ok(Self {
            repository,
            templates: Mutex::new(templates),
        })
    }

    fn lock(&self) -> ScheduleResult<MutexGuard<'_, BTreeMap<String, EventTemplate>>> {
        self.templates.lock().map_err(|error| {
            ScheduleError::from(InfraError::LockPoisoned(format!("occurrence store: {error}")))
        })
    }

    pub fn templates(&self) -> ScheduleResult<Vec<EventTemplate>> {
        Ok(self.lock()?.values().cloned().collect())
    }

    pub fn template(&self, template_id: &str) -> ScheduleResult<EventTemplate> {
        self.lock()?
            .get(template_id.trim())
            .cloned()
            .ok_or_else(|| ScheduleError::template_not_found(template_id))
    }

    /// Single templates due on `date` plus recurring templates whose pattern may hit `date`.
    pub fn templates_active_on(&self, date: NaiveDate) -> ScheduleResult<Vec<EventTemplate>> {
        Ok(self
            .lock()?
            .values()
            .filter(|template| can_occur_on(template, date))
            .cloned()
            .collect())
    }

    pub fn create(&self, template: EventTemplate) -> ScheduleResult<EventTemplate> {
        template.validate()?;
        let mut templates = self.lock()?;
        if templates.contains_key(&template.id) {
            return Err(ScheduleError::AlreadyExists {
                kind: "template",
                id: template.id,
            });
        }
        self.commit(&mut templates, template.clone())?;
        Ok(template)
    }

    /// Replaces the template with the same id. The id is the link to completion history.
    pub fn update(&self, template: EventTemplate) -> ScheduleResult<EventTemplate> {
        template.validate()?;
        let mut templates = self.lock()?;
        if !templates.contains_key(&template.id) {
            return Err(ScheduleError::template_not_found(template.id));
        }
        self.commit(&mut templates, template.clone())?;
        Ok(template)
    }

    pub fn remove(&self, template_id: &str) -> ScheduleResult<EventTemplate> {
        let mut templates = self.lock()?;
        let template_id = template_id.trim();
        let mut next = templates.clone();
        let removed = next
            .remove(template_id)
            .ok_or_else(|| ScheduleError::template_not_found(template_id))?;
        self.persist(&next)?;
        *templates = next;
        Ok(removed)
    }

    /// Moves the template to `new_date` at `new_time`, keeping its length.
    pub fn reschedule(
        &self,
        template_id: &str,
        new_date: &str,
        new_time: &str,
    ) -> ScheduleResult<EventTemplate> {
        let date = parse_date(new_date)?;
        let start = parse_time(new_time)?;
        self.modify(template_id, |template| {
            if let Some(end_time) = &template.end_time {
                let length = to_minutes(end_time)?.saturating_sub(to_minutes(&template.start_time)?);
                template.end_time = Some(minutes_to_time(start.saturating_add(length)));
            }
            template.start_time = minutes_to_time(start);
            template.due_date = date.format("%Y-%m-%d").to_string();
            Ok(())
        })
    }

    /// `None` or a blank name leaves the template unassigned.
    pub fn reassign(
        &self,
        template_id: &str,
        new_assignee: Option<&str>,
    ) -> ScheduleResult<EventTemplate> {
        let assignee = new_assignee
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned);
        self.modify(template_id, |template| {
            template.assigned_to = assignee;
            Ok(())
        })
    }

    fn modify<F>(&self, template_id: &str, apply: F) -> ScheduleResult<EventTemplate>
    where
        F: FnOnce(&mut EventTemplate) -> ScheduleResult<()>,
    {
        let mut templates = self.lock()?;
        let mut template = templates
            .get(template_id.trim())
            .cloned()
            .ok_or_else(|| ScheduleError::template_not_found(template_id))?;
        apply(&mut template)?;
        template.validate()?;
        self.commit(&mut templates, template.clone())?;
        Ok(template)
    }

    /// Persists first so the in-memory index never runs ahead of storage.
    fn commit(
        &self,
        templates: &mut BTreeMap<String, EventTemplate>,
        template: EventTemplate,
    ) -> ScheduleResult<()> {
        let mut next = templates.clone();
        next.insert(template.id.clone(), template);
        self.persist(&next)?;
        *templates = next;
        Ok(())
    }

    fn persist(&self, templates: &BTreeMap<String, EventTemplate>) -> ScheduleResult<()> {
        let list = templates.values().cloned().collect::<Vec<_>>();
        self.repository.save(&list)?;
        Ok(())
    }
}
