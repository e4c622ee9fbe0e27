//! Query and mutation façade consumed by the views.
//!
//! Every query recomputes from the template store and the overlays; nothing is cached
//! between calls, so a mutation is visible to the very next query.

use crate::application::completion::CompletionOverlay;
use crate::application::occurrence_store::OccurrenceStore;
use crate::application::overrides::{OccurrenceOverride, OverrideStore};
use crate::domain::conflict::{ConflictDetector, ConflictPair};
use crate::domain::error::{ScheduleError, ScheduleResult};
use crate::domain::grouping::{
    self, DaySchedule, MonthCell, MonthGrid, ScheduleSummary, TimeOfDayBoundaries,
    TimeOfDayGroups,
};
use crate::domain::models::{Category, EventTemplate, Priority};
use crate::domain::occurrence::{split_occurrence_id, Occurrence};
use crate::domain::recurrence::RecurrenceExpander;
use crate::domain::time::{dates_between, days_in_month_grid, format_date, parse_date, start_of_week};
use crate::infrastructure::config::EngineConfig;
use crate::infrastructure::kv_store::{InMemoryKeyValueStore, KeyValueStore};
use crate::infrastructure::template_repository::{InMemoryTemplateRepository, TemplateRepository};
use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Caller-supplied narrowing of a query. Empty lists match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EventFilter {
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub priorities: Vec<Priority>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub hide_completed: bool,
}

impl EventFilter {
    pub fn matches(&self, occurrence: &Occurrence) -> bool {
        if !self.categories.is_empty() && !self.categories.contains(&occurrence.category) {
            return false;
        }
        if !self.priorities.is_empty() && !self.priorities.contains(&occurrence.priority) {
            return false;
        }
        if let Some(assignee) = &self.assignee {
            let matches_assignee = occurrence
                .assigned_to
                .as_deref()
                .is_some_and(|current| current.trim().eq_ignore_ascii_case(assignee.trim()));
            if !matches_assignee {
                return false;
            }
        }
        !(self.hide_completed && occurrence.is_completed)
    }
}

struct Overlays {
    completion: BTreeMap<String, bool>,
    overrides: BTreeMap<String, OccurrenceOverride>,
}

pub struct CalendarService<R: TemplateRepository, K: KeyValueStore> {
    store: OccurrenceStore<R>,
    completion: CompletionOverlay<K>,
    overrides: OverrideStore<K>,
    expander: RecurrenceExpander,
    detector: ConflictDetector,
    first_weekday: Weekday,
    boundaries: TimeOfDayBoundaries,
}

pub type InMemoryCalendarService = CalendarService<InMemoryTemplateRepository, InMemoryKeyValueStore>;

impl InMemoryCalendarService {
    /// Fresh service over in-memory storage with default configuration.
    pub fn in_memory(templates: Vec<EventTemplate>) -> ScheduleResult<Self> {
        Self::new(
            Arc::new(InMemoryTemplateRepository::with_templates(templates)),
            Arc::new(InMemoryKeyValueStore::default()),
            &EngineConfig::default(),
        )
    }
}

impl<R: TemplateRepository, K: KeyValueStore> CalendarService<R, K> {
    pub fn new(repository: Arc<R>, state: Arc<K>, config: &EngineConfig) -> ScheduleResult<Self> {
        config.validate()?;
        Ok(Self {
            store: OccurrenceStore::load(repository)?,
            completion: CompletionOverlay::new(Arc::clone(&state)),
            overrides: OverrideStore::new(state),
            expander: RecurrenceExpander::new(config.default_duration_minutes),
            detector: ConflictDetector::new(config.unassigned_assignees.iter().cloned()),
            first_weekday: config.first_weekday()?,
            boundaries: config.time_of_day_boundaries()?,
        })
    }

    pub fn first_weekday(&self) -> Weekday {
        self.first_weekday
    }

    pub fn get_events_for_date(&self, date: &str) -> ScheduleResult<Vec<Occurrence>> {
        self.get_filtered_events_for_date(date, &EventFilter::default())
    }

    pub fn get_filtered_events_for_date(
        &self,
        date: &str,
        filter: &EventFilter,
    ) -> ScheduleResult<Vec<Occurrence>> {
        let date = parse_date(date)?;
        self.events_on(date, filter, &self.overlays())
    }

    /// Occurrences per ISO date for every day in `[start, end]`.
    pub fn get_events_for_range(
        &self,
        start: &str,
        end: &str,
    ) -> ScheduleResult<BTreeMap<String, Vec<Occurrence>>> {
        self.get_filtered_events_for_range(start, end, &EventFilter::default())
    }

    pub fn get_filtered_events_for_range(
        &self,
        start: &str,
        end: &str,
        filter: &EventFilter,
    ) -> ScheduleResult<BTreeMap<String, Vec<Occurrence>>> {
        let start = parse_date(start)?;
        let end = parse_date(end)?;
        if end < start {
            return Err(ScheduleError::Range(format!(
                "range end {end} is before start {start}"
            )));
        }
        let overlays = self.overlays();
        dates_between(start, end)
            .into_iter()
            .map(|date| Ok((format_date(date), self.events_on(date, filter, &overlays)?)))
            .collect()
    }

    /// Seven days starting at the configured first weekday of the week containing `date`.
    pub fn get_week(&self, date: &str) -> ScheduleResult<Vec<DaySchedule>> {
        let first = start_of_week(parse_date(date)?, self.first_weekday);
        self.day_schedules(first, 7)
    }

    /// `count` consecutive days starting at `date`.
    pub fn get_days(&self, date: &str, count: usize) -> ScheduleResult<Vec<DaySchedule>> {
        self.day_schedules(parse_date(date)?, count)
    }

    pub fn build_month_grid(&self, date: &str) -> ScheduleResult<MonthGrid> {
        let anchor = parse_date(date)?;
        let overlays = self.overlays();
        let filter = EventFilter::default();
        let cells = days_in_month_grid(anchor, self.first_weekday)
            .into_iter()
            .map(|day| {
                Ok(MonthCell {
                    date: day,
                    in_current_month: day.year() == anchor.year() && day.month() == anchor.month(),
                    occurrences: self.events_on(day, &filter, &overlays)?,
                })
            })
            .collect::<ScheduleResult<Vec<_>>>()?;
        Ok(MonthGrid {
            year: anchor.year(),
            month: anchor.month(),
            cells,
        })
    }

    pub fn group_by_time_of_day(&self, occurrences: &[Occurrence]) -> TimeOfDayGroups {
        grouping::group_by_time_of_day(occurrences, self.boundaries)
    }

    pub fn group_by_weekday(&self, occurrences: &[Occurrence]) -> HashMap<Weekday, Vec<Occurrence>> {
        grouping::group_by_weekday(occurrences)
    }

    pub fn summarize(&self, occurrences: &[Occurrence]) -> ScheduleSummary {
        grouping::summarize(occurrences)
    }

    pub fn conflicts_for_date(&self, date: &str) -> ScheduleResult<Vec<ConflictPair>> {
        let occurrences = self.get_events_for_date(date)?;
        Ok(self.detector.conflicting_pairs(&occurrences))
    }

    /// Never fails. Without a record, a single template's `Completed` status counts;
    /// anything else reads as not completed.
    pub fn is_task_completed(&self, occurrence_id: &str) -> bool {
        self.completion
            .get(occurrence_id)
            .unwrap_or_else(|| self.completed_by_status(occurrence_id))
    }

    /// Flips the effective completion of an existing occurrence and returns the new value.
    pub fn toggle_task_completion(&self, occurrence_id: &str) -> ScheduleResult<bool> {
        self.run("toggle_task_completion", occurrence_id, || {
            let template = self.occurrence_template(occurrence_id)?;
            let current = match self.completion.records()?.get(occurrence_id) {
                Some(completed) => *completed,
                None => template.completed_by_status(),
            };
            self.completion.set(occurrence_id, !current)?;
            Ok(!current)
        })
    }

    pub fn set_task_completion(&self, occurrence_id: &str, completed: bool) -> ScheduleResult<()> {
        self.run("set_task_completion", occurrence_id, || {
            self.occurrence_template(occurrence_id)?;
            self.completion.set(occurrence_id, completed)
        })
    }

    /// Drops the record entirely. Works for occurrences of deleted templates too.
    pub fn clear_completion(&self, occurrence_id: &str) -> ScheduleResult<()> {
        self.run("clear_completion", occurrence_id, || {
            self.completion.clear(occurrence_id)
        })
    }

    pub fn reschedule_template(
        &self,
        template_id: &str,
        new_date: &str,
        new_time: &str,
    ) -> ScheduleResult<EventTemplate> {
        self.run("reschedule_template", template_id, || {
            self.store.reschedule(template_id, new_date, new_time)
        })
    }

    pub fn reassign_template(
        &self,
        template_id: &str,
        new_assignee: Option<&str>,
    ) -> ScheduleResult<EventTemplate> {
        self.run("reassign_template", template_id, || {
            self.store.reassign(template_id, new_assignee)
        })
    }

    pub fn create_template(&self, template: EventTemplate) -> ScheduleResult<EventTemplate> {
        let template_id = template.id.clone();
        self.run("create_template", &template_id, || self.store.create(template))
    }

    /// Series-wide edit. Completion records stay keyed by the unchanged id.
    pub fn update_template(&self, template: EventTemplate) -> ScheduleResult<EventTemplate> {
        let template_id = template.id.clone();
        self.run("update_template", &template_id, || self.store.update(template))
    }

    pub fn delete_template(&self, template_id: &str) -> ScheduleResult<EventTemplate> {
        self.run("delete_template", template_id, || self.store.remove(template_id))
    }

    pub fn template(&self, template_id: &str) -> ScheduleResult<EventTemplate> {
        self.store.template(template_id)
    }

    pub fn templates(&self) -> ScheduleResult<Vec<EventTemplate>> {
        self.store.templates()
    }

    /// Edits one occurrence only, leaving the rest of the series untouched.
    pub fn override_occurrence(
        &self,
        occurrence_id: &str,
        deltas: OccurrenceOverride,
    ) -> ScheduleResult<()> {
        self.run("override_occurrence", occurrence_id, || {
            self.occurrence_template(occurrence_id)?;
            self.overrides.set(occurrence_id, deltas)
        })
    }

    pub fn clear_override(&self, occurrence_id: &str) -> ScheduleResult<()> {
        self.run("clear_override", occurrence_id, || {
            self.overrides.clear(occurrence_id)
        })
    }

    pub fn occurrence_override(&self, occurrence_id: &str) -> Option<OccurrenceOverride> {
        self.overrides.get(occurrence_id)
    }

    fn overlays(&self) -> Overlays {
        Overlays {
            completion: self.completion.snapshot(),
            overrides: self.overrides.all(),
        }
    }

    fn day_schedules(&self, first: NaiveDate, count: usize) -> ScheduleResult<Vec<DaySchedule>> {
        if let Some(last_offset) = count.checked_sub(1) {
            first
                .checked_add_days(Days::new(last_offset as u64))
                .ok_or_else(|| {
                    ScheduleError::Range(format!("{count} days from {first} leave the calendar"))
                })?;
        }
        let overlays = self.overlays();
        let filter = EventFilter::default();
        first
            .iter_days()
            .take(count)
            .map(|day| Ok(DaySchedule::new(day, self.events_on(day, &filter, &overlays)?)))
            .collect()
    }

    fn events_on(
        &self,
        date: NaiveDate,
        filter: &EventFilter,
        overlays: &Overlays,
    ) -> ScheduleResult<Vec<Occurrence>> {
        let mut occurrences = Vec::new();
        for template in self.store.templates_active_on(date)? {
            let mut occurrence = match self.expander.expand(&template, date) {
                Ok(Some(occurrence)) => occurrence,
                Ok(None) => continue,
                Err(error) => {
                    warn!(template_id = %template.id, %date, %error, "skipping malformed template");
                    continue;
                }
            };
            occurrence.is_completed = template.completed_by_status();
            if let Some(deltas) = overlays.overrides.get(&occurrence.id) {
                if deltas.cancelled {
                    continue;
                }
                if let Err(error) = deltas.apply(&mut occurrence) {
                    warn!(occurrence_id = %occurrence.id, %error, "ignoring unusable override");
                }
            }
            occurrences.push(occurrence);
        }

        self.detector.annotate_in_place(&mut occurrences);
        for occurrence in &mut occurrences {
            if let Some(completed) = overlays.completion.get(&occurrence.id) {
                occurrence.is_completed = *completed;
            }
        }
        occurrences.retain(|occurrence| filter.matches(occurrence));
        occurrences.sort_by(|left, right| {
            left.start_minute
                .cmp(&right.start_minute)
                .then_with(|| left.title.cmp(&right.title))
                .then_with(|| left.id.cmp(&right.id))
        });
        Ok(occurrences)
    }

    /// Template of an occurrence its pattern actually produces.
    fn occurrence_template(&self, occurrence_id: &str) -> ScheduleResult<EventTemplate> {
        let (template_id, date) = split_occurrence_id(occurrence_id)
            .ok_or_else(|| ScheduleError::parse("occurrence_id", occurrence_id))?;
        let date = parse_date(date)?;
        let template = self.store.template(template_id)?;
        if self.expander.expand(&template, date)?.is_none() {
            return Err(ScheduleError::NotFound {
                kind: "occurrence",
                id: occurrence_id.to_string(),
            });
        }
        Ok(template)
    }

    fn completed_by_status(&self, occurrence_id: &str) -> bool {
        let Some((template_id, date)) = split_occurrence_id(occurrence_id) else {
            return false;
        };
        let Ok(template) = self.store.template(template_id) else {
            return false;
        };
        match (parse_date(&template.due_date), parse_date(date)) {
            (Ok(due), Ok(date)) => due == date && template.completed_by_status(),
            _ => false,
        }
    }

    fn run<T>(
        &self,
        command: &'static str,
        subject: &str,
        action: impl FnOnce() -> ScheduleResult<T>,
    ) -> ScheduleResult<T> {
        match action() {
            Ok(value) => {
                info!(command, subject, "command applied");
                Ok(value)
            }
            Err(error) => Err(command_failed(command, subject, error)),
        }
    }
}

fn command_failed(command: &'static str, subject: &str, failure: ScheduleError) -> ScheduleError {
    error!(command, subject, error = %failure, "command failed");
    failure
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{RecurrencePattern, TemplateStatus};
    use crate::infrastructure::kv_store::testing::UnreliableStore;
    use chrono::Duration;
    use proptest::prelude::*;

    fn service(templates: Vec<EventTemplate>) -> InMemoryCalendarService {
        CalendarService::in_memory(templates).expect("in-memory service")
    }

    fn ids(occurrences: &[Occurrence]) -> Vec<String> {
        occurrences.iter().map(|item| item.id.clone()).collect()
    }

    fn james(id: &str, start: &str, end: &str) -> EventTemplate {
        EventTemplate::new(id, id, Category::Appointment, "2024-03-05", start)
            .with_end_time(end)
            .assigned_to("james")
    }

    #[test]
    fn weekly_series_produces_one_occurrence_two_weeks_later() {
        let calendar = service(vec![EventTemplate::new(
            "pt",
            "Physio",
            Category::Therapy,
            "2024-01-01",
            "10:00",
        )
        .recurring(RecurrencePattern::weekly([1]).with_interval(1))]);

        let events = calendar.get_events_for_date("2024-01-15").expect("query");
        assert_eq!(ids(&events), vec!["pt:2024-01-15"]);
        assert!(calendar.get_events_for_date("2024-01-16").expect("query").is_empty());
    }

    #[test]
    fn overlapping_assignments_are_flagged() {
        let calendar = service(vec![
            james("a", "09:00", "09:30"),
            james("b", "09:15", "09:45"),
            james("c", "10:00", "10:30"),
        ]);
        let events = calendar.get_events_for_date("2024-03-05").expect("query");
        let flags = events
            .iter()
            .map(|item| (item.template_id.as_str(), item.has_conflict))
            .collect::<Vec<_>>();
        assert_eq!(flags, vec![("a", true), ("b", true), ("c", false)]);

        let pairs = calendar.conflicts_for_date("2024-03-05").expect("pairs");
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].first, "a:2024-03-05");
        assert_eq!(pairs[0].second, "b:2024-03-05");
    }

    #[test]
    fn double_toggle_restores_completion() {
        let calendar = service(vec![EventTemplate::new(
            "tmpl1",
            "Morning meds",
            Category::Medication,
            "2024-03-05",
            "08:00",
        )]);
        assert!(!calendar.is_task_completed("tmpl1:2024-03-05"));
        assert!(calendar.toggle_task_completion("tmpl1:2024-03-05").expect("toggle"));
        assert!(calendar.get_events_for_date("2024-03-05").expect("query")[0].is_completed);
        assert!(!calendar.toggle_task_completion("tmpl1:2024-03-05").expect("toggle"));
        assert!(!calendar.is_task_completed("tmpl1:2024-03-05"));
    }

    #[test]
    fn monthly_series_on_the_31st_clamps_in_february() {
        let calendar = service(vec![EventTemplate::new(
            "rent",
            "Pharmacy refill",
            Category::Medication,
            "2024-01-31",
            "09:00",
        )
        .recurring(RecurrencePattern::monthly())]);

        assert_eq!(
            ids(&calendar.get_events_for_date("2024-02-29").expect("query")),
            vec!["rent:2024-02-29"]
        );
        assert!(calendar.get_events_for_date("2024-02-28").expect("query").is_empty());
    }

    #[test]
    fn month_grid_has_six_full_weeks() {
        let calendar = service(vec![james("a", "09:00", "09:30")]);
        let grid = calendar.build_month_grid("2024-02-01").expect("grid");
        assert_eq!(grid.cells.len(), 42);
        assert_eq!(format_date(grid.cells[0].date), "2024-01-28");
        assert_eq!(format_date(grid.cells[41].date), "2024-03-09");
        assert_eq!(
            grid.cells.iter().filter(|cell| cell.in_current_month).count(),
            29
        );
        assert_eq!(grid.weeks().count(), 6);

        let march_fifth = grid
            .cells
            .iter()
            .find(|cell| format_date(cell.date) == "2024-03-05")
            .expect("padding reaches march 5");
        assert_eq!(march_fifth.occurrences.len(), 1);
        assert!(!march_fifth.in_current_month);
    }

    #[test]
    fn completion_survives_title_and_time_edits() {
        let calendar = service(vec![EventTemplate::new(
            "walk",
            "Walk",
            Category::Task,
            "2024-03-01",
            "07:00",
        )
        .recurring(RecurrencePattern::daily())]);
        calendar
            .toggle_task_completion("walk:2024-03-05")
            .expect("toggle");

        let mut edited = calendar.template("walk").expect("template");
        edited.title = "Evening walk".to_string();
        edited.start_time = "18:30".to_string();
        calendar.update_template(edited).expect("update");

        let events = calendar.get_events_for_date("2024-03-05").expect("query");
        assert_eq!(events[0].title, "Evening walk");
        assert_eq!(events[0].start_time, "18:30");
        assert!(events[0].is_completed);
        assert!(!calendar.get_events_for_date("2024-03-06").expect("query")[0].is_completed);
    }

    #[test]
    fn malformed_template_is_skipped_without_blanking_the_day() {
        let mut broken = james("broken", "09:00", "09:30");
        broken.start_time = "9 o'clock".to_string();
        let calendar = service(vec![broken, james("fine", "11:00", "11:30")]);

        let events = calendar.get_events_for_date("2024-03-05").expect("query");
        assert_eq!(ids(&events), vec!["fine:2024-03-05"]);
    }

    #[test]
    fn malformed_query_date_is_a_parse_error() {
        let calendar = service(Vec::new());
        assert!(matches!(
            calendar.get_events_for_date("05/03/2024"),
            Err(ScheduleError::Parse { .. })
        ));
        assert!(matches!(
            calendar.get_events_for_range("2024-03-05", "2024-03-01"),
            Err(ScheduleError::Range(_))
        ));
    }

    #[test]
    fn mutations_on_unknown_templates_are_not_found() {
        let calendar = service(vec![james("a", "09:00", "09:30")]);
        assert!(matches!(
            calendar.toggle_task_completion("ghost:2024-03-05"),
            Err(ScheduleError::NotFound { .. })
        ));
        assert!(matches!(
            calendar.reschedule_template("ghost", "2024-03-06", "09:00"),
            Err(ScheduleError::NotFound { .. })
        ));
        assert!(matches!(
            calendar.reassign_template("ghost", Some("maria")),
            Err(ScheduleError::NotFound { .. })
        ));
        assert!(matches!(
            calendar.toggle_task_completion("a"),
            Err(ScheduleError::Parse { .. })
        ));
        assert!(!calendar.is_task_completed("ghost:2024-03-05"));
    }

    #[test]
    fn reschedule_and_reassign_show_on_next_query() {
        let calendar = service(vec![
            james("a", "09:00", "09:30"),
            james("b", "09:15", "09:45"),
        ]);
        calendar
            .reassign_template("b", Some("maria"))
            .expect("reassign");
        let events = calendar.get_events_for_date("2024-03-05").expect("query");
        assert!(events.iter().all(|item| !item.has_conflict));

        calendar
            .reschedule_template("a", "2024-03-06", "1:00 PM")
            .expect("reschedule");
        assert_eq!(
            ids(&calendar.get_events_for_date("2024-03-05").expect("query")),
            vec!["b:2024-03-05"]
        );
        let moved = calendar.get_events_for_date("2024-03-06").expect("query");
        assert_eq!(moved[0].start_time, "13:00");
        assert_eq!(moved[0].end_time, "13:30");
    }

    #[test]
    fn team_assignments_never_conflict() {
        let calendar = service(vec![
            james("a", "09:00", "10:00").assigned_to("Team"),
            james("b", "09:00", "10:00").assigned_to("team"),
        ]);
        let events = calendar.get_events_for_date("2024-03-05").expect("query");
        assert!(events.iter().all(|item| !item.has_conflict));
    }

    #[test]
    fn overrides_apply_to_one_occurrence_only() {
        let calendar = service(vec![
            EventTemplate::new("pt", "Physio", Category::Therapy, "2024-03-04", "10:00")
                .with_end_time("10:45")
                .assigned_to("james")
                .recurring(RecurrencePattern::daily()),
            james("dentist", "14:00", "15:00"),
        ]);
        calendar
            .override_occurrence(
                "pt:2024-03-05",
                OccurrenceOverride {
                    start_time: Some("14:30".to_string()),
                    ..OccurrenceOverride::default()
                },
            )
            .expect("override");

        let tuesday = calendar.get_events_for_date("2024-03-05").expect("query");
        assert_eq!(ids(&tuesday), vec!["dentist:2024-03-05", "pt:2024-03-05"]);
        assert!(tuesday.iter().all(|item| item.has_conflict));
        assert!(tuesday[1].is_overridden);
        assert_eq!(tuesday[1].end_time, "15:15");

        let wednesday = calendar.get_events_for_date("2024-03-06").expect("query");
        assert_eq!(wednesday[0].start_time, "10:00");
        assert!(!wednesday[0].is_overridden);

        calendar
            .override_occurrence("pt:2024-03-06", OccurrenceOverride::cancelled())
            .expect("cancel");
        assert!(calendar.get_events_for_date("2024-03-06").expect("query").is_empty());

        calendar.clear_override("pt:2024-03-06").expect("clear");
        assert_eq!(calendar.get_events_for_date("2024-03-06").expect("query").len(), 1);
    }

    #[test]
    fn filter_narrows_by_category_assignee_and_completion() {
        let calendar = service(vec![
            james("a", "09:00", "09:30"),
            EventTemplate::new("meds", "Meds", Category::Medication, "2024-03-05", "08:00")
                .assigned_to("maria")
                .with_priority(Priority::High),
        ]);
        calendar
            .set_task_completion("meds:2024-03-05", true)
            .expect("complete");

        let only_meds = EventFilter {
            categories: vec![Category::Medication],
            ..EventFilter::default()
        };
        assert_eq!(
            ids(&calendar
                .get_filtered_events_for_date("2024-03-05", &only_meds)
                .expect("query")),
            vec!["meds:2024-03-05"]
        );

        let james_open = EventFilter {
            assignee: Some("JAMES".to_string()),
            hide_completed: true,
            ..EventFilter::default()
        };
        assert_eq!(
            ids(&calendar
                .get_filtered_events_for_date("2024-03-05", &james_open)
                .expect("query")),
            vec!["a:2024-03-05"]
        );

        let hide_completed = EventFilter {
            hide_completed: true,
            ..EventFilter::default()
        };
        assert!(!ids(&calendar
            .get_filtered_events_for_date("2024-03-05", &hide_completed)
            .expect("query"))
        .contains(&"meds:2024-03-05".to_string()));
    }

    #[test]
    fn range_week_and_days_views_share_the_pipeline() {
        let calendar = service(vec![EventTemplate::new(
            "meds",
            "Meds",
            Category::Medication,
            "2024-03-04",
            "08:00",
        )
        .recurring(RecurrencePattern::daily().with_occurrence_count(3))]);

        let range = calendar
            .get_events_for_range("2024-03-03", "2024-03-07")
            .expect("range");
        let counts = range
            .iter()
            .map(|(date, events)| (date.as_str(), events.len()))
            .collect::<Vec<_>>();
        assert_eq!(
            counts,
            vec![
                ("2024-03-03", 0),
                ("2024-03-04", 1),
                ("2024-03-05", 1),
                ("2024-03-06", 1),
                ("2024-03-07", 0),
            ]
        );

        let week = calendar.get_week("2024-03-06").expect("week");
        assert_eq!(week.len(), 7);
        assert_eq!(format_date(week[0].date), "2024-03-03");
        assert_eq!(week[0].weekday, Weekday::Sun);

        let days = calendar.get_days("2024-03-05", 3).expect("days");
        let totals = days
            .iter()
            .map(|day| calendar.summarize(&day.occurrences).total)
            .collect::<Vec<_>>();
        assert_eq!(totals, vec![1, 1, 0]);
    }

    #[test]
    fn configured_week_start_moves_the_grid() {
        let config = EngineConfig {
            week_starts_on: "monday".to_string(),
            ..EngineConfig::default()
        };
        let calendar = CalendarService::new(
            Arc::new(InMemoryTemplateRepository::default()),
            Arc::new(InMemoryKeyValueStore::default()),
            &config,
        )
        .expect("service");
        let grid = calendar.build_month_grid("2024-02-14").expect("grid");
        assert_eq!(format_date(grid.cells[0].date), "2024-01-29");
        assert_eq!(calendar.get_week("2024-03-03").expect("week")[0].weekday, Weekday::Mon);
    }

    #[test]
    fn template_crud_round_trip() {
        let calendar = service(Vec::new());
        let invalid = james("a", "09:00", "09:30")
            .recurring(RecurrencePattern::daily().with_occurrence_count(0));
        assert!(matches!(
            calendar.create_template(invalid),
            Err(ScheduleError::Range(_))
        ));

        calendar.create_template(james("a", "09:00", "09:30")).expect("create");
        assert_eq!(calendar.templates().expect("templates").len(), 1);
        calendar.delete_template("a").expect("delete");
        assert!(calendar.get_events_for_date("2024-03-05").expect("query").is_empty());
        assert!(matches!(
            calendar.delete_template("a"),
            Err(ScheduleError::NotFound { .. })
        ));
    }

    #[test]
    fn time_of_day_groups_follow_configured_boundaries() {
        let calendar = service(vec![
            james("breakfast", "08:00", "08:30"),
            james("lunch", "12:00", "12:30"),
            james("dinner", "17:00", "17:30"),
        ]);
        let events = calendar.get_events_for_date("2024-03-05").expect("query");
        let groups = calendar.group_by_time_of_day(&events);
        assert_eq!(groups.morning.len(), 1);
        assert_eq!(groups.afternoon.len(), 1);
        assert_eq!(groups.evening.len(), 1);
        assert_eq!(
            calendar.group_by_weekday(&events).get(&Weekday::Tue).map(Vec::len),
            Some(3)
        );
    }

    #[test]
    fn completed_status_counts_for_single_templates_only() {
        let calendar = service(vec![
            EventTemplate::new("gp", "GP visit", Category::Appointment, "2024-03-05", "10:00")
                .with_status(TemplateStatus::Completed),
            EventTemplate::new("meds", "Meds", Category::Medication, "2024-03-01", "08:00")
                .with_status(TemplateStatus::Completed)
                .recurring(RecurrencePattern::daily()),
        ]);

        let events = calendar.get_events_for_date("2024-03-05").expect("query");
        let flags = events
            .iter()
            .map(|item| (item.template_id.as_str(), item.is_completed))
            .collect::<Vec<_>>();
        assert_eq!(flags, vec![("meds", false), ("gp", true)]);
        assert!(calendar.is_task_completed("gp:2024-03-05"));
        assert!(!calendar.is_task_completed("gp:2024-03-06"));
        assert!(!calendar.is_task_completed("meds:2024-03-05"));

        assert!(!calendar.toggle_task_completion("gp:2024-03-05").expect("toggle"));
        assert!(!calendar.is_task_completed("gp:2024-03-05"));
        assert!(!calendar.get_events_for_date("2024-03-05").expect("query")[1].is_completed);
        assert!(calendar.toggle_task_completion("meds:2024-03-05").expect("toggle"));
    }

    #[test]
    fn storage_failure_on_toggle_keeps_history() {
        let store = Arc::new(UnreliableStore::default());
        let calendar = CalendarService::new(
            Arc::new(InMemoryTemplateRepository::with_templates(vec![EventTemplate::new(
                "meds",
                "Meds",
                Category::Medication,
                "2024-03-01",
                "08:00",
            )
            .recurring(RecurrencePattern::daily())])),
            Arc::clone(&store),
            &EngineConfig::default(),
        )
        .expect("service");
        calendar.set_task_completion("meds:2024-03-01", true).expect("set");
        calendar.set_task_completion("meds:2024-03-02", true).expect("set");

        store.fail_reads(true);
        assert!(matches!(
            calendar.toggle_task_completion("meds:2024-03-05"),
            Err(ScheduleError::Storage(_))
        ));
        assert!(calendar.set_task_completion("meds:2024-03-05", true).is_err());

        store.fail_reads(false);
        assert!(calendar.is_task_completed("meds:2024-03-01"));
        assert!(calendar.is_task_completed("meds:2024-03-02"));
        assert!(!calendar.is_task_completed("meds:2024-03-05"));
    }

    #[test]
    fn mutations_on_dates_outside_the_series_are_not_found() {
        let calendar = service(vec![
            james("gp", "10:00", "10:30"),
            EventTemplate::new("pt", "Physio", Category::Therapy, "2024-01-01", "10:00")
                .recurring(RecurrencePattern::weekly([1])),
        ]);
        assert!(matches!(
            calendar.toggle_task_completion("gp:2099-01-01"),
            Err(ScheduleError::NotFound { kind: "occurrence", .. })
        ));
        assert!(matches!(
            calendar.set_task_completion("pt:2024-01-16", true),
            Err(ScheduleError::NotFound { kind: "occurrence", .. })
        ));
        assert!(matches!(
            calendar.override_occurrence("pt:2024-01-16", OccurrenceOverride::cancelled()),
            Err(ScheduleError::NotFound { .. })
        ));
        assert!(calendar.toggle_task_completion("pt:2024-01-15").expect("toggle"));
    }

    #[test]
    fn day_views_past_the_calendar_end_are_range_errors() {
        let calendar = service(Vec::new());
        assert!(matches!(
            calendar.get_days("2024-03-05", usize::MAX),
            Err(ScheduleError::Range(_))
        ));
        assert!(calendar.get_days("2024-03-05", 0).expect("empty view").is_empty());
    }

    // Property: a completion record outlives any title or start-time edit of its template
    proptest! {
        #[test]
        fn property_completion_durable_across_edits(
            title in "[A-Za-z][A-Za-z ]{0,19}",
            hour in 0u32..23,
            minute in 0u32..60,
            complete in any::<bool>(),
        ) {
            let calendar = service(vec![EventTemplate::new(
                "meds",
                "Meds",
                Category::Medication,
                "2024-03-01",
                "08:00",
            )
            .recurring(RecurrencePattern::daily())]);
            calendar.set_task_completion("meds:2024-03-05", complete).expect("set");

            let mut edited = calendar.template("meds").expect("template");
            edited.title = title;
            edited.start_time = format!("{hour:02}:{minute:02}");
            calendar.update_template(edited).expect("update");

            let events = calendar.get_events_for_date("2024-03-05").expect("query");
            prop_assert_eq!(events.len(), 1);
            prop_assert_eq!(events[0].is_completed, complete);
        }
    }

    // Property: a day never lists the same template twice
    proptest! {
        #[test]
        fn property_no_duplicate_occurrences(
            offsets in proptest::collection::vec(0i64..60, 1..12),
            day in 0i64..60,
        ) {
            let base = parse_date("2024-01-01").expect("base");
            let templates = offsets
                .iter()
                .enumerate()
                .map(|(index, offset)| {
                    let due = format_date(base + Duration::days(*offset));
                    let template = EventTemplate::new(
                        format!("t{index}"),
                        "Item",
                        Category::Other,
                        due,
                        "09:00",
                    );
                    if index % 2 == 0 {
                        template.recurring(RecurrencePattern::daily())
                    } else {
                        template
                    }
                })
                .collect::<Vec<_>>();
            let calendar = service(templates);
            let date = format_date(base + Duration::days(day));
            let events = calendar.get_events_for_date(&date).expect("query");
            let mut template_ids = events.iter().map(|item| item.template_id.clone()).collect::<Vec<_>>();
            template_ids.sort();
            template_ids.dedup();
            prop_assert_eq!(template_ids.len(), events.len());
        }
    }
}
