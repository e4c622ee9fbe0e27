//! Scheduling core for a shared care-team calendar: recurring templates are expanded into
//! dated occurrences, annotated with same-assignee conflicts and per-occurrence completion.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::bootstrap::{bootstrap_workspace, open_workspace, SqliteCalendarService};
pub use application::calendar::{CalendarService, EventFilter, InMemoryCalendarService};
pub use application::overrides::OccurrenceOverride;
pub use domain::error::{ScheduleError, ScheduleResult};
pub use domain::models::{
    Category, EventTemplate, Priority, RecurrencePattern, RecurrenceType, TemplateStatus,
};
pub use domain::occurrence::Occurrence;
pub use infrastructure::config::EngineConfig;
pub use infrastructure::error::InfraError;
