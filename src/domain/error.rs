//! Error taxonomy surfaced by the scheduling engine.

use crate::infrastructure::error::InfraError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScheduleError {
    /// A time or date string could not be read.
    #[error("{field} is malformed: '{value}'")]
    Parse { field: &'static str, value: String },
    /// A value parsed but violates a creation-time bound.
    #[error("out of range: {0}")]
    Range(String),
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("{kind} already exists: {id}")]
    AlreadyExists { kind: &'static str, id: String },
    #[error(transparent)]
    Storage(#[from] InfraError),
}

impl ScheduleError {
    pub fn parse(field: &'static str, value: impl Into<String>) -> Self {
        Self::Parse {
            field,
            value: value.into(),
        }
    }

    pub fn template_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "template",
            id: id.into(),
        }
    }
}

pub type ScheduleResult<T> = Result<T, ScheduleError>;
