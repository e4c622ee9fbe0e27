pub mod conflict;
pub mod error;
pub mod grouping;
pub mod models;
pub mod occurrence;
pub mod recurrence;
pub mod time;
