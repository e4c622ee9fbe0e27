pub mod bootstrap;
pub mod calendar;
pub mod completion;
pub mod occurrence_store;
pub mod overrides;
