pub mod config;
pub mod error;
pub mod kv_store;
pub mod logging;
pub mod template_repository;
