//! Command log: JSON lines written to `<logs_dir>/commands.log`.

use crate::infrastructure::error::InfraError;
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

pub const COMMAND_LOG_FILE: &str = "commands.log";

/// Installs the global subscriber. Returns `Ok(false)` when one was already installed.
pub fn init_command_log(logs_dir: &Path) -> Result<bool, InfraError> {
    fs::create_dir_all(logs_dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(logs_dir.join(COMMAND_LOG_FILE))?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    Ok(tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .is_ok())
}
