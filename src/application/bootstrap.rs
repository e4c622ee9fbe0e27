use crate::application::calendar::CalendarService;
use crate::domain::error::ScheduleResult;
use crate::infrastructure::config::{ensure_default_configs, load_engine_config, EngineConfig};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::kv_store::SqliteKeyValueStore;
use crate::infrastructure::logging::init_command_log;
use crate::infrastructure::template_repository::KeyValueTemplateRepository;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

pub const DATABASE_FILE: &str = "carecal.sqlite";

pub type SqliteCalendarService =
    CalendarService<KeyValueTemplateRepository<SqliteKeyValueStore>, SqliteKeyValueStore>;

#[derive(Debug)]
pub struct BootstrapResult {
    pub workspace_root: PathBuf,
    pub database_path: PathBuf,
    pub logs_dir: PathBuf,
    pub config: EngineConfig,
}

pub fn bootstrap_workspace(workspace_root: &Path) -> Result<BootstrapResult, InfraError> {
    let config_dir = workspace_root.join("config");
    let state_dir = workspace_root.join("state");
    let logs_dir = workspace_root.join("logs");
    let database_path = state_dir.join(DATABASE_FILE);

    fs::create_dir_all(&config_dir)?;
    fs::create_dir_all(&state_dir)?;
    fs::create_dir_all(&logs_dir)?;

    ensure_default_configs(&config_dir)?;
    let config = load_engine_config(&config_dir)?;
    SqliteKeyValueStore::open(&database_path)?;

    Ok(BootstrapResult {
        workspace_root: workspace_root.to_path_buf(),
        database_path,
        logs_dir,
        config,
    })
}

/// Bootstraps `workspace_root` and returns a service backed by its SQLite database.
pub fn open_workspace(workspace_root: &Path) -> ScheduleResult<SqliteCalendarService> {
    let bootstrap = bootstrap_workspace(workspace_root)?;
    init_command_log(&bootstrap.logs_dir)?;

    let state = Arc::new(SqliteKeyValueStore::open(&bootstrap.database_path)?);
    let repository = Arc::new(KeyValueTemplateRepository::new(Arc::clone(&state)));
    let service = CalendarService::new(repository, state, &bootstrap.config)?;
    info!(
        workspace = %bootstrap.workspace_root.display(),
        database = %bootstrap.database_path.display(),
        "workspace opened"
    );
    Ok(service)
}
