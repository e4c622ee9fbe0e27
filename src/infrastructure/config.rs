use crate::domain::conflict::TEAM_ASSIGNEE;
use crate::domain::grouping::TimeOfDayBoundaries;
use crate::domain::recurrence::DEFAULT_DURATION_MINUTES;
use crate::domain::time::{parse_weekday, weekday_name};
use crate::infrastructure::error::InfraError;
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const ENGINE_JSON: &str = "engine.json";
const SCHEMA_VERSION: u64 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(default = "default_week_start")]
    pub week_starts_on: String,
    #[serde(default = "default_unassigned")]
    pub unassigned_assignees: Vec<String>,
    #[serde(default = "default_duration")]
    pub default_duration_minutes: u32,
    #[serde(default = "default_afternoon")]
    pub afternoon_starts_at: String,
    #[serde(default = "default_evening")]
    pub evening_starts_at: String,
}

fn default_week_start() -> String {
    weekday_name(Weekday::Sun).to_string()
}

fn default_unassigned() -> Vec<String> {
    vec![TEAM_ASSIGNEE.to_string()]
}

fn default_duration() -> u32 {
    DEFAULT_DURATION_MINUTES
}

fn default_afternoon() -> String {
    "12:00".to_string()
}

fn default_evening() -> String {
    "17:00".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            week_starts_on: default_week_start(),
            unassigned_assignees: default_unassigned(),
            default_duration_minutes: default_duration(),
            afternoon_starts_at: default_afternoon(),
            evening_starts_at: default_evening(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), InfraError> {
        self.first_weekday()?;
        let boundaries = self.time_of_day_boundaries()?;
        if boundaries.evening_start < boundaries.afternoon_start {
            return Err(InfraError::InvalidConfig(
                "eveningStartsAt must not be before afternoonStartsAt".to_string(),
            ));
        }
        if self.default_duration_minutes == 0 {
            return Err(InfraError::InvalidConfig(
                "defaultDurationMinutes must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn first_weekday(&self) -> Result<Weekday, InfraError> {
        parse_weekday(&self.week_starts_on).ok_or_else(|| {
            InfraError::InvalidConfig(format!(
                "weekStartsOn must be a weekday name, got '{}'",
                self.week_starts_on
            ))
        })
    }

    pub fn time_of_day_boundaries(&self) -> Result<TimeOfDayBoundaries, InfraError> {
        TimeOfDayBoundaries::parse(&self.afternoon_starts_at, &self.evening_starts_at)
            .map_err(|error| InfraError::InvalidConfig(error.to_string()))
    }
}

fn default_document() -> Result<serde_json::Value, InfraError> {
    let mut value = serde_json::to_value(EngineConfig::default())?;
    if let Some(object) = value.as_object_mut() {
        object.insert("schema".to_string(), serde_json::json!(SCHEMA_VERSION));
    }
    Ok(value)
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    let path = config_dir.join(ENGINE_JSON);
    if !path.exists() {
        let formatted = serde_json::to_string_pretty(&default_document()?)?;
        fs::write(path, format!("{formatted}\n"))?;
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != SCHEMA_VERSION {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn load_engine_config(config_dir: &Path) -> Result<EngineConfig, InfraError> {
    let parsed = read_config(&config_dir.join(ENGINE_JSON))?;
    let config: EngineConfig = serde_json::from_value(parsed)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_DIR: AtomicUsize = AtomicUsize::new(0);

    struct TempConfigDir {
        path: PathBuf,
    }

    impl TempConfigDir {
        fn new() -> Self {
            let sequence = NEXT_TEMP_DIR.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "carecal-config-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp config dir");
            Self { path }
        }
    }

    impl Drop for TempConfigDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    #[test]
    fn defaults_are_written_and_loaded() {
        let dir = TempConfigDir::new();
        ensure_default_configs(&dir.path).expect("write defaults");
        let config = load_engine_config(&dir.path).expect("load defaults");
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.first_weekday().expect("weekday"), Weekday::Sun);
    }

    #[test]
    fn existing_config_is_not_overwritten() {
        let dir = TempConfigDir::new();
        fs::write(
            dir.path.join(ENGINE_JSON),
            r#"{"schema": 1, "weekStartsOn": "Monday", "unassignedAssignees": ["team", "family"]}"#,
        )
        .expect("seed config");
        ensure_default_configs(&dir.path).expect("ensure defaults");

        let config = load_engine_config(&dir.path).expect("load config");
        assert_eq!(config.first_weekday().expect("weekday"), Weekday::Mon);
        assert_eq!(config.unassigned_assignees, vec!["team", "family"]);
        assert_eq!(config.default_duration_minutes, DEFAULT_DURATION_MINUTES);
    }

    #[test]
    fn unsupported_schema_is_rejected() {
        let dir = TempConfigDir::new();
        fs::write(dir.path.join(ENGINE_JSON), r#"{"schema": 2}"#).expect("seed config");
        match load_engine_config(&dir.path) {
            Err(InfraError::InvalidConfig(message)) => assert!(message.contains("unsupported schema")),
            other => panic!("expected invalid config, got {other:?}"),
        }
    }

    #[test]
    fn invalid_values_are_rejected() {
        let dir = TempConfigDir::new();
        fs::write(
            dir.path.join(ENGINE_JSON),
            r#"{"schema": 1, "weekStartsOn": "someday"}"#,
        )
        .expect("seed config");
        assert!(matches!(
            load_engine_config(&dir.path),
            Err(InfraError::InvalidConfig(_))
        ));

        let reversed = EngineConfig {
            afternoon_starts_at: "18:00".to_string(),
            evening_starts_at: "17:00".to_string(),
            ..EngineConfig::default()
        };
        assert!(reversed.validate().is_err());
    }
}
