use directories::ProjectDirs;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{JsonMapError, Result};

pub const SETTINGS_FILE: &str = "settings.json";
pub const RECENT_FILES_KEY: &str = "recent_files";
const MAX_RECENT_DEFAULT: usize = 10;

#[derive(Debug, Clone)]
pub struct SettingsConfig {
    pub path: PathBuf,
    pub max_recent_files: usize,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        let path = std::env::var("JSONMAP_SETTINGS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_settings_path());
        Self {
            path,
            max_recent_files: std::env::var("JSONMAP_MAX_RECENT")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(MAX_RECENT_DEFAULT),
        }
    }
}

fn default_settings_path() -> PathBuf {
    match ProjectDirs::from("", "", "jsonmap") {
        Some(dirs) => dirs.config_dir().join(SETTINGS_FILE),
        None => PathBuf::from(SETTINGS_FILE),
    }
}

/// Key/value settings persisted as one JSON object. Every write is flushed
/// to disk immediately.
#[derive(Debug)]
pub struct SettingsStore {
    config: SettingsConfig,
    entries: Map<String, Value>,
}

impl SettingsStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_config(SettingsConfig {
            path: path.into(),
            ..SettingsConfig::default()
        })
    }

    pub fn with_config(config: SettingsConfig) -> Result<Self> {
        let entries = match fs::read_to_string(&config.path) {
            Ok(text) if text.trim().is_empty() => Map::new(),
            Ok(text) => match serde_json::from_str::<Value>(&text) {
                Ok(Value::Object(entries)) => entries,
                Ok(_) => {
                    return Err(JsonMapError::parse(
                        "json",
                        format!("{} does not hold a settings object", config.path.display()),
                    ));
                }
                Err(err) => return Err(JsonMapError::parse("json", err)),
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(err) => return Err(err.into()),
        };

        debug!(path = %config.path.display(), keys = entries.len(), "opened settings store");
        Ok(Self { config, entries })
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// `Value::Null` when the key was never set.
    pub fn get(&self, key: &str) -> Value {
        self.entries.get(key).cloned().unwrap_or(Value::Null)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Result<()> {
        self.entries.insert(key.into(), value);
        self.flush()
    }

    pub fn recent_files(&self) -> Vec<String> {
        match self.entries.get(RECENT_FILES_KEY) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            Some(other) => {
                warn!(value = %other, "ignoring malformed recent file list");
                Vec::new()
            }
            None => Vec::new(),
        }
    }

    /// Moves `path` to the front of the recent list, dropping older copies
    /// and anything past the configured limit.
    pub fn add_recent_file(&mut self, path: impl Into<String>) -> Result<Vec<String>> {
        let path = path.into();
        let mut recent = self.recent_files();
        recent.retain(|existing| *existing != path);
        recent.insert(0, path);
        recent.truncate(self.config.max_recent_files);

        let stored = recent.iter().cloned().map(Value::String).collect();
        self.set(RECENT_FILES_KEY, Value::Array(stored))?;
        Ok(recent)
    }

    fn flush(&self) -> Result<()> {
        if let Some(parent) = self.config.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let text = serde_json::to_string_pretty(&self.entries)
            .map_err(|err| JsonMapError::parse("json", err))?;
        fs::write(&self.config.path, text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> SettingsStore {
        SettingsStore::with_config(SettingsConfig {
            path: dir.path().join("nested").join(SETTINGS_FILE),
            max_recent_files: 10,
        })
        .unwrap()
    }

    #[test]
    fn missing_keys_read_as_null() {
        let dir = TempDir::new().unwrap();
        assert_eq!(store(&dir).get("theme"), Value::Null);
    }

    #[test]
    fn values_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let mut settings = store(&dir);
        settings.set("theme", json!("dark")).unwrap();
        settings.set("fontSize", json!(14)).unwrap();

        let reopened = SettingsStore::open(settings.path()).unwrap();
        assert_eq!(reopened.get("theme"), json!("dark"));
        assert_eq!(reopened.get("fontSize"), json!(14));
    }

    #[test]
    fn recent_files_are_deduplicated_and_capped() {
        let dir = TempDir::new().unwrap();
        let mut settings = store(&dir);
        for idx in 0..12 {
            settings.add_recent_file(format!("/data/{idx}.json")).unwrap();
        }
        let recent = settings.add_recent_file("/data/5.json").unwrap();

        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0], "/data/5.json");
        assert_eq!(recent[1], "/data/11.json");
        assert_eq!(recent.iter().filter(|p| *p == "/data/5.json").count(), 1);
        assert!(!recent.contains(&"/data/0.json".to_string()));
        assert_eq!(settings.recent_files(), recent);
    }

    #[test]
    fn corrupt_file_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, "[1, 2").unwrap();
        assert_eq!(SettingsStore::open(&path).unwrap_err().kind(), "parse");
    }
}
