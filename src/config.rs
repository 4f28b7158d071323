use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AppError, Result};
use crate::models::HighlightColor;
use crate::storage::{BackendKind, StorageLocations, DEFAULT_QUOTA_BYTES};

const APP_DIR: &str = "folio-reader";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,

    /// Tried in order when a session starts.
    #[serde(default = "default_storage_backends")]
    pub storage_backends: Vec<BackendKind>,

    #[serde(default = "default_scroll_debounce_ms")]
    pub scroll_debounce_ms: u64,

    #[serde(default = "default_completion_threshold")]
    pub completion_threshold: f64,

    /// Rows; a stored position at or above the top of this many rows starts fresh.
    #[serde(default = "default_resume_threshold")]
    pub resume_threshold: f64,

    #[serde(default)]
    pub default_color: HighlightColor,

    #[serde(default = "default_key_value_quota")]
    pub key_value_quota_bytes: usize,

    #[serde(default = "default_min_selection_chars")]
    pub min_selection_chars: usize,
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn default_export_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn default_storage_backends() -> Vec<BackendKind> {
    BackendKind::DEFAULT_PREFERENCE.to_vec()
}

fn default_scroll_debounce_ms() -> u64 {
    500
}

fn default_completion_threshold() -> f64 {
    90.0
}

fn default_resume_threshold() -> f64 {
    5.0
}

fn default_key_value_quota() -> usize {
    DEFAULT_QUOTA_BYTES
}

fn default_min_selection_chars() -> usize {
    4
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            export_dir: default_export_dir(),
            storage_backends: default_storage_backends(),
            scroll_debounce_ms: default_scroll_debounce_ms(),
            completion_threshold: default_completion_threshold(),
            resume_threshold: default_resume_threshold(),
            default_color: HighlightColor::default(),
            key_value_quota_bytes: default_key_value_quota(),
            min_selection_chars: default_min_selection_chars(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.completion_threshold) {
            return Err(AppError::Config(format!(
                "completion_threshold must be within 0..=100, got {}",
                self.completion_threshold
            )));
        }
        if self.min_selection_chars == 0 {
            return Err(AppError::Config("min_selection_chars must be at least 1".into()));
        }
        Ok(())
    }

    pub fn storage_locations(&self) -> StorageLocations {
        StorageLocations {
            sqlite_path: self.data_dir.join("reading.db"),
            object_store_dir: self.data_dir.join("stores"),
            key_value_path: self.data_dir.join("local-storage.json"),
            key_value_quota_bytes: self.key_value_quota_bytes,
        }
    }

    /// Kept apart from the backend files so a backend failure never loses it.
    pub fn preferences_path(&self) -> PathBuf {
        self.data_dir.join("preferences.json")
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join("folio.log")
    }
}
