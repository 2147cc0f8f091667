use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{AppError, AppResult};

/// Settings namespace of this uploader in the shared settings file.
pub const UPLOADER_TYPE: &str = "pomf";

/// Key holding the host base URL inside the uploader namespace.
pub const URL_SETTING: &str = "pomf_url";

const CONFIG_DIR_NAME: &str = "Pomf Uploader";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Per-uploader key/value settings, keyed by uploader type.
    #[serde(default)]
    pub uploaders: HashMap<String, HashMap<String, serde_json::Value>>,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            uploaders: HashMap::new(),
            request_timeout_secs: default_timeout_secs(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    pub fn uploader_setting(&self, uploader_type: &str, key: &str) -> Option<&serde_json::Value> {
        self.uploaders
            .get(uploader_type)
            .and_then(|settings| settings.get(key))
    }

    pub fn set_uploader_setting(
        &mut self,
        uploader_type: &str,
        key: &str,
        value: serde_json::Value,
    ) {
        self.uploaders
            .entry(uploader_type.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn log_level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

/// Host settings the upload client works from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadConfig {
    pub base_url: String,
}

impl UploadConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// A missing or non-string `pomf_url` yields an empty base URL, which
    /// uploads report as an invalid uploader URL.
    pub fn from_settings(settings: &Settings) -> Self {
        let base_url = settings
            .uploader_setting(UPLOADER_TYPE, URL_SETTING)
            .and_then(|value| value.as_str())
            .unwrap_or_default()
            .to_string();

        Self { base_url }
    }
}

pub fn config_path() -> AppResult<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| AppError::Config("Could not find config directory".to_string()))?
        .join(CONFIG_DIR_NAME);

    fs::create_dir_all(&config_dir)?;
    Ok(config_dir.join("config.json"))
}

pub fn load_settings() -> AppResult<Settings> {
    load_settings_from(&config_path()?)
}

pub fn load_settings_from(path: &Path) -> AppResult<Settings> {
    if path.exists() {
        let settings_str = fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&settings_str).unwrap_or_else(|e| {
            log::warn!("Failed to parse settings file: {}. Using defaults.", e);
            Settings::default()
        });

        validate_settings(&settings)?;

        Ok(settings)
    } else {
        let settings = Settings::default();
        write_settings(path, &settings)?;
        Ok(settings)
    }
}

pub fn save_settings(settings: &Settings) -> AppResult<()> {
    save_settings_to(&config_path()?, settings)
}

pub fn save_settings_to(path: &Path, settings: &Settings) -> AppResult<()> {
    validate_settings(settings)?;
    write_settings(path, settings)
}

fn write_settings(path: &Path, settings: &Settings) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    if path.exists() {
        let backup_path = path.with_extension("json.bak");
        if let Err(e) = fs::copy(path, &backup_path) {
            log::warn!("Failed to create settings backup: {}", e);
        }
    }

    let settings_str = serde_json::to_string_pretty(settings)?;
    fs::write(path, settings_str)?;

    log::info!("Settings saved to {}", path.display());
    Ok(())
}

pub fn validate_settings(settings: &Settings) -> AppResult<()> {
    if settings.request_timeout_secs == 0 || settings.request_timeout_secs > 3600 {
        return Err(AppError::validation(
            "request_timeout_secs",
            "Must be between 1 and 3600",
        ));
    }

    let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
    if !valid_log_levels.contains(&settings.log_level.as_str()) {
        return Err(AppError::validation("log_level", "Must be a valid log level"));
    }

    Ok(())
}
