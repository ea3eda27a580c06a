use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::Source;
use crate::ranking::SortMode;

const APP_DIR_NAME: &str = "tabseek";
const CONFIG_FILE_NAME: &str = "config.toml";
const SETTINGS_FILE_NAME: &str = "settings.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid toml in {path}: {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid json5 in {path}: {message}")]
    Json5 { path: PathBuf, message: String },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub max_results: u16,
    pub default_source: Source,
    pub default_sort: SortMode,
    pub lookup_batch_size: u16,
    pub history_window_days: u32,
    pub history_max_results: u32,
    pub download_max_results: u32,
    pub rarely_used_max_visits: u32,
    pub dormant_days: u32,
    pub log_level: String,
    pub profile_dir: Option<PathBuf>,
    pub settings_path: PathBuf,
    #[serde(skip)]
    pub config_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let base = stable_app_data_dir();
        Self {
            max_results: 500,
            default_source: Source::Bookmarks,
            default_sort: SortMode::Smart,
            lookup_batch_size: 50,
            history_window_days: 30,
            history_max_results: 1000,
            download_max_results: 1000,
            rarely_used_max_visits: 2,
            dormant_days: 180,
            log_level: "info".to_string(),
            profile_dir: None,
            settings_path: base.join(SETTINGS_FILE_NAME),
            config_path: base.join(CONFIG_FILE_NAME),
        }
    }
}

pub fn stable_app_data_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR_NAME)
}

pub fn default_config_path() -> PathBuf {
    stable_app_data_dir().join(CONFIG_FILE_NAME)
}

/// Reads `path` (or the default location). A missing file yields defaults.
/// `.json`/`.json5` files are parsed as JSON5, anything else as TOML.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(Config {
            config_path: path,
            ..Config::default()
        });
    }

    let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    let mut cfg: Config = if is_json(&path) {
        json5::from_str(&raw).map_err(|e| ConfigError::Json5 {
            path: path.clone(),
            message: e.to_string(),
        })?
    } else {
        toml::from_str(&raw).map_err(|source| ConfigError::Toml {
            path: path.clone(),
            source,
        })?
    };
    cfg.config_path = path;

    validate(&cfg).map_err(ConfigError::Invalid)?;
    Ok(cfg)
}

pub fn save(cfg: &Config) -> Result<(), ConfigError> {
    validate(cfg).map_err(ConfigError::Invalid)?;
    let path = &cfg.config_path;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
            path: path.clone(),
            source,
        })?;
    }
    let content = toml::to_string_pretty(cfg)?;
    fs::write(path, content).map_err(|source| ConfigError::Write {
        path: path.clone(),
        source,
    })
}

pub fn validate(cfg: &Config) -> Result<(), String> {
    if !(5..=5000).contains(&cfg.max_results) {
        return Err("max_results must be between 5 and 5000".into());
    }

    if !(1..=500).contains(&cfg.lookup_batch_size) {
        return Err("lookup_batch_size must be between 1 and 500".into());
    }

    if cfg.history_window_days == 0 {
        return Err("history_window_days must be at least 1".into());
    }

    if cfg.history_max_results == 0 || cfg.download_max_results == 0 {
        return Err("history and download result caps must be at least 1".into());
    }

    if cfg.dormant_days == 0 {
        return Err("dormant_days must be at least 1".into());
    }

    if cfg.log_level.trim().is_empty() {
        return Err("log_level is required".into());
    }

    if cfg.settings_path.as_os_str().is_empty() {
        return Err("settings_path is required".into());
    }

    Ok(())
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json") || ext.eq_ignore_ascii_case("json5"))
        .unwrap_or(false)
}
