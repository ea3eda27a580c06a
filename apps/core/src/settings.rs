use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

pub const SETTINGS_KEY: &str = "settings";
pub const OPTIONS_SETTINGS_KEY: &str = "optionsSettings";
pub const MAX_FRIEND_LINKS: usize = 20;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings store io error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("settings value is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("{0}")]
    Invalid(String),
    #[error("settings store lock poisoned")]
    Poisoned,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    System,
    Light,
    Dark,
}

impl Theme {
    pub fn is_dark(self, system_prefers_dark: bool) -> bool {
        match self {
            Self::Dark => true,
            Self::Light => false,
            Self::System => system_prefers_dark,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontSize {
    Small,
    #[default]
    Medium,
    Large,
}

impl FontSize {
    pub fn css_value(self) -> &'static str {
        match self {
            Self::Small => "12px",
            Self::Medium => "14px",
            Self::Large => "16px",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineHeight {
    Compact,
    #[default]
    Normal,
    Relaxed,
}

impl LineHeight {
    pub fn css_value(self) -> &'static str {
        match self {
            Self::Compact => "1.3",
            Self::Normal => "1.5",
            Self::Relaxed => "1.7",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendLink {
    pub name: String,
    pub url: String,
}

impl FriendLink {
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UiSettings {
    pub theme: Theme,
    pub font_size: FontSize,
    pub line_height: LineHeight,
    pub animation: bool,
    pub high_contrast: bool,
    // Clicking a tab of a saved group reopens every tab of that group.
    pub group_child_click_restore_all: bool,
    pub friend_links: Vec<FriendLink>,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            theme: Theme::System,
            font_size: FontSize::Medium,
            line_height: LineHeight::Normal,
            animation: true,
            high_contrast: false,
            group_child_click_restore_all: true,
            friend_links: vec![
                FriendLink::new("Rust", "https://www.rust-lang.org"),
                FriendLink::new("crates.io", "https://crates.io"),
                FriendLink::new("docs.rs", "https://docs.rs"),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appearance {
    pub dark: bool,
    pub high_contrast: bool,
    pub font_size: String,
    pub line_height: String,
    pub transition_duration: String,
}

impl UiSettings {
    pub fn appearance(&self, system_prefers_dark: bool) -> Appearance {
        Appearance {
            dark: self.theme.is_dark(system_prefers_dark),
            high_contrast: self.high_contrast,
            font_size: self.font_size.css_value().to_string(),
            line_height: self.line_height.css_value().to_string(),
            transition_duration: self.transition_duration().to_string(),
        }
    }

    fn transition_duration(&self) -> &'static str {
        if self.animation {
            "0.3s"
        } else {
            "0s"
        }
    }
}

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, SettingsError>;
    fn put(&self, key: &str, value: Value) -> Result<(), SettingsError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, SettingsError> {
        let values = self.values.lock().map_err(|_| SettingsError::Poisoned)?;
        Ok(values.get(key).cloned())
    }

    fn put(&self, key: &str, value: Value) -> Result<(), SettingsError> {
        let mut values = self.values.lock().map_err(|_| SettingsError::Poisoned)?;
        values.insert(key.to_string(), value);
        Ok(())
    }
}

// Every key lives in one JSON object on disk. A missing file reads as empty.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Map<String, Value>, SettingsError> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let raw = std::fs::read_to_string(&self.path).map_err(|source| SettingsError::Io {
            path: self.path.clone(),
            source,
        })?;
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        Ok(serde_json::from_str(&raw)?)
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>, SettingsError> {
        Ok(self.read_all()?.remove(key))
    }

    fn put(&self, key: &str, value: Value) -> Result<(), SettingsError> {
        let _guard = self.write_lock.lock().map_err(|_| SettingsError::Poisoned)?;
        let mut all = self.read_all()?;
        all.insert(key.to_string(), value);

        let io_error = |source| SettingsError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        let serialized = serde_json::to_string_pretty(&Value::Object(all))?;
        std::fs::write(&self.path, serialized).map_err(io_error)
    }
}

/// Options-page settings win over the legacy key; line height is not part
/// of the options page and stays at its default there.
pub fn load_settings(store: &dyn KeyValueStore) -> Result<UiSettings, SettingsError> {
    if let Some(options) = store.get(OPTIONS_SETTINGS_KEY)?.filter(Value::is_object) {
        let mut settings = merge_over_defaults(options)?;
        settings.line_height = LineHeight::default();
        return Ok(settings);
    }

    match store.get(SETTINGS_KEY)? {
        Some(stored) if stored.is_object() => merge_over_defaults(stored),
        _ => Ok(UiSettings::default()),
    }
}

// Validates and writes under the legacy key. When options-page settings
// exist they are updated too so the saved values take effect.
pub fn save_settings(
    store: &dyn KeyValueStore,
    settings: &UiSettings,
) -> Result<(), SettingsError> {
    validate_settings(settings).map_err(SettingsError::Invalid)?;
    let value = serde_json::to_value(settings)?;

    if let Some(Value::Object(mut options)) = store.get(OPTIONS_SETTINGS_KEY)? {
        if let Value::Object(fields) = &value {
            for (key, field) in fields {
                options.insert(key.clone(), field.clone());
            }
        }
        store.put(OPTIONS_SETTINGS_KEY, Value::Object(options))?;
    }
    store.put(SETTINGS_KEY, value)
}

pub fn validate_settings(settings: &UiSettings) -> Result<(), String> {
    validate_friend_links(&settings.friend_links)
}

pub fn validate_friend_links(links: &[FriendLink]) -> Result<(), String> {
    if links.len() > MAX_FRIEND_LINKS {
        return Err(format!("At most {MAX_FRIEND_LINKS} links are allowed."));
    }
    links.iter().try_for_each(validate_friend_link)
}

pub fn validate_friend_link(link: &FriendLink) -> Result<(), String> {
    if link.name.trim().is_empty() {
        return Err("Link name is required.".to_string());
    }
    let parsed = Url::parse(link.url.trim())
        .map_err(|_| format!("'{}' is not a valid URL.", link.url))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("Links must use http or https, not '{other}'.")),
    }
}

fn merge_over_defaults(stored: Value) -> Result<UiSettings, SettingsError> {
    let mut merged = serde_json::to_value(UiSettings::default())?;
    if let (Value::Object(base), Value::Object(overrides)) = (&mut merged, stored) {
        for (key, value) in overrides {
            if !value.is_null() {
                base.insert(key, value);
            }
        }
    }
    Ok(serde_json::from_value(merged)?)
}
