//! User settings consumed by the registry
//!
//! Settings live in a `watch` channel so every key can be observed: a
//! subscriber gets the current value immediately and then each change of
//! that key. When opened from a file, every change is written back as TOML.

use crate::error::{Error, Result};
use crate::reactive::{distinct_until_changed, watch_stream};
use futures::stream::{BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// How enabled sources are ordered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// User-defined positions (sort keys)
    #[default]
    Manual,
    /// By title, case-insensitive
    Alphabetic,
    /// Pinned sources first, then by title
    AlphabeticPinned,
}

impl std::fmt::Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortOrder::Manual => write!(f, "manual"),
            SortOrder::Alphabetic => write!(f, "alphabetic"),
            SortOrder::AlphabeticPinned => write!(f, "alphabetic_pinned"),
        }
    }
}

impl FromStr for SortOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "manual" => Ok(SortOrder::Manual),
            "alphabetic" => Ok(SortOrder::Alphabetic),
            "alphabetic_pinned" | "pinned" => Ok(SortOrder::AlphabeticPinned),
            _ => Err(Error::Config(format!("Unknown sort order: {}", s))),
        }
    }
}

/// Snapshot of all settings the registry reads
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    /// Hide adult-content sources everywhere
    #[serde(default)]
    pub nsfw_disabled: bool,

    #[serde(default)]
    pub sources_sort_order: SortOrder,

    /// Last app version whose new sources the user acknowledged (0 = never)
    #[serde(default)]
    pub sources_version: i64,

    /// Do not record source usage
    #[serde(default)]
    pub incognito_mode: bool,

    /// Do not record usage of adult-content sources
    #[serde(default)]
    pub history_exclude_nsfw: bool,
}

/// Named settings keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    NsfwDisabled,
    SourcesSortOrder,
    SourcesVersion,
    IncognitoMode,
    HistoryExcludeNsfw,
}

impl SettingKey {
    pub const ALL: [SettingKey; 5] = [
        SettingKey::NsfwDisabled,
        SettingKey::SourcesSortOrder,
        SettingKey::SourcesVersion,
        SettingKey::IncognitoMode,
        SettingKey::HistoryExcludeNsfw,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::NsfwDisabled => "nsfw_disabled",
            SettingKey::SourcesSortOrder => "sources_sort_order",
            SettingKey::SourcesVersion => "sources_version",
            SettingKey::IncognitoMode => "incognito_mode",
            SettingKey::HistoryExcludeNsfw => "history_exclude_nsfw",
        }
    }

    /// Render this key's current value
    pub fn read(&self, settings: &UserSettings) -> String {
        match self {
            SettingKey::NsfwDisabled => settings.nsfw_disabled.to_string(),
            SettingKey::SourcesSortOrder => settings.sources_sort_order.to_string(),
            SettingKey::SourcesVersion => settings.sources_version.to_string(),
            SettingKey::IncognitoMode => settings.incognito_mode.to_string(),
            SettingKey::HistoryExcludeNsfw => settings.history_exclude_nsfw.to_string(),
        }
    }

    /// Parse `value` and store it under this key
    pub fn write(&self, settings: &mut UserSettings, value: &str) -> Result<()> {
        match self {
            SettingKey::NsfwDisabled => settings.nsfw_disabled = parse_bool(self, value)?,
            SettingKey::SourcesSortOrder => settings.sources_sort_order = value.parse()?,
            SettingKey::SourcesVersion => {
                settings.sources_version = value.parse().map_err(|_| {
                    Error::Config(format!("{} expects an integer, got '{}'", self.as_str(), value))
                })?
            }
            SettingKey::IncognitoMode => settings.incognito_mode = parse_bool(self, value)?,
            SettingKey::HistoryExcludeNsfw => {
                settings.history_exclude_nsfw = parse_bool(self, value)?
            }
        }
        Ok(())
    }
}

impl FromStr for SettingKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.to_lowercase().replace('-', "_");
        SettingKey::ALL
            .into_iter()
            .find(|key| key.as_str() == normalized)
            .ok_or_else(|| Error::UnknownSetting(s.to_string()))
    }
}

fn parse_bool(key: &SettingKey, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        _ => Err(Error::Config(format!(
            "{} expects a boolean, got '{}'",
            key.as_str(),
            value
        ))),
    }
}

struct SettingsInner {
    state: watch::Sender<UserSettings>,
    path: Option<PathBuf>,
}

/// Observable settings store
#[derive(Clone)]
pub struct AppSettings {
    inner: Arc<SettingsInner>,
}

impl AppSettings {
    /// Settings held only in memory
    pub fn in_memory(initial: UserSettings) -> Self {
        Self::with_path(initial, None)
    }

    /// Load settings from a TOML file, or start from defaults if it is missing
    pub fn open(path: &Path) -> Result<Self> {
        let initial = if path.exists() {
            debug!("Loading settings from {:?}", path);
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            debug!("No settings file at {:?}, using defaults", path);
            UserSettings::default()
        };
        Ok(Self::with_path(initial, Some(path.to_path_buf())))
    }

    fn with_path(initial: UserSettings, path: Option<PathBuf>) -> Self {
        let (state, _) = watch::channel(initial);
        Self {
            inner: Arc::new(SettingsInner { state, path }),
        }
    }

    /// Current snapshot
    pub fn get(&self) -> UserSettings {
        self.inner.state.borrow().clone()
    }

    pub fn is_nsfw_disabled(&self) -> bool {
        self.inner.state.borrow().nsfw_disabled
    }

    pub fn sort_order(&self) -> SortOrder {
        self.inner.state.borrow().sources_sort_order
    }

    pub fn sources_version(&self) -> i64 {
        self.inner.state.borrow().sources_version
    }

    pub fn is_incognito_mode(&self) -> bool {
        self.inner.state.borrow().incognito_mode
    }

    pub fn is_history_exclude_nsfw(&self) -> bool {
        self.inner.state.borrow().history_exclude_nsfw
    }

    /// Apply a change; subscribers are woken only if something changed
    ///
    /// The change is persisted before it becomes visible. If persisting
    /// fails the in-memory settings are left untouched.
    pub fn update<F: FnOnce(&mut UserSettings)>(&self, mutate: F) -> Result<()> {
        let mut outcome = Ok(());
        self.inner.state.send_if_modified(|current| {
            let mut next = current.clone();
            mutate(&mut next);
            if next == *current {
                return false;
            }
            if let Some(path) = &self.inner.path {
                if let Err(e) = persist(path, &next) {
                    outcome = Err(e);
                    return false;
                }
            }
            *current = next;
            true
        });
        outcome
    }

    /// Set a key from its textual form
    pub fn set(&self, key: SettingKey, value: &str) -> Result<()> {
        let mut parsed = Ok(());
        self.update(|settings| parsed = key.write(settings, value))?;
        parsed
    }

    pub fn set_nsfw_disabled(&self, value: bool) -> Result<()> {
        self.update(|s| s.nsfw_disabled = value)
    }

    pub fn set_sort_order(&self, value: SortOrder) -> Result<()> {
        self.update(|s| s.sources_sort_order = value)
    }

    pub fn set_sources_version(&self, value: i64) -> Result<()> {
        self.update(|s| s.sources_version = value)
    }

    pub fn set_incognito_mode(&self, value: bool) -> Result<()> {
        self.update(|s| s.incognito_mode = value)
    }

    pub fn set_history_exclude_nsfw(&self, value: bool) -> Result<()> {
        self.update(|s| s.history_exclude_nsfw = value)
    }

    /// Observe one projection of the settings
    ///
    /// Emits the current value right away, then once per change of the
    /// projected value.
    pub fn observe<T, F>(&self, select: F) -> BoxStream<'static, T>
    where
        T: Clone + PartialEq + Send + 'static,
        F: Fn(&UserSettings) -> T + Send + 'static,
    {
        let values = watch_stream(self.inner.state.subscribe()).map(move |s| select(&s));
        distinct_until_changed(values)
    }

    pub fn observe_nsfw_disabled(&self) -> BoxStream<'static, bool> {
        self.observe(|s| s.nsfw_disabled)
    }

    pub fn observe_sort_order(&self) -> BoxStream<'static, SortOrder> {
        self.observe(|s| s.sources_sort_order)
    }

    pub fn observe_sources_version(&self) -> BoxStream<'static, i64> {
        self.observe(|s| s.sources_version)
    }
}

fn persist(path: &Path, settings: &UserSettings) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(settings)?;
    std::fs::write(path, content)?;
    debug!("Saved settings to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = AppSettings::in_memory(UserSettings::default());
        assert!(!settings.is_nsfw_disabled());
        assert_eq!(settings.sort_order(), SortOrder::Manual);
        assert_eq!(settings.sources_version(), 0);
    }

    #[test]
    fn test_persist_round_trip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.toml");

        let settings = AppSettings::open(&path).unwrap();
        settings.set_nsfw_disabled(true).unwrap();
        settings.set_sort_order(SortOrder::AlphabeticPinned).unwrap();
        assert!(path.exists());

        let reopened = AppSettings::open(&path).unwrap();
        assert!(reopened.is_nsfw_disabled());
        assert_eq!(reopened.sort_order(), SortOrder::AlphabeticPinned);
    }

    #[test]
    fn test_set_by_key() {
        let settings = AppSettings::in_memory(UserSettings::default());
        let key: SettingKey = "incognito-mode".parse().unwrap();
        settings.set(key, "on").unwrap();
        assert!(settings.is_incognito_mode());

        settings.set(SettingKey::SourcesSortOrder, "alphabetic").unwrap();
        assert_eq!(settings.sort_order(), SortOrder::Alphabetic);

        assert!(settings.set(SettingKey::SourcesVersion, "abc").is_err());
        assert!(settings.set(SettingKey::NsfwDisabled, "maybe").is_err());
        assert!(matches!(
            "colour".parse::<SettingKey>(),
            Err(Error::UnknownSetting(_))
        ));
    }

    #[tokio::test]
    async fn test_observe_emits_current_then_key_changes() {
        let settings = AppSettings::in_memory(UserSettings::default());
        let mut nsfw = settings.observe_nsfw_disabled();

        assert_eq!(nsfw.next().await, Some(false));

        // A different key changing does not re-emit this one
        settings.set_incognito_mode(true).unwrap();
        settings.set_nsfw_disabled(true).unwrap();
        assert_eq!(nsfw.next().await, Some(true));
    }

    #[test]
    fn test_set_keeps_concurrent_changes_to_other_keys() {
        let settings = AppSettings::in_memory(UserSettings::default());

        let version = {
            let settings = settings.clone();
            std::thread::spawn(move || {
                for i in 1..=200 {
                    settings.set(SettingKey::SourcesVersion, &i.to_string()).unwrap();
                }
            })
        };
        let incognito = {
            let settings = settings.clone();
            std::thread::spawn(move || {
                for i in 1..=200 {
                    let value = if i % 2 == 0 { "true" } else { "false" };
                    settings.set(SettingKey::IncognitoMode, value).unwrap();
                }
            })
        };
        version.join().unwrap();
        incognito.join().unwrap();

        assert_eq!(settings.sources_version(), 200);
        assert!(settings.is_incognito_mode());
    }

    #[test]
    fn test_set_rejects_bad_value_without_change() {
        let settings = AppSettings::in_memory(UserSettings::default());
        let rx = settings.inner.state.subscribe();
        assert!(settings.set(SettingKey::SourcesVersion, "soon").is_err());
        assert_eq!(settings.sources_version(), 0);
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_unchanged_update_does_not_notify() {
        let settings = AppSettings::in_memory(UserSettings::default());
        let rx = settings.inner.state.subscribe();
        settings.set_sort_order(SortOrder::Manual).unwrap();
        assert!(!rx.has_changed().unwrap());
    }
}
