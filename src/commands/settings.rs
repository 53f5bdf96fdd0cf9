//! Settings commands

use crate::error::Result;
use crate::registry::SourceRegistry;
use crate::settings::SettingKey;
use serde::{Deserialize, Serialize};
use tracing::info;

/// One setting rendered as text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingEntry {
    pub key: String,
    pub value: String,
}

fn entry(registry: &SourceRegistry, key: SettingKey) -> SettingEntry {
    SettingEntry {
        key: key.as_str().to_string(),
        value: key.read(&registry.settings().get()),
    }
}

/// Show one setting, or all of them
pub fn cmd_get_settings(registry: &SourceRegistry, key: Option<&str>) -> Result<Vec<SettingEntry>> {
    match key {
        Some(key) => Ok(vec![entry(registry, key.parse()?)]),
        None => Ok(SettingKey::ALL
            .into_iter()
            .map(|key| entry(registry, key))
            .collect()),
    }
}

/// Change one setting
pub fn cmd_set_setting(registry: &SourceRegistry, key: &str, value: &str) -> Result<SettingEntry> {
    let key: SettingKey = key.parse()?;
    registry.settings().set(key, value)?;
    info!("Set {} = {}", key.as_str(), value);
    Ok(entry(registry, key))
}

/// Acknowledge new sources
pub fn cmd_clear_badge(registry: &SourceRegistry) -> Result<SettingEntry> {
    registry.clear_new_sources_badge()?;
    Ok(entry(registry, SettingKey::SourcesVersion))
}

pub fn print_settings(entries: &[SettingEntry]) {
    for entry in entries {
        println!("{} = {}", entry.key, entry.value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::testing::ABC;
    use crate::catalog::Catalog;
    use crate::settings::{AppSettings, SortOrder, UserSettings};
    use crate::store::SourcesDb;
    use crate::Error;
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn setup(app_version: i64) -> (SourceRegistry, TempDir) {
        let tmp = TempDir::new().unwrap();
        let db = SourcesDb::new(&tmp.path().join("sources.db")).await.unwrap();
        let settings = AppSettings::in_memory(UserSettings::default());
        let catalog = Arc::new(Catalog::new(ABC, false));
        (SourceRegistry::new(db, settings, catalog, app_version), tmp)
    }

    #[tokio::test]
    async fn test_get_and_set() {
        let (registry, _tmp) = setup(1).await;
        assert_eq!(cmd_get_settings(&registry, None).unwrap().len(), 5);

        let set = cmd_set_setting(&registry, "sources-sort-order", "alphabetic-pinned").unwrap();
        assert_eq!(set.value, "alphabetic_pinned");
        assert_eq!(registry.settings().sort_order(), SortOrder::AlphabeticPinned);

        let shown = cmd_get_settings(&registry, Some("sources_sort_order")).unwrap();
        assert_eq!(shown, vec![set]);

        assert!(matches!(
            cmd_set_setting(&registry, "volume", "11"),
            Err(Error::UnknownSetting(_))
        ));
    }

    #[tokio::test]
    async fn test_clear_badge_records_version() {
        let (registry, _tmp) = setup(9).await;
        let entry = cmd_clear_badge(&registry).unwrap();
        assert_eq!(entry.value, "9");
        assert_eq!(registry.settings().sources_version(), 9);
    }
}
