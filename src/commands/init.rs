//! Init command implementation

use crate::config::Config;
use crate::error::{Error, Result};
use crate::registry::SourceRegistry;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

/// What `init` created
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitReport {
    pub config_path: String,
    pub db_path: String,
    pub catalog_sources: usize,
    pub stored_records: usize,
}

/// Write a default config, create the database and register the catalog
pub async fn cmd_init(base_dir: Option<PathBuf>, force: bool) -> Result<InitReport> {
    let mut config = Config::default();
    config.init_paths(base_dir);

    if config.paths.config_file.exists() && !force {
        return Err(Error::Config(format!(
            "Config already exists at {}. Use --force to overwrite.",
            config.paths.config_file.display()
        )));
    }

    info!("Initializing registry in {:?}", config.paths.base_dir);
    std::fs::create_dir_all(&config.paths.base_dir)?;
    config.save()?;

    let registry = SourceRegistry::from_config(&config).await?;
    // Any read reconciles the catalog into the fresh database
    registry.get_disabled_sources().await?;
    let stored_records = registry.db().find_all().await?.len();

    Ok(InitReport {
        config_path: config.paths.config_file.display().to_string(),
        db_path: config.paths.db_file.display().to_string(),
        catalog_sources: registry.all_sources().len(),
        stored_records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_creates_everything() {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path().join("registry");

        let report = cmd_init(Some(base.clone()), false).await.unwrap();
        assert!(base.join("config.toml").exists());
        assert!(base.join("sources.db").exists());
        assert_eq!(report.stored_records, report.catalog_sources);
        assert!(report.catalog_sources > 0);

        // Refuses to clobber without --force
        assert!(cmd_init(Some(base.clone()), false).await.is_err());
        let again = cmd_init(Some(base), true).await.unwrap();
        assert_eq!(again.stored_records, report.stored_records);
    }
}
