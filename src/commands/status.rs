//! Status command implementation

use crate::config::Config;
use crate::error::Result;
use crate::reactive::ResultStream;
use crate::registry::SourceRegistry;
use crate::settings::UserSettings;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Status information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub db_path: String,
    pub settings_path: String,
    pub initialized: bool,
    pub app_version: i64,
    pub catalog_sources: usize,
    pub stored_records: usize,
    pub enabled_sources: usize,
    pub available_sources: usize,
    pub pinned_sources: usize,
    pub setup_required: bool,
    pub has_new_sources: bool,
    pub new_sources_badge: bool,
    pub settings: UserSettings,
}

/// First value of a view, or false if it ended without one
async fn first_flag(mut stream: ResultStream<bool>) -> Result<bool> {
    Ok(stream.next().await.transpose()?.unwrap_or(false))
}

async fn first_count(mut stream: ResultStream<usize>) -> Result<usize> {
    Ok(stream.next().await.transpose()?.unwrap_or(0))
}

/// Get registry status
pub async fn cmd_status(config: &Config, registry: &SourceRegistry) -> Result<StatusInfo> {
    info!("Getting status");

    let setup_required = registry.is_setup_required().await?;
    let stored_records = registry.db().find_all().await?.len();
    let enabled_sources = first_count(registry.observe_enabled_sources_count()).await?;
    let available_sources = first_count(registry.observe_available_sources_count()).await?;
    let pinned_sources = registry.get_pinned_sources().await?.len();
    let has_new_sources = first_flag(registry.observe_has_new_sources()).await?;
    let new_sources_badge = first_flag(registry.observe_has_new_sources_for_badge()).await?;

    Ok(StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        db_path: config.paths.db_file.display().to_string(),
        settings_path: config.paths.settings_file.display().to_string(),
        initialized: config.is_initialized(),
        app_version: registry.app_version(),
        catalog_sources: registry.all_sources().len(),
        stored_records,
        enabled_sources,
        available_sources,
        pinned_sources,
        setup_required,
        has_new_sources,
        new_sources_badge,
        settings: registry.settings().get(),
    })
}

/// Print status to console
pub fn print_status(status: &StatusInfo) {
    println!("\n📊 sourcereg Status\n");
    println!("Configuration: {}", status.config_path);
    println!("Database: {}", status.db_path);
    println!("Settings: {}", status.settings_path);
    println!("App version: {}", status.app_version);
    if !status.initialized {
        println!("⚠ No config file yet. Run 'sourcereg init' to create one.");
    }

    println!("\nSources:");
    println!("  Catalog: {}", status.catalog_sources);
    println!("  Stored records: {}", status.stored_records);
    println!("  Enabled: {}", status.enabled_sources);
    println!("  Available: {}", status.available_sources);
    println!("  Pinned: {}", status.pinned_sources);

    if status.setup_required {
        println!("\n⚠ No sources enabled yet. Run 'sourcereg enable <NAME>...' to get started.");
    }
    if status.new_sources_badge {
        println!("\n✨ New sources available. Run 'sourcereg list --new' to see them,");
        println!("   then 'sourcereg clear-badge' to dismiss.");
    } else if status.has_new_sources {
        println!("\n✨ This version added new sources. Run 'sourcereg list --new' to see them.");
    }

    println!("\nSettings:");
    println!("  Hide NSFW: {}", status.settings.nsfw_disabled);
    println!("  Sort order: {}", status.settings.sources_sort_order);
    println!("  Acknowledged version: {}", status.settings.sources_version);
    println!("  Incognito: {}", status.settings.incognito_mode);
    println!("  Exclude NSFW from history: {}", status.settings.history_exclude_nsfw);
}
