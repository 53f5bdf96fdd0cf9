//! Source listing and mutation commands

use crate::catalog::{ContentType, SourceId};
use crate::error::Result;
use crate::registry::{ReversibleHandle, SourceFilter, SourceRegistry, ToggleKind};
use crate::settings::SortOrder;
use crate::store::SourceRecord;
use chrono::{DateTime, Utc};
use clap_complete::Shell;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

/// A source joined with its persisted state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceView {
    pub name: String,
    pub title: String,
    pub locale: Option<String>,
    pub content_type: ContentType,
    pub enabled: bool,
    pub pinned: bool,
    pub broken: bool,
    pub nsfw: bool,
    pub added_in: i64,
    /// RFC 3339, absent if never used
    pub last_used_at: Option<String>,
}

impl SourceView {
    fn new(id: SourceId, record: Option<&SourceRecord>) -> Self {
        let last_used_at = record
            .map(|r| r.last_used_at)
            .filter(|&ms| ms > 0)
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|t| t.to_rfc3339());

        Self {
            name: id.name().to_string(),
            title: id.title().to_string(),
            locale: id.locale().map(str::to_string),
            content_type: id.content_type(),
            enabled: record.is_some_and(|r| r.enabled),
            pinned: record.is_some_and(|r| r.pinned),
            broken: id.is_broken(),
            nsfw: id.is_nsfw(),
            added_in: record.map_or(0, |r| r.added_in),
            last_used_at,
        }
    }
}

/// Options for listing sources
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub disabled_only: bool,
    pub new_only: bool,
    pub exclude_broken: bool,
    pub content_types: Vec<ContentType>,
    pub query: Option<String>,
    pub locale: Option<String>,
    pub sort: Option<SortOrder>,
}

impl ListOptions {
    fn to_filter(&self) -> SourceFilter {
        SourceFilter {
            disabled_only: self.disabled_only,
            new_only: self.new_only,
            exclude_broken: self.exclude_broken,
            content_types: self.content_types.iter().copied().collect(),
            query: self.query.clone(),
            locale: self.locale.clone(),
            sort_order: self.sort,
        }
    }
}

/// Attach stored state to each source
async fn views<I>(registry: &SourceRegistry, sources: I) -> Result<Vec<SourceView>>
where
    I: IntoIterator<Item = SourceId>,
{
    let records: HashMap<String, SourceRecord> = registry
        .db()
        .find_all()
        .await?
        .into_iter()
        .map(|r| (r.source.clone(), r))
        .collect();

    Ok(sources
        .into_iter()
        .map(|id| SourceView::new(id, records.get(id.name())))
        .collect())
}

/// Resolve user-supplied names; unknown names are an error
pub fn resolve_sources(registry: &SourceRegistry, names: &[String]) -> Result<Vec<SourceId>> {
    names
        .iter()
        .map(|name| registry.catalog().require(name))
        .collect()
}

/// List catalog sources matching the options
pub async fn cmd_list_sources(
    registry: &SourceRegistry,
    options: &ListOptions,
) -> Result<Vec<SourceView>> {
    info!("Listing sources");
    let sources = registry.get_available_sources(&options.to_filter()).await?;
    views(registry, sources).await
}

pub async fn cmd_enabled_sources(registry: &SourceRegistry) -> Result<Vec<SourceView>> {
    let sources = registry.get_enabled_sources().await?;
    views(registry, sources).await
}

pub async fn cmd_disabled_sources(registry: &SourceRegistry) -> Result<Vec<SourceView>> {
    let sources = registry.get_disabled_sources().await?;
    views(registry, sources).await
}

pub async fn cmd_pinned_sources(registry: &SourceRegistry) -> Result<Vec<SourceView>> {
    let sources = registry.get_pinned_sources().await?;
    views(registry, sources).await
}

pub async fn cmd_top_sources(registry: &SourceRegistry, limit: usize) -> Result<Vec<SourceView>> {
    let sources = registry.get_top_sources(limit).await?;
    views(registry, sources).await
}

/// Enable or disable named sources
pub async fn cmd_set_enabled(
    registry: &SourceRegistry,
    names: &[String],
    enabled: bool,
) -> Result<ReversibleHandle> {
    let ids = resolve_sources(registry, names)?;
    info!("Setting enabled={} on {} sources", enabled, ids.len());
    registry.set_sources_enabled(&ids, enabled).await
}

/// Pin or unpin named sources
pub async fn cmd_set_pinned(
    registry: &SourceRegistry,
    names: &[String],
    pinned: bool,
) -> Result<ReversibleHandle> {
    let ids = resolve_sources(registry, names)?;
    info!("Setting pinned={} on {} sources", pinned, ids.len());
    registry.set_is_pinned(&ids, pinned).await
}

/// Enable exactly the named sources
pub async fn cmd_enable_only(registry: &SourceRegistry, names: &[String]) -> Result<Vec<SourceView>> {
    let ids = resolve_sources(registry, names)?;
    registry.set_sources_enabled_exclusive(&ids).await?;
    cmd_enabled_sources(registry).await
}

pub async fn cmd_disable_all(registry: &SourceRegistry) -> Result<()> {
    registry.disable_all_sources().await
}

/// Put the named sources first, in the given order
///
/// Sources not named keep their relative order after the named ones.
pub async fn cmd_reorder(registry: &SourceRegistry, names: &[String]) -> Result<Vec<SourceView>> {
    let named = resolve_sources(registry, names)?;
    let mut order = named.clone();
    let rest = registry
        .get_available_sources(&SourceFilter::new())
        .await?
        .into_iter()
        .filter(|id| !named.contains(id));
    order.extend(rest);

    registry.set_positions(&order).await?;
    views(registry, order).await
}

/// Record usage of one source; false if the settings suppressed it
pub async fn cmd_track_usage(registry: &SourceRegistry, name: &str) -> Result<bool> {
    let id = registry.catalog().require(name)?;
    registry.track_usage(id).await
}

/// Print a list of sources to console
pub fn print_sources(heading: &str, sources: &[SourceView]) {
    println!("\n📚 {} ({})\n", heading, sources.len());

    if sources.is_empty() {
        println!("No sources.");
        return;
    }

    for source in sources {
        let mut flags = Vec::new();
        if source.enabled {
            flags.push("enabled");
        }
        if source.pinned {
            flags.push("pinned");
        }
        if source.broken {
            flags.push("broken");
        }
        if source.nsfw {
            flags.push("nsfw");
        }

        println!(
            "• {} [{}] {}",
            source.title,
            source.locale.as_deref().unwrap_or("multi"),
            source.content_type
        );
        println!("  Name: {}", source.name);
        if !flags.is_empty() {
            println!("  Flags: {}", flags.join(", "));
        }
        if let Some(last_used) = &source.last_used_at {
            println!("  Last used: {}", last_used);
        }
    }
    println!();
}

/// Print the result of a toggle
pub fn print_toggle(handle: &ReversibleHandle, value: bool) {
    if handle.is_noop() {
        println!("Nothing to change.");
        return;
    }

    let verb = match (handle.kind(), value) {
        (ToggleKind::Enabled, true) => "Enabled",
        (ToggleKind::Enabled, false) => "Disabled",
        (ToggleKind::Pinned, true) => "Pinned",
        (ToggleKind::Pinned, false) => "Unpinned",
    };
    let changed: Vec<_> = handle
        .prior()
        .iter()
        .filter(|(_, prior)| *prior != value)
        .map(|(id, _)| id.name())
        .collect();

    println!(
        "✓ {} {} of {} sources",
        verb,
        changed.len(),
        handle.prior().len()
    );
    for name in changed {
        println!("  {}", name);
    }
}

/// Print source names with titles for shell completions
pub fn print_source_completions(registry: &SourceRegistry, shell: Shell) {
    for id in registry.all_sources() {
        let description = format!("{} ({})", id.title(), id.locale().unwrap_or("multi"));

        match shell {
            Shell::Zsh => {
                let sanitized = description.replace(':', "\\:");
                println!("{}:{}", id.name(), sanitized);
            }
            Shell::Fish => {
                let sanitized = description.replace('\t', " ");
                println!("{}\t{}", id.name(), sanitized);
            }
            _ => {
                println!("{}", id.name());
            }
        }
    }
}
