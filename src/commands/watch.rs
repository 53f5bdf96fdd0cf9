//! Follow a reactive view until interrupted

use crate::catalog::SourceId;
use crate::error::Result;
use crate::reactive::ResultStream;
use crate::registry::SourceRegistry;
use chrono::Local;
use clap::ValueEnum;
use futures::StreamExt;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};

/// Views that can be watched
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WatchTarget {
    /// Enabled sources in display order
    Enabled,
    /// Number of enabled sources
    EnabledCount,
    /// Number of sources that could still be enabled
    AvailableCount,
    /// Every source with its enabled flag
    All,
    /// Whether this version added sources
    NewSources,
    /// Whether the new-sources badge is showing
    Badge,
    /// Whether one source is enabled (requires --source)
    Source,
}

/// One emission of a watched view
#[derive(Debug, Clone, Serialize)]
pub struct WatchEvent {
    pub at: String,
    pub view: WatchTarget,
    pub value: Value,
}

impl Serialize for WatchTarget {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let name = self
            .to_possible_value()
            .map(|v| v.get_name().to_string())
            .unwrap_or_default();
        serializer.serialize_str(&name)
    }
}

fn names(sources: &[SourceId]) -> Value {
    json!(sources.iter().map(|s| s.name()).collect::<Vec<_>>())
}

fn to_values<T, F>(stream: ResultStream<T>, render: F) -> ResultStream<Value>
where
    T: Send + 'static,
    F: Fn(T) -> Value + Send + 'static,
{
    stream.map(move |item| item.map(&render)).boxed()
}

/// Build the value stream for a target
pub fn view_stream(
    registry: &SourceRegistry,
    target: WatchTarget,
    source: Option<&str>,
) -> Result<ResultStream<Value>> {
    let stream = match target {
        WatchTarget::Enabled => to_values(registry.observe_enabled_sources(), |s| names(&s)),
        WatchTarget::EnabledCount => to_values(registry.observe_enabled_sources_count(), |n| json!(n)),
        WatchTarget::AvailableCount => {
            to_values(registry.observe_available_sources_count(), |n| json!(n))
        }
        WatchTarget::All => to_values(registry.observe_all(), |all| {
            json!(all
                .iter()
                .map(|(id, enabled)| json!({ "name": id.name(), "enabled": enabled }))
                .collect::<Vec<_>>())
        }),
        WatchTarget::NewSources => to_values(registry.observe_has_new_sources(), |b| json!(b)),
        WatchTarget::Badge => {
            to_values(registry.observe_has_new_sources_for_badge(), |b| json!(b))
        }
        WatchTarget::Source => {
            let name = source.ok_or_else(|| {
                crate::error::Error::Config("--source is required to watch a source".to_string())
            })?;
            let id = registry.catalog().require(name)?;
            to_values(registry.observe_is_enabled(id), |b| json!(b))
        }
    };
    Ok(stream)
}

/// Print every emission of a view until Ctrl-C or the view ends
pub async fn cmd_watch(
    registry: &SourceRegistry,
    target: WatchTarget,
    source: Option<&str>,
    json_output: bool,
) -> Result<()> {
    let mut values = view_stream(registry, target, source)?;
    info!("Watching {:?}; press Ctrl-C to stop", target);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                debug!("Interrupted");
                break;
            }
            next = values.next() => match next {
                Some(Ok(value)) => {
                    let event = WatchEvent {
                        at: Local::now().format("%H:%M:%S").to_string(),
                        view: target,
                        value,
                    };
                    print_event(&event, json_output)?;
                }
                Some(Err(e)) => return Err(e),
                None => break,
            }
        }
    }

    Ok(())
}

fn print_event(event: &WatchEvent, json_output: bool) -> Result<()> {
    if json_output {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }

    let rendered = match &event.value {
        Value::Array(items) if items.iter().all(Value::is_string) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Array(items) => items
            .iter()
            .map(|item| match (item["name"].as_str(), item["enabled"].as_bool()) {
                (Some(name), Some(true)) => format!("+{}", name),
                (Some(name), _) => format!("-{}", name),
                _ => item.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    };
    println!("[{}] {}", event.at, rendered);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::testing::ABC;
    use crate::catalog::Catalog;
    use crate::settings::{AppSettings, UserSettings};
    use crate::store::SourcesDb;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_watch_values() {
        let tmp = TempDir::new().unwrap();
        let db = SourcesDb::new(&tmp.path().join("sources.db")).await.unwrap();
        let settings = AppSettings::in_memory(UserSettings::default());
        let registry = SourceRegistry::new(db, settings, Arc::new(Catalog::new(ABC, false)), 1);

        let mut enabled = view_stream(&registry, WatchTarget::Enabled, None).unwrap();
        assert_eq!(enabled.next().await.unwrap().unwrap(), json!([]));

        let b = registry.catalog().require("B").unwrap();
        let _ = registry.set_sources_enabled(&[b], true).await.unwrap();
        assert_eq!(enabled.next().await.unwrap().unwrap(), json!(["B"]));

        let mut source = view_stream(&registry, WatchTarget::Source, Some("B")).unwrap();
        assert_eq!(source.next().await.unwrap().unwrap(), json!(true));

        assert!(view_stream(&registry, WatchTarget::Source, None).is_err());
        assert!(view_stream(&registry, WatchTarget::Source, Some("Z")).is_err());
    }

    #[test]
    fn test_target_serializes_as_cli_name() {
        let event = WatchEvent {
            at: "00:00:00".to_string(),
            view: WatchTarget::EnabledCount,
            value: json!(2),
        };
        let encoded = serde_json::to_string(&event).unwrap();
        assert!(encoded.contains("\"view\":\"enabled-count\""));
    }
}
