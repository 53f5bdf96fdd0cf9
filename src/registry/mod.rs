//! Source registry service
//!
//! [`SourceRegistry`] is the single entry point for reading and changing
//! source state. It joins three collaborators:
//! - the static [`Catalog`] of known sources
//! - the persisted per-source records in [`SourcesDb`]
//! - the user's [`AppSettings`] (adult-content toggle, sort order, ...)
//!
//! Every read intersects stored records with the live catalog, so records
//! for sources that no longer exist are ignored. Before the first real
//! access in a process lifetime, catalog sources the store has never seen
//! are inserted once (see [`reconcile`]).

mod filter;
mod reconcile;
mod undo;

pub use filter::SourceFilter;
pub use undo::{ReversibleHandle, ToggleKind};

use crate::catalog::{Catalog, SourceId};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::reactive::{combine_latest, distinct_ok, switch_latest, ResultStream};
use crate::settings::{AppSettings, SortOrder};
use crate::store::{SourcesDb, SourcesTx};
use chrono::Utc;
use filter::to_sources;
use futures::future;
use futures::stream::{self, BoxStream, StreamExt};
use reconcile::Reconciler;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

struct Inner {
    db: SourcesDb,
    settings: AppSettings,
    catalog: Arc<Catalog>,
    reconciler: Reconciler,
    app_version: i64,
}

/// Shared handle to the registry; cheap to clone
#[derive(Clone)]
pub struct SourceRegistry {
    inner: Arc<Inner>,
}

impl SourceRegistry {
    pub fn new(db: SourcesDb, settings: AppSettings, catalog: Arc<Catalog>, app_version: i64) -> Self {
        let reconciler = Reconciler::new(Arc::clone(&catalog), app_version);
        Self {
            inner: Arc::new(Inner {
                db,
                settings,
                catalog,
                reconciler,
                app_version,
            }),
        }
    }

    /// Open the configured database and settings over the built-in catalog
    pub async fn from_config(config: &Config) -> Result<Self> {
        let db = SourcesDb::connect(config).await?;
        let settings = AppSettings::open(&config.paths.settings_file)?;
        let catalog = Arc::new(Catalog::builtin(config.include_debug_sources));
        info!(
            "Source registry ready: {} catalog sources, app version {}",
            catalog.len(),
            config.app_version
        );
        Ok(Self::new(db, settings, catalog, config.app_version))
    }

    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    pub fn settings(&self) -> &AppSettings {
        &self.inner.settings
    }

    pub(crate) fn db(&self) -> &SourcesDb {
        &self.inner.db
    }

    pub fn app_version(&self) -> i64 {
        self.inner.app_version
    }

    /// Every remote catalog source, in declaration order
    pub fn all_sources(&self) -> &BTreeSet<SourceId> {
        self.inner.catalog.remote_sources()
    }

    /// Whether reconciliation has completed in this lifetime
    pub fn is_reconciled(&self) -> bool {
        self.inner.reconciler.is_done()
    }

    /// Best-effort reconciliation for read paths
    async fn reconcile(&self) {
        if let Err(e) = self.inner.reconciler.ensure(&self.inner.db).await {
            warn!("Source reconciliation failed, will retry: {}", e);
        }
    }

    /// Reconcile, then subscribe
    fn reconciled<T, F>(&self, subscribe: F) -> ResultStream<T>
    where
        T: Send + 'static,
        F: FnOnce(&SourceRegistry) -> ResultStream<T> + Send + 'static,
    {
        let registry = self.clone();
        stream::once(async move {
            registry.reconcile().await;
            subscribe(&registry)
        })
        .flatten()
        .boxed()
    }

    fn skip_nsfw(&self) -> bool {
        self.inner.settings.is_nsfw_disabled()
    }

    // ===== One-shot queries =====

    /// Enabled sources in the configured sort order
    pub async fn get_enabled_sources(&self) -> Result<Vec<SourceId>> {
        self.reconcile().await;
        let order = self.inner.settings.sort_order();
        let records = self.inner.db.find_all_enabled(order).await?;
        Ok(to_sources(
            &self.inner.catalog,
            &records,
            self.skip_nsfw(),
            Some(order),
        ))
    }

    pub async fn get_pinned_sources(&self) -> Result<BTreeSet<SourceId>> {
        self.reconcile().await;
        let records = self.inner.db.find_all_pinned().await?;
        Ok(to_sources(&self.inner.catalog, &records, self.skip_nsfw(), None)
            .into_iter()
            .collect())
    }

    /// Up to `limit` sources, most recently used first
    ///
    /// The limit applies before hidden sources are removed, so fewer than
    /// `limit` may come back.
    pub async fn get_top_sources(&self, limit: usize) -> Result<Vec<SourceId>> {
        self.reconcile().await;
        let records = self.inner.db.find_last_used(limit).await?;
        Ok(to_sources(&self.inner.catalog, &records, self.skip_nsfw(), None))
    }

    /// Catalog sources that are not enabled
    pub async fn get_disabled_sources(&self) -> Result<BTreeSet<SourceId>> {
        self.reconcile().await;
        let enabled: HashSet<String> = self
            .inner
            .db
            .find_all_enabled_names()
            .await?
            .into_iter()
            .collect();
        Ok(self
            .inner
            .catalog
            .remote_sources()
            .iter()
            .filter(|id| !enabled.contains(id.name()))
            .copied()
            .collect())
    }

    pub async fn get_available_sources(&self, filter: &SourceFilter) -> Result<Vec<SourceId>> {
        self.reconcile().await;
        let records = self.inner.db.find_all().await?;
        Ok(filter.apply(
            &self.inner.catalog,
            &records,
            self.inner.app_version,
            self.skip_nsfw(),
        ))
    }

    /// True on first run: nothing acknowledged and nothing enabled
    pub async fn is_setup_required(&self) -> Result<bool> {
        self.reconcile().await;
        if self.inner.settings.sources_version() != 0 {
            return Ok(false);
        }
        let enabled = self.inner.db.find_all_enabled_names().await?;
        Ok(!enabled
            .iter()
            .any(|name| self.inner.catalog.resolve(name).is_some()))
    }

    // ===== Observation =====

    pub fn observe_is_enabled(&self, id: SourceId) -> ResultStream<bool> {
        self.reconciled(move |registry| distinct_ok(registry.inner.db.observe_is_enabled(id.name())))
    }

    /// Number of enabled sources, respecting the adult-content setting
    pub fn observe_enabled_sources_count(&self) -> ResultStream<usize> {
        self.reconciled(|registry| {
            let catalog = Arc::clone(&registry.inner.catalog);
            let counts = combine_latest(
                ok_stream(registry.inner.settings.observe_nsfw_disabled()),
                registry.inner.db.observe_enabled(SortOrder::Manual),
                move |skip_nsfw, records| {
                    records
                        .iter()
                        .filter_map(|r| catalog.resolve(&r.source))
                        .filter(|id| !(*skip_nsfw && id.is_nsfw()))
                        .count()
                },
            );
            distinct_ok(counts)
        })
    }

    /// Number of catalog sources that could still be enabled
    pub fn observe_available_sources_count(&self) -> ResultStream<usize> {
        self.reconciled(|registry| {
            let catalog = Arc::clone(&registry.inner.catalog);
            let counts = combine_latest(
                ok_stream(registry.inner.settings.observe_nsfw_disabled()),
                registry.inner.db.observe_enabled(SortOrder::Manual),
                move |skip_nsfw, records| {
                    let enabled: HashSet<&str> = records.iter().map(|r| r.source.as_str()).collect();
                    catalog
                        .remote_sources()
                        .iter()
                        .filter(|id| !enabled.contains(id.name()))
                        .filter(|id| !(*skip_nsfw && id.is_nsfw()))
                        .count()
                },
            );
            distinct_ok(counts)
        })
    }

    /// Enabled sources, following the adult-content and sort-order settings
    ///
    /// A settings change re-subscribes the store query with the new
    /// parameters; results from the previous subscription are discarded.
    pub fn observe_enabled_sources(&self) -> ResultStream<Vec<SourceId>> {
        self.reconciled(|registry| {
            let settings = &registry.inner.settings;
            let params = combine_latest(
                ok_stream(settings.observe_nsfw_disabled()),
                ok_stream(settings.observe_sort_order()),
                |skip_nsfw, order| (*skip_nsfw, *order),
            );

            let db = registry.inner.db.clone();
            let catalog = Arc::clone(&registry.inner.catalog);
            let lists = params.map(move |item| {
                item.map(|(skip_nsfw, order)| {
                    debug!("Enabled sources view: skip_nsfw={}, order={}", skip_nsfw, order);
                    let catalog = Arc::clone(&catalog);
                    db.observe_enabled(order)
                        .map(move |records| {
                            records.map(|records| {
                                to_sources(&catalog, &records, skip_nsfw, Some(order))
                            })
                        })
                        .boxed()
                })
            });

            distinct_ok(switch_latest(lists.boxed()))
        })
    }

    /// Every catalog source with its enabled flag, in store order
    pub fn observe_all(&self) -> ResultStream<Vec<(SourceId, bool)>> {
        self.reconciled(|registry| {
            let catalog = Arc::clone(&registry.inner.catalog);
            registry
                .inner
                .db
                .observe_all()
                .map(move |records| {
                    records.map(|records| {
                        records
                            .iter()
                            .filter_map(|r| catalog.resolve(&r.source).map(|id| (id, r.enabled)))
                            .collect::<Vec<_>>()
                    })
                })
                .boxed()
        })
    }

    /// Whether this app version added sources, unless it added all of them
    pub fn observe_has_new_sources(&self) -> ResultStream<bool> {
        self.reconciled(|registry| {
            let catalog = Arc::clone(&registry.inner.catalog);
            let total = catalog.len();
            let flags = combine_latest(
                ok_stream(registry.inner.settings.observe_nsfw_disabled()),
                registry
                    .inner
                    .db
                    .observe_from_version(registry.inner.app_version),
                move |skip_nsfw, records| {
                    let fresh = to_sources(&catalog, records, *skip_nsfw, None);
                    !fresh.is_empty() && fresh.len() != total
                },
            );
            distinct_ok(flags)
        })
    }

    /// Whether sources were added since the user last acknowledged them
    pub fn observe_has_new_sources_for_badge(&self) -> ResultStream<bool> {
        self.reconciled(|registry| {
            let settings = &registry.inner.settings;
            let params = combine_latest(
                ok_stream(settings.observe_sources_version()),
                ok_stream(settings.observe_nsfw_disabled()),
                |acknowledged, skip_nsfw| (*acknowledged, *skip_nsfw),
            );

            let db = registry.inner.db.clone();
            let catalog = Arc::clone(&registry.inner.catalog);
            let app_version = registry.inner.app_version;
            let flags = params.map(move |item| {
                item.map(|(acknowledged, skip_nsfw)| {
                    if acknowledged >= app_version {
                        return stream::once(future::ready(Ok::<_, Error>(false))).boxed();
                    }
                    let catalog = Arc::clone(&catalog);
                    // Strictly after the acknowledged version; sources added in it were already seen
                    db.observe_from_version(acknowledged + 1)
                        .map(move |records| {
                            records.map(|records| {
                                !to_sources(&catalog, &records, skip_nsfw, None).is_empty()
                            })
                        })
                        .boxed()
                })
            });

            distinct_ok(switch_latest(flags.boxed()))
        })
    }

    // ===== Mutations =====

    /// Enable or disable sources; a single source is a point write, more
    /// than one is a single transaction
    pub async fn set_sources_enabled(
        &self,
        ids: &[SourceId],
        enabled: bool,
    ) -> Result<ReversibleHandle> {
        self.toggle(ToggleKind::Enabled, ids, enabled).await
    }

    /// Enable exactly `ids` and disable every other catalog source
    pub async fn set_sources_enabled_exclusive(&self, ids: &[SourceId]) -> Result<()> {
        let selected: HashSet<SourceId> = ids.iter().copied().collect();
        let mut tx = self.inner.db.begin().await?;
        self.inner.reconciler.insert_missing(&mut tx).await?;
        for id in self.inner.catalog.remote_sources() {
            tx.set_enabled(id.name(), selected.contains(id)).await?;
        }
        tx.commit().await?;
        self.inner.reconciler.mark_done();
        info!("Enabled {} sources exclusively", selected.len());
        Ok(())
    }

    pub async fn disable_all_sources(&self) -> Result<()> {
        let mut tx = self.inner.db.begin().await?;
        self.inner.reconciler.insert_missing(&mut tx).await?;
        tx.disable_all().await?;
        tx.commit().await?;
        self.inner.reconciler.mark_done();
        info!("Disabled all sources");
        Ok(())
    }

    /// Make `ids` the manual order: each gets its index as sort key
    pub async fn set_positions(&self, ids: &[SourceId]) -> Result<()> {
        self.reconcile().await;
        if ids.is_empty() {
            return Ok(());
        }
        let mut tx = self.inner.db.begin().await?;
        for (index, id) in ids.iter().enumerate() {
            tx.set_sort_key(id.name(), index as i64).await?;
        }
        tx.commit().await
    }

    pub async fn set_is_pinned(&self, ids: &[SourceId], pinned: bool) -> Result<ReversibleHandle> {
        self.toggle(ToggleKind::Pinned, ids, pinned).await
    }

    /// Record that `id` was just used
    ///
    /// Returns false when the settings say not to record it: incognito
    /// mode, or an adult source with adult history excluded.
    pub async fn track_usage(&self, id: SourceId) -> Result<bool> {
        self.reconcile().await;
        let settings = &self.inner.settings;
        if settings.is_incognito_mode() || (settings.is_history_exclude_nsfw() && id.is_nsfw()) {
            debug!("Not recording usage of {}", id);
            return Ok(false);
        }
        self.inner
            .db
            .set_last_used(id.name(), Utc::now().timestamp_millis())
            .await?;
        Ok(true)
    }

    /// Acknowledge every source known to this app version
    pub fn clear_new_sources_badge(&self) -> Result<()> {
        self.inner
            .settings
            .set_sources_version(self.inner.app_version)
    }

    async fn toggle(&self, kind: ToggleKind, ids: &[SourceId], value: bool) -> Result<ReversibleHandle> {
        self.reconcile().await;
        let ids = unique(ids);
        let mut prior = Vec::with_capacity(ids.len());

        match ids.as_slice() {
            [] => {}
            [id] => {
                let record = self.inner.db.find_by_name(id.name()).await?;
                prior.push((*id, record.is_some_and(|r| kind.read(&r))));
                self.write_one(kind, *id, value).await?;
            }
            _ => {
                let mut tx = self.inner.db.begin().await?;
                for id in &ids {
                    let record = tx.find_by_name(id.name()).await?;
                    prior.push((*id, record.is_some_and(|r| kind.read(&r))));
                    write_in_tx(&mut tx, kind, *id, value).await?;
                }
                tx.commit().await?;
            }
        }

        debug!("Set {:?}={} on {} sources", kind, value, prior.len());
        Ok(ReversibleHandle::new(kind, prior))
    }

    /// Write per-source values for one flag
    pub(crate) async fn write_toggles(&self, kind: ToggleKind, values: &[(SourceId, bool)]) -> Result<()> {
        match values {
            [] => Ok(()),
            [(id, value)] => self.write_one(kind, *id, *value).await,
            _ => {
                let mut tx = self.inner.db.begin().await?;
                for (id, value) in values {
                    write_in_tx(&mut tx, kind, *id, *value).await?;
                }
                tx.commit().await
            }
        }
    }

    async fn write_one(&self, kind: ToggleKind, id: SourceId, value: bool) -> Result<()> {
        match kind {
            ToggleKind::Enabled => self.inner.db.set_enabled(id.name(), value).await,
            ToggleKind::Pinned => self.inner.db.set_pinned(id.name(), value).await,
        }
    }
}

async fn write_in_tx(tx: &mut SourcesTx, kind: ToggleKind, id: SourceId, value: bool) -> Result<()> {
    match kind {
        ToggleKind::Enabled => tx.set_enabled(id.name(), value).await,
        ToggleKind::Pinned => tx.set_pinned(id.name(), value).await,
    }
}

/// Drop repeated ids, keeping first occurrences in order
fn unique(ids: &[SourceId]) -> Vec<SourceId> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

fn ok_stream<T: Send + 'static>(values: BoxStream<'static, T>) -> ResultStream<T> {
    values.map(Ok).boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::testing::{ABC, MIXED};
    use crate::catalog::SourceInfo;
    use crate::settings::UserSettings;
    use crate::store::SourceRecord;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::time::timeout;

    async fn setup(table: &'static [SourceInfo], app_version: i64) -> (SourceRegistry, TempDir) {
        let tmp = TempDir::new().unwrap();
        let db = SourcesDb::new(&tmp.path().join("sources.db")).await.unwrap();
        let settings = AppSettings::in_memory(UserSettings::default());
        let catalog = Arc::new(Catalog::new(table, false));
        (SourceRegistry::new(db, settings, catalog, app_version), tmp)
    }

    fn ids(registry: &SourceRegistry, names: &[&str]) -> Vec<SourceId> {
        names
            .iter()
            .map(|name| registry.catalog().require(name).unwrap())
            .collect()
    }

    fn names<I: IntoIterator<Item = SourceId>>(sources: I) -> Vec<&'static str> {
        sources.into_iter().map(|s| s.name()).collect()
    }

    async fn next<T>(stream: &mut ResultStream<T>) -> T {
        timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("stream stalled")
            .expect("stream ended")
            .expect("stream failed")
    }

    #[tokio::test]
    async fn test_enable_then_revert() {
        let (registry, _tmp) = setup(ABC, 1).await;

        assert!(registry.get_enabled_sources().await.unwrap().is_empty());

        let handle = registry
            .set_sources_enabled(&ids(&registry, &["A", "C"]), true)
            .await
            .unwrap();
        assert_eq!(names(registry.get_enabled_sources().await.unwrap()), vec!["A", "C"]);

        handle.apply(&registry).await.unwrap();
        assert!(registry.get_enabled_sources().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_reconcile_exactly_once_under_concurrency() {
        let (registry, _tmp) = setup(ABC, 1).await;

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.get_enabled_sources().await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        // One committed insert batch, nothing else written
        assert_eq!(registry.db().generation(), 1);
        assert!(registry.is_reconciled());

        let records = registry.db().find_all().await.unwrap();
        assert_eq!(records.len(), 3);
        let keys: Vec<_> = records.iter().map(|r| (r.source.as_str(), r.sort_key)).collect();
        assert_eq!(keys, vec![("A", 1), ("B", 2), ("C", 3)]);
        assert!(records.iter().all(|r| r.added_in == 1 && !r.enabled && !r.pinned));

        // Later reads never insert again
        registry.get_disabled_sources().await.unwrap();
        registry.get_top_sources(5).await.unwrap();
        assert_eq!(registry.db().generation(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_multi_source_toggles_all_succeed() {
        let (registry, _tmp) = setup(ABC, 1).await;
        let all = ids(&registry, &["A", "B", "C"]);

        for round in 0..20 {
            let tasks: Vec<_> = (0..8)
                .map(|i| {
                    let registry = registry.clone();
                    let all = all.clone();
                    tokio::spawn(async move {
                        if i % 2 == 0 {
                            registry.set_sources_enabled(&all, (i + round) % 3 == 0).await
                        } else {
                            registry.set_is_pinned(&all, true).await
                        }
                    })
                })
                .collect();
            for task in tasks {
                task.await.unwrap().unwrap();
            }
        }

        let pinned = registry.get_pinned_sources().await.unwrap();
        assert_eq!(names(pinned), vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_reconcile_appends_after_existing_keys() {
        let (registry, _tmp) = setup(ABC, 4).await;
        registry
            .db()
            .insert_if_absent(&[SourceRecord::new("B", 10, 2)])
            .await
            .unwrap();

        registry.get_enabled_sources().await.unwrap();

        let records = registry.db().find_all().await.unwrap();
        let keys: Vec<_> = records
            .iter()
            .map(|r| (r.source.as_str(), r.sort_key, r.added_in))
            .collect();
        assert_eq!(keys, vec![("B", 10, 2), ("A", 11, 4), ("C", 12, 4)]);
    }

    #[tokio::test]
    async fn test_reconcile_retries_after_store_failure() {
        let (registry, _tmp) = setup(ABC, 1).await;
        sqlx::query("DROP TABLE sources")
            .execute(registry.db().pool())
            .await
            .unwrap();

        assert!(registry.get_enabled_sources().await.is_err());
        assert!(!registry.is_reconciled());

        registry.db().init_schema().await.unwrap();
        assert!(registry.get_enabled_sources().await.unwrap().is_empty());
        assert!(registry.is_reconciled());
        assert_eq!(registry.db().find_all().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_exclusive_enable() {
        let (registry, _tmp) = setup(ABC, 1).await;

        // Runs its own reconciliation inside the transaction
        registry
            .set_sources_enabled_exclusive(&ids(&registry, &["A", "B"]))
            .await
            .unwrap();
        assert!(registry.is_reconciled());
        assert_eq!(names(registry.get_enabled_sources().await.unwrap()), vec!["A", "B"]);
        assert_eq!(names(registry.get_disabled_sources().await.unwrap()), vec!["C"]);

        registry
            .set_sources_enabled_exclusive(&ids(&registry, &["C"]))
            .await
            .unwrap();
        assert_eq!(names(registry.get_enabled_sources().await.unwrap()), vec!["C"]);
        assert_eq!(registry.db().find_all().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_disable_all() {
        let (registry, _tmp) = setup(ABC, 1).await;
        let _ = registry
            .set_sources_enabled(&ids(&registry, &["A", "B", "C"]), true)
            .await
            .unwrap();

        registry.disable_all_sources().await.unwrap();
        assert!(registry.get_enabled_sources().await.unwrap().is_empty());
        assert_eq!(registry.get_disabled_sources().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_handle_restores_each_prior_value() {
        let (registry, _tmp) = setup(ABC, 1).await;
        let _ = registry
            .set_sources_enabled(&ids(&registry, &["A"]), true)
            .await
            .unwrap();

        let handle = registry
            .set_sources_enabled(&ids(&registry, &["A", "B"]), true)
            .await
            .unwrap();
        assert_eq!(handle.kind(), ToggleKind::Enabled);
        assert_eq!(names(handle.affected()), vec!["A", "B"]);
        assert_eq!(names(registry.get_enabled_sources().await.unwrap()), vec!["A", "B"]);

        handle.apply(&registry).await.unwrap();
        assert_eq!(names(registry.get_enabled_sources().await.unwrap()), vec!["A"]);
    }

    #[tokio::test]
    async fn test_duplicate_ids_collapse() {
        let (registry, _tmp) = setup(ABC, 1).await;
        let handle = registry
            .set_sources_enabled(&ids(&registry, &["B", "B"]), true)
            .await
            .unwrap();
        assert_eq!(handle.prior().len(), 1);

        handle.apply(&registry).await.unwrap();
        assert!(registry.get_enabled_sources().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_selection_is_noop() {
        let (registry, _tmp) = setup(ABC, 1).await;
        registry.get_enabled_sources().await.unwrap();
        let generation = registry.db().generation();

        let handle = registry.set_sources_enabled(&[], true).await.unwrap();
        assert!(handle.is_noop());
        handle.apply(&registry).await.unwrap();
        registry.set_positions(&[]).await.unwrap();

        assert_eq!(registry.db().generation(), generation);
    }

    #[tokio::test]
    async fn test_pin_handle_reverts_pinning_only() {
        let (registry, _tmp) = setup(ABC, 1).await;
        let _ = registry
            .set_sources_enabled(&ids(&registry, &["C"]), true)
            .await
            .unwrap();

        let handle = registry
            .set_is_pinned(&ids(&registry, &["A", "C"]), true)
            .await
            .unwrap();
        assert_eq!(handle.kind(), ToggleKind::Pinned);
        assert_eq!(names(registry.get_pinned_sources().await.unwrap()), vec!["A", "C"]);

        handle.apply(&registry).await.unwrap();
        assert!(registry.get_pinned_sources().await.unwrap().is_empty());
        assert_eq!(names(registry.get_enabled_sources().await.unwrap()), vec!["C"]);
    }

    #[tokio::test]
    async fn test_set_positions() {
        let (registry, _tmp) = setup(ABC, 1).await;
        registry
            .set_positions(&ids(&registry, &["C", "A", "B"]))
            .await
            .unwrap();

        let all = registry
            .get_available_sources(&SourceFilter::new())
            .await
            .unwrap();
        assert_eq!(names(all), vec!["C", "A", "B"]);
    }

    #[tokio::test]
    async fn test_enabled_sort_orders() {
        let (registry, _tmp) = setup(MIXED, 1).await;
        let all: Vec<_> = registry.all_sources().iter().copied().collect();
        registry.set_sources_enabled_exclusive(&all).await.unwrap();
        let _ = registry
            .set_is_pinned(&ids(&registry, &["ZETA"]), true)
            .await
            .unwrap();

        assert_eq!(
            names(registry.get_enabled_sources().await.unwrap()),
            vec!["ZETA", "ADULT", "RUMANGA", "TOONS", "BLAND"]
        );

        registry.settings().set_sort_order(SortOrder::Alphabetic).unwrap();
        assert_eq!(
            names(registry.get_enabled_sources().await.unwrap()),
            vec!["ADULT", "BLAND", "RUMANGA", "TOONS", "ZETA"]
        );

        registry
            .settings()
            .set_sort_order(SortOrder::AlphabeticPinned)
            .unwrap();
        assert_eq!(
            names(registry.get_enabled_sources().await.unwrap()),
            vec!["ZETA", "ADULT", "BLAND", "RUMANGA", "TOONS"]
        );
    }

    #[tokio::test]
    async fn test_nsfw_suppressed_everywhere() {
        let (registry, _tmp) = setup(MIXED, 1).await;
        let all: Vec<_> = registry.all_sources().iter().copied().collect();
        registry.set_sources_enabled_exclusive(&all).await.unwrap();
        let _ = registry
            .set_is_pinned(&ids(&registry, &["ADULT", "ZETA"]), true)
            .await
            .unwrap();
        registry
            .track_usage(registry.catalog().require("ADULT").unwrap())
            .await
            .unwrap();

        let mut count = registry.observe_enabled_sources_count();
        assert_eq!(next(&mut count).await, 5);

        registry.settings().set_nsfw_disabled(true).unwrap();
        assert_eq!(next(&mut count).await, 3);

        assert_eq!(
            names(registry.get_enabled_sources().await.unwrap()),
            vec!["ZETA", "RUMANGA", "TOONS"]
        );
        assert_eq!(names(registry.get_pinned_sources().await.unwrap()), vec!["ZETA"]);
        assert!(!names(registry.get_top_sources(10).await.unwrap()).contains(&"ADULT"));

        let available = registry
            .get_available_sources(&SourceFilter::new())
            .await
            .unwrap();
        assert_eq!(names(available), vec!["ZETA", "RUMANGA", "TOONS"]);

        let _ = registry
            .set_sources_enabled(&ids(&registry, &["ADULT", "BLAND", "TOONS"]), false)
            .await
            .unwrap();
        let mut available_count = registry.observe_available_sources_count();
        assert_eq!(next(&mut available_count).await, 1);

        registry.settings().set_nsfw_disabled(false).unwrap();
        assert_eq!(next(&mut available_count).await, 3);
    }

    #[tokio::test]
    async fn test_enabled_stream_follows_store_and_settings() {
        let (registry, _tmp) = setup(ABC, 1).await;
        let mut enabled = registry.observe_enabled_sources();
        assert!(next(&mut enabled).await.is_empty());

        // Store write, no settings change
        let _ = registry
            .set_sources_enabled(&ids(&registry, &["C"]), true)
            .await
            .unwrap();
        assert_eq!(names(next(&mut enabled).await), vec!["C"]);

        registry
            .set_positions(&ids(&registry, &["C", "B", "A"]))
            .await
            .unwrap();
        let _ = registry
            .set_sources_enabled(&ids(&registry, &["A"]), true)
            .await
            .unwrap();
        assert_eq!(names(next(&mut enabled).await), vec!["C", "A"]);

        // Settings change, no store write
        registry.settings().set_sort_order(SortOrder::Alphabetic).unwrap();
        assert_eq!(names(next(&mut enabled).await), vec!["A", "C"]);
    }

    #[tokio::test]
    async fn test_observe_is_enabled() {
        let (registry, _tmp) = setup(ABC, 1).await;
        let a = registry.catalog().require("A").unwrap();
        let mut stream = registry.observe_is_enabled(a);
        assert!(!next(&mut stream).await);

        let _ = registry
            .set_sources_enabled(&ids(&registry, &["B"]), true)
            .await
            .unwrap();
        let _ = registry.set_sources_enabled(&[a], true).await.unwrap();
        assert!(next(&mut stream).await);

        let _ = registry.set_sources_enabled(&[a], false).await.unwrap();
        assert!(!next(&mut stream).await);
    }

    #[tokio::test]
    async fn test_observe_all() {
        let (registry, _tmp) = setup(ABC, 1).await;
        let mut all = registry.observe_all();

        let first = next(&mut all).await;
        assert_eq!(names(first.iter().map(|(id, _)| *id)), vec!["A", "B", "C"]);
        assert!(first.iter().all(|(_, enabled)| !enabled));

        let _ = registry
            .set_sources_enabled(&ids(&registry, &["B"]), true)
            .await
            .unwrap();
        let second = next(&mut all).await;
        let enabled: Vec<_> = second.iter().filter(|(_, e)| *e).map(|(id, _)| id.name()).collect();
        assert_eq!(enabled, vec!["B"]);
    }

    #[tokio::test]
    async fn test_track_usage_respects_settings() {
        let (registry, _tmp) = setup(MIXED, 1).await;
        let catalog = registry.catalog();
        let last_used = |name: &'static str| {
            let registry = registry.clone();
            async move {
                registry
                    .db()
                    .find_by_name(name)
                    .await
                    .unwrap()
                    .unwrap()
                    .last_used_at
            }
        };

        assert!(registry.track_usage(catalog.require("ZETA").unwrap()).await.unwrap());
        assert!(last_used("ZETA").await > 0);

        registry.settings().set_incognito_mode(true).unwrap();
        assert!(!registry.track_usage(catalog.require("TOONS").unwrap()).await.unwrap());
        assert_eq!(last_used("TOONS").await, 0);

        registry.settings().set_incognito_mode(false).unwrap();
        registry.settings().set_history_exclude_nsfw(true).unwrap();
        assert!(!registry.track_usage(catalog.require("ADULT").unwrap()).await.unwrap());
        assert_eq!(last_used("ADULT").await, 0);
        assert!(registry.track_usage(catalog.require("TOONS").unwrap()).await.unwrap());
        assert!(last_used("TOONS").await > 0);
    }

    #[tokio::test]
    async fn test_top_sources_by_last_used() {
        let (registry, _tmp) = setup(ABC, 1).await;
        registry.get_enabled_sources().await.unwrap();
        registry.db().set_last_used("A", 100).await.unwrap();
        registry.db().set_last_used("C", 300).await.unwrap();

        assert_eq!(names(registry.get_top_sources(2).await.unwrap()), vec!["C", "A"]);
        assert_eq!(names(registry.get_top_sources(10).await.unwrap()), vec!["C", "A", "B"]);
    }

    #[tokio::test]
    async fn test_new_sources_and_badge() {
        let (registry, _tmp) = setup(ABC, 2).await;
        registry
            .db()
            .insert_if_absent(&[SourceRecord::new("A", 1, 1), SourceRecord::new("B", 2, 1)])
            .await
            .unwrap();

        assert!(registry.is_setup_required().await.unwrap());

        let mut has_new = registry.observe_has_new_sources();
        assert!(next(&mut has_new).await);

        let mut badge = registry.observe_has_new_sources_for_badge();
        assert!(next(&mut badge).await);

        registry.clear_new_sources_badge().unwrap();
        assert_eq!(registry.settings().sources_version(), 2);
        assert!(!next(&mut badge).await);
        assert!(!registry.is_setup_required().await.unwrap());

        // Only sources added after the acknowledged version count
        registry.settings().set_sources_version(1).unwrap();
        assert!(next(&mut badge).await);
    }

    #[tokio::test]
    async fn test_new_sources_all_new_is_not_news() {
        let (registry, _tmp) = setup(ABC, 1).await;
        let mut has_new = registry.observe_has_new_sources();
        assert!(!next(&mut has_new).await);
    }

    #[tokio::test]
    async fn test_new_sources_hidden_by_nsfw_setting() {
        let (registry, _tmp) = setup(MIXED, 2).await;
        let existing: Vec<_> = ["ZETA", "RUMANGA", "TOONS", "BLAND"]
            .iter()
            .zip(1..)
            .map(|(name, key)| SourceRecord::new(*name, key, 1))
            .collect();
        registry.db().insert_if_absent(&existing).await.unwrap();

        let mut has_new = registry.observe_has_new_sources();
        assert!(next(&mut has_new).await);

        registry.settings().set_nsfw_disabled(true).unwrap();
        assert!(!next(&mut has_new).await);
    }

    #[tokio::test]
    async fn test_records_outside_catalog_ignored() {
        let (registry, _tmp) = setup(ABC, 1).await;
        let mut gone = SourceRecord::new("GONE", 1, 1);
        gone.enabled = true;
        gone.pinned = true;
        let mut local = SourceRecord::new("LOCAL", 2, 1);
        local.enabled = true;
        registry.db().insert_if_absent(&[gone, local]).await.unwrap();

        assert!(registry.get_enabled_sources().await.unwrap().is_empty());
        assert!(registry.get_pinned_sources().await.unwrap().is_empty());
        assert_eq!(registry.get_disabled_sources().await.unwrap().len(), 3);
        assert!(registry.is_setup_required().await.unwrap());

        let mut count = registry.observe_enabled_sources_count();
        assert_eq!(next(&mut count).await, 0);
        let mut all = registry.observe_all();
        assert_eq!(next(&mut all).await.len(), 3);
    }
}
