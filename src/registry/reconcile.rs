//! Lazy, once-per-lifetime insertion of catalog sources missing from the store

use crate::catalog::{Catalog, SourceId};
use crate::error::Result;
use crate::store::{SourceRecord, SourcesDb, SourcesTx};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Inserts a record for every catalog source the store has never seen
pub(crate) struct Reconciler {
    done: AtomicBool,
    catalog: Arc<Catalog>,
    app_version: i64,
}

impl Reconciler {
    pub(crate) fn new(catalog: Arc<Catalog>, app_version: i64) -> Self {
        Self {
            done: AtomicBool::new(false),
            catalog,
            app_version,
        }
    }

    /// Run reconciliation unless an attempt already completed
    ///
    /// Only the first caller does the work; concurrent callers return
    /// `Ok(0)` straight away. On failure the flag is cleared so a later
    /// call retries.
    pub(crate) async fn ensure(&self, db: &SourcesDb) -> Result<u64> {
        if self
            .done
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(0);
        }

        match self.run(db).await {
            Ok(inserted) => Ok(inserted),
            Err(e) => {
                self.done.store(false, Ordering::Release);
                Err(e)
            }
        }
    }

    async fn run(&self, db: &SourcesDb) -> Result<u64> {
        let mut tx = db.begin().await?;
        let inserted = self.insert_missing(&mut tx).await?;
        tx.commit().await?;
        Ok(inserted)
    }

    /// Insert records for missing sources inside an existing transaction
    ///
    /// New records get sort keys after the current maximum, in catalog
    /// order, and are stamped with the running app version.
    pub(crate) async fn insert_missing(&self, tx: &mut SourcesTx) -> Result<u64> {
        let existing: HashSet<String> = tx.find_all_names().await?.into_iter().collect();
        let missing: Vec<SourceId> = self
            .catalog
            .remote_sources()
            .iter()
            .filter(|id| !existing.contains(id.name()))
            .copied()
            .collect();

        if missing.is_empty() {
            debug!("All {} catalog sources already stored", self.catalog.len());
            return Ok(0);
        }

        let max_sort_key = tx.max_sort_key().await?;
        let records: Vec<SourceRecord> = missing
            .iter()
            .zip(1..)
            .map(|(id, offset)| SourceRecord::new(id.name(), max_sort_key + offset, self.app_version))
            .collect();

        let inserted = tx.insert_if_absent(&records).await?;
        info!(
            "Registered {} new sources (app version {})",
            inserted, self.app_version
        );
        Ok(inserted)
    }

    /// Record that a transaction containing [`Reconciler::insert_missing`] committed
    pub(crate) fn mark_done(&self) {
        self.done.store(true, Ordering::Release);
    }

    pub(crate) fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }
}
