//! Undo handles returned by bulk toggles

use super::SourceRegistry;
use crate::catalog::SourceId;
use crate::error::Result;
use crate::store::SourceRecord;
use serde::Serialize;

/// Which per-source flag a toggle touched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToggleKind {
    Enabled,
    Pinned,
}

impl ToggleKind {
    pub(crate) fn read(self, record: &SourceRecord) -> bool {
        match self {
            ToggleKind::Enabled => record.enabled,
            ToggleKind::Pinned => record.pinned,
        }
    }
}

/// Restores the flag values a toggle overwrote
///
/// Holds each affected source with the value it had before the toggle.
/// [`ReversibleHandle::apply`] consumes the handle, so it reverts at most once.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct ReversibleHandle {
    kind: ToggleKind,
    prior: Vec<(SourceId, bool)>,
}

impl ReversibleHandle {
    pub(crate) fn new(kind: ToggleKind, prior: Vec<(SourceId, bool)>) -> Self {
        Self { kind, prior }
    }

    pub fn kind(&self) -> ToggleKind {
        self.kind
    }

    /// Affected sources with their values before the toggle
    pub fn prior(&self) -> &[(SourceId, bool)] {
        &self.prior
    }

    pub fn affected(&self) -> impl Iterator<Item = SourceId> + '_ {
        self.prior.iter().map(|(id, _)| *id)
    }

    /// True if applying would write nothing
    pub fn is_noop(&self) -> bool {
        self.prior.is_empty()
    }

    /// Write the prior values back
    pub async fn apply(self, registry: &SourceRegistry) -> Result<()> {
        registry.write_toggles(self.kind, &self.prior).await
    }
}
