//! Record-to-source mapping, narrowing and ordering

use crate::catalog::{Catalog, ContentType, SourceId};
use crate::settings::SortOrder;
use crate::store::SourceRecord;
use std::collections::HashSet;

/// Criteria for [`super::SourceRegistry::get_available_sources`]
///
/// Every criterion only narrows the result. The sort order is applied
/// after all narrowing; `None` keeps store order.
#[derive(Debug, Clone, Default)]
pub struct SourceFilter {
    /// Keep only sources that are not enabled
    pub disabled_only: bool,
    /// Keep only sources first registered by the running app version
    pub new_only: bool,
    pub exclude_broken: bool,
    /// Keep only these content types; empty keeps all
    pub content_types: HashSet<ContentType>,
    /// Case-insensitive substring of title or name
    pub query: Option<String>,
    pub locale: Option<String>,
    pub sort_order: Option<SortOrder>,
}

impl SourceFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn disabled_only(mut self, value: bool) -> Self {
        self.disabled_only = value;
        self
    }

    pub fn new_only(mut self, value: bool) -> Self {
        self.new_only = value;
        self
    }

    pub fn exclude_broken(mut self, value: bool) -> Self {
        self.exclude_broken = value;
        self
    }

    pub fn content_type(mut self, content_type: ContentType) -> Self {
        self.content_types.insert(content_type);
        self
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn sort_order(mut self, order: SortOrder) -> Self {
        self.sort_order = Some(order);
        self
    }

    /// Narrow `records` to matching catalog sources
    pub(crate) fn apply(
        &self,
        catalog: &Catalog,
        records: &[SourceRecord],
        app_version: i64,
        skip_nsfw: bool,
    ) -> Vec<SourceId> {
        let query = self
            .query
            .as_deref()
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase);

        let mut pinned = HashSet::new();
        let mut sources: Vec<SourceId> = records
            .iter()
            .filter(|r| !(self.disabled_only && r.enabled))
            .filter(|r| !self.new_only || r.added_in == app_version)
            .filter_map(|r| {
                let id = catalog.resolve(&r.source)?;
                if r.pinned {
                    pinned.insert(id);
                }
                Some(id)
            })
            .filter(|id| !(skip_nsfw && id.is_nsfw()))
            .filter(|id| match &self.locale {
                Some(locale) => id.locale() == Some(locale.as_str()),
                None => true,
            })
            .filter(|id| !(self.exclude_broken && id.is_broken()))
            .filter(|id| {
                self.content_types.is_empty() || self.content_types.contains(&id.content_type())
            })
            .filter(|id| match &query {
                Some(q) => {
                    id.title().to_lowercase().contains(q.as_str())
                        || id.name().to_lowercase().contains(q.as_str())
                }
                None => true,
            })
            .collect();

        sort_sources(&mut sources, &pinned, self.sort_order);
        sources
    }
}

/// Resolve records against the catalog, dropping unknown and hidden ones
pub(crate) fn to_sources(
    catalog: &Catalog,
    records: &[SourceRecord],
    skip_nsfw: bool,
    order: Option<SortOrder>,
) -> Vec<SourceId> {
    let mut pinned = HashSet::new();
    let mut sources = Vec::with_capacity(records.len());
    for record in records {
        let Some(id) = catalog.resolve(&record.source) else {
            continue;
        };
        if skip_nsfw && id.is_nsfw() {
            continue;
        }
        if record.pinned {
            pinned.insert(id);
        }
        sources.push(id);
    }
    sort_sources(&mut sources, &pinned, order);
    sources
}

/// Reorder in place; manual order is whatever order the store returned
pub(crate) fn sort_sources(
    sources: &mut [SourceId],
    pinned: &HashSet<SourceId>,
    order: Option<SortOrder>,
) {
    match order {
        None | Some(SortOrder::Manual) => {}
        Some(SortOrder::Alphabetic) => sources.sort_by_cached_key(|id| id.title().to_lowercase()),
        Some(SortOrder::AlphabeticPinned) => {
            sources.sort_by_cached_key(|id| (!pinned.contains(id), id.title().to_lowercase()))
        }
    }
}
