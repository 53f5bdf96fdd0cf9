//! Source registry synchronization engine
//!
//! Tracks a fixed catalog of content-provider sources together with their
//! persisted per-source state, and serves that state as one-shot queries and
//! reactive streams while mutations go through a single transactional facade.

pub mod catalog;
pub mod commands;
pub mod config;
pub mod error;
pub mod reactive;
pub mod registry;
pub mod settings;
pub mod store;

pub use catalog::{Catalog, ContentType, SourceId, SourceInfo, SourceKind};
pub use error::{Error, Result};
pub use registry::{ReversibleHandle, SourceFilter, SourceRegistry, ToggleKind};
pub use settings::{AppSettings, SettingKey, SortOrder, UserSettings};
pub use store::{SourceRecord, SourcesDb};
