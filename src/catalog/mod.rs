//! Static catalog of known sources
//!
//! The catalog is fixed at build time: a table of [`SourceInfo`] entries in
//! declaration order. [`SourceId`]s are handed out by a [`Catalog`] built over
//! such a table and compare by their position in it.
//!
//! The "remote" set excludes the local-files and unknown placeholders, and the
//! debug-only source unless debug sources are requested.

mod builtin;

pub use builtin::BUILTIN_SOURCES;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Kind of content a source serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Manga,
    Manhwa,
    Manhua,
    Comics,
    Novel,
    Hentai,
    Other,
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentType::Manga => write!(f, "manga"),
            ContentType::Manhwa => write!(f, "manhwa"),
            ContentType::Manhua => write!(f, "manhua"),
            ContentType::Comics => write!(f, "comics"),
            ContentType::Novel => write!(f, "novel"),
            ContentType::Hentai => write!(f, "hentai"),
            ContentType::Other => write!(f, "other"),
        }
    }
}

impl FromStr for ContentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "manga" => Ok(ContentType::Manga),
            "manhwa" => Ok(ContentType::Manhwa),
            "manhua" => Ok(ContentType::Manhua),
            "comics" => Ok(ContentType::Comics),
            "novel" => Ok(ContentType::Novel),
            "hentai" => Ok(ContentType::Hentai),
            "other" => Ok(ContentType::Other),
            _ => Err(Error::Config(format!("Unknown content type: {}", s))),
        }
    }
}

/// Role of a catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// A real content provider
    Remote,
    /// Local files pseudo-source
    Local,
    /// Placeholder for content whose source is gone
    Unknown,
    /// Test source, only exposed in debug builds
    Debug,
}

/// Static metadata for one catalog entry
#[derive(Debug)]
pub struct SourceInfo {
    /// Stable identifier, used as the persisted key
    pub name: &'static str,
    /// Human-readable title
    pub title: &'static str,
    /// Content language, `None` for multilingual sources
    pub locale: Option<&'static str>,
    pub content_type: ContentType,
    pub kind: SourceKind,
    pub is_broken: bool,
    pub is_nsfw: bool,
}

impl SourceInfo {
    pub const fn remote(
        name: &'static str,
        title: &'static str,
        locale: Option<&'static str>,
        content_type: ContentType,
    ) -> Self {
        Self {
            name,
            title,
            locale,
            content_type,
            kind: SourceKind::Remote,
            is_broken: false,
            // Hentai is always adult content; other types opt in via `nsfw()`
            is_nsfw: matches!(content_type, ContentType::Hentai),
        }
    }

    pub const fn special(name: &'static str, title: &'static str, kind: SourceKind) -> Self {
        Self {
            name,
            title,
            locale: None,
            content_type: ContentType::Other,
            kind,
            is_broken: false,
            is_nsfw: false,
        }
    }

    pub const fn nsfw(mut self) -> Self {
        self.is_nsfw = true;
        self
    }

    pub const fn broken(mut self) -> Self {
        self.is_broken = true;
        self
    }
}

/// Identifier of a catalog source
///
/// Ordered by declaration order in the catalog table it came from.
#[derive(Clone, Copy)]
pub struct SourceId {
    ordinal: u32,
    info: &'static SourceInfo,
}

impl SourceId {
    pub fn name(&self) -> &'static str {
        self.info.name
    }

    pub fn title(&self) -> &'static str {
        self.info.title
    }

    pub fn locale(&self) -> Option<&'static str> {
        self.info.locale
    }

    pub fn content_type(&self) -> ContentType {
        self.info.content_type
    }

    pub fn kind(&self) -> SourceKind {
        self.info.kind
    }

    pub fn is_broken(&self) -> bool {
        self.info.is_broken
    }

    pub fn is_nsfw(&self) -> bool {
        self.info.is_nsfw
    }
}

impl PartialEq for SourceId {
    fn eq(&self, other: &Self) -> bool {
        self.ordinal == other.ordinal
    }
}

impl Eq for SourceId {}

impl Hash for SourceId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ordinal.hash(state);
    }
}

impl PartialOrd for SourceId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SourceId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ordinal.cmp(&other.ordinal)
    }
}

impl std::fmt::Debug for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.info.name)
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.info.name)
    }
}

impl Serialize for SourceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.info.name)
    }
}

/// The fixed universe of sources known to this build
#[derive(Debug)]
pub struct Catalog {
    by_name: HashMap<&'static str, SourceId>,
    remote: BTreeSet<SourceId>,
}

impl Catalog {
    /// Build a catalog over a static table
    pub fn new(table: &'static [SourceInfo], include_debug: bool) -> Self {
        let mut by_name = HashMap::with_capacity(table.len());
        let mut remote = BTreeSet::new();

        for (ordinal, info) in table.iter().enumerate() {
            let id = SourceId {
                ordinal: ordinal as u32,
                info,
            };
            by_name.insert(info.name, id);
            match info.kind {
                SourceKind::Remote => {
                    remote.insert(id);
                }
                SourceKind::Debug if include_debug => {
                    remote.insert(id);
                }
                _ => {}
            }
        }

        Self { by_name, remote }
    }

    /// The catalog compiled into this crate
    pub fn builtin(include_debug: bool) -> Self {
        Self::new(BUILTIN_SOURCES, include_debug)
    }

    /// Look up any catalog entry by its stable name, placeholders included
    pub fn lookup(&self, name: &str) -> Option<SourceId> {
        self.by_name.get(name).copied()
    }

    /// Look up a name and keep it only if it is a live remote source
    pub fn resolve(&self, name: &str) -> Option<SourceId> {
        self.lookup(name).filter(|id| self.remote.contains(id))
    }

    /// Like [`Catalog::resolve`], but an unknown name is an error
    pub fn require(&self, name: &str) -> Result<SourceId> {
        self.resolve(name)
            .ok_or_else(|| Error::UnknownSource(name.to_string()))
    }

    /// All remote sources in declaration order
    pub fn remote_sources(&self) -> &BTreeSet<SourceId> {
        &self.remote
    }

    /// Number of remote sources
    pub fn len(&self) -> usize {
        self.remote.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remote.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{ContentType, SourceInfo, SourceKind};

    /// Catalog {A, B, C} plus placeholders
    pub static ABC: &[SourceInfo] = &[
        SourceInfo::special("LOCAL", "Local", SourceKind::Local),
        SourceInfo::remote("A", "Alpha", Some("en"), ContentType::Manga),
        SourceInfo::remote("B", "Bravo", Some("en"), ContentType::Manga),
        SourceInfo::remote("C", "Charlie", Some("en"), ContentType::Manga),
        SourceInfo::special("UNKNOWN", "Unknown", SourceKind::Unknown),
    ];

    /// A catalog exercising every filter dimension
    pub static MIXED: &[SourceInfo] = &[
        SourceInfo::special("LOCAL", "Local", SourceKind::Local),
        SourceInfo::remote("ZETA", "zeta scans", Some("en"), ContentType::Manga),
        SourceInfo::remote("ADULT", "Adult Reader", Some("en"), ContentType::Hentai),
        SourceInfo::remote("RUMANGA", "Read Manga", Some("ru"), ContentType::Manga).broken(),
        SourceInfo::remote("TOONS", "Toons", Some("ko"), ContentType::Manhwa),
        SourceInfo::remote("BLAND", "Bland Comics", None, ContentType::Comics).nsfw(),
        SourceInfo::special("UNKNOWN", "Unknown", SourceKind::Unknown),
        SourceInfo::special("DUMMY", "Dummy", SourceKind::Debug),
    ];
}
