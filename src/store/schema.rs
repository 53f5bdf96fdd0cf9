//! SQLite schema definition

/// SQL schema for the source registry database
pub const SCHEMA_SQL: &str = r#"
-- Sources: persisted state for every catalog source ever seen
CREATE TABLE IF NOT EXISTS sources (
    source TEXT PRIMARY KEY NOT NULL,
    enabled INTEGER NOT NULL DEFAULT 0,
    pinned INTEGER NOT NULL DEFAULT 0,
    sort_key INTEGER NOT NULL,
    added_in INTEGER NOT NULL DEFAULT 0,
    last_used_at INTEGER NOT NULL DEFAULT 0
);

-- Indexes for ordered and filtered reads
CREATE INDEX IF NOT EXISTS idx_sources_sort_key ON sources(sort_key);
CREATE INDEX IF NOT EXISTS idx_sources_enabled ON sources(enabled);
CREATE INDEX IF NOT EXISTS idx_sources_added_in ON sources(added_in);
"#;
