//! Default values for configuration

/// Default application version stamped on newly reconciled sources
pub fn default_app_version() -> i64 {
    std::env::var("SOURCEREG_APP_VERSION")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(1)
}

/// Debug-only sources are visible in debug builds
pub fn default_include_debug_sources() -> bool {
    cfg!(debug_assertions)
}

/// Default SQLite pool size
pub fn default_max_connections() -> u32 {
    5
}

/// Default busy timeout in seconds
pub fn default_busy_timeout_secs() -> u64 {
    5
}

/// Default capacity hint for the top-sources list
pub fn default_top_sources_limit() -> usize {
    10
}
