//! Common test utilities for integration tests

use chrono::{DateTime, TimeZone, Utc};
use organizer_store::{MemoryStore, OrganizerServerHandler, UnifiedStore};
use tempfile::TempDir;

/// Clock used by every store built here.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 4, 1, 9, 30, 0).unwrap()
}

/// Memory store seeded with raw `(key, value)` entries.
pub fn memory_store(entries: &[(&str, &str)]) -> MemoryStore {
    let mut store = MemoryStore::new();
    for (key, value) in entries {
        store.insert(key, value);
    }
    store
}

/// Unified store over seeded memory with the fixed clock.
pub fn unified_store(entries: &[(&str, &str)]) -> UnifiedStore<MemoryStore> {
    UnifiedStore::new(memory_store(entries)).with_clock(fixed_now)
}

/// Server handler over a fresh data file in a temporary directory.
pub fn get_test_handler() -> (OrganizerServerHandler, TempDir) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("organizer.toml");
    let handler = OrganizerServerHandler::new(path.to_str().unwrap()).unwrap();
    (handler, dir)
}
