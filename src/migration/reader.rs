//! Reads the legacy fragments out of the storage medium.

use super::legacy_types::{FragmentSlot, LegacyFragmentSet};
use crate::storage::KeyValueStore;
use serde_json::Value;
use tracing::warn;

/// Load all six legacy fragments. Never fails: an unreadable, unparsable or
/// wrongly shaped entry is replaced by its default and the others still
/// load.
pub fn load_fragments<S: KeyValueStore + ?Sized>(store: &S) -> LegacyFragmentSet {
    let mut fragments = LegacyFragmentSet::default();
    for slot in FragmentSlot::ALL {
        let value = read_fragment(store, slot);
        fragments.assign(slot, value);
    }
    fragments
}

fn read_fragment<S: KeyValueStore + ?Sized>(store: &S, slot: FragmentSlot) -> Option<Value> {
    let raw = match store.get(slot.key()) {
        Ok(raw) => raw?,
        Err(e) => {
            warn!(fragment = slot.key(), error = %e, "legacy fragment unreadable");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(fragment = slot.key(), error = %e, "legacy fragment is not valid JSON");
            None
        }
    }
}
