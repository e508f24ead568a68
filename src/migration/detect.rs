//! Storage generation detection.

use crate::schema::keys::{CURRENT_VERSION, V1_MAIN_KEY, V2_KEY};
use crate::storage::KeyValueStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use tracing::{debug, warn};

/// Generation reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageVersion {
    /// Nothing stored yet.
    None,
    V1,
    V2,
}

impl fmt::Display for StorageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::V1 => "v1",
            Self::V2 => "v2",
        })
    }
}

/// Parsed unified-document envelope, with the payload still untyped so the
/// field-level migrations can run on it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEnvelope {
    pub created: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
    pub data: Value,
}

impl StoredEnvelope {
    /// Accepts a JSON object whose `version` is the current tag. A missing
    /// `data` field reads as an empty payload.
    pub fn from_object(object: Map<String, Value>) -> Option<Self> {
        if object.get("version").and_then(Value::as_str) != Some(CURRENT_VERSION) {
            return None;
        }
        let mut object = object;
        Some(Self {
            created: parse_timestamp(object.get("created")),
            last_modified: parse_timestamp(object.get("lastModified")),
            data: object
                .remove("data")
                .unwrap_or_else(|| Value::Object(Map::new())),
        })
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match serde_json::from_str(raw) {
            Ok(Value::Object(object)) => Self::from_object(object),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "unified document is not valid JSON");
                None
            }
        }
    }
}

fn parse_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    value
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Generation of the medium, resolved once. The V2 variant carries the
/// parsed envelope so nothing downstream parses it again.
#[derive(Debug, Clone, PartialEq)]
pub enum Detection {
    Fresh,
    V1,
    V2(StoredEnvelope),
}

impl Detection {
    pub fn version(&self) -> StorageVersion {
        match self {
            Self::Fresh => StorageVersion::None,
            Self::V1 => StorageVersion::V1,
            Self::V2(_) => StorageVersion::V2,
        }
    }
}

/// Classify the medium. A valid unified document wins over a legacy
/// bundle; a corrupt one counts as absent. The legacy bundle only has to
/// exist. Read-only.
pub fn detect<S: KeyValueStore + ?Sized>(store: &S) -> Detection {
    match store.get(V2_KEY) {
        Ok(Some(raw)) => {
            if let Some(envelope) = StoredEnvelope::parse(&raw) {
                debug!("detected unified storage");
                return Detection::V2(envelope);
            }
            warn!(key = V2_KEY, "unified document unusable, treating as absent");
        }
        Ok(None) => {}
        Err(e) => warn!(key = V2_KEY, error = %e, "unified document unreadable"),
    }

    match store.contains(V1_MAIN_KEY) {
        Ok(true) => {
            debug!("detected legacy storage");
            Detection::V1
        }
        Ok(false) => Detection::Fresh,
        Err(e) => {
            warn!(key = V1_MAIN_KEY, error = %e, "legacy bundle unreadable");
            Detection::Fresh
        }
    }
}
