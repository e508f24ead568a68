//! Append-only audit log of migration attempts.

use crate::error::StoreResult;
use crate::schema::keys::MIGRATION_STATUS_KEY;
use crate::storage::KeyValueStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Outcome of one migration attempt. Written once; a retry appends a new
/// record instead of editing this one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationStatus {
    pub attempted: bool,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    pub from_version: String,
    pub to_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub backup_created: bool,
}

impl MigrationStatus {
    pub fn succeeded(from: &str, to: &str, backup_created: bool, at: DateTime<Utc>) -> Self {
        Self {
            attempted: true,
            success: true,
            timestamp: at,
            from_version: from.to_string(),
            to_version: to.to_string(),
            error: None,
            backup_created,
        }
    }

    pub fn failed(
        from: &str,
        to: &str,
        backup_created: bool,
        error: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::succeeded(from, to, backup_created, at)
        }
    }
}

/// All recorded attempts, oldest first. An unreadable log reads as empty.
pub fn read_history<S: KeyValueStore + ?Sized>(store: &S) -> Vec<MigrationStatus> {
    let raw = match store.get(MIGRATION_STATUS_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!(error = %e, "migration history unreadable");
            return Vec::new();
        }
    };
    serde_json::from_str(&raw).unwrap_or_else(|e| {
        warn!(error = %e, "migration history is not valid JSON");
        Vec::new()
    })
}

/// Append one record, leaving earlier records as they were.
pub fn append_status<S: KeyValueStore + ?Sized>(
    store: &mut S,
    status: MigrationStatus,
) -> StoreResult<()> {
    let mut history = read_history(&*store);
    history.push(status);
    let raw = serde_json::to_string(&history)?;
    store.set(MIGRATION_STATUS_KEY, &raw)
}
