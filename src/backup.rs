//! Snapshot and rollback of the legacy fragments.
//!
//! The backup holds the raw strings of the six legacy entries exactly as
//! they were before the first migration attempt, so a rollback restores
//! them byte for byte.

use crate::schema::keys::{BACKUP_KEY, V1_KEYS, V2_KEY};
use crate::storage::KeyValueStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Stored form of the backup. `None` marks a key that was absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct V1Backup {
    pub created_at: DateTime<Utc>,
    pub entries: BTreeMap<String, Option<String>>,
}

/// What `snapshot` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupOutcome {
    Created,
    /// A readable backup already existed and was left as it was.
    Kept,
    Failed,
}

impl BackupOutcome {
    /// Whether a usable backup exists afterwards.
    pub fn is_ok(self) -> bool {
        !matches!(self, Self::Failed)
    }
}

/// The stored backup, if present and readable.
pub fn read_backup<S: KeyValueStore + ?Sized>(store: &S) -> Option<V1Backup> {
    let raw = store.get(BACKUP_KEY).ok()??;
    match serde_json::from_str(&raw) {
        Ok(backup) => Some(backup),
        Err(e) => {
            warn!(error = %e, "legacy backup is unreadable");
            None
        }
    }
}

/// Sole writer of the backup key.
pub struct BackupManager<'a, S: KeyValueStore + ?Sized> {
    store: &'a mut S,
}

impl<'a, S: KeyValueStore + ?Sized> BackupManager<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        Self { store }
    }

    /// Whether a usable backup exists; an unreadable one does not count.
    pub fn has_backup(&self) -> bool {
        self.read().is_some()
    }

    pub fn read(&self) -> Option<V1Backup> {
        read_backup(&*self.store)
    }

    /// Snapshot the legacy entries unless a readable backup already exists.
    pub fn snapshot(&mut self, now: DateTime<Utc>) -> BackupOutcome {
        if self.read().is_some() {
            info!("legacy backup already present, keeping it");
            return BackupOutcome::Kept;
        }
        self.write_snapshot(now)
    }

    /// Snapshot the legacy entries; true when a usable backup exists
    /// afterwards.
    pub fn backup(&mut self, now: DateTime<Utc>) -> bool {
        self.snapshot(now).is_ok()
    }

    /// Overwrite any existing backup with the current legacy entries.
    pub fn replace_backup(&mut self, now: DateTime<Utc>) -> bool {
        self.write_snapshot(now) == BackupOutcome::Created
    }

    fn write_snapshot(&mut self, now: DateTime<Utc>) -> BackupOutcome {
        let mut entries = BTreeMap::new();
        for key in V1_KEYS {
            match self.store.get(key) {
                Ok(value) => {
                    entries.insert(key.to_string(), value);
                }
                Err(e) => {
                    warn!(key, error = %e, "cannot read legacy entry for backup");
                    return BackupOutcome::Failed;
                }
            }
        }

        let backup = V1Backup {
            created_at: now,
            entries,
        };
        let raw = match serde_json::to_string(&backup) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "cannot serialize legacy backup");
                return BackupOutcome::Failed;
            }
        };
        match self.store.set(BACKUP_KEY, &raw) {
            Ok(()) => {
                info!("legacy backup created");
                BackupOutcome::Created
            }
            Err(e) => {
                warn!(error = %e, "cannot write legacy backup");
                BackupOutcome::Failed
            }
        }
    }

    /// Write every backed-up legacy value back verbatim and drop the unified
    /// document so the next load detects V1 again. Keys whose backed-up
    /// value was absent are left as they are. False when there is no usable
    /// backup or a write fails.
    pub fn restore(&mut self) -> bool {
        let Some(backup) = self.read() else {
            return false;
        };
        for key in V1_KEYS {
            if let Some(Some(raw)) = backup.entries.get(key)
                && let Err(e) = self.store.set(key, raw)
            {
                warn!(key, error = %e, "restoring legacy entry failed");
                return false;
            }
        }
        if let Err(e) = self.store.remove(V2_KEY) {
            warn!(error = %e, "cannot remove unified document after restore");
            return false;
        }
        info!(backup_created_at = %backup.created_at, "legacy data restored from backup");
        true
    }

    /// Delete the backup. Only ever done on explicit operator request.
    pub fn delete_backup(&mut self) -> bool {
        match self.store.remove(BACKUP_KEY) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "cannot delete legacy backup");
                false
            }
        }
    }
}
