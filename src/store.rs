//! The unified store: the load/save contract the rest of the application
//! talks to.
//!
//! `load` walks the startup decision tree (fresh install, legacy migration,
//! or unified read) and always hands back a usable document. `save`
//! propagates every write failure.

use crate::backup::{BackupManager, BackupOutcome, read_backup};
use crate::error::StoreResult;
use crate::migration::{
    self, Detection, MigrationStatus, StorageVersion, StoredEnvelope, append_status,
    load_fragments, read_history,
};
use crate::schema::keys::{CURRENT_VERSION, FIRST_RUN_KEY, LEGACY_VERSION, V2_KEY};
use crate::schema::{AppData, StoredDocument};
use crate::storage::KeyValueStore;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Owner of the unified document, the first-run marker and the migration
/// log.
pub struct UnifiedStore<S: KeyValueStore> {
    store: S,
    clock: fn() -> DateTime<Utc>,
    /// Set once a legacy migration attempt failed in this process. Later
    /// loads migrate in memory only, so the log is not flooded with one
    /// failed attempt per load.
    legacy_attempt_failed: bool,
}

impl<S: KeyValueStore> UnifiedStore<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            clock: Utc::now,
            legacy_attempt_failed: false,
        }
    }

    /// Replace the wall clock, for deterministic timestamps.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn storage(&self) -> &S {
        &self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    pub fn detect_storage_version(&self) -> StorageVersion {
        migration::detect(&self.store).version()
    }

    /// Current document payload, migrating or initializing storage first
    /// when needed.
    pub fn load(&mut self) -> AppData {
        self.load_document().data
    }

    /// Like `load`, with the envelope.
    pub fn load_document(&mut self) -> StoredDocument {
        match migration::detect(&self.store) {
            Detection::Fresh => self.initialize(),
            Detection::V1 => self.migrate_legacy(),
            Detection::V2(envelope) => self.read_unified(envelope),
        }
    }

    fn initialize(&mut self) -> StoredDocument {
        let doc = StoredDocument::wrap(AppData::default(), None, self.now());
        match self.write_document(&doc) {
            Ok(()) => info!("initialized fresh storage"),
            Err(e) => warn!(error = %e, "cannot write initial document"),
        }
        doc
    }

    fn migrate_legacy(&mut self) -> StoredDocument {
        let now = self.now();
        let fragments = load_fragments(&self.store);
        let migrated = migration::migrate_payload(fragments.into_value(), LEGACY_VERSION);
        let lost: Vec<String> = migrated.fallbacks().map(ToString::to_string).collect();
        let doc = StoredDocument::wrap(migrated.data, None, now);

        if self.legacy_attempt_failed {
            debug!("legacy migration already failed in this process, serving it from memory");
            return doc;
        }
        info!(from = LEGACY_VERSION, to = CURRENT_VERSION, "migrating legacy storage");

        let backup = BackupManager::new(&mut self.store).snapshot(now);
        let backup_created = backup == BackupOutcome::Created;

        let outcome = if !backup.is_ok() {
            Err("backup of legacy data could not be written".to_string())
        } else if !lost.is_empty() {
            Err(format!(
                "legacy data could not be read completely, nothing was written: {}",
                lost.join("; ")
            ))
        } else {
            self.write_document(&doc).map_err(|e| e.to_string())
        };

        let status = match outcome {
            Ok(()) => {
                info!(backup_created, "legacy storage migrated");
                MigrationStatus::succeeded(LEGACY_VERSION, CURRENT_VERSION, backup_created, now)
            }
            Err(error) => {
                warn!(error = %error, "legacy migration not persisted");
                self.legacy_attempt_failed = true;
                MigrationStatus::failed(LEGACY_VERSION, CURRENT_VERSION, backup_created, error, now)
            }
        };

        if let Err(e) = append_status(&mut self.store, status) {
            warn!(error = %e, "cannot record migration status");
        }
        doc
    }

    fn read_unified(&mut self, envelope: StoredEnvelope) -> StoredDocument {
        let now = self.now();
        let migrated = migration::migrate_payload(envelope.data, CURRENT_VERSION);
        let lossy = migrated.is_lossy();
        let applied = migrated.applied;
        let created = envelope.created.unwrap_or(now);

        if applied.is_empty() || lossy {
            if lossy {
                warn!(steps = ?applied, "unified document has unreadable parts, not writing it back");
            }
            let last_modified = envelope.last_modified.unwrap_or(created).max(created);
            return StoredDocument {
                version: CURRENT_VERSION.to_string(),
                created,
                last_modified,
                data: migrated.data,
            };
        }

        let doc = StoredDocument::wrap(migrated.data, Some(created), now);
        match self.write_document(&doc) {
            Ok(()) => info!(steps = ?applied, "unified document repaired"),
            Err(e) => warn!(error = %e, steps = ?applied, "repaired document could not be written"),
        }
        doc
    }

    /// Persist `data`, keeping the stored creation time when there is one.
    pub fn save(&mut self, data: AppData) -> StoreResult<()> {
        let doc = StoredDocument::wrap(data, self.stored_created(), self.now());
        self.write_document(&doc)
    }

    fn stored_created(&self) -> Option<DateTime<Utc>> {
        let raw = self.store.get(V2_KEY).ok()??;
        StoredEnvelope::parse(&raw)?.created
    }

    fn write_document(&mut self, doc: &StoredDocument) -> StoreResult<()> {
        let raw = serde_json::to_string(doc)?;
        self.store.set(V2_KEY, &raw)
    }

    pub fn merge_with_defaults(partial: Value) -> AppData {
        migration::merge_with_defaults(partial)
    }

    pub fn is_first_time(&self) -> bool {
        !self.store.contains(FIRST_RUN_KEY).unwrap_or(false)
    }

    pub fn mark_first_time_complete(&mut self) -> StoreResult<()> {
        self.store.set(FIRST_RUN_KEY, "true")
    }

    /// True when a backup exists that `restore_v1_from_backup` could use.
    pub fn has_v1_backup(&self) -> bool {
        read_backup(&self.store).is_some()
    }

    /// Roll back to the legacy layout. False when there is no backup.
    pub fn restore_v1_from_backup(&mut self) -> bool {
        let restored = BackupManager::new(&mut self.store).restore();
        if restored {
            self.legacy_attempt_failed = false;
        }
        restored
    }

    /// Overwrite the legacy backup with the current legacy entries.
    pub fn replace_v1_backup(&mut self) -> bool {
        let now = self.now();
        BackupManager::new(&mut self.store).replace_backup(now)
    }

    pub fn delete_v1_backup(&mut self) -> bool {
        BackupManager::new(&mut self.store).delete_backup()
    }

    pub fn migration_history(&self) -> Vec<MigrationStatus> {
        read_history(&self.store)
    }
}
