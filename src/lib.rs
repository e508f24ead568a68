//! Organizer Store Library
//!
//! Versioned storage engine for a personal organizer (university,
//! freelancing, programming, finance, home and misc records), served over
//! the Model Context Protocol.
//!
//! # Architecture
//!
//! - **MCP Layer**: `OrganizerServerHandler` - tool surface over stdio
//! - **Engine Layer**: `store`, `migration`, `backup`, `codec` - version
//!   detection, the migration pipeline, legacy backup and import/export
//! - **Persistence Layer**: `storage` - the `KeyValueStore` port with an
//!   in-memory and a TOML file implementation
//!
//! Every load detects the storage generation first. Legacy (V1) data is
//! backed up and migrated into the unified (V2) document; unified data
//! runs the idempotent in-version repairs and is merged with defaults.
//!
//! # Example
//!
//! ```no_run
//! use organizer_store::OrganizerServerHandler;
//! use anyhow::Result;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let handler = OrganizerServerHandler::new("organizer.toml")?;
//!     // Use handler with MCP server...
//!     Ok(())
//! }
//! ```

pub mod backup;
pub mod codec;
pub mod error;
pub mod formatting;
pub mod handlers;
pub mod logging;
pub mod migration;
pub mod schema;
pub mod storage;
pub mod store;

use anyhow::Result;
use mcp_attr::Result as McpResult;
use mcp_attr::server::{McpServer, mcp_server};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::info;

pub use error::{ImportError, StoreError, StoreResult};
pub use migration::{MigrationStatus, StorageVersion};
pub use schema::{AppData, StoredDocument, create_default_app_data};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use store::UnifiedStore;

/// MCP Server handler for the organizer store
///
/// Owns the unified store over a TOML key/value file. Tool calls are
/// serialized through the mutex, so no two operations interleave.
pub struct OrganizerServerHandler {
    pub(crate) store: Mutex<UnifiedStore<FileStore>>,
    pub(crate) export_dir: PathBuf,
}

impl OrganizerServerHandler {
    /// Open the data file and run the startup load, migrating legacy data
    /// if there is any.
    ///
    /// # Arguments
    /// * `storage_path` - Path to the key/value file (TOML format)
    pub fn new(storage_path: &str) -> Result<Self> {
        let file_store = FileStore::open(storage_path)?;
        let export_dir = Path::new(storage_path)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

        let mut store = UnifiedStore::new(file_store);
        let version = store.detect_storage_version();
        store.load();
        info!(path = storage_path, detected = %version, "organizer store opened");

        Ok(Self {
            store: Mutex::new(store),
            export_dir,
        })
    }

    /// Lock the store. A poisoned lock still hands out the store: every
    /// operation leaves storage consistent before it can panic.
    pub(crate) fn lock_store(&self) -> MutexGuard<'_, UnifiedStore<FileStore>> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Personal organizer storage server.
///
/// Holds one unified document with the modules university, freelancing,
/// programming, finance, home, misc, settings and notificationSettings.
/// Data written by the legacy application (six separate entries) is
/// migrated automatically on first load, after a backup of the legacy
/// entries is taken.
///
/// Typical flow:
/// - **load_data**: read the document (JSON)
/// - **save_data**: write back a modified document
/// - **export_data** / **import_data**: move the document between machines
/// - **restore_v1_from_backup**: roll back a migration
#[mcp_server]
impl McpServer for OrganizerServerHandler {
    /// **Load**: Return the full document as JSON. Legacy data is migrated first.
    #[tool]
    pub async fn load_data(&self) -> McpResult<String> {
        self.handle_load_data().await
    }

    /// **Save**: Replace the document. Missing modules and fields take their defaults.
    #[tool]
    pub async fn save_data(
        &self,
        /// Document payload as JSON (same shape as load_data returns)
        json: String,
    ) -> McpResult<String> {
        self.handle_save_data(&json).await
    }

    /// **Export**: Write organizer-export-YYYY-MM-DD.json. Defaults to the data file's directory.
    #[tool]
    pub async fn export_data(
        &self,
        /// Target directory (optional)
        dir: Option<String>,
    ) -> McpResult<String> {
        self.handle_export_data(dir).await
    }

    /// **Import**: Replace the document with an export file. Accepts current exports, legacy exports and bare legacy objects.
    #[tool]
    pub async fn import_data(
        &self,
        /// Path of the JSON file to import
        path: String,
    ) -> McpResult<String> {
        self.handle_import_data(&path).await
    }

    /// **Onboarding**: "true" until mark_first_time_complete has been called.
    #[tool]
    async fn is_first_time(&self) -> McpResult<String> {
        self.handle_is_first_time().await
    }

    /// **Onboarding**: Record that the first-run flow is done.
    #[tool]
    async fn mark_first_time_complete(&self) -> McpResult<String> {
        self.handle_mark_first_time_complete().await
    }

    /// **Diagnostics**: Storage generation currently on disk: none, v1 or v2.
    #[tool]
    pub async fn detect_storage_version(&self) -> McpResult<String> {
        self.handle_detect_storage_version().await
    }

    /// **Backup**: "true" when a backup of the legacy data exists.
    #[tool]
    pub async fn has_v1_backup(&self) -> McpResult<String> {
        self.handle_has_v1_backup().await
    }

    /// **Backup**: Restore the legacy entries and drop the unified document. The next load migrates again.
    #[tool]
    async fn restore_v1_from_backup(&self) -> McpResult<String> {
        self.handle_restore_v1_from_backup().await
    }

    /// **Diagnostics**: Every recorded migration attempt, oldest first.
    #[tool]
    pub async fn migration_history(&self) -> McpResult<String> {
        self.handle_migration_history().await
    }
}
