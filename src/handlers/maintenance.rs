//! First-run, version and backup handlers

use crate::OrganizerServerHandler;
use crate::formatting;
use mcp_attr::{Result as McpResult, bail_public};

impl OrganizerServerHandler {
    pub async fn handle_is_first_time(&self) -> McpResult<String> {
        let store = self.lock_store();
        Ok(store.is_first_time().to_string())
    }

    pub async fn handle_mark_first_time_complete(&self) -> McpResult<String> {
        let mut store = self.lock_store();
        if let Err(e) = store.mark_first_time_complete() {
            drop(store);
            bail_public!(_, "Failed to save: {}", e);
        }
        Ok("First run marked complete".to_string())
    }

    pub async fn handle_detect_storage_version(&self) -> McpResult<String> {
        let store = self.lock_store();
        Ok(store.detect_storage_version().to_string())
    }

    pub async fn handle_has_v1_backup(&self) -> McpResult<String> {
        let store = self.lock_store();
        Ok(store.has_v1_backup().to_string())
    }

    /// Rolls back to the legacy layout. The next load migrates again.
    pub async fn handle_restore_v1_from_backup(&self) -> McpResult<String> {
        let mut store = self.lock_store();
        if !store.restore_v1_from_backup() {
            drop(store);
            bail_public!(_, "No usable legacy backup to restore");
        }
        Ok("Legacy data restored; it will be migrated again on the next load".to_string())
    }

    pub async fn handle_migration_history(&self) -> McpResult<String> {
        let store = self.lock_store();
        let history = store.migration_history();
        Ok(formatting::format_migration_history(&history))
    }
}
