//! Load and save handlers

use crate::OrganizerServerHandler;
use crate::schema::AppData;
use mcp_attr::{Result as McpResult, bail_public};

impl OrganizerServerHandler {
    /// Loads the current document payload and renders it as pretty JSON.
    pub async fn handle_load_data(&self) -> McpResult<String> {
        let mut store = self.lock_store();
        let data = store.load();
        drop(store);

        match serde_json::to_string_pretty(&data) {
            Ok(json) => Ok(json),
            Err(e) => bail_public!(_, "Failed to serialize data: {}", e),
        }
    }

    /// Replaces the stored payload. Missing modules and fields take their
    /// defaults; a payload that is not an `AppData` object is refused.
    pub async fn handle_save_data(&self, json: &str) -> McpResult<String> {
        let data: AppData = match serde_json::from_str(json) {
            Ok(data) => data,
            Err(e) => bail_public!(_, "Invalid data: {}", e),
        };

        let mut store = self.lock_store();
        if let Err(e) = store.save(data) {
            drop(store);
            bail_public!(_, "Failed to save: {}", e);
        }
        Ok("Data saved".to_string())
    }
}
