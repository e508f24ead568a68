//! Export and import handlers

use crate::OrganizerServerHandler;
use crate::formatting;
use chrono::Local;
use mcp_attr::{Result as McpResult, bail_public};
use std::path::{Path, PathBuf};

impl OrganizerServerHandler {
    /// Writes the dated export file into `dir`, or next to the data file.
    pub async fn handle_export_data(&self, dir: Option<String>) -> McpResult<String> {
        let target = dir.map_or_else(|| self.export_dir.clone(), PathBuf::from);
        let today = Local::now().date_naive();

        let mut store = self.lock_store();
        match store.export_to_dir(&target, today) {
            Ok(path) => Ok(format!("Exported to {}", path.display())),
            Err(e) => {
                drop(store);
                bail_public!(_, "Failed to export: {}", e)
            }
        }
    }

    /// Imports a unified export, a legacy export or a bare legacy object.
    pub async fn handle_import_data(&self, path: &str) -> McpResult<String> {
        let mut store = self.lock_store();
        match store.import_file(Path::new(path)) {
            Ok(data) => Ok(format!(
                "Imported {}\n\n{}",
                path,
                formatting::format_summary(&data)
            )),
            Err(e) => {
                drop(store);
                bail_public!(_, "Failed to import {}: {}", path, e)
            }
        }
    }
}
