//! MCP tool handlers for the organizer store
//!
//! Each tool in `lib.rs` delegates to a `handle_*` method defined here,
//! grouped by concern.

pub mod data;
pub mod maintenance;
pub mod transfer;
