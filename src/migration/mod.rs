//! Migration between storage generations.
//!
//! - **V1**: six independent entries (main bundle, freelancing projects,
//!   freelancing project tasks, freelancing standalone tasks, programming,
//!   finance) with no version tag
//! - **V2**: one unified document `{ version: "2.0.0", created,
//!   lastModified, data }`
//!
//! ## Adding a migration
//!
//! 1. Write an idempotent `fn(&mut Value) -> bool` (see `normalize`)
//! 2. Append a `MigrationStep` to `all_steps` with its `from`/`to` versions
//! 3. Add tests showing a second run changes nothing

mod detect;
mod legacy_types;
mod merge;
mod migrate;
mod normalize;
mod reader;
mod status;

pub use detect::{Detection, StorageVersion, StoredEnvelope, detect};
pub use legacy_types::{FragmentSlot, LegacyFragmentSet};
pub use merge::{deep_merge, merge_checked, merge_with_defaults, shape_conflicts};
pub use migrate::{
    MigrationStep, Migrated, all_steps, migrate, migrate_data, migrate_payload, run_steps,
};
pub use normalize::{
    MAIN_ACCOUNT_ID, assign_transaction_accounts, normalize_transaction_nature,
    resolve_category, slugify, title_case,
};
pub use reader::load_fragments;
pub use status::{MigrationStatus, append_status, read_history};
