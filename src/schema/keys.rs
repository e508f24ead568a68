//! Storage key names and generation tags.
//!
//! Key names are part of the on-disk format; changing one orphans existing
//! installations.

/// Version tag of the unified document.
pub const CURRENT_VERSION: &str = "2.0.0";

/// Version the legacy fragment layout is treated as when ordering
/// migration steps.
pub const LEGACY_VERSION: &str = "1.0.0";

/// Unified (V2) document.
pub const V2_KEY: &str = "organizer-data-v2";

/// Legacy main bundle. Its presence alone marks a V1 installation.
pub const V1_MAIN_KEY: &str = "organizer-data";
pub const V1_FREELANCING_PROJECTS_KEY: &str = "organizer-freelancing-projects";
pub const V1_FREELANCING_PROJECT_TASKS_KEY: &str = "organizer-freelancing-project-tasks";
pub const V1_FREELANCING_STANDALONE_TASKS_KEY: &str = "organizer-freelancing-standalone-tasks";
pub const V1_PROGRAMMING_KEY: &str = "organizer-programming";
pub const V1_FINANCE_KEY: &str = "organizer-finance";

/// All legacy fragment keys, main bundle first.
pub const V1_KEYS: [&str; 6] = [
    V1_MAIN_KEY,
    V1_FREELANCING_PROJECTS_KEY,
    V1_FREELANCING_PROJECT_TASKS_KEY,
    V1_FREELANCING_STANDALONE_TASKS_KEY,
    V1_PROGRAMMING_KEY,
    V1_FINANCE_KEY,
];

/// Snapshot of the legacy fragments taken before migration.
pub const BACKUP_KEY: &str = "organizer-v1-backup";

/// Set once the user finished onboarding.
pub const FIRST_RUN_KEY: &str = "organizer-first-run-complete";

/// Append-only list of migration attempts.
pub const MIGRATION_STATUS_KEY: &str = "organizer-migration-status";
