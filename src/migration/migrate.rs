//! The migration pipeline.
//!
//! Every schema change is one `MigrationStep` identified by the versions it
//! goes from and to. Steps run in declaration order; a document only runs
//! the steps whose `from` is at or above its own version. Intra-V2 steps
//! (`2.0.0 -> 2.0.0`) run on every load and must be idempotent.

use super::legacy_types::{FragmentSlot, LegacyFragmentSet};
use super::merge::merge_checked;
use super::normalize::{assign_transaction_accounts, normalize_transaction_nature};
use crate::schema::keys::{CURRENT_VERSION, LEGACY_VERSION};
use crate::schema::{AppData, DecodeIssue, Module, StoredDocument, json_kind};
use chrono::{DateTime, Utc};
use semver::Version;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// One schema migration over the untyped payload. `apply` returns whether
/// it changed anything.
pub struct MigrationStep {
    /// Stable identifier, recorded in logs.
    pub id: &'static str,
    pub from: &'static str,
    pub to: &'static str,
    pub description: &'static str,
    pub apply: fn(&mut Value) -> bool,
}

/// All steps in the order they must run.
pub fn all_steps() -> Vec<MigrationStep> {
    vec![
        MigrationStep {
            id: "v1.unify-fragments",
            from: LEGACY_VERSION,
            to: CURRENT_VERSION,
            description: "Assign the six legacy fragments to unified module slots",
            apply: unify_fragments,
        },
        MigrationStep {
            id: "finance.transaction-nature",
            from: CURRENT_VERSION,
            to: CURRENT_VERSION,
            description: "Turn free-text transaction types into category references and a nature",
            apply: normalize_transaction_nature,
        },
        MigrationStep {
            id: "finance.multi-account",
            from: CURRENT_VERSION,
            to: CURRENT_VERSION,
            description: "Attach every transaction to an account",
            apply: assign_transaction_accounts,
        },
    ]
}

fn parse_version(tag: &str) -> Version {
    Version::parse(tag).unwrap_or_else(|_| {
        warn!(version = tag, "unrecognized version tag, migrating from legacy");
        Version::new(1, 0, 0)
    })
}

/// Run every step applicable to a payload at `source_version`. Returns the
/// ids of the steps that changed it.
pub fn run_steps(value: &mut Value, source_version: &str) -> Vec<&'static str> {
    let source = parse_version(source_version);
    let mut applied = Vec::new();
    for step in all_steps() {
        if parse_version(step.from) < source {
            continue;
        }
        if (step.apply)(value) {
            debug!(step = step.id, from = step.from, to = step.to, "migration step applied");
            applied.push(step.id);
        }
    }
    applied
}

/// Modules copied from the legacy main bundle as they are.
const MAIN_BUNDLE_MODULES: [Module; 5] = [
    Module::University,
    Module::Home,
    Module::Misc,
    Module::Settings,
    Module::NotificationSettings,
];

fn take_present(object: &mut Map<String, Value>, key: &str) -> Option<Value> {
    match object.remove(key) {
        None | Some(Value::Null) => None,
        Some(value) => Some(value),
    }
}

fn non_empty_list(value: Option<Value>) -> Option<Value> {
    match value {
        Some(Value::Array(items)) if items.is_empty() => None,
        other => other,
    }
}

/// `1.0.0 -> 2.0.0`: reshape the fragment value built by
/// `LegacyFragmentSet::into_value` into module slots. Payloads without the
/// `main` fragment are left alone.
fn unify_fragments(value: &mut Value) -> bool {
    let Some(fragments) = value.as_object_mut() else {
        return false;
    };
    let Some(Value::Object(mut main)) = fragments.remove(FragmentSlot::Main.field()) else {
        return false;
    };

    let mut data = Map::new();
    for module in MAIN_BUNDLE_MODULES {
        if let Some(module_value) = take_present(&mut main, module.key()) {
            data.insert(module.key().to_string(), module_value);
        }
    }

    let mut freelancing = match take_present(&mut main, Module::Freelancing.key()) {
        Some(Value::Object(object)) => object,
        None => Map::new(),
        Some(other) => {
            warn!(kind = json_kind(&other), "legacy freelancing entry is not an object, keeping it aside");
            data.insert("freelancingUnparsed".to_string(), other);
            Map::new()
        }
    };
    // the profile and applications used to sit at the top of the bundle
    for key in ["profile", "applications"] {
        let standalone = take_present(&mut main, key);
        if !freelancing.contains_key(key)
            && let Some(found) = standalone
        {
            freelancing.insert(key.to_string(), found);
        }
    }
    for (slot, key) in [
        (FragmentSlot::FreelancingProjects, "projects"),
        (FragmentSlot::FreelancingProjectTasks, "projectTasks"),
        (FragmentSlot::FreelancingStandaloneTasks, "standaloneTasks"),
    ] {
        if let Some(list) = non_empty_list(fragments.remove(slot.field())) {
            freelancing.insert(key.to_string(), list);
        }
    }
    data.insert(
        Module::Freelancing.key().to_string(),
        Value::Object(freelancing),
    );

    for slot in [FragmentSlot::Programming, FragmentSlot::Finance] {
        let module = if slot == FragmentSlot::Programming {
            Module::Programming
        } else {
            Module::Finance
        };
        main.remove(module.key());
        if let Some(fragment) = take_present(fragments, slot.field()) {
            data.insert(module.key().to_string(), fragment);
        }
    }

    // whatever else the bundle carried survives as unknown modules
    for (key, rest) in main {
        data.entry(key).or_insert(rest);
    }

    *value = Value::Object(data);
    true
}

/// Outcome of bringing one payload up to the current shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Migrated {
    pub data: AppData,
    /// Ids of the steps that changed the payload.
    pub applied: Vec<&'static str>,
    /// Values that did not decode, see `AppData::decode`.
    pub issues: Vec<DecodeIssue>,
}

impl Migrated {
    /// Issues where a whole module was replaced by its default. Persisting
    /// such a document would drop the stored module.
    pub fn fallbacks(&self) -> impl Iterator<Item = &DecodeIssue> {
        self.issues.iter().filter(|issue| issue.fell_back)
    }

    pub fn is_lossy(&self) -> bool {
        self.fallbacks().next().is_some()
    }
}

/// Run the applicable steps over a payload at `source_version`, then merge
/// it with defaults, keeping track of every value that did not decode.
pub fn migrate_payload(mut value: Value, source_version: &str) -> Migrated {
    let applied = run_steps(&mut value, source_version);
    let (data, issues) = merge_checked(value);
    Migrated {
        data,
        applied,
        issues,
    }
}

/// Build the unified document from the legacy fragments. Pure apart from
/// the injected clock; never fails.
pub fn migrate(fragments: LegacyFragmentSet, now: DateTime<Utc>) -> StoredDocument {
    let migrated = migrate_payload(fragments.into_value(), LEGACY_VERSION);
    StoredDocument::wrap(migrated.data, None, now)
}

/// Bring a payload at `source_version` up to the current shape: run the
/// applicable steps, then merge with defaults. Returns the typed payload and
/// the ids of the steps that changed it.
pub fn migrate_data(value: Value, source_version: &str) -> (AppData, Vec<&'static str>) {
    let migrated = migrate_payload(value, source_version);
    (migrated.data, migrated.applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::create_default_app_data;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn steps_are_ordered_and_unique() {
        let steps = all_steps();
        let mut ids: Vec<&str> = steps.iter().map(|s| s.id).collect();
        assert_eq!(ids[0], "v1.unify-fragments");
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), steps.len());
        for step in &steps {
            assert!(parse_version(step.from) <= parse_version(step.to));
            assert!(!step.description.is_empty());
        }
    }

    #[test]
    fn current_payload_skips_legacy_step() {
        let mut value = json!({ "main": { "settings": { "userName": "kept" } } });
        let applied = run_steps(&mut value, CURRENT_VERSION);
        assert!(!applied.contains(&"v1.unify-fragments"));
        assert!(value.get("main").is_some());
    }

    #[test]
    fn empty_fragments_migrate_to_defaults() {
        let doc = migrate(LegacyFragmentSet::default(), now());
        assert_eq!(doc.data, create_default_app_data());
        assert_eq!(doc.version, CURRENT_VERSION);
        assert_eq!(doc.created, now());
        assert_eq!(doc.last_modified, now());
    }

    #[test]
    fn fragments_land_in_module_slots() {
        let mut fragments = LegacyFragmentSet::default();
        fragments.assign(
            FragmentSlot::Main,
            Some(json!({
                "settings": { "userName": "Ada" },
                "university": { "currentSemester": "WS25" },
                "profile": { "name": "Ada L.", "skills": ["rust"] },
                "dashboardLayout": "grid"
            })),
        );
        fragments.assign(
            FragmentSlot::FreelancingProjects,
            Some(json!([{ "id": "p1", "client": "ACME", "title": "Site" }])),
        );
        fragments.assign(
            FragmentSlot::FreelancingProjectTasks,
            Some(json!([{ "id": "t1", "projectId": "p1", "title": "Design" }])),
        );
        fragments.assign(
            FragmentSlot::Programming,
            Some(json!({ "projects": [{ "id": "c1", "name": "cli" }] })),
        );

        let data = migrate(fragments, now()).data;
        assert_eq!(data.settings.user_name, "Ada");
        assert_eq!(data.university.current_semester.as_deref(), Some("WS25"));
        assert_eq!(data.freelancing.profile.name, "Ada L.");
        assert_eq!(data.freelancing.projects[0].client, "ACME");
        assert_eq!(data.freelancing.project_tasks[0].project_id, "p1");
        assert_eq!(data.programming.projects[0].name, "cli");
        assert_eq!(data.extra.get("dashboardLayout"), Some(&json!("grid")));
    }

    #[test]
    fn nested_freelancing_profile_wins_over_standalone() {
        let mut fragments = LegacyFragmentSet::default();
        fragments.assign(
            FragmentSlot::Main,
            Some(json!({
                "freelancing": { "profile": { "name": "nested" } },
                "profile": { "name": "standalone" }
            })),
        );
        let data = migrate(fragments, now()).data;
        assert_eq!(data.freelancing.profile.name, "nested");
        assert!(!data.extra.contains_key("profile"));
    }

    #[test]
    fn legacy_finance_is_normalized_during_migration() {
        let mut fragments = LegacyFragmentSet::default();
        fragments.assign(
            FragmentSlot::Finance,
            Some(json!({
                "balance": 100,
                "incomes": [ { "id": "i1", "amount": 3000, "type": "salary" } ]
            })),
        );
        let finance = migrate(fragments, now()).data.finance;
        let income = &finance.incomes[0];
        assert_eq!(income.nature, crate::schema::TransactionNature::Variable);
        assert_eq!(income.category_id.as_deref(), Some("cat-salary"));
        assert_eq!(income.account_id.as_deref(), Some("acc-main"));
        assert_eq!(finance.accounts[0].balance, 100.0);
    }

    #[test]
    fn migration_is_deterministic() {
        let build = || {
            let mut fragments = LegacyFragmentSet::default();
            fragments.assign(
                FragmentSlot::Finance,
                Some(json!({ "expenses": [ { "type": "groceries" }, { "type": "rent" } ] })),
            );
            migrate(fragments, now())
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn migrate_data_is_idempotent() {
        let value = json!({
            "finance": {
                "incomes": [ { "id": "i1", "type": "salary" }, { "id": "i2", "type": "bonus" } ]
            }
        });
        let (once, applied) = migrate_data(value, CURRENT_VERSION);
        assert!(!applied.is_empty());

        let (twice, applied_again) = migrate_data(once.to_value().unwrap(), CURRENT_VERSION);
        assert!(applied_again.is_empty());
        assert_eq!(once, twice);
    }

    #[test]
    fn numeric_ids_keep_every_legacy_record() {
        let mut fragments = LegacyFragmentSet::default();
        fragments.assign(
            FragmentSlot::Main,
            Some(json!({
                "university": {
                    "courses": [
                        { "id": 1700000000000u64, "name": "Math", "credits": "6" },
                        { "id": "c2", "name": "Physics" }
                    ]
                }
            })),
        );
        let migrated = migrate_payload(fragments.into_value(), LEGACY_VERSION);
        assert!(migrated.issues.is_empty(), "{:?}", migrated.issues);
        let courses = &migrated.data.university.courses;
        assert_eq!(courses.len(), 2);
        assert_eq!(courses[0].id, "1700000000000");
        assert_eq!(courses[0].credits, Some(6.0));
        assert_eq!(courses[1].name, "Physics");
    }

    #[test]
    fn unreadable_module_makes_the_result_lossy() {
        let mut fragments = LegacyFragmentSet::default();
        fragments.assign(
            FragmentSlot::Main,
            Some(json!({ "settings": { "userName": "Ada" }, "misc": [1, 2] })),
        );
        let migrated = migrate_payload(fragments.into_value(), LEGACY_VERSION);
        assert!(migrated.is_lossy());
        assert_eq!(migrated.fallbacks().next().unwrap().path, "misc");
        assert_eq!(migrated.data.settings.user_name, "Ada");
    }

    #[test]
    fn odd_legacy_freelancing_entry_is_kept_aside() {
        let mut fragments = LegacyFragmentSet::default();
        fragments.assign(FragmentSlot::Main, Some(json!({ "freelancing": "paused" })));
        fragments.assign(
            FragmentSlot::FreelancingProjects,
            Some(json!([{ "id": "p1", "client": "ACME" }])),
        );
        let migrated = migrate_payload(fragments.into_value(), LEGACY_VERSION);
        assert!(!migrated.is_lossy());
        assert_eq!(migrated.data.freelancing.projects.len(), 1);
        assert_eq!(migrated.data.extra.get("freelancingUnparsed"), Some(&json!("paused")));
    }
}
