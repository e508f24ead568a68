//! Import and export of the whole document as a JSON file.
//!
//! Export always writes the unified envelope. Import accepts three shapes:
//! a unified export, a legacy export (`data` plus fragment siblings) and a
//! bare legacy object. Whatever comes in goes through the same migration
//! pipeline as stored data before a single `save`.

use crate::error::{ImportError, StoreError, StoreResult};
use crate::migration::{FragmentSlot, LegacyFragmentSet, migrate_payload};
use crate::schema::keys::{CURRENT_VERSION, LEGACY_VERSION};
use crate::schema::{AppData, Module, json_kind};
use crate::storage::KeyValueStore;
use crate::store::UnifiedStore;
use chrono::NaiveDate;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Top-level keys besides `data` that a legacy export may carry.
const LEGACY_EXPORT_SIBLINGS: [&str; 7] = [
    "profile",
    "applications",
    "projects",
    "tasks",
    "standaloneTasks",
    "programming",
    "finance",
];

const FINANCE_LIFTED_KEYS: [&str; 4] = ["incomes", "expenses", "accounts", "categories"];
const FREELANCING_LIFTED_KEYS: [&str; 4] =
    ["profile", "applications", "projectTasks", "standaloneTasks"];

/// Shape of an import blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFormat {
    /// `{ version: "2.0.0", data, ... }`
    V2,
    /// Export of the legacy application: another version tag, with `data`
    /// or fragment siblings.
    V1Exported,
    /// Anything else: module keys and loose legacy keys at the top level.
    LegacyBare,
}

pub fn detect_import_format(object: &Map<String, Value>) -> ImportFormat {
    match object.get("version").and_then(Value::as_str) {
        Some(CURRENT_VERSION) if object.contains_key("data") => ImportFormat::V2,
        Some(_)
            if object.contains_key("data")
                || LEGACY_EXPORT_SIBLINGS.iter().any(|k| object.contains_key(*k)) =>
        {
            ImportFormat::V1Exported
        }
        _ => ImportFormat::LegacyBare,
    }
}

/// File name used by `export_to_dir`.
pub fn export_file_name(date: NaiveDate) -> String {
    format!("organizer-export-{}.json", date.format("%Y-%m-%d"))
}

/// Payload and source version ready for the migration pipeline.
fn normalize(
    format: ImportFormat,
    mut object: Map<String, Value>,
) -> Result<(Value, &'static str), ImportError> {
    match format {
        ImportFormat::V2 => match object.remove("data") {
            Some(data @ Value::Object(_)) => Ok((data, CURRENT_VERSION)),
            Some(other) => Err(ImportError::rejected(format!(
                "`data` must be an object, found {}",
                json_kind(&other)
            ))),
            None => Err(ImportError::rejected("missing `data`")),
        },
        ImportFormat::V1Exported => Ok((
            legacy_export_fragments(object)?.into_value(),
            LEGACY_VERSION,
        )),
        ImportFormat::LegacyBare => {
            for key in ["version", "created", "lastModified"] {
                object.remove(key);
            }
            lift_into(&mut object, Module::Finance, &FINANCE_LIFTED_KEYS)?;
            lift_into(&mut object, Module::Freelancing, &FREELANCING_LIFTED_KEYS)?;
            Ok((Value::Object(object), CURRENT_VERSION))
        }
    }
}

fn wrong_shape(key: &str, expected: &str, found: &Value) -> ImportError {
    ImportError::rejected(format!(
        "`{key}` must be {expected}, found {}",
        json_kind(found)
    ))
}

/// `assign`, refusing present values of the wrong shape instead of
/// defaulting the slot.
fn assign_checked(
    fragments: &mut LegacyFragmentSet,
    slot: FragmentSlot,
    key: &str,
    value: Option<Value>,
) -> Result<(), ImportError> {
    match value {
        None | Some(Value::Null) => Ok(()),
        Some(value) => {
            let expected = if slot.expects_list() { "a list" } else { "an object" };
            let error = wrong_shape(key, expected, &value);
            if fragments.assign(slot, Some(value)) {
                Ok(())
            } else {
                Err(error)
            }
        }
    }
}

fn legacy_export_fragments(
    mut object: Map<String, Value>,
) -> Result<LegacyFragmentSet, ImportError> {
    let mut main = match object.remove("data") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(main)) => main,
        Some(other) => return Err(wrong_shape("data", "an object", &other)),
    };
    for key in ["profile", "applications"] {
        if let Some(value) = object.remove(key) {
            main.entry(key.to_string()).or_insert(value);
        }
    }

    let mut fragments = LegacyFragmentSet::default();
    fragments.assign(FragmentSlot::Main, Some(Value::Object(main)));
    assign_checked(
        &mut fragments,
        FragmentSlot::FreelancingProjects,
        "projects",
        object.remove("projects"),
    )?;

    let (project_tasks, mut standalone_tasks) = split_tasks(object.remove("tasks"))?;
    match object.remove("standaloneTasks") {
        None | Some(Value::Null) => {}
        Some(Value::Array(extra)) => standalone_tasks.extend(extra),
        Some(other) => return Err(wrong_shape("standaloneTasks", "a list", &other)),
    }
    fragments.assign(
        FragmentSlot::FreelancingProjectTasks,
        Some(Value::Array(project_tasks)),
    );
    fragments.assign(
        FragmentSlot::FreelancingStandaloneTasks,
        Some(Value::Array(standalone_tasks)),
    );
    assign_checked(
        &mut fragments,
        FragmentSlot::Programming,
        "programming",
        object.remove("programming"),
    )?;
    assign_checked(
        &mut fragments,
        FragmentSlot::Finance,
        "finance",
        object.remove("finance"),
    )?;
    Ok(fragments)
}

/// Project tasks and standalone tasks from a legacy `tasks` value.
fn split_tasks(tasks: Option<Value>) -> Result<(Vec<Value>, Vec<Value>), ImportError> {
    match tasks {
        None | Some(Value::Null) => Ok((Vec::new(), Vec::new())),
        Some(Value::Array(items)) => Ok(items.into_iter().partition(|task| {
            task.get("projectId").is_some_and(|id| !id.is_null())
        })),
        Some(Value::Object(mut grouped)) => {
            let mut list = |key: &str| match grouped.remove(key) {
                None | Some(Value::Null) => Ok(Vec::new()),
                Some(Value::Array(items)) => Ok(items),
                Some(other) => Err(wrong_shape(&format!("tasks.{key}"), "a list", &other)),
            };
            Ok((list("projectTasks")?, list("standaloneTasks")?))
        }
        Some(other) => Err(wrong_shape("tasks", "a list or an object", &other)),
    }
}

/// Move loose top-level `keys` into the `module` object, without
/// overwriting what the module already has.
fn lift_into(
    object: &mut Map<String, Value>,
    module: Module,
    keys: &[&str],
) -> Result<(), ImportError> {
    let mut target = match object.remove(module.key()) {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(target)) => target,
        Some(other) => return Err(wrong_shape(module.key(), "an object", &other)),
    };
    for key in keys {
        if let Some(value) = object.remove(*key) {
            target.entry(key.to_string()).or_insert(value);
        }
    }
    if !target.is_empty() {
        object.insert(module.key().to_string(), Value::Object(target));
    }
    Ok(())
}

impl<S: KeyValueStore> UnifiedStore<S> {
    /// Current document as pretty JSON, after the usual load.
    pub fn export_document(&mut self) -> StoreResult<String> {
        let doc = self.load_document();
        Ok(serde_json::to_string_pretty(&doc)?)
    }

    /// Replace the stored document with an imported one. Nothing is written
    /// unless the blob is accepted, and a blob is only accepted when every
    /// value in it decodes.
    pub fn import_document(&mut self, blob: &str) -> Result<AppData, ImportError> {
        let parsed: Value = serde_json::from_str(blob)
            .map_err(|e| ImportError::rejected(format!("not valid JSON: {e}")))?;
        let object = match parsed {
            Value::Object(object) => object,
            other => {
                return Err(ImportError::rejected(format!(
                    "expected a JSON object, found {}",
                    json_kind(&other)
                )));
            }
        };

        let format = detect_import_format(&object);
        debug!(?format, "import format detected");
        let (value, source) = normalize(format, object)?;
        let migrated = migrate_payload(value, source);
        if !migrated.issues.is_empty() {
            let issues: Vec<String> = migrated.issues.iter().map(ToString::to_string).collect();
            return Err(ImportError::rejected(format!(
                "document does not decode: {}",
                issues.join("; ")
            )));
        }

        self.save(migrated.data.clone())?;
        info!(?format, steps = ?migrated.applied, "document imported");
        Ok(migrated.data)
    }

    pub fn import_file(&mut self, path: &Path) -> Result<AppData, ImportError> {
        let blob = fs::read_to_string(path).map_err(StoreError::from)?;
        self.import_document(&blob)
    }

    /// Write the export into `dir` under the dated file name and return its
    /// path.
    pub fn export_to_dir(&mut self, dir: &Path, date: NaiveDate) -> StoreResult<PathBuf> {
        let json = self.export_document()?;
        fs::create_dir_all(dir)?;
        let path = dir.join(export_file_name(date));
        fs::write(&path, json)?;
        info!(path = %path.display(), "document exported");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::keys::V2_KEY;
    use crate::schema::{Note, TransactionNature, create_default_app_data};
    use crate::storage::MemoryStore;
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::json;
    use tempfile::TempDir;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn new_store() -> UnifiedStore<MemoryStore> {
        UnifiedStore::new(MemoryStore::new()).with_clock(fixed_now)
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(object) => object,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn format_detection() {
        assert_eq!(
            detect_import_format(&object(json!({ "version": "2.0.0", "data": {} }))),
            ImportFormat::V2
        );
        assert_eq!(
            detect_import_format(&object(json!({ "version": "1.4.2", "data": {} }))),
            ImportFormat::V1Exported
        );
        assert_eq!(
            detect_import_format(&object(json!({ "version": "1.0", "tasks": [] }))),
            ImportFormat::V1Exported
        );
        assert_eq!(
            detect_import_format(&object(json!({ "version": "2.0.0" }))),
            ImportFormat::LegacyBare
        );
        assert_eq!(
            detect_import_format(&object(json!({ "incomes": [] }))),
            ImportFormat::LegacyBare
        );
    }

    #[test]
    fn export_file_name_is_dated() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
        assert_eq!(export_file_name(date), "organizer-export-2025-03-09.json");
    }

    #[test]
    fn rejected_blobs_leave_storage_untouched() {
        let mut store = new_store();
        for blob in ["not json", "[1, 2]", r#"{"version":"2.0.0","data":[]}"#] {
            let err = store.import_document(blob).unwrap_err();
            assert!(matches!(err, ImportError::Rejected(_)), "{blob}");
        }
        assert!(store.storage().entries().is_empty());
    }

    #[test]
    fn export_then_import_is_identity() {
        let mut store = new_store();
        let mut data = store.load();
        data.settings.user_name = "Lin".to_string();
        data.misc.notes.push(Note {
            id: "n1".to_string(),
            title: "hello".to_string(),
            ..Note::default()
        });
        store.save(data.clone()).unwrap();

        let exported = store.export_document().unwrap();
        let mut other = new_store();
        let imported = other.import_document(&exported).unwrap();
        assert_eq!(imported, data);
        assert_eq!(other.load(), data);
    }

    #[test]
    fn bare_legacy_income_gets_category_and_nature() {
        let mut store = new_store();
        let data = store
            .import_document(r#"{"incomes":[{"type":"salary"}]}"#)
            .unwrap();

        let income = &data.finance.incomes[0];
        assert_eq!(income.nature, TransactionNature::Variable);
        let category = data
            .finance
            .category(income.category_id.as_deref().unwrap())
            .unwrap();
        assert_eq!(category.name, "Salary");
        assert!(store.storage().get(V2_KEY).unwrap().is_some());
    }

    #[test]
    fn bare_legacy_freelancing_keys_are_lifted() {
        let mut store = new_store();
        let data = store
            .import_document(r#"{"profile":{"name":"Ada"},"settings":{"theme":"dark"}}"#)
            .unwrap();
        assert_eq!(data.freelancing.profile.name, "Ada");
        assert_eq!(data.settings.theme, "dark");
        assert!(!data.extra.contains_key("profile"));
    }

    #[test]
    fn legacy_export_splits_tasks_by_project() {
        let mut store = new_store();
        let data = store
            .import_document(
                r#"{
                    "version": "1.2.0",
                    "data": { "settings": { "userName": "Ada" } },
                    "profile": { "name": "Ada L." },
                    "projects": [ { "id": "p1", "client": "ACME" } ],
                    "tasks": [
                        { "id": "t1", "projectId": "p1", "title": "Wireframes" },
                        { "id": "t2", "title": "Invoice template" }
                    ],
                    "finance": { "expenses": [ { "type": "rent", "amount": 900 } ] }
                }"#,
            )
            .unwrap();

        assert_eq!(data.settings.user_name, "Ada");
        assert_eq!(data.freelancing.profile.name, "Ada L.");
        assert_eq!(data.freelancing.projects[0].client, "ACME");
        assert_eq!(data.freelancing.project_tasks.len(), 1);
        assert_eq!(data.freelancing.project_tasks[0].project_id, "p1");
        assert_eq!(data.freelancing.standalone_tasks.len(), 1);
        assert_eq!(
            data.finance.expenses[0].category_id.as_deref(),
            Some("cat-rent")
        );
    }

    #[test]
    fn grouped_tasks_object_is_accepted() {
        let (project, standalone) = split_tasks(Some(json!({
            "projectTasks": [ { "id": "a", "projectId": "p" } ],
            "standaloneTasks": [ { "id": "b" }, { "id": "c" } ]
        })))
        .unwrap();
        assert_eq!(project.len(), 1);
        assert_eq!(standalone.len(), 2);
    }

    #[test]
    fn mistyped_record_rejects_the_whole_import() {
        let mut store = new_store();
        let mut data = store.load();
        data.settings.user_name = "Kept".to_string();
        store.save(data).unwrap();
        let before = store.storage().entries().clone();

        let err = store
            .import_document(
                r#"{"version":"2.0.0","data":{
                    "settings":{"userName":"New"},
                    "university":{"courses":[{"id":"c1","name":"Math","credits":"six"}]}
                }}"#,
            )
            .unwrap_err();
        match err {
            ImportError::Rejected(reason) => assert!(reason.contains("university.courses"), "{reason}"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.storage().entries(), &before);
    }

    #[test]
    fn wrongly_shaped_modules_are_rejected() {
        let blobs = [
            r#"{"version":"2.0.0","data":{"home":"none"}}"#,
            r#"{"version":"2.0.0","data":{"freelancing":{"profile":[]}}}"#,
            r#"{"finance":"broke","incomes":[]}"#,
            r#"{"version":"1.1.0","data":{},"projects":{"p1":{}}}"#,
            r#"{"version":"1.1.0","tasks":"all done"}"#,
        ];
        for blob in blobs {
            let mut store = new_store();
            let err = store.import_document(blob).unwrap_err();
            assert!(matches!(err, ImportError::Rejected(_)), "{blob}");
            assert!(store.storage().entries().is_empty(), "{blob}");
        }
    }

    #[test]
    fn loosely_typed_import_is_accepted() {
        let mut store = new_store();
        let data = store
            .import_document(
                r#"{"version":"2.0.0","data":{"university":{"courses":[{"id":17,"name":"Math","credits":"6"}]}}}"#,
            )
            .unwrap();
        assert_eq!(data.university.courses[0].id, "17");
        assert_eq!(data.university.courses[0].credits, Some(6.0));
    }

    #[test]
    fn export_to_dir_writes_dated_file() {
        let dir = TempDir::new().unwrap();
        let mut store = new_store();
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();

        let path = store.export_to_dir(dir.path(), date).unwrap();
        assert!(path.ends_with("organizer-export-2025-06-01.json"));

        let mut other = new_store();
        let data = other.import_file(&path).unwrap();
        assert_eq!(data, create_default_app_data());
    }

    #[test]
    fn import_save_failure_is_a_storage_error() {
        let mut store = UnifiedStore::new(MemoryStore::new().with_fail_writes(true));
        let err = store.import_document("{}").unwrap_err();
        assert!(matches!(err, ImportError::Storage(_)));
    }
}
