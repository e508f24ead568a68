//! The unified (V2) document and its payload.

use super::finance::FinanceData;
use super::keys::CURRENT_VERSION;
use super::modules::{
    FreelancingData, HomeData, MiscData, NotificationSettings, ProgrammingData, Settings,
    UniversityData,
};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use tracing::warn;

/// Logical areas of the document. The order is the serialization order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Module {
    University,
    Freelancing,
    Programming,
    Finance,
    Home,
    Misc,
    Settings,
    NotificationSettings,
}

impl Module {
    pub const ALL: [Module; 8] = [
        Self::University,
        Self::Freelancing,
        Self::Programming,
        Self::Finance,
        Self::Home,
        Self::Misc,
        Self::Settings,
        Self::NotificationSettings,
    ];

    /// Field name of the module inside `data`.
    pub fn key(self) -> &'static str {
        match self {
            Self::University => "university",
            Self::Freelancing => "freelancing",
            Self::Programming => "programming",
            Self::Finance => "finance",
            Self::Home => "home",
            Self::Misc => "misc",
            Self::Settings => "settings",
            Self::NotificationSettings => "notificationSettings",
        }
    }

    /// Default value of the module, as JSON.
    pub fn default_value(self) -> Value {
        let value = match self {
            Self::University => serde_json::to_value(UniversityData::default()),
            Self::Freelancing => serde_json::to_value(FreelancingData::default()),
            Self::Programming => serde_json::to_value(ProgrammingData::default()),
            Self::Finance => serde_json::to_value(FinanceData::default()),
            Self::Home => serde_json::to_value(HomeData::default()),
            Self::Misc => serde_json::to_value(MiscData::default()),
            Self::Settings => serde_json::to_value(Settings::default()),
            Self::NotificationSettings => serde_json::to_value(NotificationSettings::default()),
        };
        // plain structs of strings, numbers and maps always serialize
        value.unwrap_or_else(|_| Value::Object(Map::new()))
    }
}

/// The application's full domain payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppData {
    pub university: UniversityData,
    pub freelancing: FreelancingData,
    pub programming: ProgrammingData,
    pub finance: FinanceData,
    pub home: HomeData,
    pub misc: MiscData,
    pub settings: Settings,
    pub notification_settings: NotificationSettings,
    /// Modules this build does not know about.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Canonical empty document payload.
pub fn create_default_app_data() -> AppData {
    AppData::default()
}

/// Default payload as a JSON object keyed by module.
pub fn default_app_data_value() -> Value {
    let mut object = Map::new();
    for module in Module::ALL {
        object.insert(module.key().to_string(), module.default_value());
    }
    Value::Object(object)
}

/// Part of a payload that did not decode as its declared type.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeIssue {
    /// `module` or `module.field`.
    pub path: String,
    pub reason: String,
    /// The module was replaced by its default. Otherwise the offending
    /// values were kept under `<field>Unparsed` in the module.
    pub fell_back: bool,
}

impl fmt::Display for DecodeIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.reason)
    }
}

impl AppData {
    /// Decode a payload module by module, record by record.
    ///
    /// A record or field that cannot be decoded is moved into the module's
    /// `extra` under `<field>Unparsed` and reported. A module whose value is
    /// not an object at all is replaced by its default and reported with
    /// `fell_back` set. The other modules are never affected.
    pub fn decode(value: Value) -> (AppData, Vec<DecodeIssue>) {
        let mut issues = Vec::new();
        let mut object = match value {
            Value::Object(object) => object,
            other => {
                issues.push(DecodeIssue {
                    path: String::new(),
                    reason: format!("payload is {}, not an object", json_kind(&other)),
                    fell_back: true,
                });
                return (AppData::default(), issues);
            }
        };

        let data = AppData {
            university: take_module(&mut object, Module::University, &mut issues),
            freelancing: take_module(&mut object, Module::Freelancing, &mut issues),
            programming: take_module(&mut object, Module::Programming, &mut issues),
            finance: take_module(&mut object, Module::Finance, &mut issues),
            home: take_module(&mut object, Module::Home, &mut issues),
            misc: take_module(&mut object, Module::Misc, &mut issues),
            settings: take_module(&mut object, Module::Settings, &mut issues),
            notification_settings: take_module(
                &mut object,
                Module::NotificationSettings,
                &mut issues,
            ),
            extra: Map::new(),
        };
        (
            AppData {
                extra: object,
                ..data
            },
            issues,
        )
    }

    /// `decode` without the report.
    pub fn decode_lenient(value: Value) -> AppData {
        Self::decode(value).0
    }

    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

fn take_module<T: DeserializeOwned + Default>(
    object: &mut Map<String, Value>,
    module: Module,
    issues: &mut Vec<DecodeIssue>,
) -> T {
    let fields = match object.remove(module.key()) {
        None | Some(Value::Null) => return T::default(),
        Some(Value::Object(fields)) => fields,
        Some(other) => {
            warn!(module = module.key(), kind = json_kind(&other), "module is not an object, using defaults");
            issues.push(DecodeIssue {
                path: module.key().to_string(),
                reason: format!("expected an object, found {}", json_kind(&other)),
                fell_back: true,
            });
            return T::default();
        }
    };

    let whole = Value::Object(fields);
    if let Ok(decoded) = T::deserialize(&whole) {
        return decoded;
    }
    let Value::Object(fields) = whole else {
        return T::default();
    };

    let salvaged = Value::Object(set_aside::<T>(module, fields, issues));
    T::deserialize(&salvaged).unwrap_or_else(|e| {
        warn!(module = module.key(), error = %e, "module unreadable, using defaults");
        issues.push(DecodeIssue {
            path: module.key().to_string(),
            reason: e.to_string(),
            fell_back: true,
        });
        T::default()
    })
}

/// Whether `{ field: value }` alone decodes as `T`.
fn check_field<T: DeserializeOwned>(field: &str, value: Value) -> Result<(), String> {
    let mut single = Map::new();
    single.insert(field.to_string(), value);
    T::deserialize(&Value::Object(single))
        .map(|_| ())
        .map_err(|e| e.to_string())
}

/// Move every value of `fields` that does not decode as part of `T` to
/// `<field>Unparsed`. Lists are checked item by item so their good records
/// stay in place.
fn set_aside<T: DeserializeOwned>(
    module: Module,
    fields: Map<String, Value>,
    issues: &mut Vec<DecodeIssue>,
) -> Map<String, Value> {
    let mut kept = Map::new();
    let mut aside = Vec::new();

    for (field, value) in fields {
        match value {
            Value::Array(items) => {
                let mut good = Vec::new();
                let mut bad = Vec::new();
                let mut first_error = None;
                for item in items {
                    match check_field::<T>(&field, Value::Array(vec![item.clone()])) {
                        Ok(()) => good.push(item),
                        Err(e) => {
                            first_error.get_or_insert(e);
                            bad.push(item);
                        }
                    }
                }
                if let Some(reason) = first_error {
                    issues.push(DecodeIssue {
                        path: format!("{}.{}", module.key(), field),
                        reason: format!("{} item(s) set aside: {}", bad.len(), reason),
                        fell_back: false,
                    });
                    aside.push((format!("{field}Unparsed"), Value::Array(bad)));
                }
                kept.insert(field, Value::Array(good));
            }
            other => match check_field::<T>(&field, other.clone()) {
                Ok(()) => {
                    kept.insert(field, other);
                }
                Err(reason) => {
                    issues.push(DecodeIssue {
                        path: format!("{}.{}", module.key(), field),
                        reason: format!("value set aside: {reason}"),
                        fell_back: false,
                    });
                    aside.push((format!("{field}Unparsed"), other));
                }
            },
        }
    }

    for (key, value) in aside {
        warn!(module = module.key(), key = %key, "unreadable values kept aside");
        match (kept.get_mut(&key), value) {
            (Some(Value::Array(existing)), Value::Array(more)) => existing.extend(more),
            (_, value) => {
                kept.insert(key, value);
            }
        }
    }
    kept
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// The single persisted unit of the unified layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDocument {
    pub version: String,
    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub data: AppData,
}

impl StoredDocument {
    /// Wrap `data` for writing. `created` is kept when given; the
    /// modification time never precedes it.
    pub fn wrap(data: AppData, created: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        let created = created.unwrap_or(now);
        Self {
            version: CURRENT_VERSION.to_string(),
            created,
            last_modified: now.max(created),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn default_value_matches_typed_default() {
        let from_value: AppData = serde_json::from_value(default_app_data_value()).unwrap();
        assert_eq!(from_value, create_default_app_data());
    }

    #[test]
    fn unreadable_module_falls_back_alone() {
        let data = AppData::decode_lenient(json!({
            "settings": { "userName": "Ada" },
            "home": "not an object",
            "university": { "courses": 42 }
        }));
        assert_eq!(data.settings.user_name, "Ada");
        assert_eq!(data.home, HomeData::default());
        assert!(data.university.courses.is_empty());
        assert_eq!(data.university.extra.get("coursesUnparsed"), Some(&json!(42)));
    }

    #[test]
    fn loosely_typed_records_decode() {
        let (data, issues) = AppData::decode(json!({
            "university": {
                "courses": [
                    { "id": 1700000000000u64, "name": "Math", "credits": "6" },
                    { "id": "c2", "name": "Physics", "code": null }
                ]
            },
            "notificationSettings": { "reminderLeadDays": "2", "enabled": "false" }
        }));
        assert!(issues.is_empty(), "{issues:?}");
        let courses = &data.university.courses;
        assert_eq!(courses.len(), 2);
        assert_eq!(courses[0].id, "1700000000000");
        assert_eq!(courses[0].credits, Some(6.0));
        assert_eq!(courses[1].name, "Physics");
        assert_eq!(data.notification_settings.reminder_lead_days, 2);
        assert!(!data.notification_settings.enabled);
    }

    #[test]
    fn bad_record_is_set_aside_and_reported() {
        let (data, issues) = AppData::decode(json!({
            "home": {
                "shoppingList": [
                    { "id": "s1", "name": "Milk" },
                    "eggs",
                    { "id": "s3", "name": { "nested": true } }
                ]
            }
        }));
        assert_eq!(data.home.shopping_list.len(), 1);
        assert_eq!(data.home.shopping_list[0].name, "Milk");
        assert_eq!(
            data.home.extra.get("shoppingListUnparsed"),
            Some(&json!(["eggs", { "id": "s3", "name": { "nested": true } }]))
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path, "home.shoppingList");
        assert!(!issues[0].fell_back);

        // set-aside values survive another pass unchanged
        let (again, issues) = AppData::decode(data.to_value().unwrap());
        assert!(issues.is_empty());
        assert_eq!(again, data);
    }

    #[test]
    fn non_object_module_is_reported_as_fallback() {
        let (data, issues) = AppData::decode(json!({ "misc": [1, 2] }));
        assert_eq!(data.misc, MiscData::default());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path, "misc");
        assert!(issues[0].fell_back);
    }

    #[test]
    fn unknown_modules_are_kept() {
        let data = AppData::decode_lenient(json!({ "garden": { "plants": [] } }));
        assert_eq!(data.extra.get("garden"), Some(&json!({ "plants": [] })));
    }

    #[test]
    fn wrap_keeps_created_before_last_modified() {
        let created = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let doc = StoredDocument::wrap(AppData::default(), Some(created), now);
        assert_eq!(doc.created, created);
        assert!(doc.created <= doc.last_modified);
        assert_eq!(doc.version, CURRENT_VERSION);
    }

    #[test]
    fn document_serializes_envelope_fields() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let doc = StoredDocument::wrap(AppData::default(), None, now);
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["version"], json!("2.0.0"));
        assert!(value["lastModified"].is_string());
        assert!(value["data"]["notificationSettings"].is_object());
    }
}
