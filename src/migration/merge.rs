//! Merge-with-defaults: backfills fields that older stored data lacks.

use crate::schema::{AppData, DecodeIssue, default_app_data_value, json_kind};
use serde_json::Value;
use tracing::warn;

/// Deep-merge `stored` over `default`.
///
/// Objects are repaired key by key, so a stored parent missing one child
/// field gets only that field from the default. Arrays and scalars are
/// taken whole from `stored`. A stored `null`, or a non-object where the
/// default is an object, yields the default.
pub fn deep_merge(default: Value, stored: Value) -> Value {
    match (default, stored) {
        (Value::Object(mut base), Value::Object(stored)) => {
            for (key, stored_value) in stored {
                let merged = match base.remove(&key) {
                    Some(default_value) => deep_merge(default_value, stored_value),
                    None => stored_value,
                };
                base.insert(key, merged);
            }
            Value::Object(base)
        }
        (default, Value::Null) => default,
        (default @ Value::Object(_), _) => default,
        (_, stored) => stored,
    }
}

/// Typed document built from a (possibly partial) stored payload, with every
/// missing module and field taken from the defaults.
pub fn merge_with_defaults(partial: Value) -> AppData {
    merge_checked(partial).0
}

/// `merge_with_defaults`, also reporting the values that did not decode.
/// Stored values that the merge replaces with a default object count as
/// fallbacks too.
pub fn merge_checked(partial: Value) -> (AppData, Vec<DecodeIssue>) {
    let mut issues = shape_conflicts(&partial);
    let (data, decode_issues) = AppData::decode(deep_merge(default_app_data_value(), partial));
    issues.extend(decode_issues);
    (data, issues)
}

/// Places where `partial` holds a non-object value in place of an object of
/// the default document. `deep_merge` drops those values.
pub fn shape_conflicts(partial: &Value) -> Vec<DecodeIssue> {
    let mut conflicts = Vec::new();
    collect_conflicts(&default_app_data_value(), partial, "", &mut conflicts);
    conflicts
}

fn collect_conflicts(default: &Value, stored: &Value, path: &str, out: &mut Vec<DecodeIssue>) {
    let Value::Object(defaults) = default else {
        return;
    };
    match stored {
        Value::Null => {}
        Value::Object(stored) => {
            for (key, default_child) in defaults {
                if let Some(stored_child) = stored.get(key) {
                    let child_path = if path.is_empty() {
                        key.clone()
                    } else {
                        format!("{path}.{key}")
                    };
                    collect_conflicts(default_child, stored_child, &child_path, out);
                }
            }
        }
        other => {
            warn!(path, kind = json_kind(other), "stored value replaced by its default");
            out.push(DecodeIssue {
                path: path.to_string(),
                reason: format!("expected an object, found {}", json_kind(other)),
                fell_back: true,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::create_default_app_data;
    use serde_json::json;

    #[test]
    fn empty_object_gives_defaults() {
        assert_eq!(merge_with_defaults(json!({})), create_default_app_data());
    }

    #[test]
    fn non_object_gives_defaults() {
        assert_eq!(merge_with_defaults(json!([1, 2, 3])), create_default_app_data());
        assert_eq!(merge_with_defaults(Value::Null), create_default_app_data());
    }

    #[test]
    fn partial_settings_are_repaired_field_by_field() {
        let data = merge_with_defaults(json!({ "settings": { "userName": "X" } }));
        let defaults = create_default_app_data();

        assert_eq!(data.settings.user_name, "X");
        assert_eq!(data.settings.currency, defaults.settings.currency);
        assert_eq!(data.settings.theme, defaults.settings.theme);
        assert_eq!(data.finance, defaults.finance);
        assert_eq!(data.notification_settings, defaults.notification_settings);
    }

    #[test]
    fn stored_values_beat_defaults() {
        let merged = deep_merge(
            json!({ "a": 1, "b": { "c": true, "d": [1] } }),
            json!({ "b": { "c": false, "d": [] }, "e": "new" }),
        );
        assert_eq!(merged, json!({ "a": 1, "b": { "c": false, "d": [] }, "e": "new" }));
    }

    #[test]
    fn shape_conflicts_name_the_path() {
        assert!(shape_conflicts(&json!({ "settings": { "theme": "dark" } })).is_empty());
        let paths: Vec<String> =
            shape_conflicts(&json!({ "home": "oops", "freelancing": { "profile": [1] } }))
                .into_iter()
                .map(|issue| issue.path)
                .collect();
        assert_eq!(paths, vec!["freelancing.profile", "home"]);
    }

    #[test]
    fn merge_checked_reports_dropped_values() {
        let (data, issues) = merge_checked(json!({ "home": "oops", "settings": { "userName": "Ada" } }));
        assert_eq!(data.settings.user_name, "Ada");
        assert_eq!(issues.len(), 1);
        assert!(issues[0].fell_back);
        assert_eq!(issues[0].to_string(), "home: expected an object, found string");
    }

    #[test]
    fn non_object_over_object_keeps_default() {
        let merged = deep_merge(json!({ "home": { "chores": [] } }), json!({ "home": "oops" }));
        assert_eq!(merged, json!({ "home": { "chores": [] } }));
    }

    #[test]
    fn null_child_is_backfilled() {
        let merged = deep_merge(
            json!({ "notificationSettings": { "reminderLeadDays": 1 } }),
            json!({ "notificationSettings": { "reminderLeadDays": null } }),
        );
        assert_eq!(merged["notificationSettings"]["reminderLeadDays"], json!(1));
    }
}
