//! Field deserializers for data written by loosely typed clients.
//!
//! Ids often arrive as numbers, counts and prices as strings, and flags as
//! `"true"`. Each helper accepts the loose spellings of its type and only
//! errors on values that cannot mean anything for it (an object where text
//! is expected, `"abc"` where a number is expected).

use super::json_kind;
use serde::de::Error;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Numbers and numeric strings as a finite `f64`.
pub(crate) fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().and_then(finite),
        Value::String(s) => s.trim().parse().ok().and_then(finite),
        _ => None,
    }
}

/// Text; numbers and booleans are written out, `null` is empty.
pub(crate) fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    if raw.is_null() {
        return Ok(String::new());
    }
    scalar_text(&raw)
        .ok_or_else(|| D::Error::custom(format!("expected text, found {}", json_kind(&raw))))
}

pub(crate) fn optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    if raw.is_null() {
        return Ok(None);
    }
    scalar_text(&raw)
        .map(Some)
        .ok_or_else(|| D::Error::custom(format!("expected text, found {}", json_kind(&raw))))
}

/// `null` and blank strings are absent; other non-numbers are errors.
pub(crate) fn optional_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    match &raw {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        _ => number_of(&raw)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("expected a finite number, found {raw}"))),
    }
}

/// Money amounts. Anything that is not a finite number reads as zero.
pub(crate) fn amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(number_of(&raw).unwrap_or(0.0))
}

pub(crate) fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    match &raw {
        Value::Null => Ok(false),
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(n.as_f64().is_some_and(|v| v != 0.0)),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" | "" => Ok(false),
            _ => Err(D::Error::custom(format!("expected a flag, found {raw}"))),
        },
        other => Err(D::Error::custom(format!(
            "expected a flag, found {}",
            json_kind(other)
        ))),
    }
}

/// Non-negative whole numbers; fractions are rounded.
pub(crate) fn count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    match number_of(&raw) {
        Some(v) if v >= 0.0 && v <= f64::from(u32::MAX) => Ok(v.round() as u32),
        _ => Err(D::Error::custom(format!("expected a count, found {raw}"))),
    }
}

pub(crate) fn text_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    match raw {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .iter()
            .filter(|item| !item.is_null())
            .map(|item| {
                scalar_text(item).ok_or_else(|| {
                    D::Error::custom(format!("expected text items, found {}", json_kind(item)))
                })
            })
            .collect(),
        other => Err(D::Error::custom(format!(
            "expected a list, found {}",
            json_kind(&other)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct Sample {
        #[serde(deserialize_with = "text")]
        id: String,
        #[serde(deserialize_with = "optional_number")]
        credits: Option<f64>,
        #[serde(deserialize_with = "amount")]
        amount: f64,
        #[serde(deserialize_with = "flag")]
        done: bool,
        #[serde(deserialize_with = "count")]
        days: u32,
        #[serde(deserialize_with = "text_list")]
        tags: Vec<String>,
    }

    fn sample(value: Value) -> Result<Sample, serde_json::Error> {
        serde_json::from_value(value)
    }

    #[test]
    fn loose_spellings_are_accepted() {
        let s = sample(json!({
            "id": 1700000000000u64,
            "credits": "6",
            "amount": "12.5",
            "done": "true",
            "days": "3",
            "tags": ["rust", 2024]
        }))
        .unwrap();
        assert_eq!(s.id, "1700000000000");
        assert_eq!(s.credits, Some(6.0));
        assert_eq!(s.amount, 12.5);
        assert!(s.done);
        assert_eq!(s.days, 3);
        assert_eq!(s.tags, vec!["rust", "2024"]);
    }

    #[test]
    fn null_reads_as_empty() {
        let s = sample(json!({ "id": null, "credits": null, "done": null, "tags": null })).unwrap();
        assert_eq!(s.id, "");
        assert_eq!(s.credits, None);
        assert!(!s.done);
        assert!(s.tags.is_empty());
    }

    #[test]
    fn non_finite_numbers_are_not_numbers() {
        assert_eq!(sample(json!({ "amount": "NaN" })).unwrap().amount, 0.0);
        assert_eq!(sample(json!({ "amount": "inf" })).unwrap().amount, 0.0);
        assert!(sample(json!({ "credits": "-inf" })).is_err());
        assert_eq!(number_of(&json!("NaN")), None);
    }

    #[test]
    fn meaningless_values_are_errors() {
        assert!(sample(json!({ "id": { "nested": true } })).is_err());
        assert!(sample(json!({ "credits": "six" })).is_err());
        assert!(sample(json!({ "done": "maybe" })).is_err());
        assert!(sample(json!({ "days": -1 })).is_err());
        assert!(sample(json!({ "tags": "rust" })).is_err());
    }
}
