//! Field-level migrations inside the unified layout.
//!
//! Both functions work on the untyped payload, are idempotent, and report
//! whether they changed anything. They run on every load because older
//! unified documents can still carry the legacy field shapes.

use crate::schema::lenient;
use crate::schema::{CategoryKind, TransactionNature, default_categories};
use serde_json::{Map, Value, json};
use std::collections::HashSet;
use tracing::warn;

const TRANSACTION_LISTS: [(&str, CategoryKind); 2] = [
    ("incomes", CategoryKind::Income),
    ("expenses", CategoryKind::Expense),
];

/// Id of the account created when transactions predate multi-account
/// support.
pub const MAIN_ACCOUNT_ID: &str = "acc-main";

/// Lowercase, dash-separated form of a label ("Side hustle" -> "side-hustle").
pub fn slugify(label: &str) -> String {
    let mut slug = String::new();
    let mut pending_dash = false;
    for ch in label.trim().chars() {
        if ch.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(ch.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// "side_hustle" -> "Side Hustle"
pub fn title_case(label: &str) -> String {
    label
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn has_value(object: &Map<String, Value>, key: &str) -> bool {
    match object.get(key) {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

fn category_values() -> Vec<Value> {
    default_categories()
        .iter()
        .filter_map(|c| serde_json::to_value(c).ok())
        .collect()
}

fn unique_category_id(categories: &[Value], slug: &str, kind: CategoryKind) -> String {
    let taken: HashSet<&str> = categories
        .iter()
        .filter_map(|c| c.get("id").and_then(Value::as_str))
        .collect();
    let plain = format!("cat-{}", slug);
    if !taken.contains(plain.as_str()) {
        return plain;
    }
    let scoped = format!("cat-{}-{}", kind.as_str(), slug);
    if !taken.contains(scoped.as_str()) {
        return scoped;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}-{}", scoped, n);
        if !taken.contains(candidate.as_str()) {
            return candidate;
        }
        n += 1;
    }
}

/// Id of the category of `kind` whose name matches `label`, creating the
/// category when none does. `None` for labels without any letters or digits.
pub fn resolve_category(
    categories: &mut Vec<Value>,
    label: &str,
    kind: CategoryKind,
) -> Option<String> {
    let slug = slugify(label);
    if slug.is_empty() {
        return None;
    }
    for category in categories.iter() {
        let Some(object) = category.as_object() else {
            continue;
        };
        let category_kind = object
            .get("kind")
            .and_then(Value::as_str)
            .unwrap_or("income");
        let name = object.get("name").and_then(Value::as_str).unwrap_or("");
        if category_kind == kind.as_str()
            && slugify(name) == slug
            && let Some(id) = object.get("id").and_then(Value::as_str)
        {
            return Some(id.to_string());
        }
    }

    let id = unique_category_id(categories, &slug, kind);
    categories.push(json!({
        "id": id,
        "name": title_case(label),
        "kind": kind.as_str(),
    }));
    Some(id)
}

fn is_valid_nature(raw: &str) -> bool {
    raw.parse::<TransactionNature>().is_ok()
}

fn needs_nature_fix(item: &Value) -> bool {
    let Some(object) = item.as_object() else {
        return false;
    };
    let bad_type = match object.get("type") {
        None | Some(Value::Null) => false,
        Some(Value::String(raw)) => !is_valid_nature(raw),
        Some(_) => true,
    };
    let legacy_category = !has_value(object, "categoryId")
        && object
            .get("category")
            .and_then(Value::as_str)
            .is_some_and(|name| !slugify(name).is_empty());
    bad_type || legacy_category
}

fn fix_transaction(
    object: &mut Map<String, Value>,
    categories: &mut Vec<Value>,
    kind: CategoryKind,
) -> bool {
    let mut changed = false;

    if !has_value(object, "categoryId")
        && let Some(Value::String(name)) = object.get("category").cloned()
        && let Some(id) = resolve_category(categories, &name, kind)
    {
        object.insert("categoryId".to_string(), Value::String(id));
        object.remove("category");
        changed = true;
    }

    match object.get("type").cloned() {
        Some(Value::String(raw)) if !is_valid_nature(&raw) => {
            if !has_value(object, "categoryId")
                && let Some(id) = resolve_category(categories, &raw, kind)
            {
                object.insert("categoryId".to_string(), Value::String(id));
            }
            object.insert(
                "type".to_string(),
                json!(TransactionNature::Variable.as_str()),
            );
            changed = true;
        }
        Some(Value::String(_)) | Some(Value::Null) | None => {}
        Some(_) => {
            object.insert(
                "type".to_string(),
                json!(TransactionNature::Variable.as_str()),
            );
            changed = true;
        }
    }

    changed
}

/// Turns a legacy free-text `type` (e.g. "salary") into a category
/// reference plus the `variable` nature, and resolves legacy `category`
/// names into `categoryId`.
pub fn normalize_transaction_nature(data: &mut Value) -> bool {
    let Some(finance) = data.get_mut("finance").and_then(Value::as_object_mut) else {
        return false;
    };
    let pending = TRANSACTION_LISTS.iter().any(|(key, _)| {
        finance
            .get(*key)
            .and_then(Value::as_array)
            .is_some_and(|items| items.iter().any(needs_nature_fix))
    });
    if !pending {
        return false;
    }

    let (mut categories, seeded) = match finance.remove("categories") {
        Some(Value::Array(categories)) => (categories, false),
        Some(other) => {
            warn!(found = ?other, "finance categories are not a list, reseeding defaults");
            (category_values(), true)
        }
        None => (category_values(), true),
    };

    let mut changed = seeded;
    for (key, kind) in TRANSACTION_LISTS {
        if let Some(Value::Array(items)) = finance.get_mut(key) {
            for item in items.iter_mut() {
                if let Some(object) = item.as_object_mut() {
                    changed |= fix_transaction(object, &mut categories, kind);
                }
            }
        }
    }

    finance.insert("categories".to_string(), Value::Array(categories));
    changed
}

fn as_amount(value: &Value) -> Option<f64> {
    lenient::number_of(value)
}

fn unassigned_count(finance: &Map<String, Value>) -> usize {
    TRANSACTION_LISTS
        .iter()
        .filter_map(|(key, _)| finance.get(*key).and_then(Value::as_array))
        .flatten()
        .filter_map(Value::as_object)
        .filter(|tx| !has_value(tx, "accountId"))
        .count()
}

fn existing_target_account(finance: &Map<String, Value>) -> Option<String> {
    let accounts = finance.get("accounts").and_then(Value::as_array)?;
    let ids: Vec<&str> = accounts
        .iter()
        .filter_map(|a| a.get("id").and_then(Value::as_str))
        .filter(|id| !id.is_empty())
        .collect();
    let preferred = finance.get("defaultAccountId").and_then(Value::as_str);
    match preferred {
        Some(id) if ids.contains(&id) => Some(id.to_string()),
        _ => ids.first().map(|id| id.to_string()),
    }
}

/// Gives every transaction an `accountId`. Data from before multi-account
/// support gets a single "Main account", seeded from the legacy scalar
/// `balance` when there is one.
pub fn assign_transaction_accounts(data: &mut Value) -> bool {
    let Some(finance) = data.get_mut("finance").and_then(Value::as_object_mut) else {
        return false;
    };

    let unassigned = unassigned_count(finance);
    let legacy_balance = finance.get("balance").and_then(as_amount);
    let target = existing_target_account(finance);
    if unassigned == 0 && (target.is_some() || legacy_balance.is_none()) {
        return false;
    }

    let target = match target {
        Some(id) => id,
        None => {
            let account = json!({
                "id": MAIN_ACCOUNT_ID,
                "name": "Main account",
                "kind": "checking",
                "balance": legacy_balance.unwrap_or(0.0),
                "currency": null,
            });
            match finance.get_mut("accounts") {
                Some(Value::Array(accounts)) => accounts.push(account),
                _ => {
                    finance.insert("accounts".to_string(), Value::Array(vec![account]));
                }
            }
            finance.remove("balance");
            finance.insert(
                "defaultAccountId".to_string(),
                Value::String(MAIN_ACCOUNT_ID.to_string()),
            );
            MAIN_ACCOUNT_ID.to_string()
        }
    };

    for (key, _) in TRANSACTION_LISTS {
        if let Some(Value::Array(items)) = finance.get_mut(key) {
            for tx in items.iter_mut().filter_map(Value::as_object_mut) {
                if !has_value(tx, "accountId") {
                    tx.insert("accountId".to_string(), Value::String(target.clone()));
                }
            }
        }
    }
    true
}
