//! Template/user JSON merging for workspace config files.
//!
//! [`merge`] is pure. The tool ships a template for each managed file
//! (`.vscode/settings.json`, `.vscode/extensions.json`, `.vscode/mcp.json`)
//! and the user's copy on disk is layered over it:
//!
//! - objects merge key by key, recursively, keeping the user's key order and
//!   appending keys only the template has
//! - arrays of scalars are unioned, template entries first, without duplicates
//! - arrays of objects keyed by `id` (or `name`) merge per key: template
//!   fields are refreshed, user-only fields and user-only entries survive,
//!   new template entries are appended
//! - anything else: the user value wins; a key the user lacks takes the
//!   template value
//!
//! Merging is idempotent: `merge(t, &merge(t, u)) == merge(t, u)`.

mod error;
mod file;
mod plan;

pub use error::MergeError;
pub use file::{load_templates, ConfigFileKind, ConfigTemplates, VSCODE_DIR};
pub use plan::{ExistingDocument, MergePlan};

use serde_json::{Map, Value};

/// Fields identifying entries of a named collection, in lookup order.
const KEY_FIELDS: [&str; 2] = ["id", "name"];

/// Layers `user` over `template`.
#[must_use]
pub fn merge(template: &Value, user: &Value) -> Value {
    match (template, user) {
        (Value::Object(template), Value::Object(user)) => {
            Value::Object(merge_objects(template, user))
        }
        (Value::Array(template), Value::Array(user)) => merge_arrays(template, user)
            .map_or_else(|| Value::Array(user.clone()), Value::Array),
        (_, user) => user.clone(),
    }
}

fn merge_objects(template: &Map<String, Value>, user: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = Map::new();
    for (key, user_value) in user {
        let value = match template.get(key) {
            Some(template_value) => merge(template_value, user_value),
            None => user_value.clone(),
        };
        merged.insert(key.clone(), value);
    }
    for (key, template_value) in template {
        if !user.contains_key(key) {
            merged.insert(key.clone(), template_value.clone());
        }
    }
    merged
}

/// Returns `None` when the arrays are not of a mergeable shape, in which case
/// the user array wins.
fn merge_arrays(template: &[Value], user: &[Value]) -> Option<Vec<Value>> {
    if template.is_empty() || user.is_empty() || (all_scalars(template) && all_scalars(user)) {
        return Some(union(template, user));
    }

    let field = KEY_FIELDS
        .into_iter()
        .find(|field| keyed_by(template, field) && keyed_by(user, field))?;
    Some(merge_keyed(template, user, field))
}

fn all_scalars(values: &[Value]) -> bool {
    values
        .iter()
        .all(|value| !value.is_object() && !value.is_array())
}

fn keyed_by(values: &[Value], field: &str) -> bool {
    values.iter().all(|value| key_of(value, field).is_some())
}

fn key_of<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    value.as_object()?.get(field)?.as_str()
}

fn union(template: &[Value], user: &[Value]) -> Vec<Value> {
    let mut merged: Vec<Value> = Vec::with_capacity(template.len() + user.len());
    for value in template.iter().chain(user) {
        if !merged.contains(value) {
            merged.push(value.clone());
        }
    }
    merged
}

fn merge_keyed(template: &[Value], user: &[Value], field: &str) -> Vec<Value> {
    let template_entry = |key: &str| template.iter().find(|t| key_of(t, field) == Some(key));

    let mut merged: Vec<Value> = user
        .iter()
        .map(|entry| {
            let refreshed = key_of(entry, field).and_then(template_entry);
            match (refreshed, entry) {
                (Some(Value::Object(fresh)), Value::Object(existing)) => {
                    let mut fields = existing.clone();
                    for (key, value) in fresh {
                        fields.insert(key.clone(), value.clone());
                    }
                    Value::Object(fields)
                }
                _ => entry.clone(),
            }
        })
        .collect();

    for entry in template {
        let key = key_of(entry, field);
        if !user.iter().any(|u| key_of(u, field) == key) {
            merged.push(entry.clone());
        }
    }
    merged
}
