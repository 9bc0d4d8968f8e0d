use std::collections::BTreeSet;

use serde_json::{Map, Value};

/// Field sets declared with both unique and non-unique semantics.
///
/// A `unique: true` field counts as a unique index over that one field.
pub(super) fn find_conflicts(entity: &Map<String, Value>) -> Vec<Vec<String>> {
    let mut declarations: Vec<(BTreeSet<&str>, Vec<String>, bool)> = Vec::new();

    if let Some(Value::Array(fields)) = entity.get("fields") {
        for field in fields.iter().filter_map(Value::as_object) {
            let Some(name) = field.get("name").and_then(Value::as_str) else {
                continue;
            };
            if field.get("unique").and_then(Value::as_bool) == Some(true) {
                declarations.push((BTreeSet::from([name]), vec![name.to_string()], true));
            }
        }
    }

    if let Some(Value::Array(indexes)) = entity.get("indexes") {
        for index in indexes.iter().filter_map(Value::as_object) {
            let Some(Value::Array(fields)) = index.get("fields") else {
                continue;
            };
            let names: Vec<&str> = fields.iter().filter_map(Value::as_str).collect();
            if names.is_empty() || names.len() != fields.len() {
                continue;
            }
            let unique = index.get("unique").and_then(Value::as_bool).unwrap_or(false);
            declarations.push((
                names.iter().copied().collect(),
                names.iter().map(|n| n.to_string()).collect(),
                unique,
            ));
        }
    }

    let mut conflicts: Vec<Vec<String>> = Vec::new();
    let mut reported: Vec<&BTreeSet<&str>> = Vec::new();

    for (i, (key, fields, unique)) in declarations.iter().enumerate() {
        if reported.contains(&key) {
            continue;
        }
        let disagrees = declarations[i + 1..]
            .iter()
            .any(|(other, _, other_unique)| other == key && other_unique != unique);
        if disagrees {
            reported.push(key);
            conflicts.push(fields.clone());
        }
    }

    conflicts
}
