//! Schema.org JSON-LD normalizer.
//!
//! Rewrites a JSON-LD `@graph` of `rdfs:Class` and `rdf:Property` nodes into
//! the hand-authored metadata shape, so both source kinds go through the same
//! schema validator and converter. Subclasses inherit their ancestors'
//! properties through `rdfs:subClassOf`.

use std::collections::{HashMap, HashSet, VecDeque};

use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, info};

use crate::graph::{FieldType, RelationshipKind};
use crate::naming;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaOrgError {
    #[error("JSON-LD document has no '@graph' list")]
    MissingGraph,

    #[error("'@graph' defines no usable rdfs:Class")]
    NoClasses,

    #[error("class at @graph[{index}] has neither a schema: id nor an rdfs:label")]
    UnnamedClass { index: usize },
}

const ID_PREFIXES: &[&str] = &["schema:", "https://schema.org/", "http://schema.org/"];
const LONG_TEXT: &[&str] = &["description", "abstract", "text", "content", "body", "bio", "about"];
const PHONE: &[&str] = &["phone", "telephone", "fax", "mobile"];
const COLLECTION_WORDS: &[&str] = &["list", "collection", "set"];
const SINGLE_WORDS: &[&str] = &["primary", "main", "current", "active"];

/// Convert a JSON-LD document into a metadata tree named `app_name`.
pub fn to_metadata(document: &Value, app_name: &str) -> Result<Value, SchemaOrgError> {
    let graph = document
        .get("@graph")
        .and_then(Value::as_array)
        .ok_or(SchemaOrgError::MissingGraph)?;

    let mut classes: Vec<(String, &Map<String, Value>)> = Vec::new();
    for (index, node) in graph.iter().enumerate() {
        let Some(node) = node.as_object() else {
            continue;
        };
        if !has_type(node, &["rdfs:Class"]) || node.contains_key("schema:supersededBy") {
            continue;
        }
        let name = class_name(node).ok_or(SchemaOrgError::UnnamedClass { index })?;
        classes.push((name, node));
    }
    if classes.is_empty() {
        return Err(SchemaOrgError::NoClasses);
    }

    let class_names: HashSet<&str> = classes.iter().map(|(n, _)| n.as_str()).collect();
    let properties: Vec<&Map<String, Value>> = graph
        .iter()
        .filter_map(Value::as_object)
        .filter(|n| has_type(n, &["rdf:Property", "schema:Property"]))
        .filter(|n| !n.contains_key("schema:supersededBy"))
        .collect();

    let parents: HashMap<&str, Vec<String>> = classes
        .iter()
        .map(|(name, node)| (name.as_str(), ids(node.get("rdfs:subClassOf"))))
        .collect();

    let entities: Vec<Value> = classes
        .iter()
        .map(|(name, node)| {
            let lineage = lineage(name, &parents);
            build_entity(name, node, &lineage, &properties, &class_names)
        })
        .collect();

    info!(classes = entities.len(), properties = properties.len(), "normalized Schema.org graph");

    Ok(json!({
        "app": {
            "name": app_name,
            "description": "Generated from Schema.org definitions",
            "version": "1.0.0",
        },
        "entities": entities,
    }))
}

/// The class itself, then its ancestors in the document, nearest first.
fn lineage(name: &str, parents: &HashMap<&str, Vec<String>>) -> Vec<String> {
    let mut seen: Vec<String> = vec![name.to_string()];
    let mut queue: VecDeque<String> = VecDeque::from([name.to_string()]);

    while let Some(current) = queue.pop_front() {
        for parent in parents.get(current.as_str()).into_iter().flatten() {
            if parents.contains_key(parent.as_str()) && !seen.contains(parent) {
                seen.push(parent.clone());
                queue.push_back(parent.clone());
            }
        }
    }
    seen
}

fn build_entity(
    name: &str,
    node: &Map<String, Value>,
    lineage: &[String],
    properties: &[&Map<String, Value>],
    classes: &HashSet<&str>,
) -> Value {
    let table = naming::entity_to_table(name);
    let mut fields = vec![json!({ "name": "id", "type": "uuid", "primary": true })];
    let mut relationships = Vec::new();
    let mut taken: HashSet<String> = HashSet::from(["id".to_string()]);

    // Own properties first; an inherited one never replaces them
    let applicable = lineage.iter().flat_map(|class| {
        properties
            .iter()
            .filter(move |p| ids(p.get("schema:domainIncludes")).contains(class))
    });

    for property in applicable {
        let Some(property_name) = property.get("@id").and_then(Value::as_str).map(local_name) else {
            continue;
        };
        let snake = naming::to_snake_case(property_name);
        let ranges = ids(property.get("schema:rangeIncludes"));
        let comment = text(property.get("rdfs:comment"));

        if let Some(target) = ranges.iter().find(|r| classes.contains(r.as_str())) {
            let kind = relationship_kind(&snake);
            if kind == RelationshipKind::ManyToMany {
                if !taken.insert(snake.clone()) {
                    continue;
                }
                relationships.push(json!({
                    "name": snake,
                    "type": kind.as_str(),
                    "target": target,
                }));
                continue;
            }

            let column = format!("{snake}_id");
            if !taken.insert(column.clone()) {
                continue;
            }
            let mut field = json!({
                "name": column,
                "type": "uuid",
                "foreign_key": { "references": format!("{target}.id"), "on_delete": "SET NULL" },
            });
            if kind == RelationshipKind::OneToOne {
                field["unique"] = json!(true);
            }
            if let Some(comment) = &comment {
                field["description"] = json!(comment);
            }
            fields.push(field);
            relationships.push(json!({
                "name": snake,
                "type": kind.as_str(),
                "target": target,
                "local_field": column,
                "remote_field": "id",
            }));
            continue;
        }

        if !taken.insert(snake.clone()) {
            debug!(entity = name, field = %snake, "duplicate property skipped");
            continue;
        }
        let mut field = data_field(&snake, &ranges);
        if let Some(comment) = comment {
            field["description"] = json!(comment);
        }
        fields.push(field);
    }

    let mut entity = json!({
        "name": name,
        "table_name": table,
        "fields": fields,
        "endpoints": { "base_path": format!("/api/{table}") },
    });
    if let Some(description) = text(node.get("rdfs:comment")) {
        entity["description"] = json!(description);
    }
    if !relationships.is_empty() {
        entity["relationships"] = json!(relationships);
    }
    entity
}

/// Collection-like names hold many targets; primary/main/current/active names
/// hold exactly one.
fn relationship_kind(snake: &str) -> RelationshipKind {
    let words: Vec<&str> = snake.split('_').filter(|w| !w.is_empty()).collect();
    let plural = words.last().is_some_and(|last| {
        last.len() > 2 && last.ends_with('s') && !["ss", "us", "is"].iter().any(|e| last.ends_with(e))
    });

    if plural || words.iter().any(|w| COLLECTION_WORDS.contains(w)) {
        RelationshipKind::ManyToMany
    } else if words.iter().any(|w| SINGLE_WORDS.contains(w)) {
        RelationshipKind::OneToOne
    } else {
        RelationshipKind::ManyToOne
    }
}

/// A plain column for a property whose range is a data type (or unknown).
fn data_field(name: &str, ranges: &[String]) -> Value {
    let (field_type, format) = ranges
        .iter()
        .find_map(|r| data_type(r))
        .unwrap_or((FieldType::String, None));

    let field_type = if field_type == FieldType::String && LONG_TEXT.contains(&name) {
        FieldType::Text
    } else {
        field_type
    };

    let format = format.or_else(|| {
        if name.contains("email") {
            Some("email")
        } else if PHONE.iter().any(|p| name.contains(p)) {
            Some("phone")
        } else {
            None
        }
    });

    let mut field = json!({ "name": name, "type": field_type.as_str() });
    if field_type == FieldType::String {
        field["max_length"] = json!(if format == Some("url") { 500 } else { 255 });
    }
    if field_type == FieldType::Decimal {
        field["precision"] = json!(10);
        field["scale"] = json!(2);
    }
    if let Some(format) = format {
        field["format"] = json!(format);
    }
    field
}

fn data_type(range: &str) -> Option<(FieldType, Option<&'static str>)> {
    let mapped = match range {
        "Text" | "Duration" | "DataType" | "Thing" => (FieldType::String, None),
        "URL" => (FieldType::String, Some("url")),
        "Integer" => (FieldType::Int, None),
        "Float" => (FieldType::Float, None),
        "Number" => (FieldType::Decimal, None),
        "Boolean" => (FieldType::Boolean, None),
        "Date" => (FieldType::Date, None),
        "DateTime" => (FieldType::DateTime, None),
        "Time" => (FieldType::Time, None),
        _ => return None,
    };
    Some(mapped)
}

fn class_name(node: &Map<String, Value>) -> Option<String> {
    if let Some(id) = node.get("@id").and_then(Value::as_str) {
        if ID_PREFIXES.iter().any(|p| id.starts_with(p)) {
            return Some(local_name(id).to_string());
        }
    }
    text(node.get("rdfs:label")).filter(|label| !label.is_empty())
}

fn has_type(node: &Map<String, Value>, wanted: &[&str]) -> bool {
    match node.get("@type") {
        Some(Value::String(t)) => wanted.contains(&t.as_str()),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .any(|t| wanted.contains(&t)),
        _ => false,
    }
}

fn local_name(id: &str) -> &str {
    ID_PREFIXES
        .iter()
        .find_map(|p| id.strip_prefix(p))
        .unwrap_or(id)
}

/// `{"@id": ..}`, a bare string, or a list of either.
fn ids(value: Option<&Value>) -> Vec<String> {
    let one = |v: &Value| match v {
        Value::String(s) => Some(local_name(s).to_string()),
        Value::Object(o) => o.get("@id").and_then(Value::as_str).map(|s| local_name(s).to_string()),
        _ => None,
    };
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(one).collect(),
        Some(other) => one(other).into_iter().collect(),
        None => Vec::new(),
    }
}

/// Plain string or `{"@value": ..}` literal.
fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Object(o) => o.get("@value").and_then(Value::as_str).map(String::from),
        _ => None,
    }
}
