pub mod errors;
mod indexes;

use std::collections::{HashMap, HashSet};

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};

use crate::graph::{DeletePolicy, FieldType, RelationshipKind};
pub use errors::{SchemaError, SchemaErrorKind};

lazy_static! {
    static ref ENTITY_NAME: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").unwrap();
    static ref FIELD_NAME: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
    static ref REFERENCE: Regex =
        Regex::new(r"^[A-Za-z][A-Za-z0-9_]*\.[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

const HTTP_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

#[derive(Clone, Copy)]
enum Kind {
    Bool,
    Str,
    Unsigned,
    Object,
    StrList,
    ObjList,
}

impl Kind {
    fn matches(self, value: &Value) -> bool {
        match self {
            Kind::Bool => value.is_boolean(),
            Kind::Str => value.is_string(),
            Kind::Unsigned => value.is_u64(),
            Kind::Object => value.is_object(),
            Kind::StrList => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
            Kind::ObjList => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_object)),
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Kind::Bool => "a boolean",
            Kind::Str => "a string",
            Kind::Unsigned => "a non-negative integer",
            Kind::Object => "an object",
            Kind::StrList => "a list of strings",
            Kind::ObjList => "a list of objects",
        }
    }
}

const ENTITY_KEYS: &[(&str, Kind)] = &[
    ("table_name", Kind::Str),
    ("description", Kind::Str),
    ("audit", Kind::Bool),
    ("soft_delete", Kind::Bool),
    ("business_rules", Kind::StrList),
    ("seed", Kind::ObjList),
];

const FIELD_KEYS: &[(&str, Kind)] = &[
    ("primary", Kind::Bool),
    ("auto_increment", Kind::Bool),
    ("nullable", Kind::Bool),
    ("unique", Kind::Bool),
    ("private", Kind::Bool),
    ("max_length", Kind::Unsigned),
    ("precision", Kind::Unsigned),
    ("scale", Kind::Unsigned),
    ("format", Kind::Str),
    ("description", Kind::Str),
    ("enum", Kind::StrList),
    ("foreign_key", Kind::Object),
    ("validation", Kind::Object),
];

const RELATIONSHIP_KEYS: &[(&str, Kind)] = &[
    ("name", Kind::Str),
    ("local_field", Kind::Str),
    ("remote_field", Kind::Str),
    ("via", Kind::Str),
    ("cascade", Kind::Str),
    ("inverse", Kind::Str),
    ("eager_load", Kind::Bool),
];

/// Check the raw tree against the structural rules, collecting every problem.
pub fn validate(tree: &Value) -> Result<(), Vec<SchemaError>> {
    let mut validator = SchemaValidator::default();
    validator.check_document(tree);

    if validator.errors.is_empty() {
        Ok(())
    } else {
        Err(validator.errors)
    }
}

#[derive(Default)]
struct SchemaValidator {
    errors: Vec<SchemaError>,
}

impl SchemaValidator {
    fn push(&mut self, path: impl Into<String>, kind: SchemaErrorKind) {
        self.errors.push(SchemaError::new(path, kind));
    }

    fn check_keys(&mut self, obj: &Map<String, Value>, keys: &[(&str, Kind)], path: &str) {
        for (key, kind) in keys {
            match obj.get(*key) {
                None | Some(Value::Null) => {}
                Some(value) if kind.matches(value) => {}
                Some(_) => self.push(
                    format!("{path}.{key}"),
                    SchemaErrorKind::WrongType {
                        expected: kind.describe(),
                    },
                ),
            }
        }
    }

    // ===== (a) TOP LEVEL =====
    fn check_document(&mut self, tree: &Value) {
        let Some(root) = tree.as_object() else {
            self.push("$", SchemaErrorKind::InvalidRoot);
            return;
        };

        match root.get("app") {
            None => self.push("app", SchemaErrorKind::MissingKey { key: "app".into() }),
            Some(Value::Object(app)) => self.check_app(app),
            Some(_) => self.push("app", SchemaErrorKind::WrongType { expected: "an object" }),
        }

        if let Some(options) = root.get("generation_options") {
            if !options.is_object() {
                self.push(
                    "generation_options",
                    SchemaErrorKind::WrongType { expected: "an object" },
                );
            }
        }

        match root.get("entities") {
            None => self.push(
                "entities",
                SchemaErrorKind::MissingKey {
                    key: "entities".into(),
                },
            ),
            Some(Value::Array(entities)) if entities.is_empty() => self.push(
                "entities",
                SchemaErrorKind::EmptyList {
                    key: "entities".into(),
                },
            ),
            Some(Value::Array(entities)) => self.check_entities(entities),
            Some(_) => self.push("entities", SchemaErrorKind::WrongType { expected: "a list" }),
        }
    }

    fn check_app(&mut self, app: &Map<String, Value>) {
        match app.get("name") {
            Some(Value::String(name)) if !name.trim().is_empty() => {}
            _ => self.push("app.name", SchemaErrorKind::MissingName),
        }
        for key in ["description", "version", "locale", "timezone"] {
            if let Some(value) = app.get(key) {
                if !value.is_string() && !value.is_null() {
                    self.push(
                        format!("app.{key}"),
                        SchemaErrorKind::WrongType { expected: "a string" },
                    );
                }
            }
        }
    }

    // ===== (b) ENTITIES =====
    /// Runs each check as a pass over the whole document: names, then fields,
    /// then relationships, then everything else.
    fn check_entities(&mut self, entities: &[Value]) {
        let mut objects: Vec<(String, &Map<String, Value>, &str)> = Vec::new();
        let mut seen: HashMap<&str, usize> = HashMap::new();

        for (i, entity) in entities.iter().enumerate() {
            let path = format!("entities[{i}]");
            let Some(obj) = entity.as_object() else {
                self.push(path, SchemaErrorKind::WrongType { expected: "an object" });
                continue;
            };

            let name = match obj.get("name").and_then(Value::as_str) {
                Some(name) if !name.trim().is_empty() => name,
                _ => {
                    self.push(format!("{path}.name"), SchemaErrorKind::MissingName);
                    ""
                }
            };

            if !name.is_empty() {
                if !ENTITY_NAME.is_match(name) {
                    self.push(
                        format!("{path}.name"),
                        SchemaErrorKind::InvalidIdentifier { name: name.into() },
                    );
                }
                if let Some(&first) = seen.get(name) {
                    self.push(
                        format!("{path}.name"),
                        SchemaErrorKind::DuplicateEntity {
                            entity: name.into(),
                            first,
                        },
                    );
                } else {
                    seen.insert(name, i);
                }
            }

            objects.push((path, obj, name));
        }

        for (path, obj, name) in &objects {
            match obj.get("fields") {
                None => self.push(
                    format!("{path}.fields"),
                    SchemaErrorKind::MissingKey {
                        key: "fields".into(),
                    },
                ),
                Some(Value::Array(fields)) => self.check_fields(name, fields, path),
                Some(_) => self.push(
                    format!("{path}.fields"),
                    SchemaErrorKind::WrongType { expected: "a list" },
                ),
            }
        }

        for (path, obj, _) in &objects {
            match obj.get("relationships") {
                None | Some(Value::Null) => {}
                Some(Value::Array(relationships)) => self.check_relationships(relationships, path),
                Some(_) => self.push(
                    format!("{path}.relationships"),
                    SchemaErrorKind::WrongType { expected: "a list" },
                ),
            }
        }

        for (path, obj, name) in &objects {
            self.check_keys(obj, ENTITY_KEYS, path);
            self.check_entity_extras(name, obj, path);
        }
    }

    fn check_entity_extras(&mut self, entity: &str, obj: &Map<String, Value>, path: &str) {
        self.check_string_list(obj, "composite_primary_key", path);
        self.check_permissions(obj, path);
        self.check_endpoints(obj, path);

        match obj.get("indexes") {
            None | Some(Value::Null) => {}
            Some(Value::Array(indexes)) => {
                for (i, index) in indexes.iter().enumerate() {
                    let index_path = format!("{path}.indexes[{i}]");
                    match index.as_object() {
                        Some(index) => {
                            self.check_string_list(index, "fields", &index_path);
                            if index.get("fields").map_or(true, Value::is_null) {
                                self.push(
                                    format!("{index_path}.fields"),
                                    SchemaErrorKind::MissingKey {
                                        key: "fields".into(),
                                    },
                                );
                            }
                            self.check_keys(
                                index,
                                &[("name", Kind::Str), ("unique", Kind::Bool)],
                                &index_path,
                            );
                        }
                        None => self.push(
                            index_path,
                            SchemaErrorKind::WrongType { expected: "an object" },
                        ),
                    }
                }
            }
            Some(_) => self.push(
                format!("{path}.indexes"),
                SchemaErrorKind::WrongType { expected: "a list" },
            ),
        }

        for conflict in indexes::find_conflicts(obj) {
            self.push(
                format!("{path}.indexes"),
                SchemaErrorKind::IndexConflict {
                    entity: entity.to_string(),
                    fields: conflict,
                },
            );
        }
    }

    /// A non-empty list of strings, when present.
    fn check_string_list(&mut self, obj: &Map<String, Value>, key: &str, path: &str) {
        match obj.get(key) {
            None | Some(Value::Null) => {}
            Some(value) if !Kind::StrList.matches(value) => self.push(
                format!("{path}.{key}"),
                SchemaErrorKind::WrongType {
                    expected: "a list of strings",
                },
            ),
            Some(Value::Array(items)) if items.is_empty() => self.push(
                format!("{path}.{key}"),
                SchemaErrorKind::EmptyList { key: key.into() },
            ),
            Some(_) => {}
        }
    }

    fn check_permissions(&mut self, obj: &Map<String, Value>, path: &str) {
        match obj.get("permissions") {
            None | Some(Value::Null) => {}
            Some(Value::Object(actions)) => {
                for (action, roles) in actions {
                    if !Kind::StrList.matches(roles) {
                        self.push(
                            format!("{path}.permissions.{action}"),
                            SchemaErrorKind::WrongType {
                                expected: "a list of role names",
                            },
                        );
                    }
                }
            }
            Some(_) => self.push(
                format!("{path}.permissions"),
                SchemaErrorKind::WrongType { expected: "an object" },
            ),
        }
    }

    fn check_endpoints(&mut self, obj: &Map<String, Value>, path: &str) {
        let endpoints = match obj.get("endpoints") {
            None | Some(Value::Null) => return,
            Some(Value::Object(endpoints)) => endpoints,
            Some(_) => {
                self.push(
                    format!("{path}.endpoints"),
                    SchemaErrorKind::WrongType { expected: "an object" },
                );
                return;
            }
        };
        let path = format!("{path}.endpoints");

        match endpoints.get("base_path") {
            Some(Value::String(base)) if !base.starts_with('/') => self.push(
                format!("{path}.base_path"),
                SchemaErrorKind::InvalidPath {
                    found: base.clone(),
                },
            ),
            Some(Value::String(_)) => {}
            Some(_) => self.push(
                format!("{path}.base_path"),
                SchemaErrorKind::WrongType { expected: "a string" },
            ),
            None => self.push(
                format!("{path}.base_path"),
                SchemaErrorKind::MissingKey {
                    key: "base_path".into(),
                },
            ),
        }

        self.check_keys(
            endpoints,
            &[("crud", Kind::Bool), ("search", Kind::Object), ("bulk", Kind::Object)],
            &path,
        );
        if let Some(Value::Object(search)) = endpoints.get("search") {
            self.check_string_list(search, "fields", &format!("{path}.search"));
        }
        if let Some(Value::Object(bulk)) = endpoints.get("bulk") {
            self.check_keys(
                bulk,
                &[("create", Kind::Bool), ("update", Kind::Bool), ("delete", Kind::Bool)],
                &format!("{path}.bulk"),
            );
        }

        match endpoints.get("extra") {
            None | Some(Value::Null) => {}
            Some(Value::Object(operations)) => {
                for (name, operation) in operations {
                    self.check_operation(name, operation, &format!("{path}.extra.{name}"));
                }
            }
            Some(_) => self.push(
                format!("{path}.extra"),
                SchemaErrorKind::WrongType { expected: "an object" },
            ),
        }
    }

    fn check_operation(&mut self, name: &str, operation: &Value, path: &str) {
        let Some(operation) = operation.as_object() else {
            self.push(path, SchemaErrorKind::WrongType { expected: "an object" });
            return;
        };

        match operation.get("method").and_then(Value::as_str) {
            Some(method) if HTTP_METHODS.contains(&method.to_ascii_uppercase().as_str()) => {}
            Some(method) => self.push(
                format!("{path}.method"),
                SchemaErrorKind::InvalidMethod {
                    operation: name.into(),
                    found: method.into(),
                },
            ),
            None => self.push(
                format!("{path}.method"),
                SchemaErrorKind::MissingKey {
                    key: "method".into(),
                },
            ),
        }

        match operation.get("path").and_then(Value::as_str) {
            Some(p) if p.starts_with('/') => {}
            Some(p) => self.push(
                format!("{path}.path"),
                SchemaErrorKind::InvalidPath { found: p.into() },
            ),
            None => self.push(
                format!("{path}.path"),
                SchemaErrorKind::MissingKey { key: "path".into() },
            ),
        }

        self.check_keys(operation, &[("auth", Kind::Bool)], path);
    }

    // ===== (c) FIELDS =====
    fn check_fields(&mut self, entity: &str, fields: &[Value], entity_path: &str) {
        let mut seen: HashSet<&str> = HashSet::new();

        for (i, field) in fields.iter().enumerate() {
            let path = format!("{entity_path}.fields[{i}]");
            let Some(obj) = field.as_object() else {
                self.push(path, SchemaErrorKind::WrongType { expected: "an object" });
                continue;
            };

            let name = match obj.get("name").and_then(Value::as_str) {
                Some(name) if !name.trim().is_empty() => name,
                _ => {
                    self.push(format!("{path}.name"), SchemaErrorKind::MissingName);
                    ""
                }
            };

            if !name.is_empty() {
                if !FIELD_NAME.is_match(name) {
                    self.push(
                        format!("{path}.name"),
                        SchemaErrorKind::InvalidIdentifier { name: name.into() },
                    );
                }
                if !seen.insert(name) {
                    self.push(
                        format!("{path}.name"),
                        SchemaErrorKind::DuplicateField {
                            entity: entity.into(),
                            field: name.into(),
                        },
                    );
                }
            }

            match obj.get("type") {
                None => self.push(
                    format!("{path}.type"),
                    SchemaErrorKind::MissingFieldType { field: name.into() },
                ),
                Some(Value::String(ty)) if FieldType::parse(ty).is_some() => {}
                Some(other) => self.push(
                    format!("{path}.type"),
                    SchemaErrorKind::UnknownFieldType {
                        field: name.into(),
                        found: other.as_str().map_or_else(|| other.to_string(), String::from),
                    },
                ),
            }

            self.check_keys(obj, FIELD_KEYS, &path);
            self.check_foreign_key(obj, &path);
            self.check_validation(name, obj, &path);
        }
    }

    fn check_foreign_key(&mut self, field: &Map<String, Value>, path: &str) {
        let Some(Value::Object(fk)) = field.get("foreign_key") else {
            return;
        };
        let path = format!("{path}.foreign_key");

        match fk.get("references") {
            Some(Value::String(reference)) if REFERENCE.is_match(reference) => {}
            Some(Value::String(reference)) => self.push(
                format!("{path}.references"),
                SchemaErrorKind::InvalidReference {
                    found: reference.clone(),
                },
            ),
            Some(_) => self.push(
                format!("{path}.references"),
                SchemaErrorKind::WrongType { expected: "a string" },
            ),
            None => self.push(
                format!("{path}.references"),
                SchemaErrorKind::MissingKey {
                    key: "references".into(),
                },
            ),
        }

        match fk.get("on_delete") {
            None | Some(Value::Null) => {}
            Some(Value::String(policy)) if DeletePolicy::parse(policy).is_some() => {}
            Some(other) => self.push(
                format!("{path}.on_delete"),
                SchemaErrorKind::UnknownDeletePolicy {
                    found: other.as_str().map_or_else(|| other.to_string(), String::from),
                },
            ),
        }
    }

    fn check_validation(&mut self, field: &str, obj: &Map<String, Value>, path: &str) {
        let Some(Value::Object(validation)) = obj.get("validation") else {
            return;
        };
        match validation.get("pattern") {
            None | Some(Value::Null) => {}
            Some(Value::String(pattern)) => {
                if let Err(e) = Regex::new(pattern) {
                    self.push(
                        format!("{path}.validation.pattern"),
                        SchemaErrorKind::InvalidPattern {
                            field: field.into(),
                            reason: e.to_string(),
                        },
                    );
                }
            }
            Some(_) => self.push(
                format!("{path}.validation.pattern"),
                SchemaErrorKind::WrongType { expected: "a string" },
            ),
        }
    }

    // ===== (d) RELATIONSHIPS =====
    fn check_relationships(&mut self, relationships: &[Value], entity_path: &str) {
        for (i, relationship) in relationships.iter().enumerate() {
            let path = format!("{entity_path}.relationships[{i}]");
            let Some(obj) = relationship.as_object() else {
                self.push(path, SchemaErrorKind::WrongType { expected: "an object" });
                continue;
            };

            match obj.get("type") {
                None => self.push(
                    format!("{path}.type"),
                    SchemaErrorKind::MissingRelationshipType,
                ),
                Some(Value::String(kind)) if RelationshipKind::parse(kind).is_some() => {}
                Some(other) => self.push(
                    format!("{path}.type"),
                    SchemaErrorKind::UnknownRelationshipKind {
                        found: other.as_str().map_or_else(|| other.to_string(), String::from),
                    },
                ),
            }

            match obj.get("target").and_then(Value::as_str) {
                Some(target) if !target.trim().is_empty() => {}
                _ => self.push(
                    format!("{path}.target"),
                    SchemaErrorKind::MissingKey {
                        key: "target".into(),
                    },
                ),
            }

            self.check_keys(obj, RELATIONSHIP_KEYS, &path);
        }
    }
}
