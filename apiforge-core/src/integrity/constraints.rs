use std::collections::HashSet;

use serde_json::Value;

use crate::graph::EntityGraph;
use super::errors::ReferentialError;

/// Validates primary key declarations
pub fn check_primary_keys(graph: &EntityGraph) -> Vec<ReferentialError> {
    let mut errors = Vec::new();

    for entity in graph.entities() {
        let flagged: Vec<String> = entity
            .fields
            .iter()
            .filter(|f| f.primary)
            .map(|f| f.name.clone())
            .collect();

        if let Some(composite) = &entity.composite_primary_key {
            let mut seen = HashSet::new();
            for member in composite {
                if !entity.has_field(member) {
                    errors.push(ReferentialError::CompositeKeyUnknownField {
                        entity: entity.name.clone(),
                        field: member.clone(),
                    });
                }
                if !seen.insert(member.as_str()) {
                    errors.push(ReferentialError::CompositeKeyDuplicate {
                        entity: entity.name.clone(),
                        field: member.clone(),
                    });
                }
            }
            for field in flagged {
                errors.push(ReferentialError::PrimaryWithCompositeKey {
                    entity: entity.name.clone(),
                    field,
                });
            }
            continue;
        }

        match flagged.len() {
            0 => errors.push(ReferentialError::MissingPrimaryKey {
                entity: entity.name.clone(),
            }),
            1 => {}
            _ => errors.push(ReferentialError::MultiplePrimaryKeys {
                entity: entity.name.clone(),
                fields: flagged,
            }),
        }
    }

    errors
}

/// Indexes, search endpoints and seed records may only name declared fields.
pub fn check_field_references(graph: &EntityGraph) -> Vec<ReferentialError> {
    let mut errors = Vec::new();

    for entity in graph.entities() {
        for index in &entity.indexes {
            for field in index.fields.iter().filter(|f| !entity.has_field(f)) {
                errors.push(ReferentialError::UnknownIndexField {
                    entity: entity.name.clone(),
                    field: field.clone(),
                });
            }
        }

        if let Some(endpoints) = &entity.endpoints {
            for field in endpoints.search_fields.iter().filter(|f| !entity.has_field(f)) {
                errors.push(ReferentialError::UnknownSearchField {
                    entity: entity.name.clone(),
                    field: field.clone(),
                });
            }
        }

        for (row, record) in entity.seed.iter().enumerate() {
            for key in record.keys().filter(|k| !entity.has_field(k)) {
                errors.push(ReferentialError::UnknownSeedField {
                    entity: entity.name.clone(),
                    row,
                    field: key.clone(),
                });
            }
        }
    }

    errors
}

/// A default on an enumerated field must be one of its values
pub fn check_defaults(graph: &EntityGraph) -> Vec<ReferentialError> {
    let mut errors = Vec::new();

    for entity in graph.entities() {
        for field in &entity.fields {
            let (Some(default), Some(values)) = (&field.default, &field.enum_values) else {
                continue;
            };
            if default.is_null() {
                continue;
            }
            let allowed = match default {
                Value::String(s) => values.contains(s),
                _ => false,
            };
            if !allowed {
                errors.push(ReferentialError::DefaultNotInEnum {
                    entity: entity.name.clone(),
                    field: field.name.clone(),
                    value: default.to_string(),
                });
            }
        }
    }

    errors
}
