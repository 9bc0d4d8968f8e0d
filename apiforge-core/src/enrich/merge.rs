use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::graph::{Entity, EntityGraph, Field, Index, IndexOrigin};
use super::service::{Annotations, FieldSuggestion};

/// Fold settled annotations into a new graph, in graph order.
///
/// Only attributes the document left unstated are touched. Key and
/// foreign-key columns keep their nullability and uniqueness, unknown fields
/// are ignored, and no index is added over a field set that already has one.
pub fn merge_annotations(
    graph: &EntityGraph,
    annotations: &HashMap<String, Annotations>,
) -> EntityGraph {
    let entities = graph
        .entities()
        .map(|entity| match annotations.get(&entity.name) {
            Some(annotations) => apply(entity, annotations),
            None => entity.clone(),
        })
        .collect();
    graph.with_entities(entities)
}

fn apply(entity: &Entity, annotations: &Annotations) -> Entity {
    let mut out = entity.clone();

    let shorthand = annotations.unique_fields.iter().map(|name| {
        (
            name,
            FieldSuggestion {
                unique: Some(true),
                ..FieldSuggestion::default()
            },
        )
    });
    let suggestions: Vec<(&String, FieldSuggestion)> = annotations
        .fields
        .iter()
        .map(|(name, s)| (name, s.clone()))
        .chain(shorthand)
        .collect();

    for (name, suggestion) in suggestions {
        let Some(position) = out.fields.iter().position(|f| &f.name == name) else {
            debug!(entity = %entity.name, field = %name, "suggestion for unknown field ignored");
            continue;
        };
        let protected = is_key_column(&out, &out.fields[position]);
        let conflicts = unique_conflicts_with_index(&out, name);
        apply_field(&mut out.fields[position], &suggestion, protected, conflicts);
    }

    let shorthand_indexes = annotations
        .indexed_fields
        .iter()
        .map(|name| (vec![name.clone()], false));
    let index_suggestions: Vec<(Vec<String>, bool)> = annotations
        .indexes
        .iter()
        .map(|s| (s.fields.clone(), s.unique))
        .chain(shorthand_indexes)
        .collect();

    for (fields, unique) in index_suggestions {
        if fields.is_empty() || !fields.iter().all(|f| out.has_field(f)) {
            debug!(entity = %entity.name, ?fields, "index suggestion over unknown fields ignored");
            continue;
        }
        let key: BTreeSet<&str> = fields.iter().map(String::as_str).collect();
        if existing_index_keys(&out).contains(&key) {
            continue;
        }
        out.indexes.push(Index {
            name: None,
            fields,
            unique,
            origin: IndexOrigin::Suggested,
        });
    }

    if !out.explicit.business_rules {
        extend_unique(&mut out.business_rules, &annotations.business_rules);
    }
    extend_unique(&mut out.security_notes, &annotations.security_notes);

    if let Some(soft_delete) = annotations.soft_delete {
        if !out.explicit.soft_delete {
            out.soft_delete = soft_delete;
        }
    }

    out
}

fn apply_field(field: &mut Field, suggestion: &FieldSuggestion, protected: bool, conflicts: bool) {
    if let Some(unique) = suggestion.unique {
        if !field.explicit.unique && !protected && !(unique && conflicts) {
            field.unique = unique;
        }
    }
    if let Some(nullable) = suggestion.nullable {
        if !field.explicit.nullable && !protected {
            field.nullable = nullable;
        }
    }
    if let Some(sensitive) = suggestion.sensitive {
        if !field.explicit.sensitive {
            field.sensitive = sensitive;
        }
    }
    if let Some(description) = &suggestion.description {
        if !field.explicit.description {
            field.description = Some(description.clone());
        }
    }
}

/// Primary and composite-key columns, plus every column that carries a
/// dependency edge (foreign keys and belongs-to relationship fields).
fn is_key_column(entity: &Entity, field: &Field) -> bool {
    field.primary
        || field.foreign_key.is_some()
        || entity.dependencies().iter().any(|d| d.field == field.name)
        || entity
            .composite_primary_key
            .as_ref()
            .is_some_and(|key| key.contains(&field.name))
}

/// A non-unique index already covers exactly this one field.
fn unique_conflicts_with_index(entity: &Entity, field: &str) -> bool {
    entity
        .indexes
        .iter()
        .any(|index| !index.unique && index.fields.len() == 1 && index.fields[0] == field)
}

fn existing_index_keys(entity: &Entity) -> Vec<BTreeSet<&str>> {
    let mut keys: Vec<BTreeSet<&str>> = entity.indexes.iter().map(Index::key).collect();
    keys.extend(
        entity
            .fields
            .iter()
            .filter(|f| f.unique || f.primary)
            .map(|f| BTreeSet::from([f.name.as_str()])),
    );
    keys.push(entity.primary_key().into_iter().collect());
    keys
}

fn extend_unique(target: &mut Vec<String>, items: &[String]) {
    for item in items {
        if !target.contains(item) {
            target.push(item.clone());
        }
    }
}
