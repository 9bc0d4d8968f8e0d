mod join;
mod raw;

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::graph::{
    DeletePolicy, EndpointConfig, Entity, EntityExplicit, EntityGraph, Explicit, Field,
    FieldType, ForeignKey, Index, IndexOrigin, Relationship, RelationshipKind,
};
use crate::naming;
use raw::{RawDocument, RawEntity, RawField, RawRelationship};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error("document could not be decoded: {message}")]
    Decode { message: String },

    #[error("relationship '{relationship}' in entity '{entity}' targets unknown entity '{target}'{}", hint(.suggestion))]
    UnknownRelationshipTarget {
        entity: String,
        relationship: String,
        target: String,
        suggestion: Option<String>,
    },

    #[error("relationship '{relationship}' in entity '{entity}' uses unknown join entity '{via}'{}", hint(.suggestion))]
    UnknownJoinEntity {
        entity: String,
        relationship: String,
        via: String,
        suggestion: Option<String>,
    },

    #[error("field '{field}' in entity '{entity}' references unknown entity '{target}'{}", hint(.suggestion))]
    UnknownForeignKeyTarget {
        entity: String,
        field: String,
        target: String,
        suggestion: Option<String>,
    },

    #[error("join entity '{join}' for {left} <-> {right} collides with a declared entity; set 'via' to use it")]
    JoinNameCollision {
        join: String,
        left: String,
        right: String,
    },

    #[error("join entity '{join}' for {left} <-> {right} is also the join name for {other_left} <-> {other_right}; set 'via' on one of them")]
    JoinPairCollision {
        join: String,
        left: String,
        right: String,
        other_left: String,
        other_right: String,
    },
}

fn hint(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(name) => format!(" (did you mean '{name}'?)"),
        None => String::new(),
    }
}

/// Build the entity graph from a schema-valid raw tree.
pub fn convert(tree: &Value) -> Result<EntityGraph, ConversionError> {
    let document = RawDocument::deserialize(tree).map_err(|e| ConversionError::Decode {
        message: e.to_string(),
    })?;

    // Pass one: every entity, no cross-entity resolution
    let mut entities = document
        .entities
        .iter()
        .map(build_entity)
        .collect::<Result<Vec<_>, _>>()?;

    let index: HashMap<String, usize> = entities
        .iter()
        .enumerate()
        .map(|(i, e)| (e.name.clone(), i))
        .collect();

    // Pass two: resolve names against the complete index
    let mut joins: IndexMap<String, (usize, usize)> = IndexMap::new();
    for (i, raw_entity) in document.entities.iter().enumerate() {
        resolve_foreign_keys(&entities[i], &index)?;

        let relationships = raw_entity.relationships.as_deref().unwrap_or_default();
        let mut resolved = Vec::with_capacity(relationships.len());
        for raw_relationship in relationships {
            let mut relationship = resolve_relationship(i, raw_relationship, &entities, &index)?;

            if relationship.kind == RelationshipKind::ManyToMany && relationship.via.is_none() {
                let target = index[&relationship.target];
                let join_name = naming::join_entity_name(&entities[i].name, &relationship.target);
                if index.contains_key(&join_name) {
                    return Err(ConversionError::JoinNameCollision {
                        join: join_name,
                        left: entities[i].name.clone(),
                        right: relationship.target.clone(),
                    });
                }
                let pair = if entities[i].name <= relationship.target {
                    (i, target)
                } else {
                    (target, i)
                };
                match joins.get(&join_name) {
                    Some(&existing) if existing != pair => {
                        return Err(ConversionError::JoinPairCollision {
                            join: join_name,
                            left: entities[pair.0].name.clone(),
                            right: entities[pair.1].name.clone(),
                            other_left: entities[existing.0].name.clone(),
                            other_right: entities[existing.1].name.clone(),
                        });
                    }
                    Some(_) => {}
                    None => {
                        joins.insert(join_name.clone(), pair);
                    }
                }
                relationship.via = Some(join_name);
            }

            resolved.push(relationship);
        }
        entities[i].relationships = resolved;
    }

    let synthesized: Vec<Entity> = joins
        .iter()
        .map(|(name, &(left, right))| join::build_join_entity(name, &entities[left], &entities[right]))
        .collect();
    for join in &synthesized {
        debug!(join = %join.name, "synthesized many-to-many join entity");
    }

    let mut graph = EntityGraph::new(document.app);
    graph.options = document.sections;
    for entity in entities.into_iter().chain(synthesized) {
        graph.add_entity(entity);
    }

    info!(
        entities = graph.len(),
        joins = joins.len(),
        "entity graph built"
    );
    Ok(graph)
}

fn build_entity(raw: &RawEntity) -> Result<Entity, ConversionError> {
    let mut entity = Entity::new(raw.name.clone());

    if let Some(table) = &raw.table_name {
        entity.table_name = table.clone();
    }
    entity.description = raw.description.clone().unwrap_or_default();
    entity.audit = raw.audit.unwrap_or(false);
    entity.soft_delete = raw.soft_delete.unwrap_or(false);
    entity.composite_primary_key = raw.composite_primary_key.clone();
    entity.business_rules = raw.business_rules.clone().unwrap_or_default();
    entity.seed = raw.seed.clone().unwrap_or_default();
    entity.explicit = EntityExplicit {
        soft_delete: raw.soft_delete.is_some(),
        business_rules: raw.business_rules.is_some(),
    };

    for field in &raw.fields {
        entity.add_field(build_field(&raw.name, field)?);
    }

    entity.indexes = raw
        .indexes
        .iter()
        .flatten()
        .map(|index| Index {
            name: index.name.clone(),
            fields: index.fields.clone(),
            unique: index.unique.unwrap_or(false),
            origin: IndexOrigin::Explicit,
        })
        .collect();

    entity.permissions = raw
        .permissions
        .iter()
        .flatten()
        .map(|(action, roles)| (action.clone(), roles.iter().cloned().collect()))
        .collect();

    entity.endpoints = raw.endpoints.as_ref().map(|endpoints| EndpointConfig {
        base_path: endpoints.base_path.clone(),
        crud: endpoints.crud.unwrap_or(true),
        search_fields: endpoints
            .search
            .as_ref()
            .and_then(|s| s.fields.clone())
            .unwrap_or_default(),
        bulk: endpoints.bulk.unwrap_or_default(),
        extra: endpoints.extra.clone().unwrap_or_default(),
    });

    Ok(entity)
}

fn build_field(entity: &str, raw: &RawField) -> Result<Field, ConversionError> {
    let field_type = FieldType::parse(&raw.field_type).ok_or_else(|| ConversionError::Decode {
        message: format!(
            "field '{}' of entity '{entity}' has unknown type '{}'",
            raw.name, raw.field_type
        ),
    })?;
    let primary = raw.primary.unwrap_or(false);

    let foreign_key = raw
        .foreign_key
        .as_ref()
        .map(|fk| {
            let (target, field) = fk.references.split_once('.').ok_or_else(|| {
                ConversionError::Decode {
                    message: format!("malformed reference '{}'", fk.references),
                }
            })?;
            Ok::<_, ConversionError>(ForeignKey {
                entity: target.to_string(),
                field: field.to_string(),
                on_delete: fk
                    .on_delete
                    .as_deref()
                    .and_then(DeletePolicy::parse)
                    .unwrap_or_default(),
            })
        })
        .transpose()?;

    Ok(Field {
        name: raw.name.clone(),
        field_type,
        primary,
        auto_increment: raw.auto_increment.unwrap_or(false),
        nullable: raw.nullable.unwrap_or(!primary),
        unique: raw.unique.unwrap_or(false),
        default: raw.default.clone(),
        enum_values: raw.enum_values.clone(),
        foreign_key,
        pattern: raw.validation.as_ref().and_then(|v| v.pattern.clone()),
        max_length: raw.max_length,
        precision: raw.precision,
        scale: raw.scale,
        format: raw.format.clone(),
        description: raw.description.clone(),
        sensitive: raw.private.unwrap_or(false),
        frontend: raw.frontend.clone(),
        explicit: Explicit {
            nullable: raw.nullable.is_some(),
            unique: raw.unique.is_some(),
            description: raw.description.is_some(),
            sensitive: raw.private.is_some(),
        },
    })
}

fn resolve_foreign_keys(
    entity: &Entity,
    index: &HashMap<String, usize>,
) -> Result<(), ConversionError> {
    for field in &entity.fields {
        let Some(fk) = &field.foreign_key else {
            continue;
        };
        if !index.contains_key(&fk.entity) {
            return Err(ConversionError::UnknownForeignKeyTarget {
                entity: entity.name.clone(),
                field: field.name.clone(),
                target: fk.entity.clone(),
                suggestion: suggest(&fk.entity, index),
            });
        }
    }
    Ok(())
}

fn resolve_relationship(
    owner: usize,
    raw: &RawRelationship,
    entities: &[Entity],
    index: &HashMap<String, usize>,
) -> Result<Relationship, ConversionError> {
    let owner = &entities[owner];
    let kind = RelationshipKind::parse(&raw.kind).ok_or_else(|| ConversionError::Decode {
        message: format!(
            "relationship in entity '{}' has unknown type '{}'",
            owner.name, raw.kind
        ),
    })?;

    let name = raw.name.clone().unwrap_or_else(|| match kind {
        RelationshipKind::OneToMany | RelationshipKind::ManyToMany => {
            naming::pluralize(&naming::to_snake_case(&raw.target))
        }
        _ => naming::to_snake_case(&raw.target),
    });

    let Some(&target) = index.get(&raw.target) else {
        return Err(ConversionError::UnknownRelationshipTarget {
            entity: owner.name.clone(),
            relationship: name,
            target: raw.target.clone(),
            suggestion: suggest(&raw.target, index),
        });
    };
    let target = &entities[target];

    if let Some(via) = &raw.via {
        if !index.contains_key(via) {
            return Err(ConversionError::UnknownJoinEntity {
                entity: owner.name.clone(),
                relationship: name,
                via: via.clone(),
                suggestion: suggest(via, index),
            });
        }
    }

    let key_of = |entity: &Entity| entity.single_primary_key().map(|f| f.name.clone());
    let (local_field, remote_field) = match kind {
        RelationshipKind::ManyToOne
        | RelationshipKind::OneToOne
        | RelationshipKind::SelfReferencing => (
            raw.local_field.clone(),
            raw.remote_field.clone().or_else(|| key_of(target)),
        ),
        RelationshipKind::OneToMany => (
            raw.local_field.clone().or_else(|| key_of(owner)),
            raw.remote_field.clone(),
        ),
        RelationshipKind::ManyToMany => (raw.local_field.clone(), raw.remote_field.clone()),
    };

    Ok(Relationship {
        name,
        kind,
        target: target.name.clone(),
        local_field,
        remote_field,
        via: raw.via.clone(),
        cascade: raw.cascade.clone(),
        inverse: raw.inverse.clone(),
        eager_load: raw.eager_load.unwrap_or(false),
    })
}

fn suggest(name: &str, index: &HashMap<String, usize>) -> Option<String> {
    let mut names: Vec<&str> = index.keys().map(String::as_str).collect();
    names.sort_unstable();
    naming::closest_match(name, names).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EntityOrigin;
    use crate::test_helper;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn document(entities: Value) -> Value {
        json!({ "app": { "name": "Shop", "version": "1.0.0" }, "entities": entities })
    }

    #[test]
    fn test_shop_document_converts() {
        let graph = convert(&test_helper::shop_document()).unwrap();
        let names: Vec<&str> = graph.entity_names().collect();
        assert_eq!(names, vec!["Product", "Category", "Supplier", "Tag", "ProductTag"]);

        let product = graph.get_entity("Product").unwrap();
        assert_eq!(product.table_name, "products");
        assert_eq!(product.fields.len(), 6);
        assert!(product.get_field("name").unwrap().unique);
        assert_eq!(
            product.permissions["delete"].iter().collect::<Vec<_>>(),
            vec!["admin"]
        );
        assert_eq!(graph.options["generation_options"]["tests"], true);
    }

    #[test]
    fn test_forward_references_resolve() {
        // Product is declared before Category and references it
        let graph = convert(&test_helper::shop_document()).unwrap();
        let product = graph.get_entity("Product").unwrap();
        let fk = product.get_field("category_id").unwrap().foreign_key.as_ref().unwrap();
        assert_eq!(fk.entity, "Category");
        assert_eq!(fk.on_delete, DeletePolicy::Cascade);
        assert!(graph.position("Category").unwrap() > graph.position("Product").unwrap());
    }

    #[test]
    fn test_explicit_attributes_are_tracked() {
        let graph = convert(&test_helper::shop_document()).unwrap();
        let product = graph.get_entity("Product").unwrap();

        let name = product.get_field("name").unwrap();
        assert!(name.explicit.unique);
        assert!(name.explicit.nullable);

        let price = product.get_field("price").unwrap();
        assert!(!price.explicit.unique);
        assert!(price.nullable);

        let id = product.get_field("id").unwrap();
        assert!(!id.nullable, "primary keys default to non-nullable");
    }

    #[test]
    fn test_many_to_many_synthesizes_join_entity() {
        let graph = convert(&test_helper::shop_document()).unwrap();
        let join = graph.get_entity("ProductTag").unwrap();

        assert_eq!(
            join.origin,
            EntityOrigin::SynthesizedJoin {
                left: "Product".into(),
                right: "Tag".into()
            }
        );
        assert_eq!(join.fields.len(), 2);
        assert!(join.get_field("id").is_none());
        for (column, target) in [("product_id", "Product"), ("tag_id", "Tag")] {
            let field = join.get_field(column).unwrap();
            assert!(!field.nullable);
            let fk = field.foreign_key.as_ref().unwrap();
            assert_eq!((fk.entity.as_str(), fk.field.as_str()), (target, "id"));
        }

        let tags = graph
            .get_entity("Product")
            .unwrap()
            .relationships
            .iter()
            .find(|r| r.name == "tags")
            .unwrap();
        assert_eq!(tags.via.as_deref(), Some("ProductTag"));
    }

    #[test]
    fn test_inverse_many_to_many_shares_join_entity() {
        let graph = convert(&test_helper::shop_document()).unwrap();
        assert_eq!(graph.join_entities().count(), 1);
        let products = graph
            .get_entity("Tag")
            .unwrap()
            .relationships
            .iter()
            .find(|r| r.name == "products")
            .unwrap();
        assert_eq!(products.via.as_deref(), Some("ProductTag"));
    }

    #[test]
    fn test_join_synthesis_is_idempotent() {
        let first = convert(&test_helper::shop_document()).unwrap();
        let second = convert(&test_helper::shop_document()).unwrap();
        assert_eq!(first.get_entity("ProductTag"), second.get_entity("ProductTag"));
    }

    #[test]
    fn test_misspelled_target() {
        let tree = document(json!([
            { "name": "Supplier", "fields": [{ "name": "id", "type": "uuid", "primary": true }] },
            {
                "name": "Product",
                "fields": [
                    { "name": "id", "type": "uuid", "primary": true },
                    { "name": "supplier_id", "type": "uuid" },
                ],
                "relationships": [
                    { "name": "supplier", "type": "many-to-one", "target": "Suplier", "local_field": "supplier_id" }
                ]
            }
        ]));

        let err = convert(&tree).unwrap_err();
        assert_eq!(
            err,
            ConversionError::UnknownRelationshipTarget {
                entity: "Product".into(),
                relationship: "supplier".into(),
                target: "Suplier".into(),
                suggestion: Some("Supplier".into()),
            }
        );
        let message = err.to_string();
        assert!(message.contains("Suplier"));
        assert!(message.contains("Product"));
        assert!(message.contains("did you mean 'Supplier'"));
    }

    #[test]
    fn test_unknown_foreign_key_entity() {
        let tree = document(json!([{
            "name": "Order",
            "fields": [
                { "name": "id", "type": "uuid", "primary": true },
                { "name": "user_id", "type": "uuid", "foreign_key": { "references": "User.id" } },
            ]
        }]));
        assert!(matches!(
            convert(&tree),
            Err(ConversionError::UnknownForeignKeyTarget { ref target, .. }) if target == "User"
        ));
    }

    #[test]
    fn test_unknown_via() {
        let tree = document(json!([
            { "name": "Student", "fields": [{ "name": "id", "type": "uuid", "primary": true }],
              "relationships": [{ "name": "courses", "type": "many-to-many", "target": "Course", "via": "Enrolment" }] },
            { "name": "Course", "fields": [{ "name": "id", "type": "uuid", "primary": true }] },
        ]));
        assert!(matches!(
            convert(&tree),
            Err(ConversionError::UnknownJoinEntity { .. })
        ));
    }

    #[test]
    fn test_join_name_collision() {
        let tree = document(json!([
            { "name": "Product", "fields": [{ "name": "id", "type": "uuid", "primary": true }],
              "relationships": [{ "name": "tags", "type": "many-to-many", "target": "Tag" }] },
            { "name": "Tag", "fields": [{ "name": "id", "type": "uuid", "primary": true }] },
            { "name": "ProductTag", "fields": [{ "name": "note", "type": "string" }] },
        ]));
        assert!(matches!(
            convert(&tree),
            Err(ConversionError::JoinNameCollision { .. })
        ));
    }

    #[test]
    fn test_two_pairs_sharing_a_join_name() {
        let keyed = |name: &str, target: &str| {
            json!({
                "name": name,
                "fields": [{ "name": "id", "type": "uuid", "primary": true }],
                "relationships": [{ "name": "links", "type": "many-to-many", "target": target }]
            })
        };
        let tree = document(json!([
            keyed("A", "BC"),
            keyed("AB", "C"),
            { "name": "BC", "fields": [{ "name": "id", "type": "uuid", "primary": true }] },
            { "name": "C", "fields": [{ "name": "id", "type": "uuid", "primary": true }] },
        ]));

        assert_eq!(
            convert(&tree),
            Err(ConversionError::JoinPairCollision {
                join: "ABC".into(),
                left: "AB".into(),
                right: "C".into(),
                other_left: "A".into(),
                other_right: "BC".into(),
            })
        );
    }

    #[test]
    fn test_relationship_field_inference() {
        let graph = convert(&test_helper::shop_document()).unwrap();

        let category = graph.get_entity("Category").unwrap();
        let parent = category.relationships.iter().find(|r| r.name == "parent").unwrap();
        assert_eq!(parent.local_field.as_deref(), Some("parent_id"));
        assert_eq!(parent.remote_field.as_deref(), Some("id"));

        let products = category
            .relationships
            .iter()
            .find(|r| r.name == "products")
            .unwrap();
        assert_eq!(products.local_field.as_deref(), Some("id"));
        assert_eq!(products.remote_field.as_deref(), Some("category_id"));
    }

    #[test]
    fn test_default_relationship_name() {
        let tree = document(json!([
            { "name": "Author", "fields": [{ "name": "id", "type": "uuid", "primary": true }],
              "relationships": [{ "type": "one-to-many", "target": "BlogPost", "remote_field": "author_id" }] },
            { "name": "BlogPost", "fields": [
                { "name": "id", "type": "uuid", "primary": true },
                { "name": "author_id", "type": "uuid" } ] },
        ]));
        let graph = convert(&tree).unwrap();
        let author = graph.get_entity("Author").unwrap();
        assert_eq!(author.relationships[0].name, "blog_posts");
    }
}
