use crate::graph::{Entity, EntityGraph, EntityOrigin, RelationshipKind};
use super::errors::ReferentialError;

/// Every foreign-key descriptor must land on an existing field of the same type.
pub fn check_foreign_keys(graph: &EntityGraph) -> Vec<ReferentialError> {
    let mut errors = Vec::new();

    for entity in graph.entities() {
        let mut dangling = Vec::new();

        for field in &entity.fields {
            let Some(fk) = &field.foreign_key else {
                continue;
            };
            let target_field = graph
                .get_entity(&fk.entity)
                .and_then(|target| target.get_field(&fk.field));

            match target_field {
                None => dangling.push(ReferentialError::DanglingForeignKey {
                    entity: entity.name.clone(),
                    field: field.name.clone(),
                    target: fk.entity.clone(),
                    target_field: fk.field.clone(),
                }),
                Some(target) if target.field_type != field.field_type => {
                    errors.push(ReferentialError::ForeignKeyTypeMismatch {
                        entity: entity.name.clone(),
                        field: field.name.clone(),
                        field_type: field.field_type.to_string(),
                        target: fk.entity.clone(),
                        target_field: fk.field.clone(),
                        target_type: target.field_type.to_string(),
                    })
                }
                Some(_) => {}
            }
        }

        // A synthesized join with no resolvable side is one problem, not two
        match &entity.origin {
            EntityOrigin::SynthesizedJoin { left, right }
                if !dangling.is_empty() && dangling.len() == foreign_key_count(entity) =>
            {
                errors.push(ReferentialError::UnreachableJoinEntity {
                    entity: entity.name.clone(),
                    left: left.clone(),
                    right: right.clone(),
                });
            }
            _ => errors.extend(dangling),
        }
    }

    errors
}

fn foreign_key_count(entity: &Entity) -> usize {
    entity.fields.iter().filter(|f| f.foreign_key.is_some()).count()
}

/// Relationship endpoints resolve: local fields on the owner, remote fields on
/// the target. Many-to-many relationships go through their join entity instead.
pub fn check_relationships(graph: &EntityGraph) -> Vec<ReferentialError> {
    let mut errors = Vec::new();

    for entity in graph.entities() {
        for relationship in &entity.relationships {
            if relationship.kind == RelationshipKind::SelfReferencing
                && relationship.target != entity.name
            {
                errors.push(ReferentialError::SelfReferenceTarget {
                    entity: entity.name.clone(),
                    relationship: relationship.name.clone(),
                    target: relationship.target.clone(),
                });
                continue;
            }

            if relationship.kind == RelationshipKind::ManyToMany {
                continue;
            }

            // Targets were resolved during conversion
            let Some(target) = graph.get_entity(&relationship.target) else {
                continue;
            };

            let sides = [
                ("local_field", relationship.local_field.as_deref(), entity),
                ("remote_field", relationship.remote_field.as_deref(), target),
            ];
            for (side, field, owner) in sides {
                match field {
                    None => errors.push(ReferentialError::MissingRelationshipField {
                        entity: entity.name.clone(),
                        relationship: relationship.name.clone(),
                        side,
                    }),
                    Some(field) if !owner.has_field(field) => {
                        errors.push(ReferentialError::UnknownRelationshipField {
                            entity: entity.name.clone(),
                            relationship: relationship.name.clone(),
                            owner: owner.name.clone(),
                            field: field.to_string(),
                        })
                    }
                    Some(_) => {}
                }
            }
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Field, FieldType, Relationship};
    use crate::test_helper::{entity_referencing, graph_of, keyed_entity, shop_graph};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_shop_relations_are_sound() {
        let graph = shop_graph();
        assert_eq!(check_foreign_keys(&graph), vec![]);
        assert_eq!(check_relationships(&graph), vec![]);
    }

    #[test]
    fn test_dangling_foreign_key_field() {
        let mut order = keyed_entity("Order");
        order.add_field(Field::new("user_id", FieldType::Uuid).references("User", "uuid"));
        let graph = graph_of(vec![keyed_entity("User"), order]);

        let errors = check_foreign_keys(&graph);
        assert_eq!(
            errors,
            vec![ReferentialError::DanglingForeignKey {
                entity: "Order".into(),
                field: "user_id".into(),
                target: "User".into(),
                target_field: "uuid".into(),
            }]
        );
    }

    #[test]
    fn test_foreign_key_type_mismatch() {
        let mut order = keyed_entity("Order");
        order.add_field(Field::new("user_id", FieldType::Int).references("User", "id"));
        let graph = graph_of(vec![keyed_entity("User"), order]);

        let errors = check_foreign_keys(&graph);
        assert_eq!(errors.len(), 1);
        let message = errors[0].to_string();
        assert!(message.contains("'int'"));
        assert!(message.contains("'uuid'"));
    }

    #[test]
    fn test_unreachable_join_entity_is_reported_once() {
        let mut join = crate::graph::Entity::new("LeftRight");
        join.add_field(Field::new("left_id", FieldType::Uuid).required().references("Left", "id"));
        join.add_field(Field::new("right_id", FieldType::Uuid).required().references("Right", "id"));
        join.origin = EntityOrigin::SynthesizedJoin {
            left: "Left".into(),
            right: "Right".into(),
        };
        let graph = graph_of(vec![
            crate::graph::Entity::new("Left"),
            crate::graph::Entity::new("Right"),
            join,
        ]);

        let errors = check_foreign_keys(&graph);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], ReferentialError::UnreachableJoinEntity { .. }));
    }

    #[test]
    fn test_relationship_fields_must_resolve() {
        let mut order = entity_referencing("Order", "user_id", "User", true);
        order.add_relationship(
            Relationship::new("user", RelationshipKind::ManyToOne, "User").fields("owner_id", "id"),
        );
        let mut user = keyed_entity("User");
        user.add_relationship(Relationship::new("orders", RelationshipKind::OneToMany, "Order"));
        let graph = graph_of(vec![user, order]);

        let errors = check_relationships(&graph);
        assert_eq!(errors.len(), 3);
        assert_eq!(
            errors[0],
            ReferentialError::MissingRelationshipField {
                entity: "User".into(),
                relationship: "orders".into(),
                side: "local_field",
            }
        );
        assert!(matches!(errors[1], ReferentialError::MissingRelationshipField { side: "remote_field", .. }));
        assert!(matches!(
            errors[2],
            ReferentialError::UnknownRelationshipField { ref field, .. } if field == "owner_id"
        ));
    }

    #[test]
    fn test_self_reference_must_target_owner() {
        let mut category = keyed_entity("Category");
        category.add_field(Field::new("parent_id", FieldType::Uuid));
        category.add_relationship(
            Relationship::new("parent", RelationshipKind::SelfReferencing, "Tag")
                .fields("parent_id", "id"),
        );
        let graph = graph_of(vec![category, keyed_entity("Tag")]);

        let errors = check_relationships(&graph);
        assert_eq!(
            errors,
            vec![ReferentialError::SelfReferenceTarget {
                entity: "Category".into(),
                relationship: "parent".into(),
                target: "Tag".into(),
            }]
        );
    }
}
