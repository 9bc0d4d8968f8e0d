use std::collections::BTreeSet;

use serde::Serialize;

use crate::graph::{Entity, IndexOrigin};
use super::GenerationError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedIndex {
    pub name: String,
    pub fields: Vec<String>,
    pub unique: bool,
    pub origin: IndexOrigin,
}

/// Explicit and suggested indexes plus one implicit unique index per `unique`
/// field, deduplicated by field set, then one plain index per reference
/// column not already leading another index or the primary key.
pub(super) fn resolve_indexes(entity: &Entity) -> Result<Vec<ResolvedIndex>, GenerationError> {
    let mut candidates: Vec<(Option<String>, Vec<String>, bool, IndexOrigin)> = entity
        .indexes
        .iter()
        .map(|index| (index.name.clone(), index.fields.clone(), index.unique, index.origin))
        .collect();

    // Primary keys are unique already
    for field in entity.fields.iter().filter(|f| f.unique && !f.primary) {
        candidates.push((
            None,
            vec![field.name.clone()],
            true,
            IndexOrigin::UniqueConstraint,
        ));
    }

    let mut resolved: Vec<ResolvedIndex> = Vec::new();
    for (name, fields, unique, origin) in candidates {
        let key: BTreeSet<&str> = fields.iter().map(String::as_str).collect();
        let existing = resolved
            .iter()
            .find(|r| r.fields.iter().map(String::as_str).collect::<BTreeSet<_>>() == key);

        match existing {
            Some(existing) if existing.unique != unique => {
                return Err(GenerationError::IndexConflict {
                    entity: entity.name.clone(),
                    fields,
                });
            }
            Some(_) => continue,
            None => {}
        }

        let name = name.unwrap_or_else(|| index_name(&entity.table_name, &fields, unique));
        resolved.push(ResolvedIndex {
            name,
            fields,
            unique,
            origin,
        });
    }

    let primary_key = entity.primary_key();
    for dependency in entity.dependencies() {
        let column = dependency.field;
        let covered = primary_key.first() == Some(&column.as_str())
            || resolved.iter().any(|r| r.fields.first() == Some(&column));
        if covered {
            continue;
        }
        let fields = vec![column];
        resolved.push(ResolvedIndex {
            name: index_name(&entity.table_name, &fields, false),
            fields,
            unique: false,
            origin: IndexOrigin::ForeignKey,
        });
    }

    Ok(resolved)
}

/// `ix_products_status_price`, `uq_users_email`
pub fn index_name(table: &str, fields: &[String], unique: bool) -> String {
    let prefix = if unique { "uq" } else { "ix" };
    format!("{prefix}_{table}_{}", fields.join("_"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Field, FieldType, Index, Relationship, RelationshipKind};
    use crate::test_helper::{entity_referencing, keyed_entity};
    use pretty_assertions::assert_eq;

    fn index(fields: &[&str], unique: bool, origin: IndexOrigin) -> Index {
        Index {
            name: None,
            fields: fields.iter().map(|f| f.to_string()).collect(),
            unique,
            origin,
        }
    }

    #[test]
    fn test_implicit_and_explicit_indexes() {
        let mut user = keyed_entity("User");
        user.add_field(Field::new("email", FieldType::String).unique());
        user.add_field(Field::new("first", FieldType::String));
        user.add_field(Field::new("last", FieldType::String));
        user.indexes.push(index(&["last", "first"], false, IndexOrigin::Explicit));

        let indexes = resolve_indexes(&user).unwrap();
        let names: Vec<&str> = indexes.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["ix_users_last_first", "uq_users_email"]);
        assert_eq!(indexes[1].origin, IndexOrigin::UniqueConstraint);
    }

    #[test]
    fn test_duplicate_field_sets_collapse() {
        let mut user = keyed_entity("User");
        user.add_field(Field::new("email", FieldType::String).unique());
        user.indexes.push(Index {
            name: Some("users_email_key".into()),
            ..index(&["email"], true, IndexOrigin::Explicit)
        });
        user.indexes.push(index(&["email"], true, IndexOrigin::Suggested));

        let indexes = resolve_indexes(&user).unwrap();
        assert_eq!(indexes.len(), 1);
        assert_eq!(indexes[0].name, "users_email_key");
    }

    #[test]
    fn test_conflicting_uniqueness() {
        let mut user = keyed_entity("User");
        user.add_field(Field::new("email", FieldType::String).unique());
        user.indexes.push(index(&["email"], false, IndexOrigin::Suggested));

        assert_eq!(
            resolve_indexes(&user),
            Err(GenerationError::IndexConflict {
                entity: "User".into(),
                fields: vec!["email".into()],
            })
        );
    }

    #[test]
    fn test_reference_columns_are_indexed() {
        let mut order = entity_referencing("Order", "customer_id", "Customer", true);
        order.add_field(Field::new("coupon_id", FieldType::Uuid).unique().references("Coupon", "id"));
        order.add_field(Field::new("store_id", FieldType::Uuid));
        order.add_relationship(
            Relationship::new("store", RelationshipKind::ManyToOne, "Store").fields("store_id", "id"),
        );

        let indexes = resolve_indexes(&order).unwrap();
        let names: Vec<&str> = indexes.iter().map(|i| i.name.as_str()).collect();
        // coupon_id already has its unique index
        assert_eq!(
            names,
            vec!["uq_orders_coupon_id", "ix_orders_customer_id", "ix_orders_store_id"]
        );
        assert_eq!(indexes[1].origin, IndexOrigin::ForeignKey);
        assert!(!indexes[1].unique);
    }

    #[test]
    fn test_reference_leading_the_key_is_not_reindexed() {
        let mut join = Entity::new("ProductTag");
        join.add_field(Field::new("product_id", FieldType::Uuid).required().references("Product", "id"));
        join.add_field(Field::new("tag_id", FieldType::Uuid).required().references("Tag", "id"));
        join.composite_primary_key = Some(vec!["product_id".into(), "tag_id".into()]);

        let indexes = resolve_indexes(&join).unwrap();
        let fields: Vec<&Vec<String>> = indexes.iter().map(|i| &i.fields).collect();
        assert_eq!(fields, vec![&vec!["tag_id".to_string()]]);
    }
}
