//! Fixtures shared by the unit tests.

use serde_json::{json, Value};

use crate::convert;
use crate::graph::{AppInfo, Entity, EntityGraph, Field, FieldType};

/// A small shop: a required and a nullable foreign key, a self-reference, a
/// declared-first dependent (Product before Category) and a many-to-many
/// declared from both sides.
pub fn shop_document() -> Value {
    json!({
        "app": { "name": "Shop", "description": "Demo storefront", "version": "1.0.0" },
        "entities": [
            {
                "name": "Product",
                "description": "Something we sell",
                "audit": true,
                "fields": [
                    { "name": "id", "type": "uuid", "primary": true },
                    { "name": "name", "type": "string", "unique": true, "nullable": false, "max_length": 120 },
                    { "name": "price", "type": "decimal", "precision": 10, "scale": 2 },
                    { "name": "status", "type": "string", "enum": ["draft", "active", "archived"], "default": "draft" },
                    {
                        "name": "category_id", "type": "uuid", "nullable": false,
                        "foreign_key": { "references": "Category.id", "on_delete": "CASCADE" }
                    },
                    { "name": "supplier_id", "type": "uuid" }
                ],
                "relationships": [
                    { "name": "category", "type": "many-to-one", "target": "Category", "local_field": "category_id" },
                    { "name": "supplier", "type": "many-to-one", "target": "Supplier", "local_field": "supplier_id", "remote_field": "id" },
                    { "name": "tags", "type": "many-to-many", "target": "Tag" }
                ],
                "indexes": [{ "fields": ["status", "price"] }],
                "permissions": { "read": ["guest", "admin"], "delete": ["admin"] },
                "endpoints": {
                    "base_path": "/api/products",
                    "search": { "fields": ["name", "status"] },
                    "bulk": { "create": true },
                    "extra": { "publish": { "method": "POST", "path": "/{id}/publish", "auth": true } }
                },
                "seed": [{ "name": "Widget", "price": "9.99", "status": "active" }]
            },
            {
                "name": "Category",
                "fields": [
                    { "name": "id", "type": "uuid", "primary": true },
                    { "name": "name", "type": "string", "nullable": false },
                    {
                        "name": "parent_id", "type": "uuid",
                        "foreign_key": { "references": "Category.id", "on_delete": "SET NULL" }
                    }
                ],
                "relationships": [
                    { "name": "parent", "type": "self-referencing", "target": "Category", "local_field": "parent_id" },
                    { "name": "products", "type": "one-to-many", "target": "Product", "remote_field": "category_id" }
                ]
            },
            {
                "name": "Supplier",
                "fields": [
                    { "name": "id", "type": "uuid", "primary": true },
                    { "name": "name", "type": "string" },
                    { "name": "email", "type": "string", "format": "email" }
                ]
            },
            {
                "name": "Tag",
                "fields": [
                    { "name": "id", "type": "uuid", "primary": true },
                    { "name": "label", "type": "string" }
                ],
                "relationships": [
                    { "name": "products", "type": "many-to-many", "target": "Product" }
                ]
            }
        ],
        "generation_options": { "tests": true, "docker": false }
    })
}

/// `shop_document` run through the converter.
pub fn shop_graph() -> EntityGraph {
    convert::convert(&shop_document()).expect("shop document converts")
}

/// An entity keyed by a single `id: uuid` column.
pub fn keyed_entity(name: &str) -> Entity {
    let mut entity = Entity::new(name);
    entity.add_field(Field::new("id", FieldType::Uuid).primary());
    entity
}

/// `keyed_entity` plus a foreign key `<field>` to `<target>.id`.
pub fn entity_referencing(name: &str, field: &str, target: &str, required: bool) -> Entity {
    let mut entity = keyed_entity(name);
    let mut column = Field::new(field, FieldType::Uuid).references(target, "id");
    if required {
        column = column.required();
    }
    entity.add_field(column);
    entity
}

pub fn graph_of(entities: Vec<Entity>) -> EntityGraph {
    let mut graph = EntityGraph::new(AppInfo {
        name: "Test".into(),
        ..AppInfo::default()
    });
    for entity in entities {
        graph.add_entity(entity);
    }
    graph
}
