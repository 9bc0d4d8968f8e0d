//! Generation config builder.
//!
//! Turns a validated (and possibly enriched) entity graph into the
//! self-contained, topologically ordered structure handed to code generators.

mod indexes;
mod order;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::graph::{AppInfo, Entity, EntityGraph, EntityOrigin, RelationshipKind};

pub use indexes::{index_name, ResolvedIndex};
pub use order::{resolve_creation_order, DependencyCycleError};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error("DependencyCycleError: {0}")]
    DependencyCycle(#[from] DependencyCycleError),

    #[error("IndexConflict: indexes on '{entity}' over {fields:?} disagree on uniqueness")]
    IndexConflict { entity: String, fields: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationConfig {
    pub app: AppInfo,
    pub options: IndexMap<String, Value>,
    /// Creation order: every entity after the entities it requires
    pub entities: Vec<EntityPlan>,
    /// Non-fatal problems collected on the way, e.g. enrichment failures
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityPlan {
    pub entity: Entity,
    pub depends_on: Vec<String>,
    pub join_table: Option<JoinTable>,
    pub indexes: Vec<ResolvedIndex>,
}

/// Physical description of a many-to-many join entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinTable {
    pub table: String,
    pub left: JoinSide,
    pub right: JoinSide,
    pub synthesized: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinSide {
    pub entity: String,
    pub column: String,
    pub references: String,
}

impl GenerationConfig {
    pub fn entity_order(&self) -> Vec<&str> {
        self.entities.iter().map(|p| p.entity.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&EntityPlan> {
        self.entities.iter().find(|p| p.entity.name == name)
    }

    pub fn join_tables(&self) -> impl Iterator<Item = &JoinTable> {
        self.entities.iter().filter_map(|p| p.join_table.as_ref())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Build the generation config for a graph that already passed integrity checks.
pub fn build_generation_config(
    graph: &EntityGraph,
    warnings: Vec<String>,
) -> Result<GenerationConfig, GenerationError> {
    let order = order::resolve_creation_order(graph)?;

    let mut entities = Vec::with_capacity(order.len());
    for name in &order {
        let Some(entity) = graph.get_entity(name) else {
            continue;
        };
        entities.push(EntityPlan {
            depends_on: order::required_dependencies(graph, name)
                .into_iter()
                .map(String::from)
                .collect(),
            join_table: join_participants(graph, entity)
                .and_then(|(left, right)| describe_join(entity, &left, &right)),
            indexes: indexes::resolve_indexes(entity)?,
            entity: entity.clone(),
        });
    }

    info!(
        app = %graph.app.name,
        entities = entities.len(),
        warnings = warnings.len(),
        "generation config built"
    );

    Ok(GenerationConfig {
        app: graph.app.clone(),
        options: graph.options.clone(),
        entities,
        warnings,
    })
}

/// The two entities a join entity mediates: recorded on synthesized joins,
/// otherwise taken from the first many-to-many relationship using it as `via`.
fn join_participants(graph: &EntityGraph, entity: &Entity) -> Option<(String, String)> {
    if let EntityOrigin::SynthesizedJoin { left, right } = &entity.origin {
        return Some((left.clone(), right.clone()));
    }
    graph.entities().find_map(|owner| {
        owner
            .relationships
            .iter()
            .find(|r| {
                r.kind == RelationshipKind::ManyToMany && r.via.as_deref() == Some(entity.name.as_str())
            })
            .map(|r| (owner.name.clone(), r.target.clone()))
    })
}

fn describe_join(entity: &Entity, left: &str, right: &str) -> Option<JoinTable> {
    let side = |participant: &str, skip: Option<&str>| {
        entity.fields.iter().find_map(|field| {
            let fk = field.foreign_key.as_ref()?;
            (fk.entity == participant && Some(field.name.as_str()) != skip).then(|| JoinSide {
                entity: participant.to_string(),
                column: field.name.clone(),
                references: fk.field.clone(),
            })
        })
    };

    let left_side = side(left, None)?;
    let right_side = side(right, Some(left_side.column.as_str()))?;
    Some(JoinTable {
        table: entity.table_name.clone(),
        left: left_side,
        right: right_side,
        synthesized: entity.is_synthesized_join(),
    })
}
