use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::{Entity, FieldType};

/// What a suggestion provider is told about one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitySummary {
    pub name: String,
    pub table_name: String,
    pub description: String,
    pub fields: Vec<FieldSummary>,
    /// `kind target` pairs, e.g. `many-to-one Category`
    pub relationships: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSummary {
    pub name: String,
    pub field_type: FieldType,
    pub primary: bool,
    pub nullable: bool,
    pub unique: bool,
    pub foreign_key: bool,
}

impl EntitySummary {
    pub fn of(entity: &Entity) -> Self {
        EntitySummary {
            name: entity.name.clone(),
            table_name: entity.table_name.clone(),
            description: entity.description.clone(),
            fields: entity
                .fields
                .iter()
                .map(|f| FieldSummary {
                    name: f.name.clone(),
                    field_type: f.field_type,
                    primary: f.primary,
                    nullable: f.nullable,
                    unique: f.unique,
                    foreign_key: f.foreign_key.is_some(),
                })
                .collect(),
            relationships: entity
                .relationships
                .iter()
                .map(|r| format!("{} {}", r.kind, r.target))
                .collect(),
        }
    }
}

/// Refinements proposed for one entity. Everything is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Annotations {
    pub fields: IndexMap<String, FieldSuggestion>,
    /// Shorthand for `fields.<name>.unique = true`
    pub unique_fields: Vec<String>,
    /// Shorthand for one non-unique single-field index each
    pub indexed_fields: Vec<String>,
    pub indexes: Vec<IndexSuggestion>,
    pub business_rules: Vec<String>,
    pub security_notes: Vec<String>,
    pub soft_delete: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FieldSuggestion {
    pub unique: Option<bool>,
    pub nullable: Option<bool>,
    pub sensitive: Option<bool>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IndexSuggestion {
    pub fields: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SuggestionError {
    #[error("suggestion service unavailable: {0}")]
    Unavailable(String),

    #[error("invalid suggestion response: {0}")]
    InvalidResponse(String),
}

/// Boundary to whatever produces suggestions (an AI provider in production).
#[async_trait]
pub trait SuggestionService: Send + Sync {
    async fn suggest(&self, entity: &EntitySummary) -> Result<Annotations, SuggestionError>;
}

/// Canned annotations keyed by entity name, read from a JSON object such as
/// `{ "User": { "unique_fields": ["email"] } }`.
#[derive(Debug, Clone, Default)]
pub struct StaticSuggestions {
    by_entity: HashMap<String, Annotations>,
}

impl StaticSuggestions {
    pub fn new(by_entity: HashMap<String, Annotations>) -> Self {
        StaticSuggestions { by_entity }
    }

    pub fn from_json_str(content: &str) -> Result<Self, SuggestionError> {
        let by_entity = serde_json::from_str(content)
            .map_err(|e| SuggestionError::InvalidResponse(e.to_string()))?;
        Ok(StaticSuggestions { by_entity })
    }

    pub fn from_file(path: &Path) -> Result<Self, SuggestionError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SuggestionError::Unavailable(format!("cannot read '{}': {e}", path.display()))
        })?;
        Self::from_json_str(&content)
    }
}

#[async_trait]
impl SuggestionService for StaticSuggestions {
    async fn suggest(&self, entity: &EntitySummary) -> Result<Annotations, SuggestionError> {
        Ok(self.by_entity.get(&entity.name).cloned().unwrap_or_default())
    }
}
