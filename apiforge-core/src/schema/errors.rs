use std::fmt;
use thiserror::Error;

/// A structural problem at a location in the raw document.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaError {
    /// e.g. `entities[1].fields[0].type`
    pub path: String,
    pub kind: SchemaErrorKind,
}

impl SchemaError {
    pub fn new(path: impl Into<String>, kind: SchemaErrorKind) -> Self {
        SchemaError {
            path: path.into(),
            kind,
        }
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.kind)
    }
}

impl std::error::Error for SchemaError {}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaErrorKind {
    // Shape
    #[error("document root must be an object")]
    InvalidRoot,

    #[error("missing required key '{key}'")]
    MissingKey { key: String },

    #[error("expected {expected}")]
    WrongType { expected: &'static str },

    #[error("'{key}' must not be empty")]
    EmptyList { key: String },

    // Entities
    #[error("missing non-empty 'name'")]
    MissingName,

    #[error("'{name}' is not a valid identifier")]
    InvalidIdentifier { name: String },

    #[error("duplicate entity name '{entity}' (first defined at entities[{first}])")]
    DuplicateEntity { entity: String, first: usize },

    // Fields
    #[error("duplicate field name '{field}' in entity '{entity}'")]
    DuplicateField { entity: String, field: String },

    #[error("field '{field}' is missing a 'type'")]
    MissingFieldType { field: String },

    #[error("field '{field}' has unknown type '{found}' (expected one of: {})", crate::graph::FieldType::NAMES.join(", "))]
    UnknownFieldType { field: String, found: String },

    #[error("foreign key reference '{found}' must have the form 'Entity.field'")]
    InvalidReference { found: String },

    #[error("unknown deletion policy '{found}' (expected CASCADE, SET NULL, SET DEFAULT, RESTRICT or NO ACTION)")]
    UnknownDeletePolicy { found: String },

    #[error("validation pattern for '{field}' does not compile: {reason}")]
    InvalidPattern { field: String, reason: String },

    // Relationships
    #[error("relationship is missing a 'type'")]
    MissingRelationshipType,

    #[error("relationship has unknown type '{found}' (expected one of: {})", crate::graph::RelationshipKind::NAMES.join(", "))]
    UnknownRelationshipKind { found: String },

    // Endpoints
    #[error("path '{found}' must start with '/'")]
    InvalidPath { found: String },

    #[error("operation '{operation}' has unsupported HTTP method '{found}'")]
    InvalidMethod { operation: String, found: String },

    // Indexes
    #[error("fields {fields:?} of entity '{entity}' are indexed both as unique and non-unique")]
    IndexConflict { entity: String, fields: Vec<String> },
}
