use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReferentialError {
    // Foreign keys
    #[error("Field '{field}' in '{entity}' references '{target}.{target_field}', but '{target}' has no such field")]
    DanglingForeignKey {
        entity: String,
        field: String,
        target: String,
        target_field: String,
    },

    #[error("Field '{field}' in '{entity}' is '{field_type}' but references '{target}.{target_field}' of type '{target_type}'")]
    ForeignKeyTypeMismatch {
        entity: String,
        field: String,
        field_type: String,
        target: String,
        target_field: String,
        target_type: String,
    },

    // Relationships
    #[error("Relationship '{relationship}' in '{entity}' is missing its '{side}'")]
    MissingRelationshipField {
        entity: String,
        relationship: String,
        side: &'static str,
    },

    #[error("Relationship '{relationship}' in '{entity}' names field '{field}', but '{owner}' has no such field")]
    UnknownRelationshipField {
        entity: String,
        relationship: String,
        owner: String,
        field: String,
    },

    #[error("Self-referencing relationship '{relationship}' in '{entity}' targets '{target}'")]
    SelfReferenceTarget {
        entity: String,
        relationship: String,
        target: String,
    },

    // Primary keys
    #[error("Composite primary key of '{entity}' names unknown field '{field}'")]
    CompositeKeyUnknownField { entity: String, field: String },

    #[error("Composite primary key of '{entity}' lists '{field}' more than once")]
    CompositeKeyDuplicate { entity: String, field: String },

    #[error("Field '{field}' in '{entity}' is marked primary, but the entity declares a composite primary key")]
    PrimaryWithCompositeKey { entity: String, field: String },

    #[error("Entity '{entity}' has no primary key")]
    MissingPrimaryKey { entity: String },

    #[error("Entity '{entity}' has multiple primary keys: {fields:?}")]
    MultiplePrimaryKeys { entity: String, fields: Vec<String> },

    // Declarations naming fields
    #[error("Index on '{entity}' names unknown field '{field}'")]
    UnknownIndexField { entity: String, field: String },

    #[error("Search endpoint of '{entity}' names unknown field '{field}'")]
    UnknownSearchField { entity: String, field: String },

    #[error("Seed record #{row} of '{entity}' sets unknown field '{field}'")]
    UnknownSeedField {
        entity: String,
        row: usize,
        field: String,
    },

    #[error("Default {value} of field '{field}' in '{entity}' is not one of its enum values")]
    DefaultNotInEnum {
        entity: String,
        field: String,
        value: String,
    },

    // Join entities
    #[error("Join entity '{entity}' for {left} <-> {right} cannot reach either participant's key")]
    UnreachableJoinEntity {
        entity: String,
        left: String,
        right: String,
    },
}

impl ReferentialError {
    /// Entity the problem was found on.
    pub fn entity(&self) -> &str {
        match self {
            ReferentialError::DanglingForeignKey { entity, .. }
            | ReferentialError::ForeignKeyTypeMismatch { entity, .. }
            | ReferentialError::MissingRelationshipField { entity, .. }
            | ReferentialError::UnknownRelationshipField { entity, .. }
            | ReferentialError::SelfReferenceTarget { entity, .. }
            | ReferentialError::CompositeKeyUnknownField { entity, .. }
            | ReferentialError::CompositeKeyDuplicate { entity, .. }
            | ReferentialError::PrimaryWithCompositeKey { entity, .. }
            | ReferentialError::MissingPrimaryKey { entity }
            | ReferentialError::MultiplePrimaryKeys { entity, .. }
            | ReferentialError::UnknownIndexField { entity, .. }
            | ReferentialError::UnknownSearchField { entity, .. }
            | ReferentialError::UnknownSeedField { entity, .. }
            | ReferentialError::DefaultNotInEnum { entity, .. }
            | ReferentialError::UnreachableJoinEntity { entity, .. } => entity,
        }
    }
}
