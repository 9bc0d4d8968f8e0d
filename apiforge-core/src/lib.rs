//! Metadata resolution and validation engine.
//!
//! Reads hand-authored JSON metadata or Schema.org JSON-LD, resolves it into
//! an [`EntityGraph`], checks structural and referential integrity, optionally
//! enriches it with suggestions, and produces a topologically ordered
//! [`GenerationConfig`] for code generators.

pub mod config;
pub mod convert;
pub mod enrich;
pub mod error;
pub mod generation;
pub mod graph;
pub mod integrity;
pub mod naming;
pub mod parser;
pub mod pipeline;
pub mod schema;
pub mod schema_org;

#[cfg(test)]
mod test_helper;

pub use config::{ConfigError, EnrichmentConfig, ForgeConfig};
pub use convert::{convert, ConversionError};
pub use enrich::{
    Annotations, EnrichmentFailure, EnrichmentOutcome, Enricher, EntitySummary, StaticSuggestions,
    SuggestionError, SuggestionService,
};
pub use error::{ForgeError, ParseErrorDetail};
pub use generation::{
    build_generation_config, resolve_creation_order, DependencyCycleError, EntityPlan,
    GenerationConfig, GenerationError,
};
pub use graph::{Entity, EntityGraph, Field, FieldType, Relationship, RelationshipKind};
pub use integrity::{check_integrity, errors::ReferentialError, IntegrityReport};
pub use parser::{load_file, load_str, SourceDocument, SourceFormat};
pub use pipeline::{Pipeline, RunSummary, ValidationReport};
pub use schema::{SchemaError, SchemaErrorKind};
pub use schema_org::SchemaOrgError;
