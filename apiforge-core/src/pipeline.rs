//! Stage wiring for one generation run.
//!
//! Loader → (Schema.org normalizer) → schema validator → converter →
//! integrity checks → (enrichment) → generation config. Every stage borrows
//! its input and hands a new artifact to the next; the first fatal error
//! stops the run.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::ForgeConfig;
use crate::convert;
use crate::enrich::{Enricher, SuggestionService};
use crate::error::ForgeError;
use crate::generation::{build_generation_config, GenerationConfig};
use crate::graph::EntityGraph;
use crate::integrity;
use crate::parser::{self, SourceDocument, SourceFormat};
use crate::schema;
use crate::schema_org;

const DEFAULT_SCHEMA_ORG_APP: &str = "SchemaOrgApp";

pub struct Pipeline {
    config: ForgeConfig,
    suggestions: Option<Arc<dyn SuggestionService>>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Pipeline::new(ForgeConfig::default())
    }
}

impl Pipeline {
    pub fn new(config: ForgeConfig) -> Self {
        Pipeline {
            config,
            suggestions: None,
        }
    }

    /// Pipeline configured from a TOML settings file.
    pub fn from_config_file(path: &Path) -> Result<Self, ForgeError> {
        Ok(Pipeline::new(ForgeConfig::from_toml_file(path)?))
    }

    /// Enable the enrichment stage with this service.
    pub fn with_suggestions(mut self, service: Arc<dyn SuggestionService>) -> Self {
        self.suggestions = Some(service);
        self
    }

    pub fn config(&self) -> &ForgeConfig {
        &self.config
    }

    // ===== VALIDATION ONLY =====

    /// Load and validate a file, returning the resolved graph.
    pub async fn validate(&self, path: &Path) -> Result<EntityGraph, ForgeError> {
        let source = parser::load_file_async(path).await?;
        self.validate_source(&source)
    }

    pub fn validate_str(&self, input: &str) -> Result<EntityGraph, ForgeError> {
        let source = parser::load_str(input)?;
        self.validate_source(&source)
    }

    pub fn validate_source(&self, source: &SourceDocument) -> Result<EntityGraph, ForgeError> {
        let normalized;
        let tree = match source.format {
            SourceFormat::JsonMetadata => &source.tree,
            SourceFormat::SchemaOrg => {
                normalized = schema_org::to_metadata(&source.tree, &schema_org_app_name(source))?;
                &normalized
            }
        };

        schema::validate(tree).map_err(ForgeError::Schema)?;
        let graph = convert::convert(tree)?;
        integrity::check_integrity(&graph)
            .into_result()
            .map_err(ForgeError::Referential)?;

        info!(
            app = %graph.app.name,
            entities = graph.len(),
            "document validated"
        );
        Ok(graph)
    }

    /// Like [`Pipeline::validate`], folding the outcome into a report.
    pub async fn check(&self, path: &Path) -> ValidationReport {
        ValidationReport::new(Some(path.to_path_buf()), self.validate(path).await)
    }

    // ===== FULL RUN =====

    pub async fn run(&self, path: &Path) -> Result<GenerationConfig, ForgeError> {
        self.run_until(path, std::future::pending::<()>()).await
    }

    /// Full run; resolving `cancel` abandons enrichment and keeps the
    /// validated graph.
    pub async fn run_until<C>(&self, path: &Path, cancel: C) -> Result<GenerationConfig, ForgeError>
    where
        C: Future<Output = ()>,
    {
        let graph = self.validate(path).await?;
        self.generate(&graph, cancel).await
    }

    /// Enrichment (when a service is attached) and config building over an
    /// already validated graph.
    pub async fn generate<C>(&self, graph: &EntityGraph, cancel: C) -> Result<GenerationConfig, ForgeError>
    where
        C: Future<Output = ()>,
    {
        let (graph, warnings) = match &self.suggestions {
            Some(service) => {
                let enricher = Enricher::new(Arc::clone(service), self.config.enrichment.clone());
                let outcome = enricher.enrich_until(graph, cancel).await;
                let mut warnings = outcome.warnings();
                if outcome.cancelled {
                    warn!("run cancelled during enrichment");
                    warnings.push("enrichment cancelled; entities left unenriched".to_string());
                }
                (outcome.graph, warnings)
            }
            None => (graph.clone(), Vec::new()),
        };

        Ok(build_generation_config(&graph, warnings)?)
    }

    /// Full run, summarized instead of handed off.
    pub async fn dry_run(&self, path: &Path) -> Result<RunSummary, ForgeError> {
        let config = self.run(path).await?;
        Ok(RunSummary::from(&config))
    }
}

fn schema_org_app_name(source: &SourceDocument) -> String {
    source
        .path
        .as_deref()
        .and_then(Path::file_stem)
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or(DEFAULT_SCHEMA_ORG_APP)
        .to_string()
}

/// Outcome of a validation-only run.
#[derive(Debug)]
pub struct ValidationReport {
    pub path: Option<PathBuf>,
    pub graph: Option<EntityGraph>,
    pub error: Option<ForgeError>,
}

impl ValidationReport {
    fn new(path: Option<PathBuf>, result: Result<EntityGraph, ForgeError>) -> Self {
        match result {
            Ok(graph) => ValidationReport {
                path,
                graph: Some(graph),
                error: None,
            },
            Err(error) => ValidationReport {
                path,
                graph: None,
                error: Some(error),
            },
        }
    }

    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }

    /// Stage that failed, if any.
    pub fn stage(&self) -> Option<&'static str> {
        self.error.as_ref().map(ForgeError::stage)
    }

    pub fn diagnostics(&self) -> Vec<String> {
        self.error
            .as_ref()
            .map(ForgeError::diagnostics)
            .unwrap_or_default()
    }

    /// Returns a formatted report
    pub fn error_report(&self) -> String {
        let source = self
            .path
            .as_ref()
            .map_or_else(|| "Document".to_string(), |p| p.display().to_string());

        if let Some(graph) = &self.graph {
            return format!("✅ {} is valid ({} entities)", source, graph.len());
        }

        let diagnostics = self.diagnostics();
        let mut report = format!(
            "❌ Found {} error(s) in {} during {}:\n\n",
            diagnostics.len(),
            source,
            self.stage().unwrap_or("validation")
        );
        for (i, message) in diagnostics.iter().enumerate() {
            report.push_str(&format!("  {}. {}\n", i + 1, message));
        }
        report
    }
}

/// What a dry run would hand to the generators.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub app: String,
    pub version: String,
    /// Creation order
    pub entities: Vec<String>,
    /// `table (Left <-> Right)`
    pub join_tables: Vec<String>,
    pub index_count: usize,
    pub warnings: Vec<String>,
}

impl From<&GenerationConfig> for RunSummary {
    fn from(config: &GenerationConfig) -> Self {
        RunSummary {
            app: config.app.name.clone(),
            version: config.app.version.clone(),
            entities: config.entity_order().into_iter().map(String::from).collect(),
            join_tables: config
                .join_tables()
                .map(|j| format!("{} ({} <-> {})", j.table, j.left.entity, j.right.entity))
                .collect(),
            index_count: config.entities.iter().map(|p| p.indexes.len()).sum(),
            warnings: config.warnings.clone(),
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "App: {} {}", self.app, self.version)?;
        writeln!(
            f,
            "Entities ({}): {}",
            self.entities.len(),
            self.entities.join(" -> ")
        )?;
        if self.join_tables.is_empty() {
            writeln!(f, "Join tables: none")?;
        } else {
            writeln!(f, "Join tables: {}", self.join_tables.join(", "))?;
        }
        writeln!(f, "Indexes: {}", self.index_count)?;
        if self.warnings.is_empty() {
            write!(f, "Warnings: none")
        } else {
            write!(f, "Warnings ({}):", self.warnings.len())?;
            for warning in &self.warnings {
                write!(f, "\n  - {warning}")?;
            }
            Ok(())
        }
    }
}
