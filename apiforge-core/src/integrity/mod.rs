pub mod errors;
mod constraints;
mod relations;

use tracing::debug;

use crate::graph::EntityGraph;
use errors::ReferentialError;

/// Result of checking an entity graph
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrityReport {
    pub errors: Vec<ReferentialError>,
}

impl IntegrityReport {
    /// Returns true if the graph passed all checks
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns a formatted error report
    pub fn error_report(&self) -> String {
        if self.is_valid() {
            return "✅ Entity graph is valid".to_string();
        }

        let mut report = format!("❌ Found {} error(s):\n\n", self.errors.len());
        for (i, error) in self.errors.iter().enumerate() {
            report.push_str(&format!("  {}. {}\n", i + 1, error));
        }
        report
    }

    pub fn into_result(self) -> Result<(), Vec<ReferentialError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

/// Run all referential checks on a graph
pub fn check_integrity(graph: &EntityGraph) -> IntegrityReport {
    let mut errors: Vec<ReferentialError> = Vec::new();

    // Foreign keys and relationships
    errors.extend(relations::check_foreign_keys(graph));
    errors.extend(relations::check_relationships(graph));

    // Keys and field-naming declarations
    errors.extend(constraints::check_primary_keys(graph));
    errors.extend(constraints::check_field_references(graph));
    errors.extend(constraints::check_defaults(graph));

    debug!(entities = graph.len(), errors = errors.len(), "integrity checked");
    IntegrityReport { errors }
}
