use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;
use crate::convert::ConversionError;
use crate::generation::GenerationError;
use crate::integrity::errors::ReferentialError;
use crate::schema::SchemaError;
use crate::schema_org::SchemaOrgError;

/// Fatal errors, one variant per pipeline stage in stage order.
#[derive(Error, Debug)]
pub enum ForgeError {
    #[error("Failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ParseError: {0}")]
    ParseError(ParseErrorDetail),

    #[error("Schema.org source error: {0}")]
    SchemaOrg(#[from] SchemaOrgError),

    #[error("{}", numbered("SchemaError", .0))]
    Schema(Vec<SchemaError>),

    #[error("ConversionError: {0}")]
    Conversion(#[from] ConversionError),

    #[error("{}", numbered("ReferentialError", .0))]
    Referential(Vec<ReferentialError>),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("ConfigError: {0}")]
    Config(#[from] ConfigError),
}

impl ForgeError {
    /// Stage that raised the error, for summaries and logs.
    pub fn stage(&self) -> &'static str {
        match self {
            ForgeError::Io { .. } | ForgeError::ParseError(_) => "load",
            ForgeError::SchemaOrg(_) => "normalize",
            ForgeError::Schema(_) => "schema",
            ForgeError::Conversion(_) => "convert",
            ForgeError::Referential(_) => "integrity",
            ForgeError::Generation(_) => "generation",
            ForgeError::Config(_) => "config",
        }
    }

    /// One message per independent problem.
    pub fn diagnostics(&self) -> Vec<String> {
        match self {
            ForgeError::Schema(errors) => errors.iter().map(ToString::to_string).collect(),
            ForgeError::Referential(errors) => errors.iter().map(ToString::to_string).collect(),
            other => vec![other.to_string()],
        }
    }
}

fn numbered<E: fmt::Display>(label: &str, errors: &[E]) -> String {
    let mut out = format!("{} {}(s):", errors.len(), label);
    for (i, error) in errors.iter().enumerate() {
        out.push_str(&format!("\n  {}. {}", i + 1, error));
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseErrorDetail {
    pub message: String,
    pub line: usize,
    pub column: usize,
    pub path: Option<PathBuf>,
    pub token: Option<String>,
    pub snippet: Option<String>,
    pub suggestion: Option<String>,
}

impl fmt::Display for ParseErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}:{}:{}: ", path.display(), self.line, self.column)?,
            None => write!(f, "line {}, column {}: ", self.line, self.column)?,
        }
        write!(f, "{}", self.message)?;
        if let Some(snippet) = &self.snippet {
            write!(f, "\n{snippet}")?;
        }
        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nhint: {suggestion}")?;
        }
        Ok(())
    }
}
