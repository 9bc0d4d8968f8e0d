use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::error::{ForgeError, ParseErrorDetail};

/// The kind of document a source file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// Hand-authored application metadata (`app` + `entities`).
    JsonMetadata,
    /// Schema.org JSON-LD definitions (`@graph`).
    SchemaOrg,
}

/// A syntactically valid document. Nothing has been interpreted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDocument {
    pub path: Option<PathBuf>,
    pub format: SourceFormat,
    pub tree: Value,
}

pub fn load_file(path: &Path) -> Result<SourceDocument, ForgeError> {
    let text = std::fs::read_to_string(path).map_err(|source| ForgeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_text(&text, Some(path))
}

pub async fn load_file_async(path: &Path) -> Result<SourceDocument, ForgeError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ForgeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    load_text(&text, Some(path))
}

pub fn load_str(input: &str) -> Result<SourceDocument, ForgeError> {
    load_text(input, None)
}

fn load_text(input: &str, path: Option<&Path>) -> Result<SourceDocument, ForgeError> {
    let tree = parse_source(input).map_err(|mut err| {
        if let ForgeError::ParseError(detail) = &mut err {
            detail.path = path.map(Path::to_path_buf);
        }
        err
    })?;
    let format = detect_format(&tree);
    debug!(?format, path = ?path, "source document parsed");

    Ok(SourceDocument {
        path: path.map(Path::to_path_buf),
        format,
        tree,
    })
}

pub fn parse_source(input: &str) -> Result<Value, ForgeError> {
    serde_json::from_str(input).map_err(|e| enhance_parse_error(&e, input))
}

pub fn detect_format(tree: &Value) -> SourceFormat {
    match tree.as_object() {
        Some(root) if root.contains_key("@graph") || root.contains_key("@context") => {
            SourceFormat::SchemaOrg
        }
        _ => SourceFormat::JsonMetadata,
    }
}

/// Build a located parse error with source context
fn enhance_parse_error(err: &serde_json::Error, source: &str) -> ForgeError {
    let full = err.to_string();
    let message = match full.rfind(" at line ") {
        Some(cut) => full[..cut].to_string(),
        None => full,
    };

    let line = err.line().max(1);
    // serde_json reports column 0 when the input ends before any token
    let column = err.column().max(1);

    let mut detail = ParseErrorDetail {
        message,
        line,
        column,
        path: None,
        token: token_at(source, line, column),
        snippet: None,
        suggestion: None,
    };

    let snippet = extract_snippet(source, detail.line, detail.column);
    if !snippet.is_empty() {
        detail.snippet = Some(snippet);
    }

    ForgeError::ParseError(add_suggestions(detail))
}

fn token_at(source: &str, line: usize, column: usize) -> Option<String> {
    let target_line = source.lines().nth(line.checked_sub(1)?)?;
    let token: String = target_line
        .chars()
        .skip(column - 1)
        .take_while(|c| !c.is_whitespace() && !matches!(c, ',' | ':' | '{' | '}' | '[' | ']'))
        .collect();
    (!token.is_empty()).then_some(token)
}

/// Extract a snippet of source code around a position
fn extract_snippet(source: &str, line: usize, column: usize) -> String {
    let lines: Vec<&str> = source.lines().collect();

    if line == 0 || line > lines.len() {
        return String::new();
    }

    let target_line = lines[line - 1];
    let mut snippet = String::new();

    let line_num_width = format!("{line}").len().max(3);

    snippet.push_str(&format!("{line:>line_num_width$} │ {target_line}\n"));

    snippet.push_str(&format!("{:>line_num_width$} │ ", ""));
    for _ in 0..(column - 1) {
        snippet.push(' ');
    }

    let token_len = target_line
        .chars()
        .skip(column - 1)
        .take_while(|c| !c.is_whitespace() && *c != ',' && *c != '{' && *c != '}')
        .count()
        .max(1);

    for _ in 0..token_len {
        snippet.push('^');
    }

    snippet
}

/// Add helpful suggestions based on common JSON mistakes
fn add_suggestions(mut detail: ParseErrorDetail) -> ParseErrorDetail {
    if let Some(token) = &detail.token {
        if token.starts_with('\'') {
            detail.suggestion =
                Some("JSON strings use double quotes.\nExample: \"name\": \"User\"".to_string());
        } else if matches!(token.as_str(), "True" | "False" | "None" | "TRUE" | "FALSE") {
            detail.suggestion =
                Some("JSON literals are lowercase: true, false, null".to_string());
        } else if token.starts_with("//") || token.starts_with("/*") {
            detail.suggestion = Some("JSON does not allow comments.".to_string());
        }
    }

    if detail.suggestion.is_some() {
        return detail;
    }

    if detail.message.contains("trailing comma") {
        detail.suggestion =
            Some("Remove the comma after the last element of the object or list.".to_string());
    } else if detail.message.contains("key must be a string") {
        detail.suggestion = Some(
            "Object keys must be double-quoted.\nExample: { \"name\": \"User\" }".to_string(),
        );
    } else if detail.message.contains("expected `,` or `}`") {
        detail.suggestion =
            Some("Members of an object must be separated by commas.".to_string());
    } else if detail.message.contains("expected `,` or `]`") {
        detail.suggestion = Some("Elements of a list must be separated by commas.".to_string());
    } else if detail.message.contains("EOF while parsing") {
        detail.suggestion = Some(
            "The file ended unexpectedly. You may be missing a closing brace } or bracket ]"
                .to_string(),
        );
    }

    detail
}
