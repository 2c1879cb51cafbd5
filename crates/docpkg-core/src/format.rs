//! Source file formatting
//!
//! Rewrites JSON array source files with `id` first in every document,
//! two-space indentation and a trailing newline.

use crate::error::CoreError;
use docpkg_model::{Document, IdentityError};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Outcome for one formatted file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatOutcome {
    pub path: PathBuf,
    /// False when the file was already formatted and left untouched
    pub changed: bool,
}

/// Source text that cannot be formatted
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// Text is not a JSON array
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Entry is neither an object nor `null`
    #[error("entry {index}: {source}")]
    InvalidEntry {
        index: usize,
        #[source]
        source: IdentityError,
    },
}

/// Format source text, returning the canonical rendering
///
/// `null` entries are kept. Any other non-object entry is rejected.
///
/// # Errors
/// Returns [`FormatError`] if `text` is not a JSON array of objects and nulls
pub fn format_source(text: &str) -> Result<String, FormatError> {
    let values: Vec<Value> = serde_json::from_str(text)?;
    let normalized = values
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            if value.is_null() {
                return Ok(Value::Null);
            }
            Document::from_value(value)
                .map(|document| document.normalized().into_value())
                .map_err(|source| FormatError::InvalidEntry { index, source })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let mut out = serde_json::to_string_pretty(&normalized)?;
    out.push('\n');
    Ok(out)
}

/// Format every file in place
///
/// Non-object entries other than `null` are rejected rather than dropped.
///
/// # Errors
/// Returns IO or JSON errors naming the file
pub fn format_sources<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<FormatOutcome>, CoreError> {
    let mut outcomes = Vec::with_capacity(paths.len());
    for path in paths {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| CoreError::io_error(path, e))?;
        let formatted = format_source(&text).map_err(|e| match e {
            FormatError::Json(e) => CoreError::json_error(path, e),
            FormatError::InvalidEntry { index, source } => CoreError::InvalidSourceDocument {
                path: path.to_path_buf(),
                index,
                source,
            },
        })?;

        let changed = formatted != text;
        if changed {
            std::fs::write(path, &formatted).map_err(|e| CoreError::io_error(path, e))?;
            tracing::info!(path = %path.display(), "formatted");
        } else {
            tracing::debug!(path = %path.display(), "already formatted");
        }
        outcomes.push(FormatOutcome {
            path: path.to_path_buf(),
            changed,
        });
    }
    Ok(outcomes)
}
