//! Request DTOs for the operational API
//!
//! Defines the structure of incoming request bodies and query strings.

use serde::Deserialize;

/// Request body for POST /circuits/reset
///
/// Omitting `names` resets every registered circuit.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResetCircuitsRequest {
    #[serde(default)]
    pub names: Option<Vec<String>>,
}

/// Query string for DELETE /cache
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatternQuery {
    /// Glob-style key pattern, e.g. `study_offer:*`
    #[serde(default)]
    pub pattern: Option<String>,
}

impl PatternQuery {
    /// Returns the pattern, or an error message if it is missing or blank.
    ///
    /// A leading `*` is rejected: it matches every key, and a full flush is
    /// not offered over HTTP.
    pub fn validated(&self) -> Result<&str, String> {
        match self.pattern.as_deref().map(str::trim) {
            Some(pattern) if pattern.starts_with('*') => Err(
                "Query parameter 'pattern' must start with a literal prefix".to_string(),
            ),
            Some(pattern) if !pattern.is_empty() => Ok(pattern),
            _ => Err("Query parameter 'pattern' is required".to_string()),
        }
    }
}
