//! Error types for schema loading, resolution and entity writes

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for schema operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Schema loader and model errors
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Schema directory invalid: {path}: {reason}")]
    SchemaDirectoryInvalid { path: PathBuf, reason: String },

    #[error("Unable to resolve reference '{reference}' in {schema}: {reason}")]
    ReferenceResolution {
        schema: PathBuf,
        reference: String,
        reason: String,
    },

    #[error("Invalid schema {schema}: {reason}")]
    InvalidSchema { schema: PathBuf, reason: String },

    #[error("Duplicate model '{name}' defined by {first} and {second}")]
    DuplicateModel {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    #[error("Entity not found: {model} {id}")]
    EntityNotFound { model: String, id: String },

    #[error("Invalid ObjectId: {0}")]
    InvalidObjectId(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Loader task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

impl SchemaError {
    pub(crate) fn reference(
        schema: impl Into<PathBuf>,
        reference: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::ReferenceResolution {
            schema: schema.into(),
            reference: reference.into(),
            reason: reason.into(),
        }
    }

    /// The violation list when this is a validation failure
    pub fn violations(&self) -> Option<&[Violation]> {
        match self {
            Self::Validation(failure) => Some(&failure.violations),
            _ => None,
        }
    }
}

/// A single schema violation found while validating an instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// JSON pointer into the instance ("" for the root)
    pub instance_path: String,
    /// JSON Schema keyword that failed (e.g. "required", "type")
    pub keyword: String,
    /// Human-readable message
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instance_path.is_empty() {
            write!(f, "{} ({})", self.message, self.keyword)
        } else {
            write!(f, "{}: {} ({})", self.instance_path, self.message, self.keyword)
        }
    }
}

/// All violations collected for one rejected write
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub struct ValidationFailure {
    pub model: String,
    pub violations: Vec<Violation>,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Validation failed for {} ({} violation{})",
            self.model,
            self.violations.len(),
            if self.violations.len() == 1 { "" } else { "s" }
        )?;
        for violation in &self.violations {
            write!(f, "\n  {}", violation)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_failure_display_lists_violations() {
        let failure = ValidationFailure {
            model: "Quotation".to_string(),
            violations: vec![Violation {
                instance_path: String::new(),
                keyword: "required".to_string(),
                message: "\"name\" is a required property".to_string(),
            }],
        };

        let rendered = failure.to_string();
        assert!(rendered.starts_with("Validation failed for Quotation (1 violation)"));
        assert!(rendered.contains("\"name\" is a required property (required)"));
    }

    #[test]
    fn test_violations_accessor() {
        let err = SchemaError::from(ValidationFailure {
            model: "Person".to_string(),
            violations: Vec::new(),
        });
        assert_eq!(err.violations().map(<[Violation]>::len), Some(0));
        assert!(SchemaError::Task("boom".to_string()).violations().is_none());
    }
}
