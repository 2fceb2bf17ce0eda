//! Write-time Validation
//!
//! Instances are validated in their canonical serialized form: whatever the
//! in-memory representation, a value is checked as the JSON it serializes
//! to, so timestamps are checked as RFC 3339 strings. Private keys
//! (`_`-prefixed) and linked-data metadata keys are not part of the
//! user-authored schema and are removed before evaluation.
//!
//! An instance matching more than one `oneOf` branch is accepted.

use jsonschema::error::ValidationErrorKind;
use jsonschema::{Draft, JSONSchema};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::path::Path;

use crate::entity::ObjectId;
use crate::error::{Result, SchemaError, ValidationFailure, Violation};

/// Top-level keys reserved for linked-data rendering
pub const METADATA_KEYS: &[&str] = &["@context", "@id", "@type"];

/// A compiled validation schema for one model
pub struct SchemaValidator {
    model: String,
    compiled: JSONSchema,
}

impl fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaValidator")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl SchemaValidator {
    /// Compile a resolved schema (draft 4, with the `objectid` format)
    pub fn compile(model: impl Into<String>, schema: &Value, source: &Path) -> Result<Self> {
        let compiled = JSONSchema::options()
            .with_draft(Draft::Draft4)
            .with_format("objectid", is_object_id)
            .compile(schema)
            .map_err(|e| SchemaError::InvalidSchema {
                schema: source.to_path_buf(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            model: model.into(),
            compiled,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Validate any serializable instance
    pub fn validate<T: Serialize + ?Sized>(&self, instance: &T) -> Result<()> {
        let normalized = normalize(instance)?;
        let violations = self.violations(&normalized);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::Validation(ValidationFailure {
                model: self.model.clone(),
                violations,
            }))
        }
    }

    /// Violations for an already normalized instance, tolerated ones excluded
    pub fn violations(&self, instance: &Value) -> Vec<Violation> {
        match self.compiled.validate(instance) {
            Ok(()) => Vec::new(),
            Err(errors) => errors
                .filter(|error| !matches!(error.kind, ValidationErrorKind::OneOfMultipleValid { .. }))
                .map(|error| Violation {
                    instance_path: error.instance_path.to_string(),
                    keyword: keyword(&error.kind).to_string(),
                    message: error.to_string(),
                })
                .collect(),
        }
    }
}

fn is_object_id(value: &str) -> bool {
    ObjectId::is_valid(value)
}

fn keyword(kind: &ValidationErrorKind) -> &'static str {
    match kind {
        ValidationErrorKind::AdditionalProperties { .. } => "additionalProperties",
        ValidationErrorKind::AnyOf { .. } => "anyOf",
        ValidationErrorKind::Constant { .. } => "const",
        ValidationErrorKind::Enum { .. } => "enum",
        ValidationErrorKind::Format { .. } => "format",
        ValidationErrorKind::MaxItems { .. } => "maxItems",
        ValidationErrorKind::MaxLength { .. } => "maxLength",
        ValidationErrorKind::Maximum { .. } => "maximum",
        ValidationErrorKind::MinItems { .. } => "minItems",
        ValidationErrorKind::MinLength { .. } => "minLength",
        ValidationErrorKind::Minimum { .. } => "minimum",
        ValidationErrorKind::Not { .. } => "not",
        ValidationErrorKind::OneOfMultipleValid { .. } => "oneOf",
        ValidationErrorKind::OneOfNotValid { .. } => "oneOf",
        ValidationErrorKind::Pattern { .. } => "pattern",
        ValidationErrorKind::Required { .. } => "required",
        ValidationErrorKind::Type { .. } => "type",
        ValidationErrorKind::UniqueItems { .. } => "uniqueItems",
        _ => "schema",
    }
}

/// Canonical form of an instance, with private and metadata keys removed
pub fn normalize<T: Serialize + ?Sized>(instance: &T) -> Result<Value> {
    let mut value = serde_json::to_value(instance)?;
    strip_private_keys(&mut value);
    strip_metadata(&mut value);
    Ok(value)
}

/// Remove `_`-prefixed keys at every depth
pub fn strip_private_keys(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|key, _| !key.starts_with('_'));
            for child in map.values_mut() {
                strip_private_keys(child);
            }
        }
        Value::Array(items) => {
            for item in items {
                strip_private_keys(item);
            }
        }
        _ => {}
    }
}

/// Remove reserved linked-data keys from the top level
pub fn strip_metadata(value: &mut Value) {
    if let Value::Object(map) = value {
        for key in METADATA_KEYS {
            map.remove(*key);
        }
    }
}
