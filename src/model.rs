//! Model Builder
//!
//! Turns a [`ResolvedSchema`] into a [`Model`]: the validation schema
//! (compiled once), the storage schema derived from it, and the lifecycle
//! hooks that enforce validation on every write.

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::checksum::Checksum;
use crate::entity::{
    is_object_id_node, Document, Entity, ObjectId, CREATED_KEY, OBJECT_ID_PATTERN, TYPE_KEY,
    UPDATED_KEY,
};
use crate::error::{Result, SchemaError};
use crate::resolver::{ReplacedReferences, ResolvedSchema};
use crate::storage::StorageSchema;
use crate::validation::SchemaValidator;

/// User extension point run around entity writes. Every method defaults to
/// a no-op; returning an error aborts the write.
pub trait LifecycleHook: Send + Sync {
    fn pre_create(&self, _model: &Model, _entity: &mut Entity) -> Result<()> {
        Ok(())
    }

    /// `document` is the full document that will replace the stored one
    fn pre_update(&self, _model: &Model, _document: &mut Document) -> Result<()> {
        Ok(())
    }

    fn pre_delete(&self, _model: &Model, _id: &ObjectId) -> Result<()> {
        Ok(())
    }
}

/// Builds models, attaching the same hooks to each
#[derive(Clone, Default)]
pub struct ModelBuilder {
    hooks: Vec<Arc<dyn LifecycleHook>>,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hooks(mut self, hooks: Vec<Arc<dyn LifecycleHook>>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn build(&self, resolved: ResolvedSchema, name: &str, collection: &str) -> Result<Model> {
        let ResolvedSchema {
            source,
            schema,
            replaced,
            sanitized,
        } = resolved;

        if !schema.is_object() {
            return Err(SchemaError::InvalidSchema {
                schema: source,
                reason: "schema root must be a JSON object".to_string(),
            });
        }

        let checksum = Checksum::from_json(&schema);

        let mut validation_schema = schema;
        annotate_object_ids(&mut validation_schema);
        add_metadata_properties(&mut validation_schema);

        let validator = SchemaValidator::compile(name, &validation_schema, &source)?;
        let storage_schema = StorageSchema::from_validation_schema(&validation_schema, name, collection);

        Ok(Model {
            name: name.to_string(),
            collection: collection.to_string(),
            source,
            validation_schema,
            storage_schema,
            replaced,
            sanitized,
            checksum,
            validator,
            hooks: self.hooks.clone(),
        })
    }
}

/// Add the identifier pattern to every objectid node
fn annotate_object_ids(value: &mut Value) {
    match value {
        Value::Object(obj) => {
            if is_object_id_node(obj) && !obj.contains_key("pattern") {
                obj.insert("pattern".to_string(), json!(OBJECT_ID_PATTERN));
            }
            for child in obj.values_mut() {
                annotate_object_ids(child);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(annotate_object_ids),
        _ => {}
    }
}

fn add_metadata_properties(schema: &mut Value) {
    let Some(root) = schema.as_object_mut() else {
        return;
    };

    let properties = root
        .entry("properties")
        .or_insert_with(|| Value::Object(Map::new()));

    if let Value::Object(properties) = properties {
        properties.insert(TYPE_KEY.to_string(), json!({ "type": "string" }));
        for key in [CREATED_KEY, UPDATED_KEY] {
            properties.insert(key.to_string(), json!({ "type": "string", "format": "date-time" }));
        }
    }
}

/// A runtime model: one schema file turned into everything needed to
/// validate and store its instances
pub struct Model {
    name: String,
    collection: String,
    source: PathBuf,
    validation_schema: Value,
    storage_schema: StorageSchema,
    replaced: ReplacedReferences,
    sanitized: bool,
    checksum: Checksum,
    validator: SchemaValidator,
    hooks: Vec<Arc<dyn LifecycleHook>>,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.name)
            .field("collection", &self.collection)
            .field("source", &self.source)
            .field("sanitized", &self.sanitized)
            .field("replaced", &self.replaced)
            .field("hooks", &self.hooks.len())
            .finish_non_exhaustive()
    }
}

impl Model {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Schema file this model was built from
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn validation_schema(&self) -> &Value {
        &self.validation_schema
    }

    pub fn storage_schema(&self) -> &StorageSchema {
        &self.storage_schema
    }

    pub fn replaced_references(&self) -> &ReplacedReferences {
        &self.replaced
    }

    /// Whether any reference was replaced instead of expanded
    pub fn is_sanitized(&self) -> bool {
        self.sanitized
    }

    /// Checksum of the resolved schema
    pub fn checksum(&self) -> &Checksum {
        &self.checksum
    }

    /// Validate an instance against this model's schema
    pub fn validate<T: Serialize + ?Sized>(&self, instance: &T) -> Result<()> {
        self.validator.validate(instance)
    }

    /// Runs before a new entity is persisted
    pub fn pre_create(&self, entity: &mut Entity) -> Result<()> {
        entity.touch(Utc::now());
        self.validate(entity)?;
        for hook in &self.hooks {
            hook.pre_create(self, entity)?;
        }
        Ok(())
    }

    /// Runs before a stored document is replaced by `document`
    pub fn pre_update(&self, document: &mut Document) -> Result<()> {
        document.insert(UPDATED_KEY.to_string(), serde_json::to_value(Utc::now())?);
        self.validate(document)?;
        for hook in &self.hooks {
            hook.pre_update(self, document)?;
        }
        Ok(())
    }

    /// Runs before an entity is removed
    pub fn pre_delete(&self, id: &ObjectId) -> Result<()> {
        for hook in &self.hooks {
            hook.pre_delete(self, id)?;
        }
        Ok(())
    }
}
