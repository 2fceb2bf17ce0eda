//! Model Registry
//!
//! Immutable snapshot of every model built by one load, keyed by model
//! name. Shared as `Arc<ModelRegistry>`; lookups are plain map reads.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::warn;

use crate::checksum::Checksum;
use crate::crud::{EntityStore, ModelHandle};
use crate::entity::{Document, TYPE_KEY};
use crate::error::{Result, SchemaError};
use crate::model::Model;

/// The loaded models
#[derive(Debug)]
pub struct ModelRegistry {
    root: PathBuf,
    default_collection: String,
    models: BTreeMap<String, Arc<Model>>,
    checksum: Checksum,
}

impl ModelRegistry {
    /// Assemble a registry from models in discovery order. A later model
    /// with an already used name replaces the earlier one unless
    /// `reject_duplicates` is set.
    pub fn from_models(
        root: impl Into<PathBuf>,
        default_collection: impl Into<String>,
        models: Vec<Model>,
        reject_duplicates: bool,
    ) -> Result<Self> {
        let mut by_name: BTreeMap<String, Arc<Model>> = BTreeMap::new();

        for model in models {
            if let Some(previous) = by_name.get(model.name()) {
                if reject_duplicates {
                    return Err(SchemaError::DuplicateModel {
                        name: model.name().to_string(),
                        first: previous.source().to_path_buf(),
                        second: model.source().to_path_buf(),
                    });
                }
                warn!(
                    model = %model.name(),
                    replaced = %previous.source().display(),
                    by = %model.source().display(),
                    "duplicate model name, keeping the later schema"
                );
            }
            by_name.insert(model.name().to_string(), Arc::new(model));
        }

        let checksum = Checksum::combine(by_name.values().map(|m| m.checksum()));

        Ok(Self {
            root: root.into(),
            default_collection: default_collection.into(),
            models: by_name,
            checksum,
        })
    }

    /// Schema root the registry was loaded from
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn default_collection(&self) -> &str {
        &self.default_collection
    }

    /// Digest over every model's schema checksum
    pub fn checksum(&self) -> &Checksum {
        &self.checksum
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Model>> {
        self.models.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Model names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn models(&self) -> impl Iterator<Item = &Arc<Model>> {
        self.models.values()
    }

    /// Collection name -> models stored in it
    pub fn collections(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut collections: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for model in self.models.values() {
            collections
                .entry(model.collection())
                .or_default()
                .push(model.name());
        }
        collections
    }

    /// The model a stored document belongs to, by its `_type`
    pub fn model_for_document(&self, document: &Document) -> Option<&Arc<Model>> {
        document
            .get(TYPE_KEY)
            .and_then(|t| t.as_str())
            .and_then(|name| self.models.get(name))
    }

    /// CRUD operations for one model against `store`
    pub fn bind<'a>(&'a self, name: &str, store: &'a dyn EntityStore) -> Option<ModelHandle<'a>> {
        self.models
            .get(name)
            .map(|model| ModelHandle::new(model, store))
    }

    /// Hand every model's storage schema to `store`
    pub fn install(&self, store: &dyn EntityStore) -> Result<()> {
        for model in self.models.values() {
            store.ensure_collection(model.collection(), model.storage_schema())?;
        }
        Ok(())
    }
}
