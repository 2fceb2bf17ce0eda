//! Entity CRUD
//!
//! [`ModelHandle`] binds a model to an [`EntityStore`] and runs the model's
//! lifecycle hooks around every write. Stores only see canonical documents.

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use crate::entity::{strip_reserved, Document, Entity, ObjectId, ID_KEY, TYPE_KEY};
use crate::error::{Result, SchemaError};
use crate::model::Model;
use crate::storage::StorageSchema;

/// Document storage grouped into collections
pub trait EntityStore: Send + Sync {
    /// Create `collection` if needed and record the storage schema of one
    /// model stored in it
    fn ensure_collection(&self, collection: &str, schema: &StorageSchema) -> Result<()>;

    fn insert(&self, collection: &str, document: Document) -> Result<()>;

    fn find_one(&self, collection: &str, id: &ObjectId) -> Result<Option<Document>>;

    /// Replace a stored document; false when there was nothing to replace
    fn replace(&self, collection: &str, id: &ObjectId, document: Document) -> Result<bool>;

    /// Remove a stored document; false when there was nothing to remove
    fn remove(&self, collection: &str, id: &ObjectId) -> Result<bool>;

    /// Documents whose top-level fields equal every field of `filter`
    fn find(&self, collection: &str, filter: &Document) -> Result<Vec<Document>>;
}

#[derive(Debug, Default)]
struct MemoryCollection {
    schemas: BTreeMap<String, StorageSchema>,
    documents: BTreeMap<String, Document>,
}

/// In-process store, mainly for tests and tooling
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage schema recorded for `model` in `collection`
    pub fn storage_schema(&self, collection: &str, model: &str) -> Option<StorageSchema> {
        self.collections
            .read()
            .get(collection)
            .and_then(|c| c.schemas.get(model).cloned())
    }

    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.collections.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of documents in `collection`
    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map(|c| c.documents.len())
            .unwrap_or(0)
    }
}

fn missing_collection(collection: &str) -> SchemaError {
    SchemaError::Store(format!("collection '{}' does not exist", collection))
}

fn document_id(document: &Document) -> Result<String> {
    document
        .get(ID_KEY)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| SchemaError::Store("document has no _id".to_string()))
}

impl EntityStore for MemoryStore {
    fn ensure_collection(&self, collection: &str, schema: &StorageSchema) -> Result<()> {
        let mut collections = self.collections.write();
        collections
            .entry(collection.to_string())
            .or_default()
            .schemas
            .insert(schema.model.clone(), schema.clone());
        Ok(())
    }

    fn insert(&self, collection: &str, document: Document) -> Result<()> {
        let id = document_id(&document)?;
        let mut collections = self.collections.write();
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| missing_collection(collection))?;
        if target.documents.contains_key(&id) {
            return Err(SchemaError::Store(format!(
                "duplicate _id {} in collection '{}'",
                id, collection
            )));
        }
        target.documents.insert(id, document);
        Ok(())
    }

    fn find_one(&self, collection: &str, id: &ObjectId) -> Result<Option<Document>> {
        let collections = self.collections.read();
        let target = collections
            .get(collection)
            .ok_or_else(|| missing_collection(collection))?;
        Ok(target.documents.get(id.as_str()).cloned())
    }

    fn replace(&self, collection: &str, id: &ObjectId, document: Document) -> Result<bool> {
        let mut collections = self.collections.write();
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| missing_collection(collection))?;
        match target.documents.get_mut(id.as_str()) {
            Some(stored) => {
                *stored = document;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn remove(&self, collection: &str, id: &ObjectId) -> Result<bool> {
        let mut collections = self.collections.write();
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| missing_collection(collection))?;
        Ok(target.documents.remove(id.as_str()).is_some())
    }

    fn find(&self, collection: &str, filter: &Document) -> Result<Vec<Document>> {
        let collections = self.collections.read();
        let target = collections
            .get(collection)
            .ok_or_else(|| missing_collection(collection))?;
        Ok(target
            .documents
            .values()
            .filter(|doc| filter.iter().all(|(key, value)| doc.get(key) == Some(value)))
            .cloned()
            .collect())
    }
}

/// CRUD for one model
#[derive(Clone, Copy)]
pub struct ModelHandle<'a> {
    model: &'a Model,
    store: &'a dyn EntityStore,
}

impl<'a> ModelHandle<'a> {
    pub fn new(model: &'a Model, store: &'a dyn EntityStore) -> Self {
        Self { model, store }
    }

    pub fn model(&self) -> &'a Model {
        self.model
    }

    fn not_found(&self, id: &ObjectId) -> SchemaError {
        SchemaError::EntityNotFound {
            model: self.model.name().to_string(),
            id: id.to_string(),
        }
    }

    /// Validate and persist a new entity
    pub fn create(&self, fields: Document) -> Result<Entity> {
        let mut entity = Entity::new(self.model.name(), fields);
        self.model.pre_create(&mut entity)?;
        self.store
            .insert(self.model.collection(), entity.to_document()?)?;
        entity.mark_persisted();
        debug!(model = %self.model.name(), id = %entity.id, "entity created");
        Ok(entity)
    }

    /// Fetch an entity of this model by id
    pub fn retrieve(&self, id: &ObjectId) -> Result<Entity> {
        let document = self
            .store
            .find_one(self.model.collection(), id)?
            .filter(|doc| doc.get(TYPE_KEY).and_then(Value::as_str) == Some(self.model.name()))
            .ok_or_else(|| self.not_found(id))?;
        Entity::from_document(document)
    }

    /// Merge `changes` into a stored entity. `_id`, `_type` and `_created`
    /// cannot be changed.
    pub fn update(&self, id: &ObjectId, mut changes: Document) -> Result<Entity> {
        let current = self.retrieve(id)?;
        strip_reserved(&mut changes);

        let mut document = current.to_document()?;
        document.extend(changes);
        self.model.pre_update(&mut document)?;

        let updated = Entity::from_document(document)?;
        if updated.id != current.id || updated.model != current.model || updated.created != current.created {
            return Err(SchemaError::Store(format!(
                "update of {} {} changed a reserved field",
                self.model.name(),
                id
            )));
        }

        if !self
            .store
            .replace(self.model.collection(), id, updated.to_document()?)?
        {
            return Err(self.not_found(id));
        }
        debug!(model = %self.model.name(), id = %id, "entity updated");
        Ok(updated)
    }

    /// Remove an entity of this model
    pub fn delete(&self, id: &ObjectId) -> Result<()> {
        self.retrieve(id)?;
        self.model.pre_delete(id)?;
        if !self.store.remove(self.model.collection(), id)? {
            return Err(self.not_found(id));
        }
        debug!(model = %self.model.name(), id = %id, "entity deleted");
        Ok(())
    }

    /// Entities of this model matching `filter` on top-level fields
    pub fn search(&self, filter: &Document) -> Result<Vec<Entity>> {
        let mut filter = filter.clone();
        filter.insert(TYPE_KEY.to_string(), Value::String(self.model.name().to_string()));
        self.store
            .find(self.model.collection(), &filter)?
            .into_iter()
            .map(Entity::from_document)
            .collect()
    }
}
