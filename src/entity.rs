//! Entities and ObjectIds
//!
//! An [`Entity`] is a stored instance in its canonical key-value form:
//! `_id`, `_type`, `_created` and `_updated` plus the user fields. This is
//! the representation validation, storage and serializers operate on.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, SchemaError};

/// Pattern every ObjectId string matches
pub const OBJECT_ID_PATTERN: &str = "^[0-9a-fA-F]{24}$";

/// Keys every stored entity carries besides its fields
pub const ID_KEY: &str = "_id";
pub const TYPE_KEY: &str = "_type";
pub const CREATED_KEY: &str = "_created";
pub const UPDATED_KEY: &str = "_updated";

/// A canonical entity document
pub type Document = Map<String, Value>;

static COUNTER: AtomicU32 = AtomicU32::new(0);

/// 24 hex character identifier of a stored entity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId(String);

impl ObjectId {
    /// Generate a new id: 4 bytes of seconds, 5 random bytes, 3 counter bytes
    pub fn new() -> Self {
        let mut bytes = [0u8; 12];
        let secs = Utc::now().timestamp() as u32;
        bytes[..4].copy_from_slice(&secs.to_be_bytes());
        rand::thread_rng().fill(&mut bytes[4..9]);
        let count = COUNTER.fetch_add(1, Ordering::Relaxed);
        bytes[9..].copy_from_slice(&count.to_be_bytes()[1..]);
        Self(hex::encode(bytes))
    }

    pub fn parse(value: &str) -> Result<Self> {
        if Self::is_valid(value) {
            Ok(Self(value.to_ascii_lowercase()))
        } else {
            Err(SchemaError::InvalidObjectId(value.to_string()))
        }
    }

    pub fn is_valid(value: &str) -> bool {
        value.len() == 24 && value.bytes().all(|b| b.is_ascii_hexdigit())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ObjectId {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ObjectId {
    type Error = SchemaError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ObjectId> for String {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}

/// Whether a schema node is `{"type": "string", "format": "objectid"}`
pub(crate) fn is_object_id_node(node: &Map<String, Value>) -> bool {
    node.get("type").and_then(Value::as_str) == Some("string")
        && node.get("format").and_then(Value::as_str) == Some("objectid")
}

/// A stored instance of a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    /// Model name, used to pick the model when reading back
    #[serde(rename = "_type")]
    pub model: String,
    #[serde(rename = "_created")]
    pub created: DateTime<Utc>,
    #[serde(rename = "_updated")]
    pub updated: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: Document,
    #[serde(skip)]
    is_new: bool,
}

impl Entity {
    /// A new, not yet persisted entity
    pub fn new(model: impl Into<String>, mut fields: Document) -> Self {
        strip_reserved(&mut fields);
        let now = Utc::now();
        Self {
            id: ObjectId::new(),
            model: model.into(),
            created: now,
            updated: now,
            fields,
            is_new: true,
        }
    }

    /// Rebuild an entity from its stored document
    pub fn from_document(document: Document) -> Result<Self> {
        let entity: Entity = serde_json::from_value(Value::Object(document))?;
        Ok(entity)
    }

    /// Canonical key-value representation
    pub fn to_document(&self) -> Result<Document> {
        match serde_json::to_value(self)? {
            Value::Object(document) => Ok(document),
            other => Err(SchemaError::Store(format!(
                "entity serialized to a non-object value: {}",
                other
            ))),
        }
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.updated = now;
    }

    pub(crate) fn mark_persisted(&mut self) {
        self.is_new = false;
    }
}

/// Drop the keys that only the entity itself may set
pub(crate) fn strip_reserved(fields: &mut Document) {
    for key in [ID_KEY, TYPE_KEY, CREATED_KEY, UPDATED_KEY] {
        fields.remove(key);
    }
}
