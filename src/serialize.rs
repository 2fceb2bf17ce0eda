//! JSON and JSON-LD rendering of entities

use serde_json::{Map, Value};

use crate::config::SerializerConfig;
use crate::entity::Entity;
use crate::error::Result;
use crate::validation::strip_private_keys;

/// Renders an entity's canonical document for clients
pub trait Serializer: Send + Sync {
    fn to_json(&self, entity: &Entity) -> Result<Value>;

    fn to_json_ld(&self, entity: &Entity) -> Result<Value>;
}

/// Plain JSON with `@id`/`@type`, and JSON-LD with an `@context`
#[derive(Debug, Clone)]
pub struct LinkedDataSerializer {
    base_url: String,
    context: String,
}

impl LinkedDataSerializer {
    pub fn new(base_url: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            context: context.into(),
        }
    }

    pub fn from_config(config: &SerializerConfig) -> Self {
        Self::new(config.base_url.clone(), config.context.clone())
    }

    /// `@id` of an entity
    pub fn id_url(&self, entity: &Entity) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), entity.id)
    }
}

impl Default for LinkedDataSerializer {
    fn default() -> Self {
        Self::from_config(&SerializerConfig::default())
    }
}

impl Serializer for LinkedDataSerializer {
    fn to_json(&self, entity: &Entity) -> Result<Value> {
        let mut body = Value::Object(entity.to_document()?);
        strip_private_keys(&mut body);

        let mut out = Map::new();
        out.insert("@id".to_string(), Value::String(self.id_url(entity)));
        out.insert("@type".to_string(), Value::String(entity.model.clone()));
        if let Value::Object(fields) = body {
            out.extend(fields);
        }
        Ok(Value::Object(out))
    }

    fn to_json_ld(&self, entity: &Entity) -> Result<Value> {
        let mut out = self.to_json(entity)?;
        if let Value::Object(map) = &mut out {
            map.insert("@context".to_string(), Value::String(self.context.clone()));
        }
        Ok(out)
    }
}
