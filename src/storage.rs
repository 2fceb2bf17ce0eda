//! Storage Schema
//!
//! Typed field tree handed to whatever materialises a collection in the
//! storage engine. Identifier fields point at the shared `objectid`
//! definition instead of being plain strings, so the engine can emit a
//! native reference type for them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::entity::{is_object_id_node, CREATED_KEY, TYPE_KEY, UPDATED_KEY};

/// Name of the shared identifier definition
pub const OBJECT_ID_DEFINITION: &str = "objectid";

/// One field as the storage engine sees it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageField {
    String,
    Date,
    Number,
    Integer,
    Boolean,
    /// Native reference to another stored entity
    ObjectId,
    /// Anything; not constrained by the engine
    Mixed,
    /// Pointer into the schema's definition table
    Ref { definition: String },
    Array { items: Box<StorageField> },
    Object {
        fields: BTreeMap<String, StorageField>,
        /// Type of keys not listed in `fields`, from `additionalProperties`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        additional: Option<Box<StorageField>>,
    },
    /// `oneOf`/`anyOf`: a value of any of the variants
    OneOf { variants: Vec<StorageField> },
}

impl StorageField {
    fn object_id_ref() -> Self {
        Self::Ref {
            definition: OBJECT_ID_DEFINITION.to_string(),
        }
    }

    /// Map one validation-schema node to a storage field
    pub fn from_schema(node: &Value) -> Self {
        let obj = match node.as_object() {
            Some(obj) => obj,
            None => return Self::Mixed,
        };

        if is_object_id_node(obj) {
            return Self::object_id_ref();
        }

        if obj.contains_key("allOf") {
            return match object_fields(obj) {
                Some(fields) => Self::Object {
                    fields,
                    additional: additional_field(obj),
                },
                None => Self::Mixed,
            };
        }

        if let Some(branches) = obj
            .get("oneOf")
            .or_else(|| obj.get("anyOf"))
            .and_then(Value::as_array)
        {
            return Self::one_of(branches.iter().map(Self::from_schema).collect());
        }

        match primary_type(obj) {
            Some("string") => match obj.get("format").and_then(Value::as_str) {
                Some("date-time") | Some("date") => Self::Date,
                _ => Self::String,
            },
            Some("number") => Self::Number,
            Some("integer") => Self::Integer,
            Some("boolean") => Self::Boolean,
            Some("array") => {
                let items = match obj.get("items") {
                    Some(items @ Value::Object(_)) => Self::from_schema(items),
                    _ => Self::Mixed,
                };
                Self::Array {
                    items: Box::new(items),
                }
            }
            Some("object") => {
                let fields = object_fields(obj).unwrap_or_default();
                let additional = additional_field(obj);
                if fields.is_empty() && additional.is_none() {
                    Self::Mixed
                } else {
                    Self::Object { fields, additional }
                }
            }
            _ => Self::Mixed,
        }
    }

    /// Alternatives collapse when they all agree, so a choice between
    /// identifiers is still stored as one reference
    fn one_of(variants: Vec<StorageField>) -> Self {
        match variants.split_first() {
            None => Self::Mixed,
            Some((first, rest)) if rest.iter().all(|v| v == first) => first.clone(),
            Some(_) => Self::OneOf { variants },
        }
    }
}

/// `additionalProperties` when it is a schema rather than a flag
fn additional_field(obj: &Map<String, Value>) -> Option<Box<StorageField>> {
    match obj.get("additionalProperties") {
        Some(schema @ Value::Object(_)) => Some(Box::new(StorageField::from_schema(schema))),
        _ => None,
    }
}

/// The `type` keyword, ignoring `null` in type unions and inferring
/// `object`/`array` from `properties`/`items`
fn primary_type(obj: &Map<String, Value>) -> Option<&str> {
    match obj.get("type") {
        Some(Value::String(ty)) => Some(ty.as_str()),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .find(|ty| *ty != "null"),
        _ if obj.contains_key("properties") => Some("object"),
        _ if obj.contains_key("items") => Some("array"),
        _ => None,
    }
}

/// Fields of an object schema, merged across `allOf`. `None` when an `allOf`
/// member is not an object.
fn object_fields(obj: &Map<String, Value>) -> Option<BTreeMap<String, StorageField>> {
    let mut fields = BTreeMap::new();

    if let Some(members) = obj.get("allOf").and_then(Value::as_array) {
        for member in members {
            match member.as_object().and_then(object_fields) {
                Some(member_fields) => fields.extend(member_fields),
                None => return None,
            }
        }
    }

    if let Some(props) = obj.get("properties").and_then(Value::as_object) {
        for (name, prop) in props {
            fields.insert(name.clone(), StorageField::from_schema(prop));
        }
    }

    Some(fields)
}

/// Storage-facing schema of one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageSchema {
    pub model: String,
    pub collection: String,
    pub fields: BTreeMap<String, StorageField>,
    /// Shared type definitions referenced by `StorageField::Ref`
    pub definitions: BTreeMap<String, StorageField>,
}

impl StorageSchema {
    /// Derive the storage schema from a validation schema
    pub fn from_validation_schema(
        schema: &Value,
        model: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        let mut fields = schema
            .as_object()
            .and_then(object_fields)
            .unwrap_or_default();

        fields.insert(TYPE_KEY.to_string(), StorageField::String);
        fields.insert(CREATED_KEY.to_string(), StorageField::Date);
        fields.insert(UPDATED_KEY.to_string(), StorageField::Date);

        let mut definitions = BTreeMap::new();
        definitions.insert(OBJECT_ID_DEFINITION.to_string(), StorageField::ObjectId);

        Self {
            model: model.into(),
            collection: collection.into(),
            fields,
            definitions,
        }
    }

    pub fn field(&self, name: &str) -> Option<&StorageField> {
        self.fields.get(name)
    }

    /// Follow a `Ref` to its definition
    pub fn resolve<'a>(&'a self, field: &'a StorageField) -> &'a StorageField {
        match field {
            StorageField::Ref { definition } => self.definitions.get(definition).unwrap_or(field),
            other => other,
        }
    }

    /// Paths of every field stored as a native reference
    pub fn reference_fields(&self) -> Vec<String> {
        fn walk(prefix: &str, field: &StorageField, out: &mut Vec<String>) {
            match field {
                StorageField::Ref { .. } => out.push(prefix.to_string()),
                StorageField::Array { items } => walk(&format!("{}[]", prefix), items, out),
                StorageField::Object { fields, additional } => {
                    for (name, child) in fields {
                        walk(&format!("{}.{}", prefix, name), child, out);
                    }
                    if let Some(additional) = additional {
                        walk(&format!("{}.*", prefix), additional, out);
                    }
                }
                StorageField::OneOf { variants } => {
                    for variant in variants {
                        walk(prefix, variant, out);
                    }
                }
                _ => {}
            }
        }

        let mut out = Vec::new();
        for (name, field) in &self.fields {
            walk(name, field, &mut out);
        }
        out.dedup();
        out
    }
}
