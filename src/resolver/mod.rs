//! Reference Resolution
//!
//! Expands every `$ref` in a schema. References that lie on a cycle cannot
//! be expanded into a finite document; those edges are replaced in place by
//! a placeholder chosen by the [`ReplacementPolicy`] and recorded in
//! [`ReplacedReferences`]. Everything else is expanded, so a sanitized
//! schema differs from full expansion only on cyclic edges.

pub mod graph;
pub mod pointer;

pub use graph::RefGraph;
pub use pointer::{parse_reference, RefTarget};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::ResolverConfig;
use crate::entity::OBJECT_ID_PATTERN;
use crate::error::{Result, SchemaError};
use crate::source::SchemaSource;

// =============================================================================
// Replacement Policy
// =============================================================================

/// What a reference that cannot be expanded turns into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReplacementPolicy {
    /// Open object with no constraints
    #[default]
    Object,
    /// 24 hex character identifier of another stored entity
    ObjectId,
    /// URI of a resource
    Uri,
}

impl ReplacementPolicy {
    /// Parse a policy name; anything unrecognised is `Object`
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "objectid" => Self::ObjectId,
            "uri" => Self::Uri,
            _ => Self::Object,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Object => "object",
            Self::ObjectId => "objectid",
            Self::Uri => "uri",
        }
    }

    /// Schema node standing in for `reference`
    pub fn placeholder(&self, reference: &str) -> Value {
        match self {
            Self::Object => json!({
                "type": "object",
                "properties": {},
                "additionalProperties": true,
                "description": format!("An object matching the schema {}", reference),
            }),
            Self::ObjectId => json!({
                "type": "string",
                "format": "objectid",
                "pattern": OBJECT_ID_PATTERN,
                "description": format!(
                    "The ObjectID of an object in the database matching the schema {}",
                    reference
                ),
            }),
            Self::Uri => json!({
                "type": "string",
                "format": "uri",
                "description": format!("The URL of a resource matching the schema {}", reference),
            }),
        }
    }
}

impl fmt::Display for ReplacementPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ReplacementPolicy {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ReplacementPolicy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Self::parse(&value))
    }
}

// =============================================================================
// Replaced References
// =============================================================================

/// Schema path (dot separated) -> original `$ref` target, for every
/// reference that was replaced instead of expanded
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReplacedReferences(BTreeMap<String, String>);

impl ReplacedReferences {
    pub fn get(&self, path: &str) -> Option<&str> {
        self.0.get(path).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(path, target)| (path.as_str(), target.as_str()))
    }

    fn record(&mut self, path: String, reference: String) {
        self.0.insert(path, reference);
    }
}

// =============================================================================
// Resolved Schema
// =============================================================================

/// A schema with its references expanded or replaced
#[derive(Debug, Clone)]
pub struct ResolvedSchema {
    /// File the schema was loaded from
    pub source: PathBuf,
    /// Expanded schema
    pub schema: Value,
    /// References replaced by placeholders
    pub replaced: ReplacedReferences,
    /// True when at least one reference could not be expanded
    pub sanitized: bool,
}

// =============================================================================
// Reference Resolver
// =============================================================================

/// Dereferences schema files read through a [`SchemaSource`]
#[derive(Clone)]
pub struct ReferenceResolver {
    source: Arc<dyn SchemaSource>,
    policy: ReplacementPolicy,
    replace_all: bool,
}

impl fmt::Debug for ReferenceResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceResolver")
            .field("policy", &self.policy)
            .field("replace_all", &self.replace_all)
            .finish_non_exhaustive()
    }
}

impl ReferenceResolver {
    pub fn new(source: Arc<dyn SchemaSource>, config: &ResolverConfig) -> Self {
        Self {
            source,
            policy: config.circular_ref_policy,
            replace_all: config.replace_all_refs,
        }
    }

    pub fn policy(&self) -> ReplacementPolicy {
        self.policy
    }

    /// Resolve one schema file
    pub fn resolve(&self, schema_file: &Path) -> Result<ResolvedSchema> {
        let graph = RefGraph::build(schema_file, self.source.as_ref())?;
        let root = graph.root().clone();
        let document = graph.value(&root).cloned().ok_or_else(|| SchemaError::InvalidSchema {
            schema: schema_file.to_path_buf(),
            reason: "empty document".to_string(),
        })?;

        let mut pass = Expansion {
            graph: &graph,
            policy: self.policy,
            schema_name: display_name(schema_file),
            replaced: ReplacedReferences::default(),
            path: Vec::new(),
        };

        let schema = if self.replace_all {
            pass.replace_all(&document)
        } else {
            let cyclic = graph.cyclic_edges().len();
            if cyclic > 0 {
                warn!(
                    schema = %schema_file.display(),
                    cyclic_edges = cyclic,
                    policy = %self.policy,
                    "schema contains circular references; cyclic references will not be validated"
                );
            }
            pass.expand(&document, &root)?
        };

        debug!(
            schema = %schema_file.display(),
            targets = graph.node_count(),
            replaced = pass.replaced.len(),
            "resolved references"
        );

        let sanitized = !pass.replaced.is_empty();
        Ok(ResolvedSchema {
            source: schema_file.to_path_buf(),
            schema,
            replaced: pass.replaced,
            sanitized,
        })
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// One walk over a document, tracking the output path
struct Expansion<'g> {
    graph: &'g RefGraph,
    policy: ReplacementPolicy,
    schema_name: String,
    replaced: ReplacedReferences,
    path: Vec<String>,
}

impl Expansion<'_> {
    /// Expand `value`, which lies in the literal subtree of `context`
    fn expand(&mut self, value: &Value, context: &RefTarget) -> Result<Value> {
        match value {
            Value::Object(obj) => {
                if let Some(reference) = obj.get("$ref").and_then(|v| v.as_str()) {
                    let target = parse_reference(reference, &context.document).map_err(|reason| {
                        SchemaError::reference(&context.document, reference, reason)
                    })?;

                    let graph = self.graph;
                    if graph.is_cyclic_edge(context, &target) {
                        return Ok(self.replace(reference));
                    }

                    let referenced = graph.value(&target).ok_or_else(|| {
                        SchemaError::reference(&context.document, reference, "target not loaded")
                    })?;
                    return self.expand(referenced, &target);
                }

                let mut out = Map::with_capacity(obj.len());
                for (key, child) in obj {
                    self.path.push(key.clone());
                    let expanded = self.expand(child, context);
                    self.path.pop();
                    out.insert(key.clone(), expanded?);
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    self.path.push(i.to_string());
                    let expanded = self.expand(item, context);
                    self.path.pop();
                    out.push(expanded?);
                }
                Ok(Value::Array(out))
            }
            other => Ok(other.clone()),
        }
    }

    /// Replace every `$ref` without expanding anything
    fn replace_all(&mut self, value: &Value) -> Value {
        match value {
            Value::Object(obj) => {
                if let Some(reference) = obj.get("$ref").and_then(|v| v.as_str()) {
                    return self.replace(reference);
                }
                let mut out = Map::with_capacity(obj.len());
                for (key, child) in obj {
                    self.path.push(key.clone());
                    out.insert(key.clone(), self.replace_all(child));
                    self.path.pop();
                }
                Value::Object(out)
            }
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    self.path.push(i.to_string());
                    out.push(self.replace_all(item));
                    self.path.pop();
                }
                Value::Array(out)
            }
            other => other.clone(),
        }
    }

    fn replace(&mut self, reference: &str) -> Value {
        let path = self.path.join(".");
        warn!(
            schema = %self.schema_name,
            path = %path,
            reference = %reference,
            replacement = %self.policy,
            "reference replaced"
        );
        self.replaced.record(path, reference.to_string());
        self.policy.placeholder(reference)
    }
}
