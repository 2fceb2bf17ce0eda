//! Reference Graph
//!
//! Arena of every node reachable from a schema through `$ref` edges, with
//! strongly connected components computed once. An edge lies on a cycle
//! exactly when both ends share a component; self-references are one-node
//! components with a loop edge.

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

use super::pointer::{normalize, parse_reference, RefTarget};
use crate::error::{Result, SchemaError};
use crate::source::SchemaSource;

/// Reference targets and the `$ref` edges between them
#[derive(Debug)]
pub struct RefGraph {
    graph: DiGraph<RefTarget, ()>,
    index: HashMap<RefTarget, NodeIndex>,
    documents: HashMap<PathBuf, Value>,
    components: Vec<usize>,
    root: NodeIndex,
}

impl RefGraph {
    /// Load `schema_file` and every document it reaches, following `$ref`s
    pub fn build(schema_file: &Path, source: &dyn SchemaSource) -> Result<Self> {
        let schema_file = normalize(schema_file);
        let schema_file = schema_file.as_path();
        let content = source.read(schema_file)?;
        let document: Value = serde_json::from_str(&content).map_err(|e| SchemaError::InvalidSchema {
            schema: schema_file.to_path_buf(),
            reason: format!("failed to parse JSON: {}", e),
        })?;

        let mut graph = DiGraph::new();
        let mut index = HashMap::new();
        let mut documents = HashMap::new();
        documents.insert(schema_file.to_path_buf(), document);

        let root_target = RefTarget::root(schema_file);
        let root = graph.add_node(root_target.clone());
        index.insert(root_target, root);

        let mut queue = VecDeque::from([root]);
        while let Some(node) = queue.pop_front() {
            let from = graph[node].clone();
            let references = {
                let value = lookup(&documents, &from).ok_or_else(|| {
                    SchemaError::reference(schema_file, from.to_string(), "target disappeared")
                })?;
                let mut refs = Vec::new();
                collect_refs(value, &mut refs);
                refs
            };

            for reference in references {
                let target = parse_reference(&reference, &from.document)
                    .map_err(|reason| SchemaError::reference(&from.document, &reference, reason))?;

                if !documents.contains_key(&target.document) {
                    let loaded = load_document(&target.document, source)
                        .map_err(|reason| SchemaError::reference(&from.document, &reference, reason))?;
                    documents.insert(target.document.clone(), loaded);
                }

                if lookup(&documents, &target).is_none() {
                    return Err(SchemaError::reference(
                        &from.document,
                        &reference,
                        format!("no schema node at '{}'", target),
                    ));
                }

                let to = match index.get(&target) {
                    Some(&idx) => idx,
                    None => {
                        let idx = graph.add_node(target.clone());
                        index.insert(target, idx);
                        queue.push_back(idx);
                        idx
                    }
                };
                graph.update_edge(node, to, ());
            }
        }

        let mut components = vec![0; graph.node_count()];
        for (component, members) in tarjan_scc(&graph).into_iter().enumerate() {
            for member in members {
                components[member.index()] = component;
            }
        }

        Ok(Self {
            graph,
            index,
            documents,
            components,
            root,
        })
    }

    /// The schema document the graph was built from
    pub fn root(&self) -> &RefTarget {
        &self.graph[self.root]
    }

    /// The JSON node a target points at
    pub fn value(&self, target: &RefTarget) -> Option<&Value> {
        lookup(&self.documents, target)
    }

    /// Number of distinct reference targets, the root included
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of distinct `$ref` edges
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Whether the `$ref` edge `from -> to` lies on a cycle
    pub fn is_cyclic_edge(&self, from: &RefTarget, to: &RefTarget) -> bool {
        match (self.index.get(from), self.index.get(to)) {
            (Some(&a), Some(&b)) => {
                self.graph.contains_edge(a, b)
                    && self.components[a.index()] == self.components[b.index()]
            }
            _ => false,
        }
    }

    /// Every edge that lies on a cycle
    pub fn cyclic_edges(&self) -> Vec<(&RefTarget, &RefTarget)> {
        self.graph
            .edge_indices()
            .filter_map(|edge| self.graph.edge_endpoints(edge))
            .filter(|(a, b)| self.components[a.index()] == self.components[b.index()])
            .map(|(a, b)| (&self.graph[a], &self.graph[b]))
            .collect()
    }

    pub fn has_cycles(&self) -> bool {
        !self.cyclic_edges().is_empty()
    }
}

fn lookup<'a>(documents: &'a HashMap<PathBuf, Value>, target: &RefTarget) -> Option<&'a Value> {
    documents
        .get(&target.document)
        .and_then(|doc| doc.pointer(&target.pointer))
}

fn load_document(path: &Path, source: &dyn SchemaSource) -> std::result::Result<Value, String> {
    let content = source
        .read(path)
        .map_err(|e| format!("unable to read {}: {}", path.display(), e))?;
    serde_json::from_str(&content).map_err(|e| format!("failed to parse {}: {}", path.display(), e))
}

/// Collect every `$ref` in a subtree. Siblings of a `$ref` are ignored, as
/// in draft 4.
pub(crate) fn collect_refs(value: &Value, refs: &mut Vec<String>) {
    match value {
        Value::Object(obj) => {
            if let Some(reference) = obj.get("$ref").and_then(|v| v.as_str()) {
                refs.push(reference.to_string());
                return;
            }
            for child in obj.values() {
                collect_refs(child, refs);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_refs(item, refs);
            }
        }
        _ => {}
    }
}
