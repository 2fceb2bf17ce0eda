//! Reference Resolution Tests
//!
//! Acyclic schemas must expand completely; cyclic edges must be replaced by
//! the configured placeholder and recorded at the path they occurred.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use entity_schemas::config::ResolverConfig;
use entity_schemas::resolver::RefGraph;
use entity_schemas::{FsSource, ReferenceResolver, ReplacementPolicy, SchemaConfig, SchemaLoader};
use serde_json::Value;

fn fixtures_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/schemas")
}

fn resolver(policy: ReplacementPolicy, replace_all: bool) -> ReferenceResolver {
    ReferenceResolver::new(
        Arc::new(FsSource),
        &ResolverConfig {
            circular_ref_policy: policy,
            replace_all_refs: replace_all,
        },
    )
}

fn count_refs(value: &Value) -> usize {
    match value {
        Value::Object(map) => {
            usize::from(map.contains_key("$ref")) + map.values().map(count_refs).sum::<usize>()
        }
        Value::Array(items) => items.iter().map(count_refs).sum(),
        _ => 0,
    }
}

// =============================================================================
// Acyclic Schemas
// =============================================================================

#[test]
fn test_acyclic_schema_has_no_refs_left() {
    let resolved = resolver(ReplacementPolicy::Object, false)
        .resolve(&fixtures_path().join("Quotation.json"))
        .unwrap();

    assert!(!resolved.sanitized);
    assert!(resolved.replaced.is_empty());
    assert_eq!(count_refs(&resolved.schema), 0);

    let branches = resolved.schema["properties"]["spokenByCharacter"]["oneOf"]
        .as_array()
        .unwrap();
    assert_eq!(branches[0]["title"], "Person");
    assert_eq!(branches[1]["title"], "Organization");
}

#[test]
fn test_sibling_reference_in_subdirectory() {
    let resolved = resolver(ReplacementPolicy::Object, false)
        .resolve(&fixtures_path().join("Person/Author.json"))
        .unwrap();

    assert_eq!(count_refs(&resolved.schema), 0);
    assert_eq!(
        resolved.schema["allOf"][0]["properties"]["birthDate"]["format"],
        "date-time"
    );
}

#[test]
fn test_shared_target_is_not_a_cycle() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("Place.json"), r#"{"type":"object","properties":{"name":{"type":"string"}}}"#).unwrap();
    let path = dir.path().join("Trip.json");
    fs::write(
        &path,
        r#"{"properties":{"from":{"$ref":"Place.json"},"to":{"$ref":"Place.json"}}}"#,
    )
    .unwrap();

    let resolved = resolver(ReplacementPolicy::Object, false).resolve(&path).unwrap();
    assert!(!resolved.sanitized);
    assert_eq!(resolved.schema["properties"]["to"]["properties"]["name"]["type"], "string");
}

// =============================================================================
// Cyclic Schemas
// =============================================================================

#[test]
fn test_self_reference_default_policy() {
    let resolved = resolver(ReplacementPolicy::Object, false)
        .resolve(&fixtures_path().join("Character.json"))
        .unwrap();

    assert!(resolved.sanitized);
    assert_eq!(resolved.replaced.len(), 1);
    assert_eq!(resolved.replaced.get("properties.spokenByCharacter"), Some("#"));

    let placeholder = &resolved.schema["properties"]["spokenByCharacter"];
    assert_eq!(placeholder["type"], "object");
    assert_eq!(placeholder["additionalProperties"], true);
    assert_eq!(placeholder["description"], "An object matching the schema #");
    assert_eq!(count_refs(&resolved.schema), 0);
}

#[test]
fn test_self_reference_objectid_policy() {
    let resolved = resolver(ReplacementPolicy::ObjectId, false)
        .resolve(&fixtures_path().join("Character.json"))
        .unwrap();

    let placeholder = &resolved.schema["properties"]["spokenByCharacter"];
    assert_eq!(placeholder["type"], "string");
    assert_eq!(placeholder["format"], "objectid");
    assert_eq!(placeholder["pattern"], "^[0-9a-fA-F]{24}$");
    assert_eq!(resolved.replaced.get("properties.spokenByCharacter"), Some("#"));
}

#[test]
fn test_self_reference_uri_policy() {
    let resolved = resolver(ReplacementPolicy::Uri, false)
        .resolve(&fixtures_path().join("Character.json"))
        .unwrap();

    assert_eq!(resolved.schema["properties"]["spokenByCharacter"]["format"], "uri");
}

#[test]
fn test_mutual_cycle_across_files() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("Parent.json"),
        r#"{"type":"object","properties":{"name":{"type":"string"},"children":{"type":"array","items":{"$ref":"Child.json"}}}}"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("Child.json"),
        r#"{"type":"object","properties":{"name":{"type":"string"},"parent":{"$ref":"Parent.json"}}}"#,
    )
    .unwrap();

    let path = dir.path().join("Parent.json");
    let graph = RefGraph::build(&path, &FsSource).unwrap();
    assert!(graph.has_cycles());
    assert_eq!(graph.cyclic_edges().len(), 2);

    let resolved = resolver(ReplacementPolicy::Object, false).resolve(&path).unwrap();
    assert!(resolved.sanitized);
    assert_eq!(count_refs(&resolved.schema), 0);
    assert_eq!(resolved.replaced.get("properties.children.items"), Some("Child.json"));
    assert_eq!(
        resolved.schema["properties"]["children"]["items"]["type"],
        "object"
    );
    assert_eq!(
        resolved.schema["properties"]["children"]["items"]["additionalProperties"],
        true
    );
}

#[test]
fn test_edge_into_cycle_is_expanded() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("Node.json"),
        r##"{"type":"object","properties":{"label":{"type":"string"},"next":{"$ref":"#"}}}"##,
    )
    .unwrap();
    let path = dir.path().join("List.json");
    fs::write(&path, r#"{"type":"object","properties":{"head":{"$ref":"Node.json"}}}"#).unwrap();

    let resolved = resolver(ReplacementPolicy::Object, false).resolve(&path).unwrap();
    assert_eq!(resolved.schema["properties"]["head"]["properties"]["label"]["type"], "string");
    assert_eq!(resolved.replaced.get("properties.head.properties.next"), Some("#"));
    assert_eq!(resolved.replaced.len(), 1);
}

// =============================================================================
// Forced Replacement
// =============================================================================

#[test]
fn test_replace_all_refs() {
    let resolved = resolver(ReplacementPolicy::ObjectId, true)
        .resolve(&fixtures_path().join("Quotation.json"))
        .unwrap();

    assert!(resolved.sanitized);
    assert_eq!(resolved.replaced.len(), 2);
    assert_eq!(
        resolved.replaced.get("properties.spokenByCharacter.oneOf.0"),
        Some("Person/Person.json")
    );
    assert_eq!(
        resolved.replaced.get("properties.spokenByCharacter.oneOf.1"),
        Some("Organization.json")
    );
    assert_eq!(
        resolved.schema["properties"]["spokenByCharacter"]["oneOf"][0]["format"],
        "objectid"
    );
}

// =============================================================================
// Through the Loader
// =============================================================================

#[tokio::test]
async fn test_policy_from_config_reaches_models() {
    let mut config = SchemaConfig::default();
    config.resolver.circular_ref_policy = ReplacementPolicy::ObjectId;

    let registry = SchemaLoader::new(&config)
        .with_root(fixtures_path())
        .load()
        .await
        .unwrap();

    let character = registry.get("Character").unwrap();
    assert!(character.is_sanitized());
    assert_eq!(
        character.replaced_references().get("properties.spokenByCharacter"),
        Some("#")
    );
    assert_eq!(
        character.validation_schema()["properties"]["spokenByCharacter"]["format"],
        "objectid"
    );
    assert!(matches!(
        character.storage_schema().field("spokenByCharacter"),
        Some(entity_schemas::StorageField::Ref { .. })
    ));

    let quotation = registry.get("Quotation").unwrap();
    assert!(!quotation.is_sanitized());
    assert_eq!(count_refs(quotation.validation_schema()), 0);
}

#[tokio::test]
async fn test_forced_object_ids_survive_in_storage_schema() {
    let mut config = SchemaConfig::default();
    config.resolver.circular_ref_policy = ReplacementPolicy::ObjectId;
    config.resolver.replace_all_refs = true;

    let registry = SchemaLoader::new(&config)
        .with_root(fixtures_path())
        .load()
        .await
        .unwrap();

    let storage = registry.get("Quotation").unwrap().storage_schema();
    assert_eq!(
        storage.field("spokenByCharacter"),
        Some(&entity_schemas::StorageField::Ref {
            definition: "objectid".to_string()
        })
    );
    assert_eq!(storage.reference_fields(), vec!["spokenByCharacter"]);
}
