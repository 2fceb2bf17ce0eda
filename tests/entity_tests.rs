//! Entity Tests
//!
//! Validation, CRUD and rendering of entities built from the fixture
//! schema tree.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use entity_schemas::{
    Document, Entity, EntityStore, LifecycleHook, LinkedDataSerializer, MemoryStore, Model,
    ModelRegistry, ObjectId, Result, SchemaConfig, SchemaError, SchemaLoader, Serializer,
    StorageField,
};
use serde::Serialize;
use serde_json::{json, Value};

fn fixtures_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/schemas")
}

async fn registry() -> Arc<ModelRegistry> {
    SchemaLoader::new(&SchemaConfig::default())
        .with_root(fixtures_path())
        .load()
        .await
        .unwrap()
}

fn doc(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        other => panic!("Expected an object, got {}", other),
    }
}

// =============================================================================
// Validation
// =============================================================================

#[tokio::test]
async fn test_quote_validation() {
    let registry = registry().await;
    let character = registry.get("Character").unwrap();

    let quote = json!({
        "name": "Quote",
        "text": "Are you not entertained?",
        "spokenByCharacter": { "name": "Maximus" }
    });
    assert!(character.validate(&quote).is_ok());

    let mut nameless = quote.clone();
    nameless.as_object_mut().unwrap().remove("name");
    let err = character.validate(&nameless).unwrap_err();
    let violations = err.violations().unwrap();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].keyword, "required");
    assert!(violations[0].message.contains("name"));
}

#[tokio::test]
async fn test_one_of_multiple_matches_are_valid() {
    let registry = registry().await;
    let quotation = registry.get("Quotation").unwrap();

    // Person and Organization both accept an object with only a name
    let quote = json!({ "name": "Quote", "spokenByCharacter": { "name": "Skittles" } });
    assert!(quotation.validate(&quote).is_ok());

    let wrong = json!({ "name": "Quote", "spokenByCharacter": 42 });
    assert!(quotation.validate(&wrong).is_err());
}

#[tokio::test]
async fn test_temporal_values_validate_as_strings() {
    #[derive(Serialize)]
    struct Person {
        name: String,
        #[serde(rename = "birthDate")]
        birth_date: chrono::DateTime<Utc>,
    }

    let registry = registry().await;
    let person_model = registry.get("Person").unwrap();

    let gandhi = Person {
        name: "Mahatma Gandhi".to_string(),
        birth_date: Utc.with_ymd_and_hms(1869, 10, 2, 0, 0, 0).unwrap(),
    };
    assert!(person_model.validate(&gandhi).is_ok());
    assert!(person_model
        .validate(&json!({ "birthDate": "the second of October" }))
        .is_err());
}

#[tokio::test]
async fn test_object_id_fields() {
    let registry = registry().await;
    let article = registry.get("Article").unwrap();

    let id = ObjectId::new();
    assert!(article
        .validate(&json!({ "headline": "Hello", "author": id.as_str() }))
        .is_ok());
    let err = article
        .validate(&json!({ "headline": "Hello", "author": "Gandhi" }))
        .unwrap_err();
    assert!(err
        .violations()
        .unwrap()
        .iter()
        .all(|v| v.instance_path == "/author"));

    let storage = article.storage_schema();
    assert_eq!(
        storage.field("author"),
        Some(&StorageField::Ref { definition: "objectid".to_string() })
    );
    assert_eq!(storage.definitions["objectid"], StorageField::ObjectId);
    assert_eq!(storage.field("datePublished"), Some(&StorageField::Date));
    assert_eq!(storage.field("_type"), Some(&StorageField::String));

    let author = registry.get("Author").unwrap();
    assert_eq!(
        author.storage_schema().field("books"),
        Some(&StorageField::Array {
            items: Box::new(StorageField::Ref { definition: "objectid".to_string() })
        })
    );
}

// =============================================================================
// CRUD
// =============================================================================

#[tokio::test]
async fn test_crud_round_trip() {
    let registry = registry().await;
    let store = MemoryStore::new();
    registry.install(&store).unwrap();
    assert!(store.storage_schema("people", "Author").is_some());

    let people = registry.bind("Person", &store).unwrap();
    let ada = people
        .create(doc(json!({ "name": "Ada Lovelace", "birthDate": "1815-12-10T00:00:00Z" })))
        .unwrap();
    assert!(!ada.is_new());
    assert_eq!(store.count("people"), 1);

    let fetched = people.retrieve(&ada.id).unwrap();
    assert_eq!(fetched.get("name"), Some(&json!("Ada Lovelace")));
    assert_eq!(fetched.model, "Person");

    let renamed = people
        .update(&ada.id, doc(json!({ "name": "Augusta Ada King" })))
        .unwrap();
    assert_eq!(renamed.created, ada.created);
    assert!(renamed.updated >= ada.updated);

    let found = people.search(&doc(json!({ "name": "Augusta Ada King" }))).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, ada.id);

    people.delete(&ada.id).unwrap();
    assert!(matches!(
        people.retrieve(&ada.id),
        Err(SchemaError::EntityNotFound { .. })
    ));
    assert_eq!(store.count("people"), 0);
}

#[tokio::test]
async fn test_invalid_writes_are_rejected() {
    let registry = registry().await;
    let store = MemoryStore::new();
    registry.install(&store).unwrap();

    let articles = registry.bind("Article", &store).unwrap();
    let err = articles
        .create(doc(json!({ "author": "not an id", "datePublished": 2016 })))
        .unwrap_err();
    let violations = err.violations().unwrap();
    assert!(violations.iter().any(|v| v.keyword == "required"));
    assert!(violations.iter().any(|v| v.instance_path == "/datePublished"));
    assert_eq!(store.count("creativeWorks"), 0);
}

#[tokio::test]
async fn test_shared_collection_is_polymorphic() {
    let registry = registry().await;
    let store = MemoryStore::new();
    registry.install(&store).unwrap();

    let people = registry.bind("Person", &store).unwrap();
    let authors = registry.bind("Author", &store).unwrap();

    people.create(doc(json!({ "name": "Ada Lovelace" }))).unwrap();
    let author = authors
        .create(doc(json!({ "name": "Mary Shelley", "books": [ObjectId::new().as_str()] })))
        .unwrap();

    assert_eq!(store.count("people"), 2);
    assert_eq!(people.search(&Document::new()).unwrap().len(), 1);
    assert!(people.retrieve(&author.id).is_err());

    let stored = store.find_one("people", &author.id).unwrap().unwrap();
    assert_eq!(registry.model_for_document(&stored).unwrap().name(), "Author");
}

// =============================================================================
// Hooks
// =============================================================================

#[derive(Default)]
struct AuditHook {
    creates: AtomicUsize,
    updates: AtomicUsize,
}

impl LifecycleHook for AuditHook {
    fn pre_create(&self, _model: &Model, _entity: &mut Entity) -> Result<()> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn pre_update(&self, model: &Model, document: &mut Document) -> Result<()> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        if document.get("name") == Some(&json!("forbidden")) {
            return Err(SchemaError::Store(format!("{} names are audited", model.name())));
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_hooks_run_on_every_model() {
    let hook = Arc::new(AuditHook::default());
    let registry = SchemaLoader::new(&SchemaConfig::default())
        .with_root(fixtures_path())
        .with_hook(hook.clone())
        .load()
        .await
        .unwrap();
    let store = MemoryStore::new();
    registry.install(&store).unwrap();

    let novels = registry.bind("Novel", &store).unwrap();
    let dolly = registry.bind("Dolly", &store).unwrap();

    let novel = novels.create(doc(json!({ "name": "Frankenstein" }))).unwrap();
    dolly.create(doc(json!({ "name": "Dolly" }))).unwrap();
    assert_eq!(hook.creates.load(Ordering::SeqCst), 2);

    let before = novels.retrieve(&novel.id).unwrap();
    let updated = novels
        .update(&novel.id, doc(json!({ "numberOfPages": 280 })))
        .unwrap();
    assert!(updated.updated >= before.updated);
    assert_eq!(hook.updates.load(Ordering::SeqCst), 1);

    assert!(novels.update(&novel.id, doc(json!({ "name": "forbidden" }))).is_err());
    assert_eq!(
        novels.retrieve(&novel.id).unwrap().get("name"),
        Some(&json!("Frankenstein"))
    );
}

// =============================================================================
// Rendering
// =============================================================================

#[tokio::test]
async fn test_json_ld_rendering() {
    let registry = registry().await;
    let store = MemoryStore::new();
    registry.install(&store).unwrap();

    let quotes = registry.bind("Quotation", &store).unwrap();
    let quote = quotes
        .create(doc(json!({ "name": "Quote", "text": "Be the change" })))
        .unwrap();

    let serializer = LinkedDataSerializer::default();
    let rendered = serializer.to_json_ld(&quote).unwrap();
    assert_eq!(rendered["@id"], format!("http://localhost:3000/{}", quote.id));
    assert_eq!(rendered["@type"], "Quotation");
    assert_eq!(rendered["@context"], "http://schema.org/");
    assert_eq!(rendered["text"], "Be the change");
    assert!(rendered.get("_created").is_none());

    // Rendered output validates against the model it came from
    assert!(registry.get("Quotation").unwrap().validate(&rendered).is_ok());
}
