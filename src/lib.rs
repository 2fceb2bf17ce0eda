//! Entity Schemas
//!
//! Loads a directory tree of JSON Schemas into runtime entity models.
//!
//! ## Features
//!
//! - **Collection naming**: storage grouping derived from the directory a
//!   schema sits in, pluralized and camelCased
//! - **Reference resolution**: `$ref`s are expanded; references on a cycle
//!   are replaced by a configurable placeholder and recorded
//! - **Dual schemas**: every model carries a compiled validation schema and a
//!   typed storage schema derived from it
//! - **Write-time validation**: lifecycle hooks validate every create and
//!   update, reporting every violation at once
//! - **One-shot loading**: the registry is built once per loader, files are
//!   processed concurrently, and concurrent callers share the result
//!
//! ## Layout
//!
//! ```text
//! schemas/
//! ├── Quotation.json            Quotation    -> entities
//! ├── Person/
//! │   ├── Person.json           Person       -> people
//! │   └── Author.json           Author       -> people
//! └── CreativeWork/
//!     └── Article.json          Article      -> creativeWorks
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use entity_schemas::{MemoryStore, SchemaConfig, SchemaLoader};
//!
//! # async fn run() -> entity_schemas::Result<()> {
//! let loader = SchemaLoader::new(&SchemaConfig::load()?);
//! let registry = loader.load().await?;
//!
//! let store = MemoryStore::new();
//! registry.install(&store)?;
//!
//! if let Some(people) = registry.bind("Person", &store) {
//!     let mut fields = serde_json::Map::new();
//!     fields.insert("name".into(), "Ada Lovelace".into());
//!     let person = people.create(fields)?;
//!     println!("created {}", person.id);
//! }
//! # Ok(())
//! # }
//! ```

pub mod checksum;
pub mod config;
pub mod crud;
pub mod entity;
pub mod error;
pub mod loader;
pub mod model;
pub mod naming;
pub mod registry;
pub mod resolver;
pub mod serialize;
pub mod source;
pub mod storage;
pub mod validation;

pub use checksum::Checksum;
pub use config::{LoaderConfig, ResolverConfig, SchemaConfig, SerializerConfig};
pub use crud::{EntityStore, MemoryStore, ModelHandle};
pub use entity::{Document, Entity, ObjectId};
pub use error::{Result, SchemaError, ValidationFailure, Violation};
pub use loader::SchemaLoader;
pub use model::{LifecycleHook, Model, ModelBuilder};
pub use naming::CollectionNamer;
pub use registry::ModelRegistry;
pub use resolver::{ReferenceResolver, ReplacedReferences, ReplacementPolicy, ResolvedSchema};
pub use serialize::{LinkedDataSerializer, Serializer};
pub use source::{FsSource, SchemaSource};
pub use storage::{StorageField, StorageSchema};
pub use validation::SchemaValidator;
