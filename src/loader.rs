//! Schema Loader
//!
//! Scans a schema directory once and builds the [`ModelRegistry`]. Every
//! file goes through naming, reference resolution and model building on
//! the blocking pool; the first failure fails the whole load. A successful
//! load is cached, so later and concurrent calls share one registry.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::try_join_all;
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

use crate::config::{LoaderConfig, ResolverConfig, SchemaConfig};
use crate::error::{Result, SchemaError};
use crate::model::{LifecycleHook, Model, ModelBuilder};
use crate::naming::{model_name, CollectionNamer};
use crate::registry::ModelRegistry;
use crate::resolver::ReferenceResolver;
use crate::source::{FsSource, SchemaSource};

/// Loads a schema tree into a [`ModelRegistry`]
pub struct SchemaLoader {
    loader: LoaderConfig,
    resolver: ResolverConfig,
    root: PathBuf,
    source: Arc<dyn SchemaSource>,
    hooks: Vec<Arc<dyn LifecycleHook>>,
    registry: OnceCell<Arc<ModelRegistry>>,
}

impl fmt::Debug for SchemaLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaLoader")
            .field("root", &self.root)
            .field("loader", &self.loader)
            .field("resolver", &self.resolver)
            .field("loaded", &self.registry.initialized())
            .finish_non_exhaustive()
    }
}

impl SchemaLoader {
    pub fn new(config: &SchemaConfig) -> Self {
        Self {
            loader: config.loader.clone(),
            resolver: config.resolver.clone(),
            root: config.schema_dir(),
            source: Arc::new(FsSource),
            hooks: Vec::new(),
            registry: OnceCell::new(),
        }
    }

    /// Load from `root` instead of the configured schema directory
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn with_source(mut self, source: Arc<dyn SchemaSource>) -> Self {
        self.source = source;
        self
    }

    /// Attach a hook to every model this loader builds
    pub fn with_hook(mut self, hook: Arc<dyn LifecycleHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The registry, if a load already succeeded
    pub fn registry(&self) -> Option<Arc<ModelRegistry>> {
        self.registry.get().cloned()
    }

    /// Load the registry, or return the one already loaded
    pub async fn load(&self) -> Result<Arc<ModelRegistry>> {
        self.registry
            .get_or_try_init(|| self.scan())
            .await
            .map(Arc::clone)
    }

    async fn scan(&self) -> Result<Arc<ModelRegistry>> {
        self.source.check_root(&self.root)?;
        let files = self.source.discover(&self.root)?;
        info!(root = %self.root.display(), files = files.len(), "loading schemas");

        let namer = Arc::new(CollectionNamer::new(self.loader.default_collection.clone()));
        let resolver = ReferenceResolver::new(self.source.clone(), &self.resolver);
        let builder = ModelBuilder::new().with_hooks(self.hooks.clone());

        let tasks = files.into_iter().map(|file| {
            let root = self.root.clone();
            let namer = namer.clone();
            let resolver = resolver.clone();
            let builder = builder.clone();

            async move {
                tokio::task::spawn_blocking(move || {
                    build_model(&file, &root, &namer, &resolver, &builder).map_err(|e| {
                        error!(schema = %file.display(), error = %e, "failed to build model");
                        e
                    })
                })
                .await
                .map_err(|e| SchemaError::Task(e.to_string()))?
            }
        });

        let models = try_join_all(tasks).await?;

        let registry = ModelRegistry::from_models(
            self.root.clone(),
            self.loader.default_collection.clone(),
            models,
            self.loader.reject_duplicate_models,
        )?;

        info!(
            models = registry.len(),
            collections = registry.collections().len(),
            checksum = %registry.checksum().short(),
            "schema registry loaded"
        );
        Ok(Arc::new(registry))
    }
}

fn build_model(
    file: &Path,
    root: &Path,
    namer: &CollectionNamer,
    resolver: &ReferenceResolver,
    builder: &ModelBuilder,
) -> Result<Model> {
    let name = model_name(file);
    let collection = namer.collection_name(file, root);
    debug!(schema = %file.display(), model = %name, collection = %collection, "building model");

    let resolved = resolver.resolve(file)?;
    builder.build(resolved, &name, &collection)
}
