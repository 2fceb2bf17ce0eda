//! Configuration management for the schema loader
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (entity-schemas.toml)
//! - Environment variables (ENTITY_SCHEMAS__*)
//!
//! ## Example config file (entity-schemas.toml):
//! ```toml
//! [loader]
//! schema_dir = "./schemas"
//! default_collection = "entities"
//! reject_duplicate_models = false
//!
//! [resolver]
//! circular_ref_policy = "objectid"
//! replace_all_refs = false
//!
//! [serializer]
//! base_url = "http://localhost:3000"
//! context = "http://schema.org/"
//! ```
//!
//! The environment equivalent of `circular_ref_policy` above is
//! `ENTITY_SCHEMAS__RESOLVER__CIRCULAR_REF_POLICY=objectid`.

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::resolver::ReplacementPolicy;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Schema discovery settings
    #[serde(default)]
    pub loader: LoaderConfig,

    /// Reference resolution settings
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// JSON / JSON-LD rendering settings
    #[serde(default)]
    pub serializer: SerializerConfig,
}

/// Schema discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Root of the schema tree
    #[serde(default = "default_schema_dir")]
    pub schema_dir: PathBuf,

    /// Collection for schemas placed directly under the root
    #[serde(default = "default_collection")]
    pub default_collection: String,

    /// Fail the load when two files derive the same model name
    #[serde(default)]
    pub reject_duplicate_models: bool,
}

/// Reference resolution configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Placeholder used for references that cannot be expanded
    #[serde(default)]
    pub circular_ref_policy: ReplacementPolicy,

    /// Replace every reference, cyclic or not
    #[serde(default)]
    pub replace_all_refs: bool,
}

/// Serializer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializerConfig {
    /// Prefix for `@id` values
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// `@context` emitted in JSON-LD output
    #[serde(default = "default_context")]
    pub context: String,
}

fn default_schema_dir() -> PathBuf {
    PathBuf::from("schemas")
}

fn default_collection() -> String {
    "entities".to_string()
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_context() -> String {
    "http://schema.org/".to_string()
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            schema_dir: default_schema_dir(),
            default_collection: default_collection(),
            reject_duplicate_models: false,
        }
    }
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            context: default_context(),
        }
    }
}

impl SchemaConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, layering an explicit file on top of the defaults
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = [
            "entity-schemas.toml",
            ".entity-schemas.toml",
            "config/entity-schemas.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "entity-schemas") {
            let xdg_config = config_dir.config_dir().join("entity-schemas.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("ENTITY_SCHEMAS")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Schema root, with relative paths resolved against the current directory
    pub fn schema_dir(&self) -> PathBuf {
        if self.loader.schema_dir.is_absolute() {
            self.loader.schema_dir.clone()
        } else {
            std::env::current_dir()
                .unwrap_or_default()
                .join(&self.loader.schema_dir)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SchemaConfig::default();
        assert_eq!(config.loader.default_collection, "entities");
        assert_eq!(config.resolver.circular_ref_policy, ReplacementPolicy::Object);
        assert!(!config.resolver.replace_all_refs);
        assert!(!config.loader.reject_duplicate_models);
    }

    #[test]
    fn test_serialize_config() {
        let config = SchemaConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[loader]"));
        assert!(toml_str.contains("[resolver]"));
        assert!(toml_str.contains("circular_ref_policy = \"object\""));
    }

    #[test]
    fn test_unknown_policy_falls_back_to_object() {
        let config: SchemaConfig = toml::from_str(
            r#"
            [resolver]
            circular_ref_policy = "carrier-pigeon"
            "#,
        )
        .unwrap();
        assert_eq!(config.resolver.circular_ref_policy, ReplacementPolicy::Object);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[loader]\ndefault_collection = \"things\"\n\n[resolver]\ncircular_ref_policy = \"URI\"\n",
        )
        .unwrap();

        let config = SchemaConfig::load_from(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(config.loader.default_collection, "things");
        assert_eq!(config.resolver.circular_ref_policy, ReplacementPolicy::Uri);
    }

    #[test]
    fn test_relative_schema_dir_is_resolved() {
        let config = SchemaConfig::default();
        assert!(config.schema_dir().is_absolute());
        assert!(config.schema_dir().ends_with("schemas"));
    }
}
