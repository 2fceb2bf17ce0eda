//! Entity Schemas CLI
//!
//! Loads a schema directory and inspects the resulting models.

use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use entity_schemas::{ReplacementPolicy, SchemaConfig, SchemaLoader};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "entity-schemas")]
#[command(about = "Load JSON Schemas into entity models and inspect them")]
struct Cli {
    /// Config file layered over the default locations
    #[arg(short, long)]
    config: Option<String>,

    /// Schema directory (overrides loader.schema_dir)
    #[arg(short, long)]
    schemas: Option<PathBuf>,

    /// Placeholder for circular references: object, objectid or uri
    #[arg(short, long)]
    policy: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List models with their collections and replaced references
    Inspect,

    /// Print a model's schema
    Show {
        /// Model name
        model: String,
        /// Print the storage schema instead of the validation schema
        #[arg(long)]
        storage: bool,
    },

    /// Validate a JSON instance against a model
    Validate {
        /// Model name
        model: String,
        /// Instance file
        instance: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Returns false when the command ran but found problems
async fn run(cli: Cli) -> anyhow::Result<bool> {
    let mut config = SchemaConfig::load_from(cli.config.as_deref()).context("loading configuration")?;
    if let Some(dir) = cli.schemas {
        config.loader.schema_dir = dir;
    }
    if let Some(policy) = cli.policy {
        config.resolver.circular_ref_policy = ReplacementPolicy::parse(&policy);
    }

    let loader = SchemaLoader::new(&config);
    let registry = loader
        .load()
        .await
        .with_context(|| format!("loading schemas from {}", loader.root().display()))?;

    match cli.command {
        Commands::Inspect => {
            println!(
                "📦 {} models in {} ({})",
                registry.len(),
                registry.root().display(),
                registry.checksum().short()
            );
            for (collection, models) in registry.collections() {
                println!("\n{}", collection);
                for name in models {
                    let Some(model) = registry.get(name) else {
                        continue;
                    };
                    let marker = if model.is_sanitized() { "⚠️ " } else { "" };
                    println!("  {}{}  {}", marker, name, model.source().display());
                    for (path, target) in model.replaced_references().iter() {
                        println!("      {} -> {} ({})", path, target, config.resolver.circular_ref_policy);
                    }
                }
            }
            Ok(true)
        }

        Commands::Show { model, storage } => {
            let model = registry
                .get(&model)
                .ok_or_else(|| anyhow!("unknown model '{}'", model))?;
            let rendered = if storage {
                serde_json::to_string_pretty(model.storage_schema())?
            } else {
                serde_json::to_string_pretty(model.validation_schema())?
            };
            println!("{}", rendered);
            Ok(true)
        }

        Commands::Validate { model, instance } => {
            let model = registry
                .get(&model)
                .ok_or_else(|| anyhow!("unknown model '{}'", model))?;
            let content = std::fs::read_to_string(&instance)
                .with_context(|| format!("reading {}", instance.display()))?;
            let value: serde_json::Value = serde_json::from_str(&content)
                .with_context(|| format!("parsing {}", instance.display()))?;

            match model.validate(&value) {
                Ok(()) => {
                    println!("✅ {} is a valid {}", instance.display(), model.name());
                    Ok(true)
                }
                Err(e) => match e.violations() {
                    Some(violations) => {
                        println!("❌ {} is not a valid {}", instance.display(), model.name());
                        for violation in violations {
                            println!("   {}", violation);
                        }
                        Ok(false)
                    }
                    None => Err(e.into()),
                },
            }
        }
    }
}
