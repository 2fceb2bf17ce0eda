//! Model and Collection Naming
//!
//! The model name comes from the schema file name, the collection name from
//! the directory the file sits in:
//!
//! ```text
//! schemas/Person.json                            model: Person      collection: entities
//! schemas/Person/Author.json                     model: Author      collection: people
//! schemas/CreativeWork/Article.json              model: Article     collection: creativeWorks
//! schemas/CreativeWork/Article/NewsArticle.json  model: NewsArticle collection: articles
//! ```
//!
//! Only the immediate parent directory counts. Files directly under the
//! schema root share the configured default collection.

pub mod pluralize;

pub use pluralize::Pluralizer;

use std::path::Path;

/// Derives model and collection names from schema file positions
#[derive(Debug, Clone)]
pub struct CollectionNamer {
    pluralizer: Pluralizer,
    default_collection: String,
}

impl CollectionNamer {
    pub fn new(default_collection: impl Into<String>) -> Self {
        Self {
            pluralizer: Pluralizer::english(),
            default_collection: default_collection.into(),
        }
    }

    /// Collection configured for schemas at the root
    pub fn default_collection(&self) -> &str {
        &self.default_collection
    }

    /// Collection name for a schema file under `schema_root`
    pub fn collection_name(&self, schema_file: &Path, schema_root: &Path) -> String {
        let parent = match schema_file.parent() {
            Some(parent) => parent,
            None => return self.default_collection.clone(),
        };

        if same_dir(parent, schema_root) {
            return self.default_collection.clone();
        }

        match parent.file_name().and_then(|n| n.to_str()) {
            Some(dir_name) => to_camel_case(&self.pluralizer.plural(dir_name)),
            None => self.default_collection.clone(),
        }
    }
}

fn same_dir(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a.components().eq(b.components()),
    }
}

/// Model name for a schema file: its base name in PascalCase
pub fn model_name(schema_file: &Path) -> String {
    let stem = schema_file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    to_pascal_case(stem)
}

/// Split on separators; existing inner capitals are kept
fn words(s: &str) -> impl Iterator<Item = &str> {
    s.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Convert to PascalCase (`news-article` -> `NewsArticle`)
pub fn to_pascal_case(s: &str) -> String {
    words(s).map(capitalize).collect()
}

/// Convert to camelCase (`CreativeWorks` -> `creativeWorks`, `BOOKS` -> `books`)
pub fn to_camel_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for (i, word) in words(s).enumerate() {
        let all_caps = word.chars().all(|c| !c.is_lowercase());
        if i == 0 {
            if all_caps {
                result.push_str(&word.to_lowercase());
            } else {
                let mut chars = word.chars();
                if let Some(first) = chars.next() {
                    result.extend(first.to_lowercase());
                    result.extend(chars);
                }
            }
        } else if all_caps {
            result.push_str(&capitalize(&word.to_lowercase()));
        } else {
            result.push_str(&capitalize(word));
        }
    }
    result
}
