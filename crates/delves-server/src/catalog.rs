//! YAML template catalog.
//!
//! ```yaml
//! templates:
//!   - name: crypt
//!     display_name: The Crypt
//!     timeout_secs: 1800
//!     cooldown_secs: 60
//!     max_occupants: 4
//!     spawn: "5,70,5"
//!     requirements:
//!       - { kind: item, amount: 1, detail: crypt_key }
//!     conditions:
//!       - { type: kill_count, count: 10, priority: 1 }
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use delves_conditions::engine::CompletionEngine;
use delves_conditions::factory::{BlueprintError, ConditionDescriptor, ConditionFactory};
use delves_conditions::tree::ProgressAggregation;
use delves_core::location::{Location, LocationParseError};
use delves_core::transactions::ResourceSpec;
use delves_instances::domain::template::{Template, TemplateCatalog};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

/// Errors raised while loading the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog file could not be read.
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        /// Catalog path.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The catalog is not valid YAML or has the wrong shape.
    #[error("malformed catalog: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A template name is empty or not a plain directory name.
    #[error("invalid template name: {0:?}")]
    InvalidName(String),

    /// Two templates share a name.
    #[error("duplicate template: {0}")]
    Duplicate(String),

    /// The spawn location does not parse.
    #[error("template {template} has an invalid spawn: {source}")]
    Spawn {
        /// Template name.
        template: String,
        /// Parse failure.
        #[source]
        source: LocationParseError,
    },

    /// A condition descriptor is invalid.
    #[error("template {template} has an invalid condition: {source}")]
    Condition {
        /// Template name.
        template: String,
        /// Build failure.
        #[source]
        source: BlueprintError,
    },
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    templates: Vec<TemplateEntry>,
}

#[derive(Debug, Deserialize)]
struct TemplateEntry {
    name: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,
    #[serde(default)]
    cooldown_secs: u64,
    #[serde(default)]
    max_occupants: Option<usize>,
    #[serde(default)]
    max_instances: Option<usize>,
    #[serde(default)]
    spawn: Option<String>,
    #[serde(default)]
    requirements: Vec<ResourceSpec>,
    #[serde(default)]
    rewards: Vec<ResourceSpec>,
    #[serde(default)]
    conditions: Vec<ConditionDescriptor>,
}

fn default_timeout_secs() -> u64 {
    30 * 60
}

/// Templates plus the completion engine holding their blueprints.
#[derive(Debug)]
pub struct LoadedCatalog {
    /// Template settings by name.
    pub templates: TemplateCatalog,
    /// Engine with one blueprint registered per template.
    pub engine: CompletionEngine,
}

/// Reads and parses the catalog at `path`.
///
/// # Errors
///
/// Returns `CatalogError::Io` if the file cannot be read, and any error of
/// [`parse_catalog`].
pub fn load_catalog(
    path: &Path,
    factory: &ConditionFactory,
    aggregation: ProgressAggregation,
) -> Result<LoadedCatalog, CatalogError> {
    let yaml = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let catalog = parse_catalog(&yaml, factory, aggregation)?;
    info!(path = %path.display(), templates = catalog.templates.len(), "loaded template catalog");
    Ok(catalog)
}

/// Parses a catalog document, building every condition descriptor through
/// `factory`.
///
/// # Errors
///
/// Returns `CatalogError` for malformed YAML, invalid or duplicate names,
/// bad spawn strings and invalid conditions.
pub fn parse_catalog(
    yaml: &str,
    factory: &ConditionFactory,
    aggregation: ProgressAggregation,
) -> Result<LoadedCatalog, CatalogError> {
    let file: CatalogFile = serde_yaml::from_str(yaml)?;
    let mut templates = TemplateCatalog::new();
    let mut engine = CompletionEngine::new(aggregation);
    let mut seen = HashSet::new();

    for entry in file.templates {
        let name = entry.name.trim().to_owned();
        if !is_plain_name(&name) {
            return Err(CatalogError::InvalidName(entry.name));
        }
        if !seen.insert(name.clone()) {
            return Err(CatalogError::Duplicate(name));
        }

        let conditions = factory
            .build_template(&entry.conditions)
            .map_err(|source| CatalogError::Condition {
                template: name.clone(),
                source,
            })?;
        if conditions.is_empty() {
            warn!(template = %name, "template has no conditions and can never complete");
        }
        engine.register_template(name.clone(), conditions);

        let mut template = Template::new(name.clone());
        if let Some(spawn) = entry.spawn.as_deref() {
            template.spawn =
                Location::parse_tolerant(spawn).map_err(|source| CatalogError::Spawn {
                    template: name.clone(),
                    source,
                })?;
        }
        if let Some(display_name) = entry.display_name {
            template.display_name = display_name;
        }
        template.timeout = Duration::from_secs(entry.timeout_secs);
        template.cooldown_secs = entry.cooldown_secs;
        template.max_occupants = entry.max_occupants;
        template.max_instances = entry.max_instances;
        template.requirements = entry.requirements;
        template.rewards = entry.rewards;
        templates.insert(template);
    }

    Ok(LoadedCatalog { templates, engine })
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
}
