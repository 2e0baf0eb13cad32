//! Dungeon templates as the instance service sees them.

use std::collections::BTreeMap;
use std::time::Duration;

use delves_core::location::Location;
use delves_core::transactions::ResourceSpec;

/// A configured dungeon template.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    /// Directory name of the template world.
    pub name: String,
    /// Human-readable name.
    pub display_name: String,
    /// Default lifetime of an instance.
    pub timeout: Duration,
    /// Seconds a player must wait between creations.
    pub cooldown_secs: u64,
    /// Occupant cap per instance. `None` is unlimited.
    pub max_occupants: Option<usize>,
    /// Cap on concurrent instances of this template. `None` is unlimited.
    pub max_instances: Option<usize>,
    /// Where entering players are placed.
    pub spawn: Location,
    /// Taken from the creator before provisioning.
    pub requirements: Vec<ResourceSpec>,
    /// Granted to every occupant on completion.
    pub rewards: Vec<ResourceSpec>,
}

impl Template {
    /// Creates a template with a 30 minute timeout, no cooldown, no caps and
    /// a spawn at `0,64,0`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            timeout: Duration::from_secs(30 * 60),
            cooldown_secs: 0,
            max_occupants: None,
            max_instances: None,
            spawn: Location::at(0.0, 64.0, 0.0),
            requirements: Vec::new(),
            rewards: Vec::new(),
        }
    }
}

/// Every configured template, by name.
#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
    templates: BTreeMap<String, Template>,
}

impl TemplateCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a template.
    pub fn insert(&mut self, template: Template) {
        self.templates.insert(template.name.clone(), template);
    }

    /// Looks a template up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Template> {
        self.templates.get(name)
    }

    /// Iterates templates in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.values()
    }

    /// Number of templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Returns `true` if no template is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl FromIterator<Template> for TemplateCatalog {
    fn from_iter<I: IntoIterator<Item = Template>>(iter: I) -> Self {
        let mut catalog = Self::new();
        for template in iter {
            catalog.insert(template);
        }
        catalog
    }
}
