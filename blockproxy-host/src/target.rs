//! The target side of the proxy: what a renderable unit must provide and
//! the optional capabilities it may declare.
//!
//! Capabilities are discovered through the `as_*` accessors rather than by
//! probing concrete types. A target that returns `Some` from
//! [`Target::as_context_aware`] gets its context slots filled before access
//! is checked; one that returns `Some` from [`Target::as_configurable`]
//! contributes a settings sub-form and round-trips its settings on submit.

use crate::error::{ProxyError, ProxyResult};
use blockproxy_model::{AccessResult, CacheMetadata, ContextDefinition, ContextValue, RenderTree, Viewer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Optional behaviour a target may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    Configurable,
    ContextAware,
}

impl Capability {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Configurable => "configurable",
            Self::ContextAware => "context-aware",
        }
    }
}

/// Set of capabilities declared by one target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, capability: Capability) {
        self.0.insert(capability);
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<T: IntoIterator<Item = Capability>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(Capability::name).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

/// A field-level validation message for the configuration form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Dotted path of the offending form element (`target_id`,
    /// `target_settings.items_per_page`, ...).
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Re-roots the error under a parent element.
    #[must_use]
    pub fn nested_under(mut self, parent: &str) -> Self {
        self.field = format!("{parent}.{}", self.field);
        self
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// A renderable unit the proxy can stand in for.
pub trait Target {
    /// Plugin id the target was created from.
    fn plugin_id(&self) -> &str;

    fn label(&self) -> String {
        self.plugin_id().to_string()
    }

    /// The target's own access decision. Allowed unless overridden.
    fn access(&self, viewer: &Viewer) -> AccessResult {
        let _ = viewer;
        AccessResult::allowed()
    }

    /// Produces the render tree. Failures are opaque to the proxy.
    fn build(&mut self) -> anyhow::Result<RenderTree>;

    /// Cacheability known before building.
    fn cache_metadata(&self) -> CacheMetadata {
        CacheMetadata::default()
    }

    fn as_configurable(&self) -> Option<&dyn Configurable> {
        None
    }

    fn as_configurable_mut(&mut self) -> Option<&mut dyn Configurable> {
        None
    }

    fn as_context_aware(&self) -> Option<&dyn ContextAware> {
        None
    }

    fn as_context_aware_mut(&mut self) -> Option<&mut dyn ContextAware> {
        None
    }

    /// Capabilities derived from the accessors above.
    fn capabilities(&self) -> CapabilitySet {
        let mut caps = CapabilitySet::empty();
        if self.as_configurable().is_some() {
            caps.insert(Capability::Configurable);
        }
        if self.as_context_aware().is_some() {
            caps.insert(Capability::ContextAware);
        }
        caps
    }
}

/// A target with its own settings and settings form.
pub trait Configurable {
    fn configuration(&self) -> Map<String, Value>;

    fn set_configuration(&mut self, configuration: Map<String, Value>);

    fn default_configuration(&self) -> Map<String, Value> {
        Map::new()
    }

    /// Opaque description of the settings sub-form, rendered by the host's
    /// form engine.
    fn configuration_form(&self) -> Value {
        Value::Object(Map::new())
    }

    fn validate_configuration(&self, values: &Map<String, Value>) -> Vec<FieldError> {
        let _ = values;
        Vec::new()
    }

    fn submit_configuration(&mut self, values: Map<String, Value>) {
        self.set_configuration(values);
    }
}

/// A target that declares named, typed context slots.
pub trait ContextAware {
    fn context_definitions(&self) -> Vec<ContextDefinition>;

    fn set_context_value(&mut self, name: &str, value: ContextValue) -> ProxyResult<()>;

    fn context_value(&self, name: &str) -> Option<&ContextValue>;
}

/// Context storage a target can embed to implement [`ContextAware`].
///
/// Rejects values for undeclared slots and values whose type the slot does
/// not accept.
#[derive(Debug, Clone, Default)]
pub struct ContextSlots {
    definitions: Vec<ContextDefinition>,
    values: BTreeMap<String, ContextValue>,
}

impl ContextSlots {
    pub fn new(definitions: Vec<ContextDefinition>) -> Self {
        Self {
            definitions,
            values: BTreeMap::new(),
        }
    }

    pub fn definitions(&self) -> &[ContextDefinition] {
        &self.definitions
    }

    pub fn set(&mut self, name: &str, value: ContextValue) -> ProxyResult<()> {
        let definition = self
            .definitions
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| ProxyError::ContextApplication {
                context: name.to_string(),
                message: "no such context slot".to_string(),
            })?;
        if !definition.accepts(&value) {
            return Err(ProxyError::ContextApplication {
                context: name.to_string(),
                message: format!(
                    "expected '{}', got '{}'",
                    definition.data_type, value.data_type
                ),
            });
        }
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ContextValue> {
        self.values.get(name)
    }

    /// Required slots that hold no value yet.
    pub fn missing_required(&self) -> Vec<&str> {
        self.definitions
            .iter()
            .filter(|d| d.required && !self.values.contains_key(&d.name))
            .map(|d| d.name.as_str())
            .collect()
    }

    /// Combined cacheability of every value held.
    pub fn cache_metadata(&self) -> CacheMetadata {
        self.values
            .values()
            .fold(CacheMetadata::default(), |acc, v| acc.merged(&v.cache))
    }
}
