//! Capabilities the host framework supplies to the proxy, with in-process
//! implementations for hosts that do not bring their own.

use crate::error::{ProxyError, ProxyResult};
use crate::target::{ContextAware, Target};
use blockproxy_model::{AccessResult, AvailableContexts, ContextMapping, Viewer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

/// An entry in the registry's catalogue of creatable targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDefinition {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub category: String,
}

impl TargetDefinition {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            category: String::new(),
        }
    }

    #[must_use]
    pub fn in_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }
}

/// Creates target instances by plugin id.
pub trait TargetRegistry: Send + Sync {
    /// Every target the registry can create.
    fn definitions(&self) -> Vec<TargetDefinition>;

    /// Creates and configures an instance. Fails with
    /// [`ProxyError::TargetNotFound`] or [`ProxyError::TargetConstruction`].
    fn create(&self, target_id: &str, configuration: &Map<String, Value>) -> ProxyResult<Box<dyn Target>>;
}

/// Offers the contexts of the current execution scope.
pub trait ContextRepository: Send + Sync {
    fn available_contexts(&self) -> AvailableContexts;
}

/// Writes mapped context values into a target's slots.
pub trait ContextApplier: Send + Sync {
    /// `mapping` values are exact ids in `available`.
    fn apply(
        &self,
        target: &mut dyn ContextAware,
        available: &AvailableContexts,
        mapping: &ContextMapping,
    ) -> ProxyResult<()>;
}

/// Decides whether a viewer may see a target.
pub trait AccessEvaluator: Send + Sync {
    fn check(&self, target: &dyn Target, viewer: &Viewer) -> AccessResult;
}

/// Builds a target from its settings.
pub type TargetFactory =
    Box<dyn Fn(&Map<String, Value>) -> anyhow::Result<Box<dyn Target>> + Send + Sync>;

/// Registry backed by factories registered in process.
#[derive(Default)]
pub struct StaticTargetRegistry {
    definitions: Vec<TargetDefinition>,
    factories: HashMap<String, TargetFactory>,
}

impl StaticTargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory. A second registration under the same id replaces
    /// the first.
    pub fn register<F>(&mut self, definition: TargetDefinition, factory: F)
    where
        F: Fn(&Map<String, Value>) -> anyhow::Result<Box<dyn Target>> + Send + Sync + 'static,
    {
        self.definitions.retain(|d| d.id != definition.id);
        self.factories.insert(definition.id.clone(), Box::new(factory));
        self.definitions.push(definition);
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl TargetRegistry for StaticTargetRegistry {
    fn definitions(&self) -> Vec<TargetDefinition> {
        self.definitions.clone()
    }

    fn create(&self, target_id: &str, configuration: &Map<String, Value>) -> ProxyResult<Box<dyn Target>> {
        let factory = self
            .factories
            .get(target_id)
            .ok_or_else(|| ProxyError::TargetNotFound(target_id.to_string()))?;
        factory(configuration).map_err(|e| ProxyError::TargetConstruction {
            target_id: target_id.to_string(),
            message: format!("{e:#}"),
        })
    }
}

impl fmt::Debug for StaticTargetRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticTargetRegistry")
            .field("definitions", &self.definitions)
            .finish()
    }
}

/// A fixed set of contexts.
#[derive(Debug, Clone, Default)]
pub struct StaticContextRepository {
    contexts: AvailableContexts,
}

impl StaticContextRepository {
    pub fn new(contexts: AvailableContexts) -> Self {
        Self { contexts }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

impl ContextRepository for StaticContextRepository {
    fn available_contexts(&self) -> AvailableContexts {
        self.contexts.clone()
    }
}

/// Sets each mapped value through [`ContextAware::set_context_value`],
/// stopping at the first failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlotContextApplier;

impl ContextApplier for SlotContextApplier {
    fn apply(
        &self,
        target: &mut dyn ContextAware,
        available: &AvailableContexts,
        mapping: &ContextMapping,
    ) -> ProxyResult<()> {
        for (slot, source) in mapping.iter() {
            let value = available
                .get(source)
                .ok_or_else(|| ProxyError::ContextApplication {
                    context: slot.to_string(),
                    message: format!("source '{source}' is not available"),
                })?;
            target.set_context_value(slot, value.clone())?;
        }
        Ok(())
    }
}

/// Delegates to the target's own [`Target::access`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DelegatingAccess;

impl AccessEvaluator for DelegatingAccess {
    fn check(&self, target: &dyn Target, viewer: &Viewer) -> AccessResult {
        target.access(viewer)
    }
}
