use crate::ContextMapping;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Key under which a context-aware target's mapping lives in `target_config`.
pub const CONTEXT_MAPPING_KEY: &str = "context_mapping";

/// Identifier of one placed proxy instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Creates a fresh, time-ordered id for a newly placed instance.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InstanceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Persisted proxy configuration: which target to stand in for and the
/// target's own opaque settings.
///
/// Always normalized: a blank `target_id` becomes `None` and clears
/// `target_config`, so no stale settings survive a target switch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawConfiguration")]
pub struct ProxyConfiguration {
    target_id: Option<String>,
    target_config: Map<String, Value>,
}

#[derive(Deserialize)]
struct RawConfiguration {
    #[serde(default)]
    target_id: Option<String>,
    #[serde(default)]
    target_config: Map<String, Value>,
}

impl From<RawConfiguration> for ProxyConfiguration {
    fn from(raw: RawConfiguration) -> Self {
        Self::new(raw.target_id, raw.target_config)
    }
}

impl ProxyConfiguration {
    pub fn new(target_id: Option<String>, target_config: Map<String, Value>) -> Self {
        let target_id = target_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());
        let target_config = if target_id.is_some() {
            target_config
        } else {
            Map::new()
        };
        Self {
            target_id,
            target_config,
        }
    }

    /// "Render nothing".
    pub fn unconfigured() -> Self {
        Self::default()
    }

    /// Targets `target_id` with empty settings.
    pub fn for_target(target_id: impl Into<String>) -> Self {
        Self::new(Some(target_id.into()), Map::new())
    }

    pub fn target_id(&self) -> Option<&str> {
        self.target_id.as_deref()
    }

    pub fn has_target(&self) -> bool {
        self.target_id.is_some()
    }

    /// Full target settings blob, including any context mapping.
    pub fn target_config(&self) -> &Map<String, Value> {
        &self.target_config
    }

    /// Target settings without the context mapping entry.
    pub fn target_settings(&self) -> Map<String, Value> {
        let mut settings = self.target_config.clone();
        settings.remove(CONTEXT_MAPPING_KEY);
        settings
    }

    /// The administrator's explicit context mapping. A malformed entry reads
    /// as an empty mapping.
    pub fn context_mapping(&self) -> ContextMapping {
        ContextMapping::from_settings(&self.target_config)
    }

    #[must_use]
    pub fn with_context_mapping(mut self, mapping: &ContextMapping) -> Self {
        if self.target_id.is_none() {
            return self;
        }
        if mapping.is_empty() {
            self.target_config.remove(CONTEXT_MAPPING_KEY);
        } else if let Ok(value) = serde_json::to_value(mapping) {
            self.target_config.insert(CONTEXT_MAPPING_KEY.to_string(), value);
        }
        self
    }

    #[must_use]
    pub fn with_setting(mut self, key: impl Into<String>, value: Value) -> Self {
        if self.target_id.is_some() {
            self.target_config.insert(key.into(), value);
        }
        self
    }
}
