use crate::CacheMetadata;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Data type accepted by a definition that takes any value.
pub const ANY_TYPE: &str = "any";

/// A context slot declared by a target: what it is called and what it needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextDefinition {
    pub name: String,
    pub data_type: String,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

fn default_required() -> bool {
    true
}

impl ContextDefinition {
    /// A required slot of the given type.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            required: true,
            label: None,
        }
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Label for display, falling back to the slot name.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    /// Whether a value of `candidate` type can fill this slot.
    ///
    /// `any` accepts everything. Otherwise the types must be equal, or the
    /// declared type must be a `:`-delimited prefix of the candidate
    /// (`entity` accepts `entity:node`).
    pub fn accepts_type(&self, candidate: &str) -> bool {
        if self.data_type == ANY_TYPE || self.data_type == candidate {
            return true;
        }
        candidate
            .strip_prefix(self.data_type.as_str())
            .is_some_and(|rest| rest.starts_with(':'))
    }

    pub fn accepts(&self, value: &ContextValue) -> bool {
        self.accepts_type(&value.data_type)
    }
}

/// A typed value offered by the execution scope (the node being viewed,
/// the current user, the route, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextValue {
    pub data_type: String,
    #[serde(default)]
    pub value: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Cacheability contributed by whoever depends on this value.
    #[serde(default)]
    pub cache: CacheMetadata,
}

impl ContextValue {
    pub fn new(data_type: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            data_type: data_type.into(),
            value,
            label: None,
            cache: CacheMetadata::default(),
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn with_cache(mut self, cache: CacheMetadata) -> Self {
        self.cache = cache;
        self
    }
}

/// Contexts available in the current scope, keyed by id, in the order the
/// scope offered them. Iteration order drives automatic mapping, so it is
/// kept stable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AvailableContexts {
    entries: Vec<(String, ContextValue)>,
}

impl AvailableContexts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a context. Re-inserting an existing id replaces the value in place.
    pub fn insert(&mut self, id: impl Into<String>, value: ContextValue) {
        let id = id.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == id) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((id, value)),
        }
    }

    #[must_use]
    pub fn with(mut self, id: impl Into<String>, value: ContextValue) -> Self {
        self.insert(id, value);
        self
    }

    pub fn get(&self, id: &str) -> Option<&ContextValue> {
        self.entries.iter().find(|(k, _)| k == id).map(|(_, v)| v)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ContextValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, ContextValue)> for AvailableContexts {
    fn from_iter<T: IntoIterator<Item = (K, ContextValue)>>(iter: T) -> Self {
        let mut out = Self::new();
        for (id, value) in iter {
            out.insert(id, value);
        }
        out
    }
}

/// Target slot name -> source context id.
///
/// Source ids may carry a leading sigil marking them as scope-context ids;
/// the sigil is resolved by the context mapper, not here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextMapping(BTreeMap<String, String>);

impl ContextMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, slot: &str) -> Option<&str> {
        self.0.get(slot).map(String::as_str)
    }

    pub fn insert(&mut self, slot: impl Into<String>, source: impl Into<String>) {
        self.0.insert(slot.into(), source.into());
    }

    #[must_use]
    pub fn with(mut self, slot: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(slot, source);
        self
    }

    pub fn remove(&mut self, slot: &str) -> Option<String> {
        self.0.remove(slot)
    }

    pub fn contains(&self, slot: &str) -> bool {
        self.0.contains_key(slot)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Reads the mapping stored under [`crate::CONTEXT_MAPPING_KEY`] in a
    /// target settings blob. Absent or malformed entries read as empty.
    pub fn from_settings(settings: &serde_json::Map<String, serde_json::Value>) -> Self {
        settings
            .get(crate::CONTEXT_MAPPING_KEY)
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }

    /// Drops entries whose source is blank (an unselected form option).
    #[must_use]
    pub fn without_blank(mut self) -> Self {
        self.0.retain(|_, source| !source.trim().is_empty());
        self
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ContextMapping {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
