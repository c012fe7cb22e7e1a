use crate::CacheMetadata;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The identity a render is performed for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub roles: BTreeSet<String>,
}

impl Viewer {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            roles: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    pub fn is_anonymous(&self) -> bool {
        self.id.is_none()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

/// Outcome of an access check. Denials are cacheable like any other result,
/// so the decision carries its own cache metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessResult {
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default)]
    pub cache: CacheMetadata,
}

impl AccessResult {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
            cache: CacheMetadata::default(),
        }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            cache: CacheMetadata::default(),
        }
    }

    pub fn allowed_if(condition: bool, reason: impl Into<String>) -> Self {
        if condition {
            Self::allowed()
        } else {
            Self::forbidden(reason)
        }
    }

    #[must_use]
    pub fn with_cache(mut self, cache: CacheMetadata) -> Self {
        self.cache = cache;
        self
    }

    pub fn is_allowed(&self) -> bool {
        self.allowed
    }
}
