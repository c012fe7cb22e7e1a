use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// How long a rendered result may be cached.
///
/// Serialized as a plain integer where `-1` means permanent, matching the
/// host framework's convention. Ordering puts every finite age below
/// [`MaxAge::Permanent`], so the more restrictive of two ages is `min`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum MaxAge {
    /// Cacheable for at most this many seconds (0 = uncacheable).
    Seconds(u64),
    /// Cacheable until invalidated by tag.
    Permanent,
}

impl MaxAge {
    /// The raw value used on the wire: `-1` for permanent.
    pub const PERMANENT_RAW: i64 = -1;

    /// Uncacheable.
    pub const ZERO: MaxAge = MaxAge::Seconds(0);

    /// Interprets a raw integer. Any negative value is treated as permanent.
    pub fn from_raw(raw: i64) -> Self {
        if raw < 0 {
            Self::Permanent
        } else {
            Self::Seconds(raw as u64)
        }
    }

    pub fn as_raw(&self) -> i64 {
        match self {
            Self::Permanent => Self::PERMANENT_RAW,
            Self::Seconds(s) => i64::try_from(*s).unwrap_or(i64::MAX),
        }
    }

    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent)
    }

    /// Smaller finite age wins; permanent only survives when both sides are permanent.
    #[must_use]
    pub fn merge(self, other: MaxAge) -> MaxAge {
        self.min(other)
    }
}

impl Default for MaxAge {
    fn default() -> Self {
        Self::Permanent
    }
}

impl From<i64> for MaxAge {
    fn from(raw: i64) -> Self {
        Self::from_raw(raw)
    }
}

impl From<MaxAge> for i64 {
    fn from(age: MaxAge) -> Self {
        age.as_raw()
    }
}

impl fmt::Display for MaxAge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Permanent => write!(f, "permanent"),
            Self::Seconds(s) => write!(f, "{s}s"),
        }
    }
}

/// Cacheability of a render result: the variation keys (contexts), the
/// invalidation keys (tags) and the lifetime (max-age).
///
/// Contexts and tags are sets, so insertion order never matters and
/// duplicates collapse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMetadata {
    #[serde(default)]
    pub contexts: BTreeSet<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub max_age: MaxAge,
}

impl CacheMetadata {
    /// Empty, permanently cacheable metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata for something that must never be cached.
    pub fn uncacheable() -> Self {
        Self::new().with_max_age(MaxAge::ZERO)
    }

    #[must_use]
    pub fn with_contexts<I, S>(mut self, contexts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.contexts.extend(contexts.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_max_age(mut self, max_age: MaxAge) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn add_context(&mut self, context: impl Into<String>) {
        self.contexts.insert(context.into());
    }

    pub fn add_tag(&mut self, tag: impl Into<String>) {
        self.tags.insert(tag.into());
    }

    /// Folds `other` into `self` following the conservative rules: union of
    /// contexts and tags, most restrictive max-age.
    pub fn merge_in(&mut self, other: &CacheMetadata) {
        self.contexts.extend(other.contexts.iter().cloned());
        self.tags.extend(other.tags.iter().cloned());
        self.max_age = self.max_age.merge(other.max_age);
    }

    /// Non-mutating variant of [`CacheMetadata::merge_in`].
    #[must_use]
    pub fn merged(&self, other: &CacheMetadata) -> CacheMetadata {
        let mut out = self.clone();
        out.merge_in(other);
        out
    }

    /// True when nothing restricts caching: no contexts, no tags, permanent.
    pub fn is_unrestricted(&self) -> bool {
        self.contexts.is_empty() && self.tags.is_empty() && self.max_age.is_permanent()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_age_raw_roundtrip_values() {
        assert_eq!(MaxAge::from_raw(-1), MaxAge::Permanent);
        assert_eq!(MaxAge::from_raw(-30), MaxAge::Permanent);
        assert_eq!(MaxAge::from_raw(0), MaxAge::ZERO);
        assert_eq!(MaxAge::Seconds(60).as_raw(), 60);
        assert_eq!(MaxAge::Permanent.as_raw(), -1);
    }

    #[test]
    fn finite_ages_sort_below_permanent() {
        assert!(MaxAge::Seconds(u64::MAX) < MaxAge::Permanent);
        assert!(MaxAge::ZERO < MaxAge::Seconds(1));
    }

    #[test]
    fn max_age_serializes_as_integer() {
        let json = serde_json::to_string(&MaxAge::Permanent).unwrap();
        assert_eq!(json, "-1");
        let age: MaxAge = serde_json::from_str("300").unwrap();
        assert_eq!(age, MaxAge::Seconds(300));
    }

    #[test]
    fn merge_in_collapses_duplicates() {
        let mut a = CacheMetadata::new().with_tags(["node:1", "node:2"]);
        let b = CacheMetadata::new().with_tags(["node:2", "user:7"]);
        a.merge_in(&b);
        assert_eq!(a.tags.len(), 3);
    }

    #[test]
    fn default_is_unrestricted() {
        assert!(CacheMetadata::default().is_unrestricted());
        assert!(!CacheMetadata::uncacheable().is_unrestricted());
    }
}
