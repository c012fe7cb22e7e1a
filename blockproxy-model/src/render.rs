use crate::CacheMetadata;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A render tree as produced by a block: opaque render elements plus the
/// cacheability that must travel with them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderTree {
    #[serde(flatten)]
    pub elements: Map<String, Value>,
    #[serde(rename = "#cache", default)]
    pub cache: CacheMetadata,
}

impl RenderTree {
    /// Renders nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(elements: Map<String, Value>) -> Self {
        Self {
            elements,
            cache: CacheMetadata::default(),
        }
    }

    /// A single `#markup` element.
    pub fn markup(text: impl Into<String>) -> Self {
        let mut elements = Map::new();
        elements.insert("#markup".to_string(), Value::String(text.into()));
        Self::new(elements)
    }

    #[must_use]
    pub fn with_cache(mut self, cache: CacheMetadata) -> Self {
        self.cache = cache;
        self
    }

    /// No render elements. Cache metadata alone does not make a tree non-empty.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// How the caller is rendering: for visitors, or as an administrative
/// preview (layout editing) where empty output is replaced by a placeholder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    #[default]
    Live,
    Preview,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MaxAge;
    use serde_json::json;

    #[test]
    fn empty_tree_with_cache_is_still_empty() {
        let tree = RenderTree::empty().with_cache(CacheMetadata::uncacheable());
        assert!(tree.is_empty());
    }

    #[test]
    fn serializes_cache_under_hash_key() {
        let tree = RenderTree::markup("hi").with_cache(CacheMetadata::new().with_max_age(MaxAge::Seconds(5)));
        let value = serde_json::to_value(&tree).unwrap();
        assert_eq!(value["#markup"], json!("hi"));
        assert_eq!(value["#cache"]["max_age"], json!(5));
    }
}
