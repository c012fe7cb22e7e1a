//! Cache metadata merging between the proxy and its target.
//!
//! With no target, the parent's value passes through unchanged. With a
//! target, contexts and tags are unioned and max-age takes the more
//! restrictive value.

use crate::target::Target;
use blockproxy_model::{CacheMetadata, InstanceId, MaxAge, RenderTree};
use std::collections::BTreeSet;

pub fn merge_contexts(target: Option<&dyn Target>, parent: BTreeSet<String>) -> BTreeSet<String> {
    match target {
        None => parent,
        Some(target) => {
            let mut merged = parent;
            merged.extend(target.cache_metadata().contexts);
            merged
        }
    }
}

pub fn merge_tags(target: Option<&dyn Target>, parent: BTreeSet<String>) -> BTreeSet<String> {
    match target {
        None => parent,
        Some(target) => {
            let mut merged = parent;
            merged.extend(target.cache_metadata().tags);
            merged
        }
    }
}

pub fn merge_max_age(target: Option<&dyn Target>, parent: MaxAge) -> MaxAge {
    match target {
        None => parent,
        Some(target) => parent.merge(target.cache_metadata().max_age),
    }
}

/// All three merges at once.
pub fn merge_metadata(target: Option<&dyn Target>, parent: &CacheMetadata) -> CacheMetadata {
    CacheMetadata {
        contexts: merge_contexts(target, parent.contexts.clone()),
        tags: merge_tags(target, parent.tags.clone()),
        max_age: merge_max_age(target, parent.max_age),
    }
}

/// Tag that invalidates everything rendered by one proxy instance.
pub fn identity_tag(namespace: &str, instance_id: &InstanceId) -> String {
    format!("{namespace}:{instance_id}")
}

/// Folds extra metadata into a render tree's own.
pub fn bubble(tree: &mut RenderTree, sources: &[&CacheMetadata]) {
    for source in sources {
        tree.cache.merge_in(source);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockproxy_model::RenderTree;

    struct Tagged(CacheMetadata);

    impl Target for Tagged {
        fn plugin_id(&self) -> &str {
            "tagged"
        }

        fn build(&mut self) -> anyhow::Result<RenderTree> {
            Ok(RenderTree::empty())
        }

        fn cache_metadata(&self) -> CacheMetadata {
            self.0.clone()
        }
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn absent_target_passes_parent_through() {
        assert_eq!(merge_tags(None, set(&["a"])), set(&["a"]));
        assert_eq!(merge_contexts(None, set(&["user"])), set(&["user"]));
        assert_eq!(merge_max_age(None, MaxAge::Seconds(9)), MaxAge::Seconds(9));
    }

    #[test]
    fn target_tags_and_contexts_are_unioned() {
        let target = Tagged(
            CacheMetadata::new()
                .with_tags(["node:1", "a"])
                .with_contexts(["route"]),
        );
        assert_eq!(merge_tags(Some(&target), set(&["a"])), set(&["a", "node:1"]));
        assert_eq!(merge_contexts(Some(&target), set(&["user"])), set(&["route", "user"]));
    }

    #[test]
    fn target_max_age_is_more_restrictive() {
        let target = Tagged(CacheMetadata::new().with_max_age(MaxAge::Seconds(60)));
        assert_eq!(merge_max_age(Some(&target), MaxAge::Permanent), MaxAge::Seconds(60));
        assert_eq!(merge_max_age(Some(&target), MaxAge::Seconds(10)), MaxAge::Seconds(10));
        let permanent = Tagged(CacheMetadata::new());
        assert_eq!(merge_max_age(Some(&permanent), MaxAge::Permanent), MaxAge::Permanent);
    }

    #[test]
    fn identity_tag_format() {
        assert_eq!(identity_tag("proxy", &InstanceId::new("sidebar_1")), "proxy:sidebar_1");
    }

    #[test]
    fn bubble_merges_every_source() {
        let mut tree = RenderTree::markup("x").with_cache(CacheMetadata::new().with_tags(["own"]));
        let a = CacheMetadata::new().with_tags(["a"]);
        let b = CacheMetadata::new().with_max_age(MaxAge::ZERO);
        bubble(&mut tree, &[&a, &b]);
        assert_eq!(tree.cache.tags, set(&["a", "own"]));
        assert_eq!(tree.cache.max_age, MaxAge::ZERO);
    }
}
