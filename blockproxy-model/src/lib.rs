//! Data model for block proxies.
//!
//! Defines the plain values exchanged between a proxy, its target and the
//! host framework:
//! - [`CacheMetadata`] / [`MaxAge`]: cache contexts, tags and lifetime
//! - [`ContextDefinition`], [`ContextValue`], [`AvailableContexts`],
//!   [`ContextMapping`]: what a target needs and what the scope offers
//! - [`ProxyConfiguration`]: the persisted target choice and its settings
//! - [`RenderTree`] / [`RenderMode`]: render output and how it is requested
//! - [`AccessResult`] / [`Viewer`]: access decisions and who they are for
//!
//! These types carry no behaviour beyond normalization and merging; the
//! resolution and rendering logic lives in `blockproxy-host`.

mod access;
mod cache;
mod config;
mod context;
mod render;

pub use access::{AccessResult, Viewer};
pub use cache::{CacheMetadata, MaxAge};
pub use config::{CONTEXT_MAPPING_KEY, InstanceId, ProxyConfiguration};
pub use context::{ANY_TYPE, AvailableContexts, ContextDefinition, ContextMapping, ContextValue};
pub use render::{RenderMode, RenderTree};
