//! Host side of the proxy block.
//!
//! A proxy block is a configurable placeholder that renders another block
//! (its target) in its place. This crate resolves the target from a
//! persisted [`ProxyConfiguration`](blockproxy_model::ProxyConfiguration),
//! maps scope contexts into it, checks access, builds it and merges its
//! cache metadata with the proxy's own.
//!
//! The host framework is reached only through the traits in
//! [`collaborators`]: a [`TargetRegistry`], a [`ContextRepository`], a
//! [`ContextApplier`] and an [`AccessEvaluator`]. Nothing a target does,
//! including panicking, aborts the surrounding render.

pub mod cache;
pub mod collaborators;
mod context_mapper;
mod controller;
mod diagnostics;
mod error;
mod form;
mod guard;
mod resolver;
mod settings;
mod target;

pub use collaborators::{
    AccessEvaluator, ContextApplier, ContextRepository, DelegatingAccess, SlotContextApplier,
    StaticContextRepository, StaticTargetRegistry, TargetDefinition, TargetFactory, TargetRegistry,
};
pub use context_mapper::{ContextMapper, MappingReport, VIEW_MODE_CONTEXT};
pub use controller::{ProxyBlock, ProxyServices, ProxyServicesBuilder, ProxyState, RenderOutcome};
pub use diagnostics::{DiagnosticEvent, Diagnostics, Level, RecordingDiagnostics, TracingDiagnostics};
pub use error::{ProxyError, ProxyResult};
pub use form::{ContextSlotField, ContextSourceOption, ProxyForm, ProxyFormValues, TargetOption};
pub use resolver::TargetResolver;
pub use settings::{ProxySettings, default_settings_path};
pub use target::{Capability, CapabilitySet, Configurable, ContextAware, ContextSlots, FieldError, Target};
