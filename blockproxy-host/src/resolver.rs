//! Target resolution.
//!
//! Turns the `{target_id, target_config}` pair into a live target with its
//! contexts applied. The configured target is built at most once per
//! resolver; construction failures are reported and memoized as "no target"
//! rather than returned.

use crate::collaborators::TargetRegistry;
use crate::context_mapper::{ContextMapper, MappingReport};
use crate::diagnostics::{DiagnosticEvent, Diagnostics};
use crate::error::{ProxyError, ProxyResult};
use crate::guard;
use crate::target::Target;
use blockproxy_model::{ContextMapping, ProxyConfiguration};
use serde_json::{Map, Value};
use std::sync::Arc;

enum Slot {
    Unresolved,
    /// No target configured.
    Absent,
    Failed,
    Resolved(Box<dyn Target>),
}

pub struct TargetResolver {
    registry: Arc<dyn TargetRegistry>,
    mapper: Arc<ContextMapper>,
    diagnostics: Arc<dyn Diagnostics>,
    slot: Slot,
    last_mapping: Option<MappingReport>,
}

impl TargetResolver {
    pub fn new(
        registry: Arc<dyn TargetRegistry>,
        mapper: Arc<ContextMapper>,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Self {
        Self {
            registry,
            mapper,
            diagnostics,
            slot: Slot::Unresolved,
            last_mapping: None,
        }
    }

    /// The configured target, built on first call and reused afterwards.
    /// `None` when nothing is configured or construction failed.
    pub fn resolve(&mut self, configuration: &ProxyConfiguration) -> Option<&mut dyn Target> {
        if matches!(self.slot, Slot::Unresolved) {
            self.slot = match configuration.target_id() {
                None => Slot::Absent,
                Some(target_id) => match self.create(target_id, configuration.target_config()) {
                    Ok((target, mapping)) => {
                        self.last_mapping = mapping;
                        Slot::Resolved(target)
                    }
                    Err(e) => {
                        self.diagnostics.warn(
                            DiagnosticEvent::new(e.operation(), e.to_string()).with_target(target_id),
                        );
                        Slot::Failed
                    }
                },
            };
        }

        match &mut self.slot {
            Slot::Resolved(target) => Some(target.as_mut()),
            _ => None,
        }
    }

    /// The memoized target, without attempting resolution.
    pub fn resolved(&self) -> Option<&dyn Target> {
        match &self.slot {
            Slot::Resolved(target) => Some(target.as_ref()),
            _ => None,
        }
    }

    /// Whether resolution has been attempted (successfully or not).
    pub fn is_settled(&self) -> bool {
        !matches!(self.slot, Slot::Unresolved)
    }

    pub fn has_failed(&self) -> bool {
        matches!(self.slot, Slot::Failed)
    }

    /// Mapping report of the memoized target, when it is context-aware.
    pub fn mapping_report(&self) -> Option<&MappingReport> {
        self.last_mapping.as_ref()
    }

    /// Drops the memoized target so the next [`TargetResolver::resolve`]
    /// builds afresh.
    pub fn reset(&mut self) {
        self.slot = Slot::Unresolved;
        self.last_mapping = None;
    }

    /// Builds a target outside the memo, for the configuration form where
    /// the selected id may differ from the persisted one. Errors are
    /// returned, not logged.
    pub fn instantiate(&self, target_id: &str, target_config: &Map<String, Value>) -> ProxyResult<Box<dyn Target>> {
        self.create(target_id, target_config).map(|(target, _)| target)
    }

    fn create(
        &self,
        target_id: &str,
        target_config: &Map<String, Value>,
    ) -> ProxyResult<(Box<dyn Target>, Option<MappingReport>)> {
        let registry = &self.registry;
        let mut target = guard::contain(|| registry.create(target_id, target_config)).map_err(|message| {
            ProxyError::TargetConstruction {
                target_id: target_id.to_string(),
                message,
            }
        })??;

        // Contexts go in before anything can read them (access, build).
        let mapping = match target.as_context_aware_mut() {
            Some(aware) => {
                let configured = ContextMapping::from_settings(target_config);
                match guard::contain(|| self.mapper.apply_contexts(aware, &configured, target_id)) {
                    Ok(report) => Some(report),
                    Err(message) => {
                        self.diagnostics.warn(
                            DiagnosticEvent::new("apply_contexts", message).with_target(target_id),
                        );
                        None
                    }
                }
            }
            None => None,
        };

        self.diagnostics.debug(
            DiagnosticEvent::new("resolve", format!("resolved with capabilities {}", target.capabilities()))
                .with_target(target_id),
        );
        Ok((target, mapping))
    }
}
