//! Context mapping: decides which scope context fills which target slot and
//! writes the values into the target.
//!
//! The administrator's explicit mapping always wins when it resolves. Slots
//! left open (never mapped, or mapped to something no longer available) are
//! completed automatically from type-compatible scope contexts. Nothing here
//! fails the render: unresolvable entries and rejected values are reported
//! to diagnostics and skipped.

use crate::collaborators::{ContextApplier, ContextRepository};
use crate::diagnostics::{DiagnosticEvent, Diagnostics};
use crate::settings::ProxySettings;
use crate::target::ContextAware;
use blockproxy_model::{AvailableContexts, ContextDefinition, ContextMapping, ContextValue};
use serde_json::Value;
use std::sync::Arc;

/// Id (and slot name) of the synthesized view-mode context.
pub const VIEW_MODE_CONTEXT: &str = "view_mode";

/// Outcome of mapping one target's slots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingReport {
    /// Slot -> exact id in the available contexts.
    pub resolved: ContextMapping,
    /// Slots filled by automatic completion rather than configuration.
    pub auto_completed: Vec<String>,
    /// Configured `(slot, source)` entries whose source is not available.
    pub dropped: Vec<(String, String)>,
    /// Configured entries for slots the target does not declare.
    pub undeclared: Vec<String>,
    /// Required slots nothing could fill.
    pub unmapped_required: Vec<String>,
    /// Slots whose value was written into the target.
    pub applied: Vec<String>,
    /// Slots whose value the target rejected.
    pub failed: Vec<String>,
}

pub struct ContextMapper {
    repository: Arc<dyn ContextRepository>,
    applier: Arc<dyn ContextApplier>,
    diagnostics: Arc<dyn Diagnostics>,
    settings: Arc<ProxySettings>,
}

impl ContextMapper {
    pub fn new(
        repository: Arc<dyn ContextRepository>,
        applier: Arc<dyn ContextApplier>,
        diagnostics: Arc<dyn Diagnostics>,
        settings: Arc<ProxySettings>,
    ) -> Self {
        Self {
            repository,
            applier,
            diagnostics,
            settings,
        }
    }

    /// Contexts offered by the scope, plus a `view_mode` context when the
    /// scope has none and the shim is enabled.
    pub fn available_contexts(&self) -> AvailableContexts {
        let mut available = self.repository.available_contexts();
        if self.settings.synthesize_view_mode && !self.offers_view_mode(&available) {
            available.insert(
                VIEW_MODE_CONTEXT,
                ContextValue::new("string", Value::String(self.settings.default_view_mode.clone()))
                    .with_label("View mode"),
            );
        }
        available
    }

    fn offers_view_mode(&self, available: &AvailableContexts) -> bool {
        available
            .ids()
            .any(|id| self.short_name(id) == VIEW_MODE_CONTEXT)
    }

    /// Finds the available id a configured source refers to. The
    /// sigil-stripped form is tried first, then the raw source.
    pub fn resolve_source<'a>(&self, source: &str, available: &'a AvailableContexts) -> Option<&'a str> {
        let lookup = |candidate: &str| available.ids().find(|id| *id == candidate);
        self.settings
            .strip_sigil(source)
            .and_then(lookup)
            .or_else(|| lookup(source))
    }

    /// Available ids whose value fits `definition`, in scope order.
    pub fn candidates<'a>(
        &self,
        definition: &ContextDefinition,
        available: &'a AvailableContexts,
    ) -> Vec<&'a str> {
        available
            .iter()
            .filter(|(_, value)| definition.accepts(value))
            .map(|(id, _)| id)
            .collect()
    }

    /// Picks a source for an open slot: the first compatible context in
    /// scope order.
    pub fn auto_source<'a>(
        &self,
        definition: &ContextDefinition,
        available: &'a AvailableContexts,
    ) -> Option<&'a str> {
        self.candidates(definition, available).into_iter().next()
    }

    /// Last `.`/`:` segment of an id with any sigil removed.
    fn short_name<'a>(&self, id: &'a str) -> &'a str {
        let bare = self.settings.strip_sigil(id).unwrap_or(id);
        bare.rsplit(['.', ':']).next().unwrap_or(bare)
    }

    /// Computes the final mapping without touching any target. Definitions
    /// are visited in declaration order, so equal inputs give equal output.
    pub fn plan(
        &self,
        definitions: &[ContextDefinition],
        configured: &ContextMapping,
        available: &AvailableContexts,
    ) -> MappingReport {
        let mut report = MappingReport::default();

        for definition in definitions {
            let name = definition.name.as_str();
            if let Some(source) = configured.get(name).filter(|s| !s.trim().is_empty()) {
                match self.resolve_source(source, available) {
                    Some(id) => {
                        report.resolved.insert(name, id);
                        continue;
                    }
                    None => report.dropped.push((name.to_string(), source.to_string())),
                }
            }

            match self.auto_source(definition, available) {
                Some(id) => {
                    report.resolved.insert(name, id);
                    report.auto_completed.push(name.to_string());
                }
                None if definition.required => report.unmapped_required.push(name.to_string()),
                None => {}
            }
        }

        report.undeclared = configured
            .iter()
            .map(|(slot, _)| slot)
            .filter(|slot| !definitions.iter().any(|d| d.name == *slot))
            .map(str::to_string)
            .collect();

        report
    }

    /// Maps and applies contexts to `target`. Slots are applied one at a
    /// time in declaration order, so one rejected value does not keep the
    /// others out.
    pub fn apply_contexts(
        &self,
        target: &mut dyn ContextAware,
        configured: &ContextMapping,
        target_id: &str,
    ) -> MappingReport {
        let available = self.available_contexts();
        let definitions = target.context_definitions();
        let mut report = self.plan(&definitions, configured, &available);

        for (slot, source) in &report.dropped {
            self.diagnostics.warn(
                DiagnosticEvent::new("map_contexts", format!("configured source '{source}' is not available"))
                    .with_target(target_id)
                    .with_context(slot.clone()),
            );
        }
        for slot in &report.undeclared {
            self.diagnostics.warn(
                DiagnosticEvent::new("map_contexts", "mapping names a slot the target does not declare")
                    .with_target(target_id)
                    .with_context(slot.clone()),
            );
        }
        for slot in &report.unmapped_required {
            self.diagnostics.debug(
                DiagnosticEvent::new("map_contexts", "required context left unmapped")
                    .with_target(target_id)
                    .with_context(slot.clone()),
            );
        }

        let resolved: Vec<(String, String)> = definitions
            .iter()
            .filter_map(|d| {
                report
                    .resolved
                    .get(&d.name)
                    .map(|source| (d.name.clone(), source.to_string()))
            })
            .collect();
        for (slot, source) in resolved {
            let single = ContextMapping::new().with(slot.clone(), source);
            match self.applier.apply(target, &available, &single) {
                Ok(()) => report.applied.push(slot),
                Err(e) => {
                    self.diagnostics.warn(
                        DiagnosticEvent::new("apply_contexts", e.to_string())
                            .with_target(target_id)
                            .with_context(slot.clone()),
                    );
                    report.failed.push(slot);
                }
            }
        }

        report
    }
}
