//! The proxy block itself.
//!
//! A [`ProxyBlock`] is created per request by the host. It owns the
//! persisted [`ProxyConfiguration`], resolves the target lazily, and drives
//! the render pipeline:
//!
//! resolve -> map contexts -> check access -> build -> bubble cache metadata
//!
//! Every failure along the way degrades to empty output (or a placeholder
//! in preview mode) and is reported through [`Diagnostics`]; none is
//! returned to the caller.

use crate::cache;
use crate::collaborators::{
    AccessEvaluator, ContextApplier, ContextRepository, DelegatingAccess, SlotContextApplier,
    StaticContextRepository, TargetRegistry,
};
use crate::context_mapper::ContextMapper;
use crate::diagnostics::{DiagnosticEvent, Diagnostics, TracingDiagnostics};
use crate::error::ProxyError;
use crate::guard;
use crate::resolver::TargetResolver;
use crate::settings::ProxySettings;
use crate::target::Target;
use blockproxy_model::{CacheMetadata, InstanceId, MaxAge, ProxyConfiguration, RenderMode, RenderTree, Viewer};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Shared collaborators, built once and handed to every [`ProxyBlock`].
pub struct ProxyServices {
    registry: Arc<dyn TargetRegistry>,
    access: Arc<dyn AccessEvaluator>,
    diagnostics: Arc<dyn Diagnostics>,
    settings: Arc<ProxySettings>,
    mapper: Arc<ContextMapper>,
}

impl ProxyServices {
    pub fn builder(registry: Arc<dyn TargetRegistry>) -> ProxyServicesBuilder {
        ProxyServicesBuilder {
            registry,
            contexts: Arc::new(StaticContextRepository::empty()),
            applier: Arc::new(SlotContextApplier),
            access: Arc::new(DelegatingAccess),
            diagnostics: Arc::new(TracingDiagnostics),
            settings: ProxySettings::default(),
        }
    }

    pub fn registry(&self) -> &Arc<dyn TargetRegistry> {
        &self.registry
    }

    pub fn settings(&self) -> &ProxySettings {
        &self.settings
    }

    pub fn mapper(&self) -> &Arc<ContextMapper> {
        &self.mapper
    }

    pub fn diagnostics(&self) -> &Arc<dyn Diagnostics> {
        &self.diagnostics
    }
}

impl fmt::Debug for ProxyServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyServices")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

pub struct ProxyServicesBuilder {
    registry: Arc<dyn TargetRegistry>,
    contexts: Arc<dyn ContextRepository>,
    applier: Arc<dyn ContextApplier>,
    access: Arc<dyn AccessEvaluator>,
    diagnostics: Arc<dyn Diagnostics>,
    settings: ProxySettings,
}

impl ProxyServicesBuilder {
    pub fn contexts(mut self, contexts: Arc<dyn ContextRepository>) -> Self {
        self.contexts = contexts;
        self
    }

    pub fn applier(mut self, applier: Arc<dyn ContextApplier>) -> Self {
        self.applier = applier;
        self
    }

    pub fn access(mut self, access: Arc<dyn AccessEvaluator>) -> Self {
        self.access = access;
        self
    }

    pub fn diagnostics(mut self, diagnostics: Arc<dyn Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn settings(mut self, settings: ProxySettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn build(self) -> Arc<ProxyServices> {
        let settings = Arc::new(self.settings);
        let mapper = Arc::new(ContextMapper::new(
            self.contexts,
            self.applier,
            Arc::clone(&self.diagnostics),
            Arc::clone(&settings),
        ));
        Arc::new(ProxyServices {
            registry: self.registry,
            access: self.access,
            diagnostics: self.diagnostics,
            settings,
            mapper,
        })
    }
}

/// Lifecycle position of a proxy instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyState {
    /// Fresh, no target chosen.
    Unconfigured,
    /// Configuration form in progress.
    Configuring,
    /// Configuration settled (possibly "render nothing").
    Ready,
    Rendering,
    AccessDenied,
    RenderFailed,
}

/// What the last [`ProxyBlock::build`] ended with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Rendered,
    /// No target configured.
    NoTarget,
    /// A target is configured but could not be constructed.
    Unavailable,
    AccessDenied,
    RenderFailed,
}

impl RenderOutcome {
    fn placeholder_reason(&self) -> &'static str {
        match self {
            Self::Rendered => "rendered",
            Self::NoTarget => "no target configured",
            Self::Unavailable => "target unavailable",
            Self::AccessDenied => "access denied",
            Self::RenderFailed => "target failed to render",
        }
    }
}

pub struct ProxyBlock {
    pub(crate) instance_id: InstanceId,
    pub(crate) configuration: ProxyConfiguration,
    pub(crate) base_cache: CacheMetadata,
    pub(crate) services: Arc<ProxyServices>,
    pub(crate) resolver: TargetResolver,
    pub(crate) state: ProxyState,
    last_outcome: Option<RenderOutcome>,
}

impl ProxyBlock {
    pub fn new(
        instance_id: InstanceId,
        configuration: ProxyConfiguration,
        services: Arc<ProxyServices>,
    ) -> Self {
        let resolver = TargetResolver::new(
            Arc::clone(&services.registry),
            Arc::clone(&services.mapper),
            Arc::clone(&services.diagnostics),
        );
        let state = if configuration.has_target() {
            ProxyState::Ready
        } else {
            ProxyState::Unconfigured
        };
        Self {
            instance_id,
            configuration,
            base_cache: CacheMetadata::default(),
            services,
            resolver,
            state,
            last_outcome: None,
        }
    }

    /// Sets what the host's base block contributes to cacheability.
    #[must_use]
    pub fn with_base_cache(mut self, base_cache: CacheMetadata) -> Self {
        self.base_cache = base_cache;
        self
    }

    pub fn instance_id(&self) -> &InstanceId {
        &self.instance_id
    }

    pub fn configuration(&self) -> &ProxyConfiguration {
        &self.configuration
    }

    pub fn state(&self) -> ProxyState {
        self.state
    }

    pub fn last_outcome(&self) -> Option<RenderOutcome> {
        self.last_outcome
    }

    /// Replaces the configuration and forgets any resolved target.
    pub fn set_configuration(&mut self, configuration: ProxyConfiguration) {
        self.configuration = configuration;
        self.resolver.reset();
        self.transition(ProxyState::Ready);
    }

    pub fn identity_tag(&self) -> String {
        cache::identity_tag(&self.services.settings.cache_tag_namespace, &self.instance_id)
    }

    /// The proxy's own cacheability: the base block's plus the identity tag.
    pub fn own_cache_metadata(&self) -> CacheMetadata {
        let mut own = self.base_cache.clone();
        own.add_tag(self.identity_tag());
        own
    }

    /// The configured target, resolved on first use.
    pub fn target(&mut self) -> Option<&mut dyn Target> {
        self.resolver.resolve(&self.configuration)
    }

    /// Label for administrative listings: the target's label when it
    /// resolves, the placeholder label otherwise.
    pub fn admin_label(&mut self) -> String {
        let fallback = self.services.settings.placeholder_label.clone();
        match self.resolver.resolve(&self.configuration) {
            Some(target) => guard::contain(|| target.label()).unwrap_or(fallback),
            None => fallback,
        }
    }

    pub fn cache_contexts(&mut self) -> BTreeSet<String> {
        self.cache_metadata().contexts
    }

    pub fn cache_tags(&mut self) -> BTreeSet<String> {
        self.cache_metadata().tags
    }

    pub fn cache_max_age(&mut self) -> MaxAge {
        self.cache_metadata().max_age
    }

    /// Pre-render cacheability: the proxy's own merged with the target's.
    /// Resolves the target if needed but never builds it.
    pub fn cache_metadata(&mut self) -> CacheMetadata {
        let own = self.own_cache_metadata();
        let diagnostics = Arc::clone(&self.services.diagnostics);
        let target_id = self.configuration.target_id().map(str::to_string);
        let target = self.resolver.resolve(&self.configuration);
        match guard::contain(|| cache::merge_metadata(target.as_deref(), &own)) {
            Ok(merged) => merged,
            Err(message) => {
                let mut event = DiagnosticEvent::new("cache_metadata", message);
                if let Some(id) = target_id {
                    event = event.with_target(id);
                }
                diagnostics.warn(event);
                own.merged(&CacheMetadata::uncacheable())
            }
        }
    }

    /// Renders the target in place of this block.
    pub fn build(&mut self, viewer: &Viewer, mode: RenderMode) -> RenderTree {
        let settled = if self.state == ProxyState::Unconfigured && !self.configuration.has_target() {
            ProxyState::Unconfigured
        } else {
            ProxyState::Ready
        };
        self.transition(ProxyState::Rendering);

        let own = self.own_cache_metadata();
        let (outcome, tree) = self.render(viewer, &own);
        match outcome {
            RenderOutcome::AccessDenied => self.transition(ProxyState::AccessDenied),
            RenderOutcome::RenderFailed => self.transition(ProxyState::RenderFailed),
            _ => {}
        }
        self.transition(settled);
        self.last_outcome = Some(outcome);

        match mode {
            RenderMode::Preview if outcome != RenderOutcome::Rendered => self.placeholder(outcome, tree.cache),
            _ => tree,
        }
    }

    fn render(&mut self, viewer: &Viewer, own: &CacheMetadata) -> (RenderOutcome, RenderTree) {
        let services = Arc::clone(&self.services);
        let Some(target_id) = self.configuration.target_id().map(str::to_string) else {
            return (RenderOutcome::NoTarget, RenderTree::empty().with_cache(own.clone()));
        };
        let Some(target) = self.resolver.resolve(&self.configuration) else {
            return (RenderOutcome::Unavailable, RenderTree::empty().with_cache(own.clone()));
        };

        let failed = |operation: &'static str, message: String| {
            let err = ProxyError::Render {
                target_id: target_id.clone(),
                message,
            };
            services
                .diagnostics
                .error(DiagnosticEvent::new(operation, err.to_string()).with_target(target_id.clone()));
            (
                RenderOutcome::RenderFailed,
                RenderTree::empty().with_cache(own.merged(&CacheMetadata::uncacheable())),
            )
        };

        let access = match guard::contain(|| services.access.check(&*target, viewer)) {
            Ok(access) => access,
            Err(message) => return failed("access", message),
        };
        if !access.is_allowed() {
            services.diagnostics.debug(
                DiagnosticEvent::new(
                    "access",
                    access.reason.clone().unwrap_or_else(|| "denied".to_string()),
                )
                .with_target(target_id.clone()),
            );
            return (
                RenderOutcome::AccessDenied,
                RenderTree::empty().with_cache(access.cache.merged(own)),
            );
        }

        let mut tree = match guard::contain(|| target.build()) {
            Ok(Ok(tree)) => tree,
            Ok(Err(e)) => return failed("build", format!("{e:#}")),
            Err(message) => return failed("build", message),
        };

        match guard::contain(|| cache::merge_metadata(Some(&*target), &tree.cache)) {
            Ok(merged) => tree.cache = merged,
            Err(message) => return failed("cache_metadata", message),
        }
        cache::bubble(&mut tree, &[own, &access.cache]);
        (RenderOutcome::Rendered, tree)
    }

    fn placeholder(&self, outcome: RenderOutcome, cache: CacheMetadata) -> RenderTree {
        let text = format!(
            "{}: {}",
            self.services.settings.placeholder_label,
            outcome.placeholder_reason()
        );
        RenderTree::markup(text).with_cache(cache.merged(&CacheMetadata::uncacheable()))
    }

    pub(crate) fn transition(&mut self, next: ProxyState) {
        if self.state != next {
            debug!(instance = %self.instance_id, from = ?self.state, to = ?next, "proxy state change");
            self.state = next;
        }
    }
}

impl fmt::Debug for ProxyBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyBlock")
            .field("instance_id", &self.instance_id)
            .field("configuration", &self.configuration)
            .field("state", &self.state)
            .field("last_outcome", &self.last_outcome)
            .finish_non_exhaustive()
    }
}
