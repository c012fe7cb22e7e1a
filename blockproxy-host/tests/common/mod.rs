//! Shared fixtures for proxy block integration tests.

#![allow(dead_code)]

use blockproxy_host::*;
use blockproxy_model::{
    AccessResult, AvailableContexts, CacheMetadata, ContextDefinition, ContextValue, InstanceId,
    MaxAge, ProxyConfiguration, RenderTree, Viewer,
};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Installs a test subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Counts how often a target was constructed and built.
#[derive(Debug, Default)]
pub struct Counters {
    pub creates: AtomicUsize,
    pub builds: AtomicUsize,
}

impl Counters {
    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Render,
    Fail,
    Panic,
}

/// A plain target with fixed markup and cacheability.
pub struct TextBlock {
    pub id: String,
    pub text: String,
    pub cache: CacheMetadata,
    pub access: AccessResult,
    pub behavior: Behavior,
    pub counters: Arc<Counters>,
}

impl TextBlock {
    pub fn new(id: &str, text: &str, counters: Arc<Counters>) -> Self {
        Self {
            id: id.to_string(),
            text: text.to_string(),
            cache: CacheMetadata::new(),
            access: AccessResult::allowed(),
            behavior: Behavior::Render,
            counters,
        }
    }
}

impl Target for TextBlock {
    fn plugin_id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> String {
        format!("Text: {}", self.text)
    }

    fn access(&self, _viewer: &Viewer) -> AccessResult {
        self.access.clone()
    }

    fn build(&mut self) -> anyhow::Result<RenderTree> {
        self.counters.builds.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Behavior::Render => Ok(RenderTree::markup(self.text.clone())
                .with_cache(CacheMetadata::new().with_tags(["build:text"]))),
            Behavior::Fail => anyhow::bail!("database went away"),
            Behavior::Panic => panic!("target exploded"),
        }
    }

    fn cache_metadata(&self) -> CacheMetadata {
        self.cache.clone()
    }
}

/// A configurable, context-aware target showing a node in a view mode.
pub struct NodeBlock {
    settings: Map<String, Value>,
    slots: ContextSlots,
    counters: Arc<Counters>,
}

impl NodeBlock {
    pub fn new(settings: &Map<String, Value>, counters: Arc<Counters>) -> Self {
        let mut block = Self {
            settings: Map::new(),
            slots: ContextSlots::new(vec![
                ContextDefinition::new("node", "entity:node").with_label("Content"),
                ContextDefinition::new("view_mode", "string").optional(),
            ]),
            counters,
        };
        block.set_configuration(settings.clone());
        block
    }

    pub fn nid(&self) -> Option<u64> {
        self.slots.get("node").and_then(|v| v.value["nid"].as_u64())
    }
}

impl Target for NodeBlock {
    fn plugin_id(&self) -> &str {
        "node_view"
    }

    fn build(&mut self) -> anyhow::Result<RenderTree> {
        self.counters.builds.fetch_add(1, Ordering::SeqCst);
        let nid = self
            .nid()
            .ok_or_else(|| anyhow::anyhow!("no node in context"))?;
        let view_mode = self
            .slots
            .get("view_mode")
            .and_then(|v| v.value.as_str())
            .unwrap_or("none");
        let title = self.settings.get("title").and_then(Value::as_str).unwrap_or_default();
        Ok(RenderTree::markup(format!("{title}: node {nid} ({view_mode})")))
    }

    fn cache_metadata(&self) -> CacheMetadata {
        self.slots.cache_metadata()
    }

    fn as_configurable(&self) -> Option<&dyn Configurable> {
        Some(self)
    }

    fn as_configurable_mut(&mut self) -> Option<&mut dyn Configurable> {
        Some(self)
    }

    fn as_context_aware(&self) -> Option<&dyn ContextAware> {
        Some(self)
    }

    fn as_context_aware_mut(&mut self) -> Option<&mut dyn ContextAware> {
        Some(self)
    }
}

impl Configurable for NodeBlock {
    fn configuration(&self) -> Map<String, Value> {
        self.settings.clone()
    }

    fn set_configuration(&mut self, configuration: Map<String, Value>) {
        let mut settings = self.default_configuration();
        settings.extend(configuration);
        settings.remove(blockproxy_model::CONTEXT_MAPPING_KEY);
        self.settings = settings;
    }

    fn default_configuration(&self) -> Map<String, Value> {
        let mut defaults = Map::new();
        defaults.insert("title".to_string(), json!("Untitled"));
        defaults
    }

    fn configuration_form(&self) -> Value {
        json!({ "title": { "type": "textfield", "default": self.settings.get("title") } })
    }

    fn validate_configuration(&self, values: &Map<String, Value>) -> Vec<FieldError> {
        match values.get("title") {
            Some(Value::String(title)) if title.trim().is_empty() => {
                vec![FieldError::new("title", "must not be empty")]
            }
            Some(Value::String(_)) | None => Vec::new(),
            Some(_) => vec![FieldError::new("title", "must be text")],
        }
    }
}

impl ContextAware for NodeBlock {
    fn context_definitions(&self) -> Vec<ContextDefinition> {
        self.slots.definitions().to_vec()
    }

    fn set_context_value(&mut self, name: &str, value: ContextValue) -> ProxyResult<()> {
        self.slots.set(name, value)
    }

    fn context_value(&self, name: &str) -> Option<&ContextValue> {
        self.slots.get(name)
    }
}

/// Registry wrapper counting `create` calls.
pub struct CountingRegistry {
    inner: StaticTargetRegistry,
    pub counters: Arc<Counters>,
}

impl TargetRegistry for CountingRegistry {
    fn definitions(&self) -> Vec<TargetDefinition> {
        self.inner.definitions()
    }

    fn create(&self, target_id: &str, configuration: &Map<String, Value>) -> ProxyResult<Box<dyn Target>> {
        self.counters.creates.fetch_add(1, Ordering::SeqCst);
        self.inner.create(target_id, configuration)
    }
}

/// The registry every test starts from.
pub fn registry(counters: Arc<Counters>) -> CountingRegistry {
    let mut inner = StaticTargetRegistry::new();

    let c = Arc::clone(&counters);
    inner.register(
        TargetDefinition::new("static_text", "Static text").in_category("Content"),
        move |settings| {
            let text = settings.get("text").and_then(Value::as_str).unwrap_or("hello");
            let mut block = TextBlock::new("static_text", text, Arc::clone(&c));
            block.cache = CacheMetadata::new()
                .with_tags(["config:text"])
                .with_contexts(["languages"])
                .with_max_age(MaxAge::Seconds(300));
            Ok(Box::new(block) as Box<dyn Target>)
        },
    );

    let c = Arc::clone(&counters);
    inner.register(
        TargetDefinition::new("node_view", "Node view").in_category("Content"),
        move |settings| Ok(Box::new(NodeBlock::new(settings, Arc::clone(&c))) as Box<dyn Target>),
    );

    let c = Arc::clone(&counters);
    inner.register(
        TargetDefinition::new("members_only", "Members only").in_category("Access"),
        move |_| {
            let mut block = TextBlock::new("members_only", "secret", Arc::clone(&c));
            block.access = AccessResult::forbidden("members only").with_cache(
                CacheMetadata::new()
                    .with_contexts(["user.roles"])
                    .with_max_age(MaxAge::ZERO),
            );
            Ok(Box::new(block) as Box<dyn Target>)
        },
    );

    for (id, label, behavior) in [
        ("exploding", "Exploding", Behavior::Fail),
        ("panicking", "Panicking", Behavior::Panic),
    ] {
        let c = Arc::clone(&counters);
        inner.register(
            TargetDefinition::new(id, label).in_category("Broken"),
            move |_| {
                let mut block = TextBlock::new(id, "never", Arc::clone(&c));
                block.cache = CacheMetadata::new().with_tags([format!("{id}:tag")]);
                block.behavior = behavior;
                Ok(Box::new(block) as Box<dyn Target>)
            },
        );
    }

    inner.register(
        TargetDefinition::new("unbuildable", "Unbuildable").in_category("Broken"),
        |_| Err(anyhow::anyhow!("missing required setting 'source'")),
    );
    inner.register(
        TargetDefinition::new("broken", "Broken/missing").in_category("Broken"),
        |_| Err(anyhow::anyhow!("broken")),
    );
    let c = Arc::clone(&counters);
    inner.register(
        TargetDefinition::new("proxy_block", "Proxy block").in_category("Utility"),
        move |_| Ok(Box::new(TextBlock::new("proxy_block", "self", Arc::clone(&c))) as Box<dyn Target>),
    );

    CountingRegistry { inner, counters }
}

pub fn route_node(nid: u64) -> ContextValue {
    ContextValue::new("entity:node", json!({ "nid": nid }))
        .with_label(format!("Node from URL ({nid})"))
        .with_cache(
            CacheMetadata::new()
                .with_tags([format!("node:{nid}")])
                .with_contexts(["route"]),
        )
}

/// Contexts offered by a typical node page.
pub fn node_page_contexts() -> AvailableContexts {
    AvailableContexts::new()
        .with(
            "@user.current_user_context:current_user",
            ContextValue::new("entity:user", json!({ "uid": 1 })),
        )
        .with("@node.node_route_context:node", route_node(7))
}

pub struct Fixture {
    pub counters: Arc<Counters>,
    pub diagnostics: Arc<RecordingDiagnostics>,
    pub services: Arc<ProxyServices>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_contexts(node_page_contexts())
    }

    pub fn with_contexts(contexts: AvailableContexts) -> Self {
        init_tracing();
        let counters = Arc::new(Counters::default());
        let diagnostics = Arc::new(RecordingDiagnostics::forwarding_to(TracingDiagnostics));
        let services = ProxyServices::builder(Arc::new(registry(Arc::clone(&counters))))
            .contexts(Arc::new(StaticContextRepository::new(contexts)))
            .diagnostics(Arc::clone(&diagnostics) as Arc<dyn Diagnostics>)
            .build();
        Self {
            counters,
            diagnostics,
            services,
        }
    }

    pub fn block(&self, configuration: ProxyConfiguration) -> ProxyBlock {
        ProxyBlock::new(
            InstanceId::new("sidebar_proxy"),
            configuration,
            Arc::clone(&self.services),
        )
    }

    pub fn warnings(&self) -> usize {
        self.diagnostics.count(Level::Warn)
    }

    pub fn errors(&self) -> usize {
        self.diagnostics.count(Level::Error)
    }
}

pub fn tags(items: &[&str]) -> std::collections::BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}
