//! Configuration form lifecycle: build, validate, submit.
//!
//! The form engine itself belongs to the host; this module only describes
//! what the form contains and turns submitted values into a fresh
//! [`ProxyConfiguration`]. Each step builds its own target instance from the
//! values in hand, so the memoized render target is never touched.

use crate::controller::{ProxyBlock, ProxyState};
use crate::diagnostics::DiagnosticEvent;
use crate::error::{ProxyError, ProxyResult};
use crate::target::{FieldError, Target};
use blockproxy_model::{AvailableContexts, ContextMapping, ProxyConfiguration};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A selectable target in the form's dropdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetOption {
    pub id: String,
    pub label: String,
    pub category: String,
}

/// A scope context offered for one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSourceOption {
    pub id: String,
    pub label: String,
}

/// The mapping widget for one declared context slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSlotField {
    pub name: String,
    pub label: String,
    pub data_type: String,
    pub required: bool,
    pub options: Vec<ContextSourceOption>,
    /// Preselected source: the configured one when it still resolves,
    /// otherwise the automatic choice.
    pub default_value: Option<String>,
}

/// Everything the host needs to render the configuration form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProxyForm {
    pub target_options: Vec<TargetOption>,
    pub selected: Option<String>,
    /// The selected target's own settings sub-form, when it is configurable.
    pub target_settings_form: Option<Value>,
    pub context_slots: Vec<ContextSlotField>,
    /// Set when the selected target cannot be built.
    pub target_error: Option<String>,
}

/// Values submitted from the form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProxyFormValues {
    #[serde(default)]
    pub target_id: Option<String>,
    #[serde(default)]
    pub target_settings: Map<String, Value>,
    #[serde(default)]
    pub context_mapping: ContextMapping,
}

impl ProxyFormValues {
    pub fn for_target(target_id: impl Into<String>) -> Self {
        Self {
            target_id: Some(target_id.into()),
            ..Self::default()
        }
    }

    /// Reads values as posted by the host's form engine.
    pub fn from_value(value: Value) -> ProxyResult<Self> {
        Ok(serde_json::from_value(value)?)
    }

    fn selected_id(&self) -> Option<&str> {
        self.target_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// Settings blob handed to the registry: settings plus explicit mapping.
    fn target_config(&self) -> Map<String, Value> {
        ProxyConfiguration::new(self.target_id.clone(), self.target_settings.clone())
            .with_context_mapping(&self.context_mapping.clone().without_blank())
            .target_config()
            .clone()
    }
}

impl ProxyBlock {
    /// Builds the configuration form. `selected` is the id picked through
    /// the form's live update, if it differs from the persisted one.
    pub fn build_form(&mut self, selected: Option<&str>) -> ProxyForm {
        self.transition(ProxyState::Configuring);

        let settings = self.services.settings();
        let mut target_options: Vec<TargetOption> = self
            .services
            .registry()
            .definitions()
            .into_iter()
            .filter(|d| settings.is_selectable(&d.id))
            .map(|d| TargetOption {
                id: d.id,
                label: d.label,
                category: d.category,
            })
            .collect();
        target_options.sort_by(|a, b| (&a.category, &a.label).cmp(&(&b.category, &b.label)));

        let selected = selected
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .or(self.configuration.target_id())
            .map(str::to_string);

        let mut form = ProxyForm {
            target_options,
            selected: selected.clone(),
            ..ProxyForm::default()
        };
        let Some(target_id) = selected else {
            return form;
        };

        // Settings only carry over when the selection is the persisted target.
        let target_config = if self.configuration.target_id() == Some(target_id.as_str()) {
            self.configuration.target_config().clone()
        } else {
            Map::new()
        };

        match self.resolver.instantiate(&target_id, &target_config) {
            Ok(target) => {
                form.target_settings_form = target.as_configurable().map(|c| c.configuration_form());
                let configured = ContextMapping::from_settings(&target_config);
                form.context_slots = self.context_slot_fields(&*target, &configured);
            }
            Err(e) => {
                self.services.diagnostics().info(
                    DiagnosticEvent::new("build_form", e.to_string()).with_target(target_id.clone()),
                );
                form.target_error = Some(format!("The block '{target_id}' is not available."));
            }
        }
        form
    }

    fn context_slot_fields(&self, target: &dyn Target, configured: &ContextMapping) -> Vec<ContextSlotField> {
        let Some(aware) = target.as_context_aware() else {
            return Vec::new();
        };
        let mapper = self.services.mapper();
        let available: AvailableContexts = mapper.available_contexts();

        aware
            .context_definitions()
            .into_iter()
            .map(|definition| {
                let options = mapper
                    .candidates(&definition, &available)
                    .into_iter()
                    .map(|id| ContextSourceOption {
                        id: id.to_string(),
                        label: available
                            .get(id)
                            .and_then(|v| v.label.clone())
                            .unwrap_or_else(|| id.to_string()),
                    })
                    .collect();
                let default_value = configured
                    .get(&definition.name)
                    .and_then(|source| mapper.resolve_source(source, &available))
                    .or_else(|| mapper.auto_source(&definition, &available))
                    .map(str::to_string);
                ContextSlotField {
                    label: definition.display_label().to_string(),
                    name: definition.name,
                    data_type: definition.data_type,
                    required: definition.required,
                    options,
                    default_value,
                }
            })
            .collect()
    }

    /// Checks submitted values. The selected target must still construct
    /// and its own settings must validate.
    pub fn validate_form(&mut self, values: &ProxyFormValues) -> Result<(), Vec<FieldError>> {
        self.transition(ProxyState::Configuring);

        let Some(target_id) = values.selected_id() else {
            return Ok(());
        };
        if !self.services.settings().is_selectable(target_id) {
            return Err(vec![FieldError::new(
                "target_id",
                format!("The block '{target_id}' cannot be used as a target."),
            )]);
        }

        let target = self
            .resolver
            .instantiate(target_id, &values.target_config())
            .map_err(|e| vec![FieldError::new("target_id", e.to_string())])?;

        let errors: Vec<FieldError> = target
            .as_configurable()
            .map(|c| c.validate_configuration(&values.target_settings))
            .unwrap_or_default()
            .into_iter()
            .map(|e| e.nested_under("target_settings"))
            .collect();

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// Produces the configuration to persist. The target's settings are
    /// round-tripped through the target so defaults and computed values are
    /// captured; the stored mapping is the resolved one.
    pub fn submit_form(&mut self, values: &ProxyFormValues) -> ProxyResult<ProxyConfiguration> {
        let Some(target_id) = values.selected_id() else {
            self.transition(ProxyState::Ready);
            return Ok(ProxyConfiguration::unconfigured());
        };
        if !self.services.settings().is_selectable(target_id) {
            return Err(ProxyError::TargetNotFound(target_id.to_string()));
        }

        let mut target = self.resolver.instantiate(target_id, &values.target_config())?;

        let settings = match target.as_configurable_mut() {
            Some(configurable) => {
                configurable.submit_configuration(values.target_settings.clone());
                configurable.configuration()
            }
            None => Map::new(),
        };

        let mapping = match target.as_context_aware() {
            Some(aware) => {
                let mapper = self.services.mapper();
                let available = mapper.available_contexts();
                mapper
                    .plan(
                        &aware.context_definitions(),
                        &values.context_mapping.clone().without_blank(),
                        &available,
                    )
                    .resolved
            }
            None => ContextMapping::new(),
        };

        self.transition(ProxyState::Ready);
        Ok(ProxyConfiguration::new(Some(target_id.to_string()), settings).with_context_mapping(&mapping))
    }
}
