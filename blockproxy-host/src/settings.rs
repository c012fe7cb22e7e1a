//! Site-wide proxy settings, read from a `proxy.toml` file.
//!
//! A missing file or a file that fails to parse never prevents rendering:
//! both fall back to the defaults with a log line.

use crate::error::{ProxyError, ProxyResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Tunables shared by every proxy instance on a site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProxySettings {
    /// Prefix of the identity cache tag (`<namespace>:<instance_id>`).
    #[serde(default = "default_namespace")]
    pub cache_tag_namespace: String,
    /// Leading marker on source ids that name a scope context.
    #[serde(default = "default_sigil")]
    pub context_sigil: String,
    /// Value of the synthesized `view_mode` context.
    #[serde(default = "default_view_mode")]
    pub default_view_mode: String,
    /// Whether to offer a `view_mode` context when the scope has none.
    #[serde(default = "default_true")]
    pub synthesize_view_mode: bool,
    /// The proxy's own plugin id, never offered as a target.
    #[serde(default = "default_self_plugin_id")]
    pub self_plugin_id: String,
    /// Further plugin ids hidden from the target list.
    #[serde(default = "default_hidden_targets")]
    pub hidden_targets: Vec<String>,
    /// Label shown in preview placeholders.
    #[serde(default = "default_placeholder_label")]
    pub placeholder_label: String,
}

fn default_namespace() -> String {
    "proxy".to_string()
}

fn default_sigil() -> String {
    "@".to_string()
}

fn default_view_mode() -> String {
    "default".to_string()
}

fn default_true() -> bool {
    true
}

fn default_self_plugin_id() -> String {
    "proxy_block".to_string()
}

fn default_hidden_targets() -> Vec<String> {
    vec!["broken".to_string()]
}

fn default_placeholder_label() -> String {
    "Proxy block".to_string()
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            cache_tag_namespace: default_namespace(),
            context_sigil: default_sigil(),
            default_view_mode: default_view_mode(),
            synthesize_view_mode: true,
            self_plugin_id: default_self_plugin_id(),
            hidden_targets: default_hidden_targets(),
            placeholder_label: default_placeholder_label(),
        }
    }
}

/// Raw TOML structure: everything lives under a `[proxy]` table.
#[derive(Deserialize)]
struct SettingsFile {
    #[serde(default)]
    proxy: Option<ProxySettings>,
}

impl ProxySettings {
    /// Loads settings from `path`, falling back to defaults when the file is
    /// missing or unreadable.
    pub fn load_from(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!("No proxy settings at {:?}, using defaults", path);
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(contents) => match Self::from_toml(&contents) {
                Ok(settings) => {
                    info!("Loaded proxy settings from {:?}", path);
                    settings
                }
                Err(e) => {
                    warn!("Failed to parse proxy settings {:?}: {}. Using defaults.", path, e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read proxy settings {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Parses and validates a settings document.
    pub fn from_toml(contents: &str) -> ProxyResult<Self> {
        let file: SettingsFile =
            toml::from_str(contents).map_err(|e| ProxyError::InvalidSettings(e.to_string()))?;
        let settings = file.proxy.unwrap_or_default();
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> ProxyResult<()> {
        if self.cache_tag_namespace.trim().is_empty() {
            return Err(ProxyError::InvalidSettings(
                "cache-tag-namespace must not be empty".to_string(),
            ));
        }
        if self.cache_tag_namespace.contains(':') {
            return Err(ProxyError::InvalidSettings(format!(
                "cache-tag-namespace '{}' must not contain ':'",
                self.cache_tag_namespace
            )));
        }
        if self.context_sigil.chars().any(char::is_alphanumeric) {
            return Err(ProxyError::InvalidSettings(format!(
                "context-sigil '{}' must not contain alphanumerics",
                self.context_sigil
            )));
        }
        Ok(())
    }

    /// Whether `plugin_id` may be offered as a target.
    pub fn is_selectable(&self, plugin_id: &str) -> bool {
        plugin_id != self.self_plugin_id && !self.hidden_targets.iter().any(|h| h == plugin_id)
    }

    /// Removes the sigil from a source id, if present.
    pub fn strip_sigil<'a>(&self, source: &'a str) -> Option<&'a str> {
        if self.context_sigil.is_empty() {
            return None;
        }
        source.strip_prefix(self.context_sigil.as_str())
    }
}

/// Default settings path: `$BLOCKPROXY_SETTINGS`, else `./proxy.toml`.
pub fn default_settings_path() -> PathBuf {
    std::env::var_os("BLOCKPROXY_SETTINGS")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("proxy.toml"))
}
