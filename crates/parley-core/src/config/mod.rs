mod defaults;
mod onboarding;
mod prompts;
mod providers;

#[cfg(test)]
mod tests;

pub use onboarding::*;
pub use prompts::*;
pub use providers::*;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ParleyError;
use crate::model::{normalize_handle, MemoryScope, MergePolicy};
use defaults::*;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub parley: ParleyConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub onboarding: OnboardingConfig,
}

/// General agent settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParleyConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Handles the agent itself sends from. Inbound messages from these are
    /// persisted but never answered.
    #[serde(default)]
    pub agent_handles: Vec<String>,
}

impl Default for ParleyConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            agent_handles: Vec::new(),
        }
    }
}

impl ParleyConfig {
    /// Whether `handle` is one of the configured agent handles.
    pub fn is_agent_handle(&self, handle: &str) -> bool {
        let normalized = normalize_handle(handle);
        !normalized.is_empty()
            && self
                .agent_handles
                .iter()
                .any(|h| normalize_handle(h) == normalized)
    }
}

/// A memory field the enrichment task is allowed to fill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryFieldConfig {
    pub id: String,
    #[serde(default)]
    pub description: String,
    /// Declared merge policy. Undeclared fields use the naming heuristic.
    #[serde(default)]
    pub policy: Option<MergePolicy>,
    #[serde(default = "default_memory_scope")]
    pub scope: MemoryScope,
}

fn default_memory_scope() -> MemoryScope {
    MemoryScope::User
}

/// Memory config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default = "default_max_context")]
    pub max_context_messages: usize,
    /// Messages kept per thread in the ephemeral cache.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Threads kept in the ephemeral cache before the oldest is evicted.
    #[serde(default = "default_cache_max_threads")]
    pub cache_max_threads: usize,
    #[serde(default)]
    pub fields: Vec<MemoryFieldConfig>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            max_context_messages: default_max_context(),
            cache_capacity: default_cache_capacity(),
            cache_max_threads: default_cache_max_threads(),
            fields: Vec::new(),
        }
    }
}

impl MemoryConfig {
    /// Declared policy for a field, if any.
    pub fn policy_for(&self, field_id: &str) -> Option<MergePolicy> {
        self.fields
            .iter()
            .find(|f| f.id == field_id)
            .and_then(|f| f.policy)
    }

    /// Configured fields in one scope.
    pub fn fields_in(&self, scope: MemoryScope) -> impl Iterator<Item = &MemoryFieldConfig> {
        self.fields.iter().filter(move |f| f.scope == scope)
    }
}

/// Outbound delivery gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default = "default_delivery_base_url")]
    pub base_url: String,
    /// Bearer token for the delivery gateway. Empty = no auth header.
    #[serde(default)]
    pub api_key: String,
    /// Split replies on blank lines and send each paragraph separately.
    #[serde(default)]
    pub chunk_messages: bool,
    #[serde(default = "default_chunk_delay_ms")]
    pub chunk_delay_ms: u64,
    /// Services that are never sent to (test traffic, internal tools).
    #[serde(default = "default_skip_services")]
    pub skip_services: Vec<String>,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            base_url: default_delivery_base_url(),
            api_key: String::new(),
            chunk_messages: false,
            chunk_delay_ms: default_chunk_delay_ms(),
            skip_services: default_skip_services(),
        }
    }
}

impl DeliveryConfig {
    pub fn skips(&self, service: &str) -> bool {
        self.skip_services
            .iter()
            .any(|s| s.eq_ignore_ascii_case(service))
    }
}

/// Inbound webhook server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Bearer token for the webhook. Empty = no auth (for local-only use).
    #[serde(default)]
    pub api_key: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
            api_key: String::new(),
        }
    }
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file does not exist.
pub fn load(path: &str) -> Result<Config, ParleyError> {
    let path = Path::new(path);
    if !path.exists() {
        tracing::info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ParleyError::Config(format!("failed to read {}: {}", path.display(), e)))?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| ParleyError::Config(format!("failed to parse config: {}", e)))?;

    Ok(config)
}
