use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::config::{AppConfig, LlmConfig, RoleEntry};
use crate::errors::{DroidQaError, DroidQaResult};
use crate::llm::client::RoleClient;
use crate::llm::provider::LlmProvider;
use crate::llm::providers::ollama::OllamaProvider;
use crate::llm::providers::openai_compatible::OpenAiCompatibleProvider;
use crate::llm::types::CallConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentRole {
    Planner,
    Verifier,
    Supervisor,
}

impl AgentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Planner => "planner",
            AgentRole::Verifier => "verifier",
            AgentRole::Supervisor => "supervisor",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registry of all available LLM providers, keyed by their config.toml identifier.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    active: String,
    llm_config: LlmConfig,
    /// Forces the model for every role (set from the command line).
    model_override: Option<String>,
}

impl ProviderRegistry {
    pub fn register(&mut self, provider: Arc<dyn LlmProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get_active(&self) -> DroidQaResult<Arc<dyn LlmProvider>> {
        self.providers
            .get(&self.active)
            .cloned()
            .ok_or_else(|| DroidQaError::Config(format!("Active provider '{}' not found in registry", self.active)))
    }

    pub fn set_active(&mut self, name: String) -> DroidQaResult<()> {
        if self.providers.contains_key(&name) {
            self.active = name;
            Ok(())
        } else {
            Err(DroidQaError::Config(format!("Provider '{name}' not registered")))
        }
    }

    pub fn override_model(&mut self, model: String) {
        tracing::info!(model = %model, "model override applied to all roles");
        self.model_override = Some(model);
    }

    pub fn list_names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    /// Return the provider and call configuration for an agent role.
    ///
    /// Role resolution order:
    /// 1. `[llm.roles.<role>]` in config.toml
    /// 2. Fallback: active provider with its default model / temperature and `stream = false`
    pub fn call_config_for_role(&self, role: AgentRole) -> DroidQaResult<(Arc<dyn LlmProvider>, CallConfig)> {
        let role_entry: Option<&RoleEntry> = match role {
            AgentRole::Planner => self.llm_config.roles.planner.as_ref(),
            AgentRole::Verifier => self.llm_config.roles.verifier.as_ref(),
            AgentRole::Supervisor => self.llm_config.roles.supervisor.as_ref(),
        };

        let (provider, mut cfg) = if let Some(entry) = role_entry {
            let provider = self.providers.get(&entry.provider).cloned().ok_or_else(|| {
                DroidQaError::Config(format!(
                    "Role '{}' references unknown provider '{}'",
                    role, entry.provider
                ))
            })?;
            let defaults = self.llm_config.providers.get(&entry.provider);
            let temperature = entry
                .temperature
                .unwrap_or_else(|| defaults.map(|p| p.temperature).unwrap_or(0.2));
            let max_tokens = entry
                .max_tokens
                .unwrap_or_else(|| defaults.map(|p| p.max_tokens).unwrap_or(512));
            tracing::debug!(
                role = %role,
                provider = %entry.provider,
                model = %entry.model,
                stream = entry.stream,
                temperature = temperature,
                "resolved role config"
            );
            (provider, CallConfig {
                model: entry.model.clone(),
                stream: entry.stream,
                temperature,
                max_tokens,
            })
        } else {
            let provider = self.get_active()?;
            let (model, temperature, max_tokens) = self
                .llm_config
                .providers
                .get(&self.active)
                .map(|p| (p.model.clone(), p.temperature, p.max_tokens))
                .unwrap_or_else(|| (String::new(), 0.2, 512));
            tracing::debug!(
                role = %role,
                provider = %self.active,
                model = %model,
                "role not configured, using active provider fallback"
            );
            (provider, CallConfig { model, stream: false, temperature, max_tokens })
        };

        if let Some(model) = &self.model_override {
            cfg.model = model.clone();
        }
        Ok((provider, cfg))
    }

    pub fn client_for_role(&self, role: AgentRole) -> DroidQaResult<RoleClient> {
        let (provider, cfg) = self.call_config_for_role(role)?;
        Ok(RoleClient::new(role, provider, cfg))
    }

    /// Build a registry from the loaded app config.
    /// API keys are read from environment variables named `DROIDQA_<ID>_API_KEY`.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut registry = Self {
            providers: HashMap::new(),
            active: config.llm.active_provider.clone(),
            llm_config: config.llm.clone(),
            model_override: None,
        };
        for (id, entry) in &config.llm.providers {
            let provider: Arc<dyn LlmProvider> = match entry.adapter.as_deref() {
                Some("ollama") => Arc::new(OllamaProvider::new(id.clone(), entry.api_base.clone())),
                other => {
                    if let Some(unknown) = other {
                        tracing::warn!(provider = %id, adapter = unknown, "unknown adapter, using OpenAI-compatible");
                    }
                    let api_key = api_key_for(id, entry.api_key.as_deref());
                    Arc::new(OpenAiCompatibleProvider::new(id.clone(), entry.api_base.clone(), api_key))
                }
            };
            registry.register(provider);
        }
        tracing::info!(
            providers = ?registry.list_names(),
            active = %registry.active,
            "LLM provider registry built"
        );
        registry
    }
}

/// `DROIDQA_<ID>_API_KEY` from the environment, else the configured key.
fn api_key_for(id: &str, configured: Option<&str>) -> String {
    std::env::var(format!("DROIDQA_{}_API_KEY", id.to_uppercase()))
        .ok()
        .filter(|k| !k.is_empty())
        .unwrap_or_else(|| configured.unwrap_or_default().to_string())
}
