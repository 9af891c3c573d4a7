use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{DroidQaError, DroidQaResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(default = "default_trace_dir")]
    pub trace_dir: PathBuf,
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,
    pub llm: LlmConfig,
    #[serde(default, rename = "loop")]
    pub loop_cfg: LoopSettings,
    pub android_world: AndroidWorldConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmConfig {
    pub active_provider: String,
    pub providers: HashMap<String, ProviderEntry>,
    /// Role-to-model mapping. If a role is absent, falls back to active_provider defaults.
    #[serde(default)]
    pub roles: RolesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub display_name: String,
    pub api_base: String,
    /// Default model for this provider (used as fallback when no role config exists).
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// "ollama" for a local Ollama server, None for OpenAI-compatible
    pub adapter: Option<String>,
    /// Optional API key stored in config.toml (falls back to env var DROIDQA_<ID>_API_KEY).
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Maps agent roles to specific provider+model combinations.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RolesConfig {
    /// Breaks the goal into subgoals and re-plans after a failed step.
    pub planner: Option<RoleEntry>,
    /// Judges a single step against the current UI tree.
    pub verifier: Option<RoleEntry>,
    /// Reviews the finished episode and writes the report.
    pub supervisor: Option<RoleEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleEntry {
    /// Must match a key under [llm.providers.*].
    pub provider: String,
    /// Model name sent to the API.
    pub model: String,
    #[serde(default)]
    pub stream: bool,
    /// Overrides the provider-level temperature for this role.
    pub temperature: Option<f64>,
    /// Overrides the provider-level completion budget for this role.
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f64 {
    0.2
}

fn default_max_tokens() -> u32 {
    512
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("data/logs")
}

fn default_trace_dir() -> PathBuf {
    PathBuf::from("data/traces")
}

fn default_report_dir() -> PathBuf {
    PathBuf::from("data/reports")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopSettings {
    #[serde(default = "default_max_replans")]
    pub max_replans: u32,
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    #[serde(default)]
    pub max_duration_minutes: Option<u32>,
    /// How much of the serialized UI tree the verifier gets to see.
    #[serde(default = "default_ui_tree_chars")]
    pub ui_tree_prompt_chars: usize,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            max_replans: default_max_replans(),
            max_steps: default_max_steps(),
            max_duration_minutes: None,
            ui_tree_prompt_chars: default_ui_tree_chars(),
        }
    }
}

fn default_max_replans() -> u32 {
    2
}

fn default_max_steps() -> usize {
    50
}

fn default_ui_tree_chars() -> usize {
    5000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AndroidWorldConfig {
    pub task: String,
    /// Scenario file driving the scripted simulator.
    pub scenario: PathBuf,
    #[serde(default = "default_true")]
    pub render_rgb: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_true() -> bool {
    true
}

fn resolve_config_path() -> DroidQaResult<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(candidate);
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join("config.toml");
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(candidate);
    }

    if let Some(dir) = dirs::config_dir() {
        let candidate = dir.join("droidqa").join("config.toml");
        if candidate.exists() {
            tracing::debug!(path = %candidate.display(), "config found in user config dir");
            return Ok(candidate);
        }
    }

    Err(DroidQaError::Config(
        "config.toml not found next to executable, in working directory or user config dir".into(),
    ))
}

/// Load the config from an explicit path, or search the default locations.
pub fn load_config(path: Option<&Path>) -> DroidQaResult<AppConfig> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => resolve_config_path()?,
    };
    let content = std::fs::read_to_string(&path)?;
    let config = parse_config(&content)?;
    tracing::info!(
        path = %path.display(),
        provider = %config.llm.active_provider,
        task = %config.android_world.task,
        "config loaded"
    );
    Ok(config)
}

pub fn parse_config(content: &str) -> DroidQaResult<AppConfig> {
    let config: AppConfig = toml::from_str(content)?;
    if !config.llm.providers.contains_key(&config.llm.active_provider) {
        return Err(DroidQaError::Config(format!(
            "active provider '{}' has no [llm.providers] entry",
            config.llm.active_provider
        )));
    }
    Ok(config)
}

pub fn save_config(config: &AppConfig, path: &Path) -> DroidQaResult<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}
