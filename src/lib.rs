pub mod agent_engine;
pub mod agents;
pub mod config;
pub mod env;
pub mod errors;
pub mod llm;
pub mod messages;

use std::path::{Path, PathBuf};

use crate::agent_engine::history::SessionHistory;
use crate::agent_engine::{LoopLimits, QaLoop};
use crate::agents::{ExecutorAgent, PlannerAgent, SupervisorAgent, VerifierAgent};
use crate::config::AppConfig;
use crate::env::scripted::ScriptedSimulator;
use crate::env::AndroidWorldEnv;
use crate::errors::DroidQaResult;
use crate::llm::registry::{AgentRole, ProviderRegistry};
use crate::messages::EpisodeLog;

pub const EPISODE_LOG_FILE: &str = "episode_log.json";

/// Inputs for one command-line run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub goal: String,
    pub task: Option<String>,
    pub config_path: Option<PathBuf>,
    pub llm_model: Option<String>,
}

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

/// Load config, run one episode and write its log.
pub async fn run(opts: RunOptions) -> DroidQaResult<EpisodeLog> {
    // Load .env file if present (ignore error if not found)
    let _ = dotenvy::dotenv();

    let mut cfg = config::load_config(opts.config_path.as_deref())?;
    if let Some(task) = opts.task {
        cfg.android_world.task = task;
    }
    tracing::info!(task = %cfg.android_world.task, "running task");

    let mut registry = ProviderRegistry::from_config(&cfg);
    if let Some(model) = opts.llm_model {
        registry.override_model(model);
    }

    let mut qa = build_loop(&cfg, &registry).await?;
    let episode = qa.run(&opts.goal, Some(cfg.android_world.task.as_str())).await?;
    write_episode_log(&episode, &cfg.log_dir)?;
    Ok(episode)
}

/// Create the output dirs, the environment and all four agents.
pub async fn build_loop(cfg: &AppConfig, registry: &ProviderRegistry) -> DroidQaResult<QaLoop> {
    for dir in [&cfg.log_dir, &cfg.trace_dir, &cfg.report_dir] {
        std::fs::create_dir_all(dir)?;
    }

    let sim = ScriptedSimulator::from_file(&cfg.android_world.scenario)?;
    let env = AndroidWorldEnv::new(Box::new(sim), &cfg.trace_dir, cfg.android_world.render_rgb);

    let planner = PlannerAgent::new(registry.client_for_role(AgentRole::Planner)?);
    let executor = ExecutorAgent::new(env).await?;
    let verifier = VerifierAgent::new(
        registry.client_for_role(AgentRole::Verifier)?,
        cfg.loop_cfg.ui_tree_prompt_chars,
    );
    let supervisor = if cfg.supervisor.enabled {
        Some(SupervisorAgent::new(
            registry.client_for_role(AgentRole::Supervisor)?,
            &cfg.report_dir,
        ))
    } else {
        None
    };

    let qa = QaLoop::new(planner, executor, verifier, supervisor, LoopLimits::from(&cfg.loop_cfg))
        .with_history(SessionHistory::new(&cfg.log_dir));
    Ok(qa)
}

pub fn write_episode_log(episode: &EpisodeLog, log_dir: &Path) -> DroidQaResult<PathBuf> {
    let path = log_dir.join(EPISODE_LOG_FILE);
    std::fs::write(&path, episode.to_json_pretty()?)?;
    tracing::info!(path = %path.display(), verdict = %episode.final_verdict, "episode log written");
    Ok(path)
}
