use std::path::PathBuf;

use clap::Parser;
use droidqa::messages::Verdict;
use droidqa::RunOptions;

#[derive(Parser, Debug)]
#[command(
    name = "droidqa",
    about = "Drive an Android UI simulator toward a QA goal with planner/verifier LLM agents",
    version
)]
struct Args {
    /// Natural-language goal handed to the planner
    #[arg(long, default_value = "Test turning Wi-Fi on and off")]
    goal: String,

    /// Override [android_world].task from the config
    #[arg(long)]
    task: Option<String>,

    /// Path to config.toml (searched next to the binary, in the working dir, then the user config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Force this model for every agent role
    #[arg(long = "llm-model")]
    llm_model: Option<String>,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    droidqa::init_tracing();
    let args = Args::parse();

    let opts = RunOptions {
        goal: args.goal,
        task: args.task,
        config_path: args.config,
        llm_model: args.llm_model,
    };

    match droidqa::run(opts).await {
        Ok(episode) if episode.final_verdict == Verdict::Passed => std::process::ExitCode::SUCCESS,
        Ok(_) => std::process::ExitCode::from(1),
        Err(e) => {
            tracing::error!(error = %e, "run failed");
            std::process::ExitCode::from(2)
        }
    }
}
