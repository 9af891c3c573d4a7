use std::path::PathBuf;

use crate::agents::Agent;
use crate::errors::DroidQaResult;
use crate::llm::client::RoleClient;
use crate::llm::types::ChatMessage;
use crate::messages::EpisodeLog;

const SYSTEM_PROMPT: &str = "\
You are a Supervisor Agent. You read full QA logs and recommend improvements: \
better prompts, missing subgoals, robustness to modals, etc.";

pub const REPORT_FILE: &str = "supervisor_report.md";

/// Post-episode reviewer; writes a markdown report.
pub struct SupervisorAgent {
    llm: RoleClient,
    report_dir: PathBuf,
}

impl Agent for SupervisorAgent {
    fn name(&self) -> &str {
        "supervisor"
    }
}

impl SupervisorAgent {
    pub fn new(llm: RoleClient, report_dir: impl Into<PathBuf>) -> Self {
        Self { llm, report_dir: report_dir.into() }
    }

    pub async fn review(&self, episode: &EpisodeLog) -> DroidQaResult<PathBuf> {
        let prompt = format!(
            "Episode Log: {}\n\
             Return a markdown report with sections: prompt improvements, plan flaws, coverage expansion.",
            episode.to_json_pretty()?
        );
        let report = self
            .llm
            .complete(vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)])
            .await?;

        let path = self.report_dir.join(REPORT_FILE);
        tokio::fs::create_dir_all(&self.report_dir).await?;
        tokio::fs::write(&path, report).await?;
        tracing::info!(path = %path.display(), verdict = %episode.final_verdict, "supervisor report written");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::registry::AgentRole;
    use crate::llm::testing::{client, ScriptedProvider};
    use crate::messages::Verdict;

    #[tokio::test]
    async fn writes_report_from_episode() {
        let dir = tempfile::tempdir().unwrap();
        let llm = ScriptedProvider::new(["# Prompt improvements\n- ask for toggle state"]);
        let supervisor = SupervisorAgent::new(client(AgentRole::Supervisor, llm.clone()), dir.path().join("reports"));

        let now = chrono::Utc::now();
        let episode = EpisodeLog {
            planner_goal: "Test turning Wi-Fi on and off".into(),
            task: Some("settings_wifi".into()),
            steps: vec![],
            replans: 0,
            aborted: None,
            final_verdict: Verdict::Failed,
            started_at: now,
            finished_at: now,
        };

        let path = supervisor.review(&episode).await.unwrap();
        assert_eq!(path, dir.path().join("reports").join(REPORT_FILE));
        let body = std::fs::read_to_string(&path).unwrap();
        assert!(body.starts_with("# Prompt improvements"));
        assert!(llm.last_user_prompt().contains("\"planner_goal\": \"Test turning Wi-Fi on and off\""));
    }
}
