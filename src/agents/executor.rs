use crate::agents::Agent;
use crate::env::types::{AndroidState, UiAction};
use crate::env::wrapper::AndroidWorldEnv;
use crate::errors::DroidQaResult;
use crate::messages::{ExecutorResult, Observation, Subgoal};

/// Grounds subgoals to UI actions and applies them to the environment.
pub struct ExecutorAgent {
    env: AndroidWorldEnv,
    state: AndroidState,
}

impl Agent for ExecutorAgent {
    fn name(&self) -> &str {
        "executor"
    }
}

impl ExecutorAgent {
    /// Resets the environment and keeps its first observation.
    pub async fn new(mut env: AndroidWorldEnv) -> DroidQaResult<Self> {
        let state = env.reset().await?;
        Ok(Self { env, state })
    }

    pub fn state(&self) -> &AndroidState {
        &self.state
    }

    /// Keyword grounding: the first node whose text appears in the subgoal
    /// (case-insensitive) is touched; otherwise nothing happens.
    pub fn select_action(&self, subgoal: &Subgoal) -> UiAction {
        let haystack = subgoal.grounding_text().to_lowercase();
        self.state
            .ui_tree
            .nodes
            .iter()
            .find(|node| match node.text.as_deref() {
                Some(text) if !text.is_empty() => haystack.contains(&text.to_lowercase()),
                _ => false,
            })
            .map(|node| UiAction::Touch { element_id: node.id.clone() })
            .unwrap_or(UiAction::Noop)
    }

    pub async fn execute(&mut self, subgoal: &Subgoal) -> ExecutorResult {
        let action = self.select_action(subgoal);
        tracing::debug!(subgoal = %subgoal, ?action, "grounded subgoal");

        match self.env.step(&action).await {
            Ok(outcome) => {
                self.state = outcome.state;
                ExecutorResult {
                    success: true,
                    observation: Observation {
                        ui_tree: self.state.ui_tree.clone(),
                        reward: Some(outcome.reward),
                        done: Some(outcome.done),
                        info: outcome.info,
                    },
                    action_taken: Some(action),
                    error: None,
                }
            }
            Err(e) => {
                tracing::error!(error = %e, subgoal = %subgoal, ?action, "execution error");
                ExecutorResult {
                    success: false,
                    observation: Observation {
                        ui_tree: self.state.ui_tree.clone(),
                        reward: None,
                        done: None,
                        info: serde_json::Map::new(),
                    },
                    action_taken: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}
