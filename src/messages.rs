//! Records exchanged between the planner, executor, verifier and supervisor.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::env::types::{UiAction, UiTree};
use crate::errors::DroidQaResult;

/// One planned step. Models sometimes answer with bare strings instead of
/// `{"step", "reference"}` objects; both forms are accepted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subgoal {
    pub step: String,
    /// UI component or activity the step is about.
    pub reference: String,
}

impl Subgoal {
    pub fn new(step: impl Into<String>, reference: impl Into<String>) -> Self {
        Self { step: step.into(), reference: reference.into() }
    }

    /// Text the executor grounds against.
    pub fn grounding_text(&self) -> String {
        if self.reference.is_empty() {
            self.step.clone()
        } else {
            format!("{} {}", self.step, self.reference)
        }
    }
}

impl fmt::Display for Subgoal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reference.is_empty() {
            write!(f, "{}", self.step)
        } else {
            write!(f, "{} [{}]", self.step, self.reference)
        }
    }
}

impl<'de> Deserialize<'de> for Subgoal {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Text(String),
            Object {
                step: String,
                #[serde(default)]
                reference: String,
            },
        }

        Ok(match Wire::deserialize(deserializer)? {
            Wire::Text(step) => Subgoal { step, reference: String::new() },
            Wire::Object { step, reference } => Subgoal { step, reference },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerOutput {
    pub subgoals: Vec<Subgoal>,
    #[serde(default)]
    pub reasoning: String,
}

impl PlannerOutput {
    /// Empty plan used when the model reply cannot be understood.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self { subgoals: Vec::new(), reasoning: reason.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub ui_tree: UiTree,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub info: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorResult {
    pub success: bool,
    pub observation: Observation,
    pub action_taken: Option<UiAction>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    pub passed: bool,
    #[serde(default)]
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_state: Option<serde_json::Value>,
}

impl Verification {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self { passed: false, reason: reason.into(), expected_state: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepLog {
    pub index: usize,
    pub subgoal: Subgoal,
    pub executor: ExecutorResult,
    pub verifier: Verification,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Passed,
    Failed,
}

impl Verdict {
    /// Passed only when at least one step ran and every step verified.
    pub fn from_steps(steps: &[StepLog]) -> Self {
        if !steps.is_empty() && steps.iter().all(|s| s.verifier.passed) {
            Verdict::Passed
        } else {
            Verdict::Failed
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Passed => f.write_str("passed"),
            Verdict::Failed => f.write_str("failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeLog {
    pub planner_goal: String,
    #[serde(default)]
    pub task: Option<String>,
    pub steps: Vec<StepLog>,
    #[serde(default)]
    pub replans: u32,
    /// Why the loop stopped early, if it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
    pub final_verdict: Verdict,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl EpisodeLog {
    pub fn to_json_pretty(&self) -> DroidQaResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
