use serde::{Deserialize, Serialize};

use crate::config::LoopSettings;
use crate::messages::{EpisodeLog, ExecutorResult, Subgoal};

/// Phases of one QA episode.
#[derive(Debug, Clone)]
pub enum LoopPhase {
    Planning,
    Executing { index: usize, subgoal: Subgoal },
    Verifying { index: usize, subgoal: Subgoal, result: ExecutorResult },
    Replanning { last_error: String },
    Reviewing,
    Done(Box<EpisodeLog>),
}

impl LoopPhase {
    pub fn label(&self) -> &'static str {
        match self {
            LoopPhase::Planning => "planning",
            LoopPhase::Executing { .. } => "executing",
            LoopPhase::Verifying { .. } => "verifying",
            LoopPhase::Replanning { .. } => "replanning",
            LoopPhase::Reviewing => "reviewing",
            LoopPhase::Done(_) => "done",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopLimits {
    pub max_replans: u32,
    pub max_steps: usize,
    pub max_duration_minutes: Option<u32>,
}

impl Default for LoopLimits {
    fn default() -> Self {
        Self::from(&LoopSettings::default())
    }
}

impl From<&LoopSettings> for LoopLimits {
    fn from(s: &LoopSettings) -> Self {
        Self {
            max_replans: s.max_replans,
            max_steps: s.max_steps,
            max_duration_minutes: s.max_duration_minutes,
        }
    }
}
