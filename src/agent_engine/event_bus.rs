use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::messages::{Subgoal, Verdict};

/// Progress notifications emitted while an episode runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LoopEvent {
    PlanReady { subgoals: Vec<Subgoal>, reasoning: String },
    StepStarted { index: usize, subgoal: Subgoal },
    StepVerified { index: usize, passed: bool, reason: String },
    Replanned { attempt: u32, subgoals: Vec<Subgoal> },
    Aborted { reason: String },
    EpisodeFinished { verdict: Verdict },
}

pub struct EventBus {
    tx: broadcast::Sender<LoopEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(100);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LoopEvent> {
        self.tx.subscribe()
    }

    /// Returns how many subscribers saw the event; zero is fine.
    pub fn send(&self, event: LoopEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
