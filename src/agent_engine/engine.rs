use std::collections::VecDeque;

use tokio::sync::broadcast;

use crate::agent_engine::event_bus::{EventBus, LoopEvent};
use crate::agent_engine::history::{HistoryEntry, SessionHistory};
use crate::agent_engine::loop_control::LoopController;
use crate::agent_engine::state::{LoopLimits, LoopPhase};
use crate::agents::{Agent, ExecutorAgent, PlannerAgent, SupervisorAgent, VerifierAgent};
use crate::errors::DroidQaResult;
use crate::messages::{EpisodeLog, StepLog, Subgoal, Verdict};

/// Plan → execute → verify → (replan) loop for a single QA goal.
pub struct QaLoop {
    planner: PlannerAgent,
    executor: ExecutorAgent,
    verifier: VerifierAgent,
    supervisor: Option<SupervisorAgent>,
    limits: LoopLimits,
    events: EventBus,
    history: Option<SessionHistory>,
}

impl QaLoop {
    pub fn new(
        planner: PlannerAgent,
        executor: ExecutorAgent,
        verifier: VerifierAgent,
        supervisor: Option<SupervisorAgent>,
        limits: LoopLimits,
    ) -> Self {
        Self {
            planner,
            executor,
            verifier,
            supervisor,
            limits,
            events: EventBus::new(),
            history: None,
        }
    }

    pub fn with_history(mut self, history: SessionHistory) -> Self {
        self.history = Some(history);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LoopEvent> {
        self.events.subscribe()
    }

    pub fn executor(&self) -> &ExecutorAgent {
        &self.executor
    }

    pub fn history(&self) -> Option<&SessionHistory> {
        self.history.as_ref()
    }

    /// Run one episode. Only a failure to produce the initial plan is an
    /// error; everything after that ends up in the returned log.
    pub async fn run(&mut self, goal: &str, task: Option<&str>) -> DroidQaResult<EpisodeLog> {
        tracing::info!(goal = %goal, task = ?task, "received goal");
        let started_at = chrono::Utc::now();

        let mut ctrl = LoopController::new(self.limits.clone());
        let mut pending: VecDeque<Subgoal> = VecDeque::new();
        let mut steps: Vec<StepLog> = Vec::new();
        let mut aborted: Option<String> = None;
        let mut phase = LoopPhase::Planning;

        loop {
            tracing::debug!(phase = phase.label(), steps = steps.len(), pending = pending.len(), "loop phase");

            phase = match phase {
                // ── Planning: initial decomposition of the goal ───────────
                LoopPhase::Planning => {
                    let plan = self.planner.plan(goal, task).await?;
                    tracing::info!(subgoals = ?plan.subgoals, "initial plan");
                    record(&mut self.history, self.planner.name(), Some(plan.reasoning.clone()), &plan.subgoals);
                    self.events.send(LoopEvent::PlanReady {
                        subgoals: plan.subgoals.clone(),
                        reasoning: plan.reasoning.clone(),
                    });
                    if plan.subgoals.is_empty() {
                        aborted = Some(format!("planner returned no subgoals ({})", plan.reasoning));
                    }
                    pending = plan.subgoals.into();
                    advance(&mut pending, &ctrl, steps.len(), &mut aborted)
                }

                // ── Executing: ground the subgoal and step the env ────────
                LoopPhase::Executing { index, subgoal } => {
                    tracing::info!(step = index, subgoal = %subgoal, "executing subgoal");
                    self.events.send(LoopEvent::StepStarted { index, subgoal: subgoal.clone() });
                    let result = self.executor.execute(&subgoal).await;
                    ctrl.record_step();
                    tracing::info!(
                        step = index,
                        success = result.success,
                        action = ?result.action_taken,
                        nodes = result.observation.ui_tree.nodes.len(),
                        "executor result"
                    );
                    LoopPhase::Verifying { index, subgoal, result }
                }

                // ── Verifying: LLM judgment of the step ───────────────────
                LoopPhase::Verifying { index, subgoal, result } => {
                    let verification = self.verifier.verify(goal, &subgoal, &result).await;
                    tracing::info!(
                        step = index,
                        passed = verification.passed,
                        reason = %verification.reason,
                        "verifier"
                    );
                    self.events.send(LoopEvent::StepVerified {
                        index,
                        passed: verification.passed,
                        reason: verification.reason.clone(),
                    });

                    let passed = verification.passed;
                    let reason = verification.reason.clone();
                    let log = StepLog { index, subgoal, executor: result, verifier: verification };
                    record(&mut self.history, self.verifier.name(), None, &log);
                    steps.push(log);

                    if passed {
                        advance(&mut pending, &ctrl, steps.len(), &mut aborted)
                    } else {
                        tracing::warn!(step = index, reason = %reason, "verification failed");
                        if ctrl.try_replan() {
                            LoopPhase::Replanning { last_error: reason }
                        } else {
                            tracing::error!(replans = ctrl.replans(), "too many replans, aborting");
                            aborted = Some("too many replans".into());
                            LoopPhase::Reviewing
                        }
                    }
                }

                // ── Replanning: revised remaining steps replace the queue ─
                LoopPhase::Replanning { last_error } => {
                    match self.planner.replan(goal, &steps, &last_error, task).await {
                        Ok(plan) => {
                            tracing::info!(attempt = ctrl.replans(), subgoals = ?plan.subgoals, "new plan");
                            record(&mut self.history, self.planner.name(), Some(plan.reasoning.clone()), &plan.subgoals);
                            self.events.send(LoopEvent::Replanned {
                                attempt: ctrl.replans(),
                                subgoals: plan.subgoals.clone(),
                            });
                            if plan.subgoals.is_empty() {
                                aborted = Some(format!("planner returned no subgoals ({})", plan.reasoning));
                            }
                            pending = plan.subgoals.into();
                            advance(&mut pending, &ctrl, steps.len(), &mut aborted)
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "replanning failed, aborting");
                            aborted = Some(format!("replan failed: {e}"));
                            LoopPhase::Reviewing
                        }
                    }
                }

                // ── Reviewing: verdict, supervisor, done ──────────────────
                LoopPhase::Reviewing => {
                    if let Some(reason) = &aborted {
                        self.events.send(LoopEvent::Aborted { reason: reason.clone() });
                    }
                    let final_verdict = Verdict::from_steps(&steps);
                    let episode = EpisodeLog {
                        planner_goal: goal.to_string(),
                        task: task.map(str::to_string),
                        steps: std::mem::take(&mut steps),
                        replans: ctrl.replans(),
                        aborted: aborted.take(),
                        final_verdict,
                        started_at,
                        finished_at: chrono::Utc::now(),
                    };
                    tracing::info!(
                        verdict = %final_verdict,
                        steps = episode.steps.len(),
                        replans = episode.replans,
                        "episode finished"
                    );

                    if let Some(supervisor) = &self.supervisor {
                        if let Err(e) = supervisor.review(&episode).await {
                            tracing::warn!(error = %e, "supervisor review failed");
                        }
                    }
                    self.events.send(LoopEvent::EpisodeFinished { verdict: final_verdict });
                    LoopPhase::Done(Box::new(episode))
                }

                LoopPhase::Done(episode) => return Ok(*episode),
            };
        }
    }
}

fn record<T: serde::Serialize>(
    history: &mut Option<SessionHistory>,
    role: &str,
    content: Option<String>,
    payload: &T,
) {
    let Some(history) = history.as_mut() else {
        return;
    };
    history.push(HistoryEntry {
        ts: chrono::Utc::now().timestamp_millis(),
        role: role.to_string(),
        content,
        payload: serde_json::to_value(payload).ok(),
    });
    if let Err(e) = history.flush() {
        tracing::warn!(error = %e, "failed to flush session history");
    }
}

/// Pick the next pending subgoal, unless the queue is empty or a hard cap hit.
fn advance(
    pending: &mut VecDeque<Subgoal>,
    ctrl: &LoopController,
    index: usize,
    aborted: &mut Option<String>,
) -> LoopPhase {
    let Some(subgoal) = pending.pop_front() else {
        return LoopPhase::Reviewing;
    };
    if let Some(reason) = ctrl.stop_reason() {
        tracing::warn!(reason = %reason, skipped = pending.len() + 1, "loop controller triggered stop");
        *aborted = Some(reason);
        return LoopPhase::Reviewing;
    }
    LoopPhase::Executing { index, subgoal }
}
