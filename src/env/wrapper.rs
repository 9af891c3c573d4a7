use std::path::{Path, PathBuf};

use crate::env::render::save_png;
use crate::env::traits::Simulator;
use crate::env::types::{AndroidState, StepOutcome, TimeStep, UiAction};
use crate::errors::DroidQaResult;

/// Gym-style facade over a [`Simulator`]: turns raw time steps into
/// [`AndroidState`]s and optionally writes every frame to the trace dir.
pub struct AndroidWorldEnv {
    sim: Box<dyn Simulator>,
    trace_dir: PathBuf,
    render_rgb: bool,
    frame_id: u32,
    latest: Option<TimeStep>,
}

impl AndroidWorldEnv {
    pub fn new(sim: Box<dyn Simulator>, trace_dir: impl Into<PathBuf>, render_rgb: bool) -> Self {
        Self {
            sim,
            trace_dir: trace_dir.into(),
            render_rgb,
            frame_id: 0,
            latest: None,
        }
    }

    pub fn task_name(&self) -> &str {
        self.sim.task_name()
    }

    pub fn frames_written(&self) -> u32 {
        self.frame_id
    }

    pub async fn reset(&mut self) -> DroidQaResult<AndroidState> {
        let ts = self.sim.reset().await?;
        tracing::info!(task = %self.sim.task_name(), nodes = ts.ui_tree.nodes.len(), "environment reset");
        Ok(self.record(ts))
    }

    pub async fn step(&mut self, action: &UiAction) -> DroidQaResult<StepOutcome> {
        let ts = self.sim.step(action).await?;
        let reward = ts.reward;
        let done = ts.last;
        let info = ts.info.clone();
        let state = self.record(ts);
        Ok(StepOutcome { state, reward, done, info })
    }

    /// Write the latest frame to `path`. Returns false when there is nothing to write.
    pub fn render(&self, path: &Path) -> DroidQaResult<bool> {
        if !self.render_rgb {
            return Ok(false);
        }
        match self.latest.as_ref().and_then(|ts| ts.pixels.as_ref()) {
            Some(frame) => {
                save_png(frame, path)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn record(&mut self, ts: TimeStep) -> AndroidState {
        let ui_tree = ts.ui_tree.clone();
        self.latest = Some(ts);

        let mut screenshot_path = None;
        if self.render_rgb {
            let path = self.trace_dir.join(format!("frame_{:05}.png", self.frame_id));
            match self.render(&path) {
                Ok(true) => {
                    tracing::debug!(path = %path.display(), "frame written");
                    screenshot_path = Some(path);
                    self.frame_id += 1;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(error = %e, path = %path.display(), "failed to write frame");
                }
            }
        }
        AndroidState { ui_tree, screenshot_path }
    }
}
