use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::env::render::render_ui_tree;
use crate::env::traits::Simulator;
use crate::env::types::{TimeStep, UiAction, UiNode, UiTree};
use crate::errors::{DroidQaError, DroidQaResult};

/// A screen graph: touching an element follows its transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub task: String,
    /// Frame size `[width, height]` used when rendering pixels.
    #[serde(default = "default_screen_size")]
    pub screen_size: [u32; 2],
    pub initial_screen: String,
    pub screens: HashMap<String, Screen>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Screen {
    pub nodes: Vec<UiNode>,
    /// element id -> screen name
    #[serde(default)]
    pub transitions: HashMap<String, String>,
    /// Reward granted when this screen is entered.
    #[serde(default)]
    pub reward: f64,
    #[serde(default)]
    pub terminal: bool,
}

fn default_screen_size() -> [u32; 2] {
    [270, 600]
}

impl Scenario {
    pub fn validate(&self) -> DroidQaResult<()> {
        if !self.screens.contains_key(&self.initial_screen) {
            return Err(DroidQaError::Simulator(format!(
                "initial screen '{}' is not defined",
                self.initial_screen
            )));
        }
        for (name, screen) in &self.screens {
            for (element, target) in &screen.transitions {
                if !screen.nodes.iter().any(|n| &n.id == element) {
                    return Err(DroidQaError::Simulator(format!(
                        "screen '{name}': transition from unknown element '{element}'"
                    )));
                }
                if !self.screens.contains_key(target) {
                    return Err(DroidQaError::Simulator(format!(
                        "screen '{name}': transition to unknown screen '{target}'"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// In-process stand-in for an emulator, driven by a [`Scenario`].
pub struct ScriptedSimulator {
    scenario: Scenario,
    current: String,
}

impl ScriptedSimulator {
    pub fn new(scenario: Scenario) -> DroidQaResult<Self> {
        scenario.validate()?;
        let current = scenario.initial_screen.clone();
        Ok(Self { scenario, current })
    }

    pub fn from_file(path: &Path) -> DroidQaResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let scenario: Scenario = serde_json::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            task = %scenario.task,
            screens = scenario.screens.len(),
            "scenario loaded"
        );
        Self::new(scenario)
    }

    pub fn current_screen(&self) -> &str {
        &self.current
    }

    fn screen(&self, name: &str) -> DroidQaResult<&Screen> {
        self.scenario
            .screens
            .get(name)
            .ok_or_else(|| DroidQaError::Simulator(format!("unknown screen '{name}'")))
    }

    fn timestep(&self, reward: f64) -> DroidQaResult<TimeStep> {
        let screen = self.screen(&self.current)?;
        let ui_tree = UiTree { nodes: screen.nodes.clone() };
        let [w, h] = self.scenario.screen_size;
        let pixels = Some(render_ui_tree(&ui_tree, w, h));

        let mut info = serde_json::Map::new();
        info.insert("screen".into(), self.current.clone().into());

        Ok(TimeStep {
            ui_tree,
            pixels,
            reward,
            last: screen.terminal,
            info,
        })
    }
}

#[async_trait]
impl Simulator for ScriptedSimulator {
    fn task_name(&self) -> &str {
        &self.scenario.task
    }

    async fn reset(&mut self) -> DroidQaResult<TimeStep> {
        self.current = self.scenario.initial_screen.clone();
        tracing::debug!(screen = %self.current, "simulator reset");
        self.timestep(0.0)
    }

    async fn step(&mut self, action: &UiAction) -> DroidQaResult<TimeStep> {
        let element_id = match action {
            UiAction::Noop => return self.timestep(0.0),
            UiAction::Touch { element_id } => element_id,
        };

        let screen = self.screen(&self.current)?;
        if !screen.nodes.iter().any(|n| &n.id == element_id) {
            return Err(DroidQaError::Simulator(format!(
                "no element '{}' on screen '{}'",
                element_id, self.current
            )));
        }

        match screen.transitions.get(element_id).cloned() {
            Some(next) => {
                tracing::debug!(from = %self.current, to = %next, element = %element_id, "screen transition");
                self.current = next;
                let reward = self.screen(&self.current)?.reward;
                self.timestep(reward)
            }
            None => self.timestep(0.0),
        }
    }
}
