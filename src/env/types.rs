use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One accessibility node as reported by the simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiNode {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    /// `[left, top, right, bottom]` in screen pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<[i32; 4]>,
    #[serde(default)]
    pub clickable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
    /// Attributes this crate does not interpret, kept for the verifier prompt.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl UiNode {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: Some(text.into()),
            class_name: None,
            bounds: None,
            clickable: true,
            checked: None,
            extra: serde_json::Map::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiTree {
    #[serde(default)]
    pub nodes: Vec<UiNode>,
}

impl UiTree {
    pub fn find(&self, id: &str) -> Option<&UiNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Action sent to the simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action_type", rename_all = "snake_case")]
pub enum UiAction {
    Touch { element_id: String },
    Noop,
}

/// Raw simulator output for one reset or step.
#[derive(Debug, Clone)]
pub struct TimeStep {
    pub ui_tree: UiTree,
    pub pixels: Option<image::RgbaImage>,
    pub reward: f64,
    /// True when the simulator considers the episode finished.
    pub last: bool,
    pub info: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AndroidState {
    pub ui_tree: UiTree,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub state: AndroidState,
    pub reward: f64,
    pub done: bool,
    pub info: serde_json::Map<String, serde_json::Value>,
}
