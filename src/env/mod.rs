pub mod render;
pub mod scripted;
pub mod traits;
pub mod types;
pub mod wrapper;

pub use traits::Simulator;
pub use types::{AndroidState, StepOutcome, TimeStep, UiAction, UiNode, UiTree};
pub use wrapper::AndroidWorldEnv;
