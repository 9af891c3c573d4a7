use async_trait::async_trait;

use crate::env::types::{TimeStep, UiAction};
use crate::errors::DroidQaResult;

/// Device or emulator backend driven by the executor.
#[async_trait]
pub trait Simulator: Send {
    /// Task identifier the simulator was loaded for.
    fn task_name(&self) -> &str;

    async fn reset(&mut self) -> DroidQaResult<TimeStep>;

    async fn step(&mut self, action: &UiAction) -> DroidQaResult<TimeStep>;
}
