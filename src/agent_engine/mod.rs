pub mod engine;
pub mod event_bus;
pub mod history;
pub mod loop_control;
pub mod state;

pub use engine::QaLoop;
pub use event_bus::LoopEvent;
pub use state::LoopLimits;
