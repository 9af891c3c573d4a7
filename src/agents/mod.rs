pub mod executor;
pub mod planner;
pub mod supervisor;
pub mod verifier;

pub use executor::ExecutorAgent;
pub use planner::PlannerAgent;
pub use supervisor::SupervisorAgent;
pub use verifier::VerifierAgent;

/// Common identity for the agents taking part in an episode.
pub trait Agent {
    fn name(&self) -> &str;
}
