use crate::agent_engine::state::LoopLimits;

/// Tracks the replan budget and the hard step/time caps of an episode.
pub struct LoopController {
    limits: LoopLimits,
    start_time: std::time::Instant,
    replans: u32,
    steps: usize,
}

impl LoopController {
    pub fn new(limits: LoopLimits) -> Self {
        Self {
            limits,
            start_time: std::time::Instant::now(),
            replans: 0,
            steps: 0,
        }
    }

    pub fn record_step(&mut self) {
        self.steps += 1;
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn replans(&self) -> u32 {
        self.replans
    }

    /// Consume one replan. Returns false once the budget is spent.
    pub fn try_replan(&mut self) -> bool {
        if self.replans >= self.limits.max_replans {
            return false;
        }
        self.replans += 1;
        true
    }

    /// Reason to stop before running another step, if any.
    pub fn stop_reason(&self) -> Option<String> {
        if self.steps >= self.limits.max_steps {
            return Some(format!("step limit reached ({})", self.limits.max_steps));
        }
        if let Some(max_min) = self.limits.max_duration_minutes {
            if self.start_time.elapsed().as_secs() / 60 >= max_min as u64 {
                return Some(format!("time limit reached ({max_min} min)"));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(max_replans: u32, max_steps: usize) -> LoopLimits {
        LoopLimits { max_replans, max_steps, max_duration_minutes: None }
    }

    #[test]
    fn replan_budget_is_bounded() {
        let mut ctrl = LoopController::new(limits(2, 10));
        assert!(ctrl.try_replan());
        assert!(ctrl.try_replan());
        assert!(!ctrl.try_replan());
        assert_eq!(ctrl.replans(), 2);
    }

    #[test]
    fn zero_budget_never_replans() {
        let mut ctrl = LoopController::new(limits(0, 10));
        assert!(!ctrl.try_replan());
    }

    #[test]
    fn step_cap_stops_the_loop() {
        let mut ctrl = LoopController::new(limits(2, 2));
        assert!(ctrl.stop_reason().is_none());
        ctrl.record_step();
        ctrl.record_step();
        assert_eq!(ctrl.stop_reason().unwrap(), "step limit reached (2)");
    }

    #[test]
    fn zero_minute_limit_stops_immediately() {
        let ctrl = LoopController::new(LoopLimits { max_replans: 1, max_steps: 5, max_duration_minutes: Some(0) });
        assert!(ctrl.stop_reason().unwrap().starts_with("time limit"));
    }
}
