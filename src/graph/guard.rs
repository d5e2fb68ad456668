//! Deadline and cooperative cancellation for traversals

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::GraphError;

/// Shared flag a caller flips to stop an in-flight traversal
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Clock reads are amortised over this many steps
const CLOCK_INTERVAL: u64 = 64;

/// Per-traversal budget; call [`TraversalGuard::step`] once per visited node
#[derive(Debug)]
pub struct TraversalGuard {
    deadline: Option<Instant>,
    timeout: Option<Duration>,
    cancel: Option<CancelFlag>,
    node_budget: Option<usize>,
    steps: Cell<u64>,
}

impl TraversalGuard {
    pub fn new(timeout: Option<Duration>, cancel: Option<CancelFlag>) -> Self {
        Self {
            deadline: timeout.map(|t| Instant::now() + t),
            timeout,
            cancel,
            node_budget: None,
            steps: Cell::new(0),
        }
    }

    /// Cap the nodes a single tree build may emit; expansion stops once it is reached
    pub fn with_node_budget(mut self, max_nodes: usize) -> Self {
        self.node_budget = Some(max_nodes);
        self
    }

    pub fn node_budget(&self) -> Option<usize> {
        self.node_budget
    }

    /// No deadline, no cancellation
    pub fn unbounded() -> Self {
        Self::new(None, None)
    }

    pub fn steps(&self) -> u64 {
        self.steps.get()
    }

    pub fn step(&self) -> Result<(), GraphError> {
        let steps = self.steps.get() + 1;
        self.steps.set(steps);

        if let Some(cancel) = &self.cancel {
            if cancel.is_cancelled() {
                return Err(GraphError::Cancelled);
            }
        }

        if let (Some(deadline), Some(timeout)) = (self.deadline, self.timeout) {
            if steps % CLOCK_INTERVAL == 1 && Instant::now() >= deadline {
                return Err(GraphError::Timeout(format!(
                    "traversal exceeded {}ms after {} steps",
                    timeout.as_millis(),
                    steps
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_stops_next_step() {
        let flag = CancelFlag::new();
        let guard = TraversalGuard::new(None, Some(flag.clone()));
        assert!(guard.step().is_ok());

        flag.cancel();
        assert!(matches!(guard.step(), Err(GraphError::Cancelled)));
    }

    #[test]
    fn test_expired_deadline() {
        let guard = TraversalGuard::new(Some(Duration::ZERO), None);
        assert!(matches!(guard.step(), Err(GraphError::Timeout(_))));
    }

    #[test]
    fn test_unbounded_counts_steps() {
        let guard = TraversalGuard::unbounded();
        for _ in 0..200 {
            guard.step().unwrap();
        }
        assert_eq!(guard.steps(), 200);
        assert_eq!(guard.node_budget(), None);
    }

    #[test]
    fn test_node_budget_is_carried() {
        let guard = TraversalGuard::unbounded().with_node_budget(50);
        assert_eq!(guard.node_budget(), Some(50));
    }
}
