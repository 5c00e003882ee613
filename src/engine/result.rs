// ABOUTME: Task outcome and result types for the execution engine
// ABOUTME: The cumulative outcome only ever escalates, never regresses

use serde::{Deserialize, Serialize};

use crate::engine::error::ExecutionError;

/// The task's cumulative status. Ordered so that the update rule is
/// literally "only move upward": `Successful < Canceled < Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TaskOutcome {
    Successful,
    Canceled,
    Failed,
}

impl TaskOutcome {
    /// Escalate to `next` if it is worse than the current outcome.
    pub fn escalate_to(&mut self, next: TaskOutcome) {
        if next > *self {
            *self = next;
        }
    }
}

impl std::fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskOutcome::Successful => write!(f, "successful"),
            TaskOutcome::Canceled => write!(f, "canceled"),
            TaskOutcome::Failed => write!(f, "failed"),
        }
    }
}

/// Final report of a task run, created once after all steps were visited.
///
/// `was_canceled` is true only when the final outcome is exactly
/// `Canceled`; a later failure wins over an earlier cancellation.
#[derive(Debug)]
pub struct TaskResult {
    pub was_canceled: bool,
    pub errors: Vec<ExecutionError>,
}

impl TaskResult {
    pub(crate) fn new(outcome: TaskOutcome, errors: Vec<ExecutionError>) -> Self {
        Self {
            was_canceled: outcome == TaskOutcome::Canceled,
            errors,
        }
    }

    pub fn outcome(&self) -> TaskOutcome {
        if !self.errors.is_empty() {
            TaskOutcome::Failed
        } else if self.was_canceled {
            TaskOutcome::Canceled
        } else {
            TaskOutcome::Successful
        }
    }

    pub fn is_successful(&self) -> bool {
        self.outcome() == TaskOutcome::Successful
    }
}
