// ABOUTME: Step trait, step kind tag, and the basic single-action step
// ABOUTME: Execution conditions decide per step whether it runs for the current task outcome

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::engine::error::{BoxError, EngineError};
use crate::engine::result::TaskOutcome;
use crate::task::pipeline::ErasedPipeline;

/// Dispatch tag mapping a step to the executor capable of running it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepKind {
    Basic,
    Pipeline,
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepKind::Basic => write!(f, "basic"),
            StepKind::Pipeline => write!(f, "pipeline"),
        }
    }
}

/// Predicate over the task's current outcome, evaluated before a step runs.
pub type StepCondition = Arc<dyn Fn(TaskOutcome) -> bool + Send + Sync>;

/// Condition that runs a step only while the task is still successful.
/// This is the default for every step constructor.
pub fn run_on_success() -> StepCondition {
    Arc::new(|outcome| outcome == TaskOutcome::Successful)
}

/// Condition that runs a step regardless of the task's current outcome.
/// Used for cleanup steps that must run even after a failure.
pub fn always_run() -> StepCondition {
    Arc::new(|_| true)
}

/// Condition that runs a step unless an earlier step has failed.
pub fn unless_failed() -> StepCondition {
    Arc::new(|outcome| outcome != TaskOutcome::Failed)
}

/// One unit of a task's ordered work list.
///
/// Steps are polymorphic over `{name, kind, execution condition}`; the
/// executor registry maps `kind()` to the executor that runs the step.
pub trait TaskStep: Send {
    fn name(&self) -> &str;

    fn kind(&self) -> StepKind;

    /// Evaluate this step's execution condition against the task's
    /// current outcome. Returning false skips the step.
    fn should_run(&self, current_outcome: TaskOutcome) -> bool;

    /// Basic steps expose their body to the basic step executor.
    fn as_basic(&self) -> Option<&BasicStep> {
        None
    }

    /// Pipeline steps hand over their type-erased batch/block surface.
    /// The input is consumable exactly once per execution; a second take
    /// is a configuration fault.
    fn take_pipeline(&mut self) -> Option<Result<ErasedPipeline, EngineError>> {
        None
    }
}

/// A step consisting of a single synchronous action.
pub struct BasicStep {
    name: String,
    body: Arc<dyn Fn() -> Result<(), BoxError> + Send + Sync>,
    condition: StepCondition,
}

impl BasicStep {
    pub fn new(
        name: impl Into<String>,
        body: impl Fn() -> Result<(), BoxError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            body: Arc::new(body),
            condition: run_on_success(),
        }
    }

    /// A step that does nothing. Useful as a marker or in tests.
    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, || Ok(()))
    }

    pub fn with_condition(mut self, condition: StepCondition) -> Self {
        self.condition = condition;
        self
    }

    pub fn run(&self) -> Result<(), BoxError> {
        (self.body)()
    }
}

impl TaskStep for BasicStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StepKind {
        StepKind::Basic
    }

    fn should_run(&self, current_outcome: TaskOutcome) -> bool {
        (self.condition)(current_outcome)
    }

    fn as_basic(&self) -> Option<&BasicStep> {
        Some(self)
    }
}

impl std::fmt::Debug for BasicStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicStep").field("name", &self.name).finish()
    }
}
