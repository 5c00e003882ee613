// ABOUTME: Executor for basic single-action steps
// ABOUTME: Runs the body, wraps faults with the step name, then observes cancellation

use async_trait::async_trait;
use tracing::debug;

use crate::engine::context::StepContext;
use crate::engine::error::{EngineError, ExecutionError, StepError};
use crate::engine::resolver::StepExecutor;
use crate::task::step::{StepKind, TaskStep};

pub struct BasicStepExecutor;

#[async_trait]
impl StepExecutor for BasicStepExecutor {
    async fn execute(&self, step: &mut dyn TaskStep, ctx: StepContext) -> Result<(), StepError> {
        let step_name = step.name().to_string();
        let basic = step
            .as_basic()
            .ok_or_else(|| EngineError::StepKindMismatch {
                step_name: step_name.clone(),
                expected: StepKind::Basic,
            })?;

        debug!("Executing basic step: {}", step_name);
        basic
            .run()
            .map_err(|source| ExecutionError::new(&step_name, source))?;

        // The body may itself have requested cancellation
        if ctx.cancellation.is_cancelled() {
            return Err(StepError::Canceled);
        }

        Ok(())
    }
}
