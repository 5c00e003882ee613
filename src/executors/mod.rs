// ABOUTME: Step executor implementations registered behind the resolver
// ABOUTME: Basic single-action steps plus two interchangeable pipeline strategies

pub mod basic;
pub mod sequential;
pub mod stage;
pub mod staged;

pub use basic::BasicStepExecutor;
pub use sequential::SequentialPipelineExecutor;
pub use staged::StagedPipelineExecutor;

use crate::engine::error::{EngineError, StepError};
use crate::task::pipeline::ErasedPipeline;
use crate::task::step::{StepKind, TaskStep};

/// Take the erased pipeline surface from a step, surfacing registry
/// misconfiguration and double-consumption as configuration faults.
pub(crate) fn take_pipeline(step: &mut dyn TaskStep) -> Result<ErasedPipeline, StepError> {
    match step.take_pipeline() {
        Some(pipeline) => pipeline.map_err(StepError::Engine),
        None => Err(StepError::Engine(EngineError::StepKindMismatch {
            step_name: step.name().to_string(),
            expected: StepKind::Pipeline,
        })),
    }
}
