// ABOUTME: Task data model for the convoy execution engine
// ABOUTME: Defines task definitions, steps, and the pipeline batch/block model

pub mod definition;
pub mod pipeline;
pub mod step;

pub use definition::TaskDefinition;
pub use pipeline::{BatchPayload, ErasedBatch, ErasedBlock, ErasedPipeline, PipelineBlock, PipelineStep};
pub use step::{always_run, run_on_success, unless_failed, BasicStep, StepCondition, StepKind, TaskStep};
