// ABOUTME: Main library module for the convoy task execution engine
// ABOUTME: Exports all core modules and provides the public API

pub mod engine;
pub mod executors;
pub mod task;

// Re-export commonly used types
pub use engine::{
    BoxError, EngineError, EventCollector, EventSink, ExecutionError, ExecutionEvent, NoopEventSink,
    NoopProgressSink, ProgressSink, StepContext, StepError, StepExecutor, StepExecutorRegistry,
    StepProgress, TaskExecutor, TaskOutcome, TaskResult,
};
pub use executors::{BasicStepExecutor, SequentialPipelineExecutor, StagedPipelineExecutor};
pub use task::{
    always_run, run_on_success, unless_failed, BasicStep, PipelineBlock, PipelineStep,
    StepCondition, StepKind, TaskDefinition, TaskStep,
};

// Cancellation is cooperative and caller-owned; re-exported for convenience
pub use tokio_util::sync::CancellationToken;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
