// ABOUTME: Error types for task execution engine operations
// ABOUTME: Separates execution faults, cancellation, and configuration faults

use thiserror::Error;

use crate::task::step::StepKind;

/// Fault currency at block and step-body boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A processing fault raised inside a step or block body, wrapped with
/// the originating step's name and any diagnostic payload declared by
/// the failing block.
#[derive(Debug, Error)]
#[error("step '{step_name}' failed: {source}")]
pub struct ExecutionError {
    pub step_name: String,
    #[source]
    pub source: BoxError,
    pub diagnostics: Option<serde_json::Value>,
}

impl ExecutionError {
    pub fn new(step_name: impl Into<String>, source: BoxError) -> Self {
        Self {
            step_name: step_name.into(),
            source,
            diagnostics: None,
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Option<serde_json::Value>) -> Self {
        self.diagnostics = diagnostics;
        self
    }
}

/// How a step execution terminated when it did not complete normally.
///
/// Cancellation is cooperative and is not an error: it never appears in
/// `TaskResult::errors`. Engine variants are configuration faults and
/// abort the whole run immediately.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("step execution canceled")]
    Canceled,

    #[error(transparent)]
    Failed(#[from] ExecutionError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Configuration faults. Fatal: surfaced immediately, never retried and
/// never recorded as a step failure.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no step executor registered for step kind: {kind}")]
    UnresolvedStepKind { kind: StepKind },

    #[error("step '{step_name}' cannot be run by the {expected} step executor")]
    StepKindMismatch { step_name: String, expected: StepKind },

    #[error("pipeline input for step '{step_name}' was already consumed")]
    PipelineInputConsumed { step_name: String },
}
