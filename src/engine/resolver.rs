// ABOUTME: Step executor resolution: a registration-time mapping from step kind to executor
// ABOUTME: Read-only during execution; a missing mapping is a fatal configuration fault

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::engine::context::StepContext;
use crate::engine::error::{EngineError, StepError};
use crate::executors::{BasicStepExecutor, SequentialPipelineExecutor, StagedPipelineExecutor};
use crate::task::step::{StepKind, TaskStep};

/// An executor capable of running one kind of step. Payload genericity
/// is handled by the step's own type erasure, so a single registered
/// instance serves every data type.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    async fn execute(&self, step: &mut dyn TaskStep, ctx: StepContext) -> Result<(), StepError>;
}

/// Process-wide mapping from step kind to executor, established before
/// any task runs.
pub struct StepExecutorRegistry {
    executors: HashMap<StepKind, Arc<dyn StepExecutor>>,
}

impl StepExecutorRegistry {
    pub fn new() -> Self {
        Self {
            executors: HashMap::new(),
        }
    }

    /// Registry running pipeline steps with the in-process sequential
    /// executor.
    pub fn sequential() -> Self {
        let mut registry = Self::new();
        registry.register(StepKind::Basic, Arc::new(BasicStepExecutor));
        registry.register(StepKind::Pipeline, Arc::new(SequentialPipelineExecutor));
        registry
    }

    /// Registry running pipeline steps with the concurrent staged
    /// executor at its default degree of parallelism.
    pub fn staged() -> Self {
        Self::staged_with_parallelism(StagedPipelineExecutor::default_parallelism())
    }

    /// Staged registry with an explicit degree of parallelism, for
    /// deterministic tests and tuned deployments.
    pub fn staged_with_parallelism(parallelism: usize) -> Self {
        let mut registry = Self::new();
        registry.register(StepKind::Basic, Arc::new(BasicStepExecutor));
        registry.register(
            StepKind::Pipeline,
            Arc::new(StagedPipelineExecutor::with_parallelism(parallelism)),
        );
        registry
    }

    pub fn register(&mut self, kind: StepKind, executor: Arc<dyn StepExecutor>) {
        self.executors.insert(kind, executor);
    }

    pub fn resolve(&self, kind: StepKind) -> Result<Arc<dyn StepExecutor>, EngineError> {
        self.executors
            .get(&kind)
            .cloned()
            .ok_or(EngineError::UnresolvedStepKind { kind })
    }

    pub fn registered_kinds(&self) -> Vec<StepKind> {
        self.executors.keys().copied().collect()
    }
}

impl Default for StepExecutorRegistry {
    fn default() -> Self {
        Self::sequential()
    }
}
