// ABOUTME: Pipeline step data model: numbered batches flowing through an ordered list of blocks
// ABOUTME: Provides the type-erased surface that lets one executor serve every payload type

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::engine::error::{BoxError, EngineError};
use crate::engine::result::TaskOutcome;
use crate::task::step::{run_on_success, StepCondition, StepKind, TaskStep};

/// A batch payload with its concrete type erased. Constructed and
/// downcast only inside the owning pipeline step, so the engine never
/// needs to know `T`.
pub type BatchPayload = Box<dyn Any + Send>;

/// One transform stage applied to every batch of a pipeline step.
///
/// Blocks are immutable once constructed and shared read-only across all
/// workers assigned to their stage.
pub struct PipelineBlock<T> {
    name: String,
    parallel: bool,
    diagnostic_data: Option<serde_json::Value>,
    body: Arc<dyn Fn(&mut Vec<T>) -> Result<(), BoxError> + Send + Sync>,
}

impl<T: Send + 'static> PipelineBlock<T> {
    /// A block whose body receives the whole batch.
    pub fn new(
        name: impl Into<String>,
        body: impl Fn(&mut Vec<T>) -> Result<(), BoxError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            parallel: false,
            diagnostic_data: None,
            body: Arc::new(body),
        }
    }

    /// A block whose body is applied to each item of a batch in order.
    /// The first item fault aborts the batch.
    pub fn item_body(
        name: impl Into<String>,
        body: impl Fn(&mut T) -> Result<(), BoxError> + Send + Sync + 'static,
    ) -> Self {
        Self::new(name, move |batch: &mut Vec<T>| {
            for item in batch.iter_mut() {
                body(item)?;
            }
            Ok(())
        })
    }

    /// Allow this block's stage to process multiple batches concurrently,
    /// bounded by the staged executor's configured parallelism.
    pub fn parallel(mut self) -> Self {
        self.parallel = true;
        self
    }

    /// Attach a diagnostic payload surfaced on the `ExecutionError` when
    /// this block fails. Intended for post-mortem use by the caller.
    pub fn with_diagnostic_data(mut self, data: serde_json::Value) -> Self {
        self.diagnostic_data = Some(data);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }
}

impl<T> std::fmt::Debug for PipelineBlock<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBlock")
            .field("name", &self.name)
            .field("parallel", &self.parallel)
            .finish()
    }
}

/// A step whose work is expressed as batches of `T` flowing through an
/// ordered list of blocks.
pub struct PipelineStep<T> {
    name: String,
    input: Option<Box<dyn Iterator<Item = Vec<T>> + Send>>,
    blocks: Vec<PipelineBlock<T>>,
    expected_batch_count: Option<usize>,
    condition: StepCondition,
}

impl<T: Send + 'static> PipelineStep<T> {
    pub fn new<I>(name: impl Into<String>, input: I, blocks: Vec<PipelineBlock<T>>) -> Self
    where
        I: IntoIterator<Item = Vec<T>>,
        I::IntoIter: Send + 'static,
    {
        Self {
            name: name.into(),
            input: Some(Box::new(input.into_iter())),
            blocks,
            expected_batch_count: None,
            condition: run_on_success(),
        }
    }

    /// Total batch count used to derive percentage progress. Without it,
    /// progress is reported as indeterminate.
    pub fn with_expected_batch_count(mut self, count: usize) -> Self {
        self.expected_batch_count = Some(count);
        self
    }

    pub fn with_condition(mut self, condition: StepCondition) -> Self {
        self.condition = condition;
        self
    }
}

impl<T> std::fmt::Debug for PipelineStep<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineStep")
            .field("name", &self.name)
            .field("blocks", &self.blocks.len())
            .field("expected_batch_count", &self.expected_batch_count)
            .finish()
    }
}

impl<T: Send + 'static> TaskStep for PipelineStep<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StepKind {
        StepKind::Pipeline
    }

    fn should_run(&self, current_outcome: TaskOutcome) -> bool {
        (self.condition)(current_outcome)
    }

    fn take_pipeline(&mut self) -> Option<Result<ErasedPipeline, EngineError>> {
        let input = match self.input.take() {
            Some(input) => input,
            None => {
                return Some(Err(EngineError::PipelineInputConsumed {
                    step_name: self.name.clone(),
                }))
            }
        };

        Some(Ok(ErasedPipeline {
            step_name: self.name.clone(),
            expected_batch_count: self.expected_batch_count,
            input: Box::new(input.map(|batch| Box::new(batch) as BatchPayload)),
            blocks: self.blocks.iter().map(erase_block).collect(),
        }))
    }
}

fn erase_block<T: Send + 'static>(block: &PipelineBlock<T>) -> ErasedBlock {
    let body = Arc::clone(&block.body);

    ErasedBlock {
        name: block.name.clone(),
        parallel: block.parallel,
        diagnostic_data: block.diagnostic_data.clone(),
        body: Arc::new(move |payload: &mut BatchPayload| {
            // Payloads are only ever produced by the same typed step
            let batch = payload
                .downcast_mut::<Vec<T>>()
                .expect("pipeline batch payload type mismatch");
            body(batch)
        }),
    }
}

/// A pipeline step with its payload type erased, ready for execution.
pub struct ErasedPipeline {
    pub step_name: String,
    pub expected_batch_count: Option<usize>,
    pub input: Box<dyn Iterator<Item = BatchPayload> + Send>,
    pub blocks: Vec<ErasedBlock>,
}

/// A block with its payload type erased. Cheap to clone; workers share
/// the body through an `Arc`.
#[derive(Clone)]
pub struct ErasedBlock {
    pub name: String,
    pub parallel: bool,
    pub diagnostic_data: Option<serde_json::Value>,
    body: Arc<dyn Fn(&mut BatchPayload) -> Result<(), BoxError> + Send + Sync>,
}

impl ErasedBlock {
    pub fn run(&self, batch: &mut ErasedBatch) -> Result<(), BoxError> {
        (self.body)(&mut batch.payload)
    }
}

/// One numbered unit of pipeline input data, moving through the stages.
///
/// `started_at` is stamped when the batch is admitted into the pipeline;
/// the whole-batch duration reported in `BatchEnded` spans all stages,
/// queue time included. Each batch is owned by at most one worker at a
/// time.
pub struct ErasedBatch {
    pub number: usize,
    pub payload: BatchPayload,
    started_at: Instant,
}

impl ErasedBatch {
    pub fn new(number: usize, payload: BatchPayload) -> Self {
        Self {
            number,
            payload,
            started_at: Instant::now(),
        }
    }

    /// Total processing time since the batch was admitted.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}
