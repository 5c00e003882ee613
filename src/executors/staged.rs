// ABOUTME: Staged concurrent pipeline executor: one bounded worker stage per block
// ABOUTME: Backpressure via bounded queues, order preserved per stage, single completion signal

use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::debug;

use crate::engine::context::StepContext;
use crate::engine::error::{ExecutionError, StepError};
use crate::engine::events::ExecutionEvent;
use crate::engine::resolver::StepExecutor;
use crate::executors::stage::{self, FaultSlot};
use crate::task::pipeline::ErasedBatch;
use crate::task::step::TaskStep;

/// Compiles a pipeline step's block list into a chain of bounded worker
/// stages so that different batches can be in different blocks
/// simultaneously. A block marked parallel fans out across this
/// executor's configured degree of parallelism; other blocks process one
/// batch at a time.
pub struct StagedPipelineExecutor {
    parallelism: usize,
}

impl StagedPipelineExecutor {
    pub fn new() -> Self {
        Self::with_parallelism(Self::default_parallelism())
    }

    /// Explicit degree of parallelism for parallel stages. Tests use
    /// this for determinism.
    pub fn with_parallelism(parallelism: usize) -> Self {
        Self {
            parallelism: parallelism.max(1),
        }
    }

    /// Available hardware parallelism minus one, with a minimum of 1.
    pub fn default_parallelism() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2)
            .saturating_sub(1)
            .max(1)
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }
}

impl Default for StagedPipelineExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StepExecutor for StagedPipelineExecutor {
    async fn execute(&self, step: &mut dyn TaskStep, ctx: StepContext) -> Result<(), StepError> {
        let pipeline = super::take_pipeline(step)?;
        let expected_batch_count = pipeline.expected_batch_count;

        debug!(
            "Running pipeline step {} staged ({} blocks, parallelism {}, run_id: {})",
            ctx.step_name,
            pipeline.blocks.len(),
            self.parallelism,
            ctx.run_id
        );

        let fault: FaultSlot = Arc::new(Mutex::new(None));

        // Build the chain back to front so each stage owns the sender to
        // its successor; the terminal stage is the progress sink.
        let (sink_tx, sink_rx) = mpsc::channel(1);
        let mut handles = Vec::with_capacity(pipeline.blocks.len() + 1);
        handles.push(tokio::spawn(stage::run_progress_sink(
            sink_rx,
            ctx.clone(),
            expected_batch_count,
        )));

        let mut next_tx = sink_tx;
        for block in pipeline.blocks.into_iter().rev() {
            let parallelism = if block.parallel { self.parallelism } else { 1 };
            // The bounded queue is the backpressure mechanism: a stage
            // admits no more batches than it can concurrently process
            let (stage_tx, stage_rx) = mpsc::channel(parallelism);
            handles.push(tokio::spawn(stage::run_stage(
                block,
                parallelism,
                stage_rx,
                next_tx,
                ctx.clone(),
                Arc::clone(&fault),
            )));
            next_tx = stage_tx;
        }

        // Feed input batches into the first stage, numbering from 1.
        // A send failure means the chain collapsed after a fault or
        // cancellation; stop producing.
        let first_tx = next_tx;
        let mut batch_number = 0;
        for payload in pipeline.input {
            if ctx.cancellation.is_cancelled() {
                break;
            }

            batch_number += 1;
            let batch = ErasedBatch::new(batch_number, payload);
            ctx.events.emit(ExecutionEvent::BatchStarted {
                step_name: ctx.step_name.clone(),
                batch_number,
                timestamp: Utc::now(),
            });

            if first_tx.send(batch).await.is_err() {
                break;
            }
        }
        drop(first_tx);

        // Overall completion resolves only after every stage including
        // the sink has finished
        for handle in handles {
            if let Err(join_error) = handle.await {
                stage::record_fault(
                    &fault,
                    ExecutionError::new(&ctx.step_name, Box::new(join_error)),
                );
            }
        }

        if let Some(error) = fault.lock().expect("pipeline fault slot poisoned").take() {
            return Err(StepError::Failed(error));
        }
        if ctx.cancellation.is_cancelled() {
            return Err(StepError::Canceled);
        }

        debug!(
            "Pipeline step {} completed ({} batches)",
            ctx.step_name, batch_number
        );
        Ok(())
    }
}
