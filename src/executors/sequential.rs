// ABOUTME: Sequential pipeline executor: all blocks applied to one batch before the next begins
// ABOUTME: Single worker, strict batch ordering, cancellation observed between blocks and batches

use async_trait::async_trait;
use chrono::Utc;
use std::time::Instant;
use tracing::debug;

use crate::engine::context::StepContext;
use crate::engine::error::{ExecutionError, StepError};
use crate::engine::events::ExecutionEvent;
use crate::engine::progress::report_batch;
use crate::engine::resolver::StepExecutor;
use crate::task::pipeline::ErasedBatch;
use crate::task::step::TaskStep;

pub struct SequentialPipelineExecutor;

#[async_trait]
impl StepExecutor for SequentialPipelineExecutor {
    async fn execute(&self, step: &mut dyn TaskStep, ctx: StepContext) -> Result<(), StepError> {
        let pipeline = super::take_pipeline(step)?;
        let expected_batch_count = pipeline.expected_batch_count;
        let blocks = pipeline.blocks;

        debug!(
            "Running pipeline step {} sequentially ({} blocks, run_id: {})",
            ctx.step_name,
            blocks.len(),
            ctx.run_id
        );

        let mut batch_number = 0;
        for payload in pipeline.input {
            if ctx.cancellation.is_cancelled() {
                return Err(StepError::Canceled);
            }

            batch_number += 1;
            let mut batch = ErasedBatch::new(batch_number, payload);
            ctx.events.emit(ExecutionEvent::BatchStarted {
                step_name: ctx.step_name.clone(),
                batch_number,
                timestamp: Utc::now(),
            });

            for block in &blocks {
                ctx.events.emit(ExecutionEvent::BlockStarted {
                    step_name: ctx.step_name.clone(),
                    block_name: block.name.clone(),
                    batch_number,
                    timestamp: Utc::now(),
                });
                let block_timer = Instant::now();

                block.run(&mut batch).map_err(|source| {
                    ExecutionError::new(&ctx.step_name, source)
                        .with_diagnostics(block.diagnostic_data.clone())
                })?;

                ctx.events.emit(ExecutionEvent::BlockEnded {
                    step_name: ctx.step_name.clone(),
                    block_name: block.name.clone(),
                    batch_number,
                    duration: block_timer.elapsed(),
                    timestamp: Utc::now(),
                });

                if ctx.cancellation.is_cancelled() {
                    return Err(StepError::Canceled);
                }
            }

            ctx.events.emit(ExecutionEvent::BatchEnded {
                step_name: ctx.step_name.clone(),
                batch_number,
                duration: batch.elapsed(),
                timestamp: Utc::now(),
            });
            report_batch(
                ctx.progress.as_ref(),
                &ctx.step_name,
                batch_number,
                expected_batch_count,
            );
        }

        debug!(
            "Pipeline step {} completed ({} batches)",
            ctx.step_name, batch_number
        );
        Ok(())
    }
}
