// ABOUTME: Stage worker machinery for the staged pipeline executor
// ABOUTME: Bounded worker pool per stage plus a reorder buffer restoring batch order

use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::engine::context::StepContext;
use crate::engine::error::ExecutionError;
use crate::engine::events::ExecutionEvent;
use crate::engine::progress::report_batch;
use crate::task::pipeline::{ErasedBatch, ErasedBlock};

/// First fault recorded anywhere in the pipeline; later faults are
/// suppressed.
pub(crate) type FaultSlot = Arc<Mutex<Option<ExecutionError>>>;

pub(crate) fn record_fault(slot: &FaultSlot, error: ExecutionError) {
    let mut guard = slot.lock().expect("pipeline fault slot poisoned");
    if guard.is_none() {
        *guard = Some(error);
    } else {
        debug!("Suppressing subsequent pipeline fault: {}", error);
    }
}

/// Restores batch-number order at a stage's output. Workers complete out
/// of order; downstream must still observe input order.
pub(crate) struct ReorderBuffer {
    pending: BTreeMap<usize, ErasedBatch>,
    next: usize,
}

impl ReorderBuffer {
    pub(crate) fn new() -> Self {
        Self {
            pending: BTreeMap::new(),
            next: 1,
        }
    }

    /// Accept a completed batch and return every batch now ready to be
    /// forwarded, in order.
    pub(crate) fn accept(&mut self, batch: ErasedBatch) -> Vec<ErasedBatch> {
        self.pending.insert(batch.number, batch);

        let mut ready = Vec::new();
        while let Some(batch) = self.pending.remove(&self.next) {
            ready.push(batch);
            self.next += 1;
        }
        ready
    }
}

/// One stage of the staged pipeline: reads batches from its bounded
/// input queue, runs the block body on up to `parallelism` batches
/// concurrently, and forwards results downstream in batch-number order.
///
/// On a fault the stage stops reading, which collapses the chain:
/// upstream producers observe the closed channel and stop, downstream
/// stages drain and finish. In-flight bodies always run to completion.
pub(crate) async fn run_stage(
    block: ErasedBlock,
    parallelism: usize,
    mut rx: mpsc::Receiver<ErasedBatch>,
    tx: mpsc::Sender<ErasedBatch>,
    ctx: StepContext,
    fault: FaultSlot,
) {
    let mut in_flight: FuturesUnordered<JoinHandle<Result<ErasedBatch, ExecutionError>>> =
        FuturesUnordered::new();
    let mut reorder = ReorderBuffer::new();
    let mut accepting = true;
    let mut forwarding = true;

    while accepting || !in_flight.is_empty() {
        let has_in_flight = !in_flight.is_empty();
        let has_capacity = accepting && in_flight.len() < parallelism;

        tokio::select! {
            biased;

            _ = ctx.cancellation.cancelled(), if accepting => {
                debug!("[stage {}] cancellation requested, draining in-flight work", block.name);
                rx.close();
                accepting = false;
                forwarding = false;
            }

            Some(joined) = in_flight.next(), if has_in_flight => {
                match joined {
                    Ok(Ok(batch)) => {
                        if forwarding {
                            for ready in reorder.accept(batch) {
                                if tx.send(ready).await.is_err() {
                                    debug!("[stage {}] downstream closed, draining", block.name);
                                    rx.close();
                                    accepting = false;
                                    forwarding = false;
                                    break;
                                }
                            }
                        }
                    }
                    Ok(Err(error)) => {
                        debug!("[stage {}] block fault: {}", block.name, error);
                        record_fault(&fault, error);
                        rx.close();
                        accepting = false;
                        forwarding = false;
                    }
                    Err(join_error) => {
                        record_fault(
                            &fault,
                            ExecutionError::new(&ctx.step_name, Box::new(join_error)),
                        );
                        rx.close();
                        accepting = false;
                        forwarding = false;
                    }
                }
            }

            maybe_batch = rx.recv(), if has_capacity => {
                match maybe_batch {
                    Some(batch) => {
                        // Emitted at admission so downstream observers see
                        // batch numbers in input order per stage
                        ctx.events.emit(ExecutionEvent::BlockStarted {
                            step_name: ctx.step_name.clone(),
                            block_name: block.name.clone(),
                            batch_number: batch.number,
                            timestamp: Utc::now(),
                        });
                        in_flight.push(spawn_body(block.clone(), batch, ctx.clone()));
                    }
                    None => accepting = false,
                }
            }
        }
    }

    debug!("[stage {}] finished", block.name);
}

/// Run one block body on the blocking pool. The reported duration covers
/// only the body invocation, never time spent queued.
fn spawn_body(
    block: ErasedBlock,
    mut batch: ErasedBatch,
    ctx: StepContext,
) -> JoinHandle<Result<ErasedBatch, ExecutionError>> {
    tokio::task::spawn_blocking(move || {
        let block_timer = Instant::now();
        match block.run(&mut batch) {
            Ok(()) => {
                ctx.events.emit(ExecutionEvent::BlockEnded {
                    step_name: ctx.step_name.clone(),
                    block_name: block.name.clone(),
                    batch_number: batch.number,
                    duration: block_timer.elapsed(),
                    timestamp: Utc::now(),
                });
                Ok(batch)
            }
            Err(source) => Err(ExecutionError::new(&ctx.step_name, source)
                .with_diagnostics(block.diagnostic_data.clone())),
        }
    })
}

/// Terminal single-worker stage: stops the batch's accumulated timer,
/// emits BatchEnded, and reports progress.
pub(crate) async fn run_progress_sink(
    mut rx: mpsc::Receiver<ErasedBatch>,
    ctx: StepContext,
    expected_batch_count: Option<usize>,
) {
    loop {
        tokio::select! {
            biased;

            _ = ctx.cancellation.cancelled() => break,

            maybe_batch = rx.recv() => {
                match maybe_batch {
                    Some(batch) => {
                        ctx.events.emit(ExecutionEvent::BatchEnded {
                            step_name: ctx.step_name.clone(),
                            batch_number: batch.number,
                            duration: batch.elapsed(),
                            timestamp: Utc::now(),
                        });
                        report_batch(
                            ctx.progress.as_ref(),
                            &ctx.step_name,
                            batch.number,
                            expected_batch_count,
                        );
                    }
                    None => break,
                }
            }
        }
    }
}
