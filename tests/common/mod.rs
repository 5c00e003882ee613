// ABOUTME: Common utilities and helpers for integration tests
// ABOUTME: Provides step builders, recording sinks, and pipeline fixtures

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use convoy::{
    BasicStep, ExecutionEvent, PipelineBlock, ProgressSink, StepExecutorRegistry, StepProgress,
    TaskExecutor,
};

/// Progress sink that records every report in order.
#[derive(Debug, Default)]
pub struct CollectingProgressSink {
    reports: Mutex<Vec<StepProgress>>,
}

impl CollectingProgressSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<StepProgress> {
        self.reports.lock().unwrap().clone()
    }

    pub fn percentages(&self) -> Vec<Option<u8>> {
        self.snapshot().iter().map(|r| r.percent).collect()
    }
}

impl ProgressSink for CollectingProgressSink {
    fn report(&self, progress: StepProgress) {
        self.reports.lock().unwrap().push(progress);
    }
}

/// Shared store for observing final batch contents after a pipeline run.
pub type BatchStore = Arc<Mutex<Vec<Vec<i64>>>>;

pub fn batch_store() -> BatchStore {
    Arc::new(Mutex::new(Vec::new()))
}

/// Block that copies each batch it sees into the store, in the order the
/// stage processes them.
pub fn recording_block(name: &str, store: BatchStore) -> PipelineBlock<i64> {
    PipelineBlock::new(name, move |batch: &mut Vec<i64>| {
        store.lock().unwrap().push(batch.clone());
        Ok(())
    })
}

/// Block that multiplies every item, with a touch of work so measured
/// durations are strictly positive.
pub fn multiply_block(name: &str, factor: i64) -> PipelineBlock<i64> {
    PipelineBlock::new(name, move |batch: &mut Vec<i64>| {
        std::thread::sleep(std::time::Duration::from_millis(1));
        for item in batch.iter_mut() {
            *item *= factor;
        }
        Ok(())
    })
}

/// Basic step whose body always fails.
pub fn failing_step(name: &str) -> BasicStep {
    BasicStep::new(name, || Err("step body failed".into()))
}

/// Input fixture: `count` batches of consecutive numbers, `size` items
/// each, so batch n starts at (n-1)*size.
pub fn number_batches(count: usize, size: usize) -> Vec<Vec<i64>> {
    (0..count)
        .map(|batch| {
            (0..size)
                .map(|item| (batch * size + item) as i64)
                .collect()
        })
        .collect()
}

/// Executors under test: both pipeline strategies must be
/// output-observationally equivalent for fault-free runs.
pub fn all_executors() -> Vec<(&'static str, TaskExecutor)> {
    vec![
        ("sequential", TaskExecutor::new(StepExecutorRegistry::sequential())),
        (
            "staged",
            TaskExecutor::new(StepExecutorRegistry::staged_with_parallelism(2)),
        ),
    ]
}

/// Step names carried by every collected event of the given kind.
pub fn step_event_names(events: &[ExecutionEvent], kind: &str) -> Vec<String> {
    events
        .iter()
        .filter(|event| event.kind() == kind)
        .filter_map(|event| match event {
            ExecutionEvent::StepStarted { step_name, .. }
            | ExecutionEvent::StepEnded { step_name, .. }
            | ExecutionEvent::StepSkipped { step_name, .. }
            | ExecutionEvent::StepCanceled { step_name, .. }
            | ExecutionEvent::StepFailed { step_name, .. } => Some(step_name.clone()),
            _ => None,
        })
        .collect()
}

/// Batch numbers carried by every collected event of the given kind.
pub fn batch_numbers(events: &[ExecutionEvent], kind: &str) -> Vec<usize> {
    events
        .iter()
        .filter(|event| event.kind() == kind)
        .filter_map(|event| match event {
            ExecutionEvent::BatchStarted { batch_number, .. }
            | ExecutionEvent::BatchEnded { batch_number, .. }
            | ExecutionEvent::BlockStarted { batch_number, .. }
            | ExecutionEvent::BlockEnded { batch_number, .. } => Some(*batch_number),
            _ => None,
        })
        .collect()
}

/// Batch numbers seen by one block's BlockStarted events, in emission
/// order.
pub fn block_started_numbers(events: &[ExecutionEvent], block: &str) -> Vec<usize> {
    events
        .iter()
        .filter_map(|event| match event {
            ExecutionEvent::BlockStarted {
                block_name,
                batch_number,
                ..
            } if block_name == block => Some(*batch_number),
            _ => None,
        })
        .collect()
}
