// ABOUTME: Integration tests for the sequential and staged pipeline executors
// ABOUTME: Covers ordering, backpressure, equivalence, faults, cancellation, and progress

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use convoy::{
    CancellationToken, EventCollector, NoopProgressSink, PipelineBlock, PipelineStep,
    StepExecutorRegistry, TaskDefinition, TaskExecutor, TaskOutcome,
};

mod common;
use common::{
    all_executors, batch_numbers, batch_store, block_started_numbers, multiply_block,
    number_batches, recording_block, CollectingProgressSink,
};

#[tokio::test]
async fn test_sequential_pipeline_applies_blocks_in_order() {
    let store = batch_store();

    let mut task = TaskDefinition::new("task").with_step(PipelineStep::new(
        "pipeline",
        number_batches(3, 2),
        vec![
            multiply_block("double", 2),
            recording_block("record", store.clone()),
        ],
    ));

    let executor = TaskExecutor::new(StepExecutorRegistry::sequential());
    let result = executor.run(&mut task).await.unwrap();

    assert!(result.is_successful());
    let recorded = store.lock().unwrap().clone();
    assert_eq!(recorded, vec![vec![0, 2], vec![4, 6], vec![8, 10]]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_executors_are_observationally_equivalent() {
    let mut outputs = Vec::new();
    let mut batch_end_orders = Vec::new();

    for (label, executor) in all_executors() {
        let collector = Arc::new(EventCollector::new());
        let executor = executor.with_events(collector.clone());
        let store = batch_store();

        let mut task = TaskDefinition::new("task").with_step(PipelineStep::new(
            "pipeline",
            number_batches(4, 3),
            vec![
                multiply_block("double", 2).parallel(),
                multiply_block("triple", 3),
                recording_block("record", store.clone()),
            ],
        ));

        let result = executor.run(&mut task).await.unwrap();
        assert!(result.is_successful(), "{} run failed", label);

        outputs.push(store.lock().unwrap().clone());
        batch_end_orders.push(batch_numbers(&collector.snapshot(), "batch_ended"));
    }

    // Same final batch contents and same BatchEnded number sequence,
    // regardless of strategy
    assert_eq!(outputs[0], outputs[1]);
    assert_eq!(batch_end_orders[0], batch_end_orders[1]);
    assert_eq!(batch_end_orders[0], vec![1, 2, 3, 4]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_staged_pipeline_preserves_order_across_parallel_stages() {
    let collector = Arc::new(EventCollector::new());

    // Earlier batches sleep longer, so workers finish out of order
    let jitter = PipelineBlock::new("jitter", |batch: &mut Vec<i64>| {
        let delay = 20u64.saturating_sub(batch[0] as u64 * 5);
        std::thread::sleep(Duration::from_millis(delay));
        Ok(())
    })
    .parallel();

    let mut task = TaskDefinition::new("task").with_step(PipelineStep::new(
        "pipeline",
        vec![vec![0i64], vec![1], vec![2], vec![3]],
        vec![jitter, PipelineBlock::new("collect", |_| Ok(()))],
    ));

    let executor = TaskExecutor::new(StepExecutorRegistry::staged_with_parallelism(4))
        .with_events(collector.clone());
    let result = executor.run(&mut task).await.unwrap();
    assert!(result.is_successful());

    let events = collector.snapshot();
    // The downstream stage sees batch numbers in input order even though
    // the parallel stage completed them out of order
    assert_eq!(block_started_numbers(&events, "collect"), vec![1, 2, 3, 4]);
    assert_eq!(batch_numbers(&events, "batch_ended"), vec![1, 2, 3, 4]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_parallel_stage_respects_configured_parallelism() {
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let active_clone = Arc::clone(&active);
    let peak_clone = Arc::clone(&peak);
    let tracking = PipelineBlock::new("tracked", move |_batch: &mut Vec<i64>| {
        let current = active_clone.fetch_add(1, Ordering::SeqCst) + 1;
        peak_clone.fetch_max(current, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(10));
        active_clone.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    })
    .parallel();

    let mut task = TaskDefinition::new("task").with_step(PipelineStep::new(
        "pipeline",
        number_batches(8, 1),
        vec![tracking],
    ));

    let executor = TaskExecutor::new(StepExecutorRegistry::staged_with_parallelism(2));
    let result = executor.run(&mut task).await.unwrap();

    assert!(result.is_successful());
    assert!(peak.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn test_pipeline_with_zero_blocks_passes_batches_through() {
    for (label, executor) in all_executors() {
        let collector = Arc::new(EventCollector::new());
        let progress = Arc::new(CollectingProgressSink::new());
        let executor = executor.with_events(collector.clone());

        let mut task = TaskDefinition::new("task").with_step(
            PipelineStep::new("pipeline", number_batches(2, 1), Vec::new())
                .with_expected_batch_count(2),
        );

        let result = executor
            .execute(&mut task, progress.clone(), CancellationToken::new())
            .await
            .unwrap();

        assert!(result.is_successful(), "{} run failed", label);
        assert_eq!(collector.count_of("batch_started"), 2);
        assert_eq!(collector.count_of("batch_ended"), 2);
        assert_eq!(collector.count_of("block_started"), 0);
        assert_eq!(progress.percentages(), vec![Some(50), Some(100)]);
    }
}

#[tokio::test]
async fn test_progress_is_indeterminate_without_expected_count() {
    for (label, executor) in all_executors() {
        let progress = Arc::new(CollectingProgressSink::new());

        let mut task = TaskDefinition::new("task").with_step(PipelineStep::new(
            "pipeline",
            number_batches(3, 1),
            vec![multiply_block("noop", 1)],
        ));

        let result = executor
            .execute(&mut task, progress.clone(), CancellationToken::new())
            .await
            .unwrap();

        assert!(result.is_successful(), "{} run failed", label);
        assert_eq!(progress.percentages(), vec![None, None, None], "{}", label);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_block_fault_fails_the_step_with_diagnostics() {
    for (label, executor) in all_executors() {
        let failing = PipelineBlock::new("explode", |batch: &mut Vec<i64>| {
            if batch[0] >= 2 {
                return Err("bad batch".into());
            }
            Ok(())
        })
        .with_diagnostic_data(serde_json::json!({"stage": "explode"}));

        let mut task = TaskDefinition::new("task").with_step(PipelineStep::new(
            "pipeline",
            number_batches(4, 1),
            vec![failing],
        ));

        let result = executor.run(&mut task).await.unwrap();

        assert_eq!(result.outcome(), TaskOutcome::Failed, "{}", label);
        assert_eq!(result.errors.len(), 1, "{}", label);

        let error = &result.errors[0];
        assert_eq!(error.step_name, "pipeline");
        assert!(error.source.to_string().contains("bad batch"));
        assert_eq!(
            error.diagnostics.as_ref().unwrap()["stage"],
            "explode",
            "{}",
            label
        );
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cancellation_mid_pipeline_stops_promptly() {
    for (label, executor) in all_executors() {
        let collector = Arc::new(EventCollector::new());
        let cancellation = CancellationToken::new();
        let executor = executor.with_events(collector.clone());

        let token = cancellation.clone();
        let canceling = PipelineBlock::new("cancel-on-second", move |batch: &mut Vec<i64>| {
            if batch[0] >= 1 {
                token.cancel();
            }
            Ok(())
        });

        let mut task = TaskDefinition::new("task").with_step(PipelineStep::new(
            "pipeline",
            number_batches(50, 1),
            vec![canceling],
        ));

        let result = executor
            .execute(&mut task, Arc::new(NoopProgressSink), cancellation)
            .await
            .unwrap();

        assert!(result.was_canceled, "{}", label);
        assert!(result.errors.is_empty(), "{}", label);
        assert_eq!(collector.count_of("step_canceled"), 1, "{}", label);
        // Far fewer batches were admitted than the input offered
        assert!(
            collector.count_of("batch_started") < 50,
            "{} admitted too many batches",
            label
        );
    }
}

#[tokio::test]
async fn test_item_body_blocks_process_each_item() {
    let store = batch_store();

    let mut task = TaskDefinition::new("task").with_step(PipelineStep::new(
        "pipeline",
        vec![vec![1i64, 2, 3]],
        vec![
            PipelineBlock::item_body("increment", |item: &mut i64| {
                *item += 1;
                Ok(())
            }),
            recording_block("record", store.clone()),
        ],
    ));

    let executor = TaskExecutor::new(StepExecutorRegistry::sequential());
    let result = executor.run(&mut task).await.unwrap();

    assert!(result.is_successful());
    assert_eq!(store.lock().unwrap().clone(), vec![vec![2, 3, 4]]);
}

#[tokio::test]
async fn test_mixed_basic_and_pipeline_steps() {
    let store = batch_store();

    let mut task = TaskDefinition::new("task")
        .with_step(convoy::BasicStep::empty("prepare"))
        .with_step(PipelineStep::new(
            "pipeline",
            number_batches(2, 2),
            vec![recording_block("record", store.clone())],
        ))
        .with_step(convoy::BasicStep::empty("finish"));

    let executor = TaskExecutor::new(StepExecutorRegistry::staged_with_parallelism(2));
    let result = executor.run(&mut task).await.unwrap();

    assert!(result.is_successful());
    assert_eq!(store.lock().unwrap().len(), 2);
}
