// ABOUTME: Top-level task executor driving the step loop and outcome aggregation
// ABOUTME: Steps after a failure are still considered; each step's own condition decides

use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::engine::context::StepContext;
use crate::engine::error::{EngineError, StepError};
use crate::engine::events::{EventSink, ExecutionEvent, NoopEventSink};
use crate::engine::progress::{NoopProgressSink, ProgressSink};
use crate::engine::resolver::StepExecutorRegistry;
use crate::engine::result::{TaskOutcome, TaskResult};
use crate::task::definition::TaskDefinition;

/// Drives a task run: iterates steps in order, resolves the executor for
/// each, aggregates outcome and errors, and emits task/step telemetry.
pub struct TaskExecutor {
    registry: Arc<StepExecutorRegistry>,
    events: Arc<dyn EventSink>,
}

impl TaskExecutor {
    pub fn new(registry: StepExecutorRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            events: Arc::new(NoopEventSink),
        }
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Run a task with no progress rendering and a token the caller
    /// never cancels.
    pub async fn run(&self, task: &mut TaskDefinition) -> Result<TaskResult, EngineError> {
        self.execute(task, Arc::new(NoopProgressSink), CancellationToken::new())
            .await
    }

    /// Run a task, reporting per-step progress and observing the shared
    /// cancellation token. Returns `Err` only for configuration faults;
    /// step failures and cancellation are reported in the `TaskResult`.
    pub async fn execute(
        &self,
        task: &mut TaskDefinition,
        progress: Arc<dyn ProgressSink>,
        cancellation: CancellationToken,
    ) -> Result<TaskResult, EngineError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let task_name = task.name().to_string();

        info!("Starting task execution: {} (run_id: {})", task_name, run_id);
        self.events.emit(ExecutionEvent::TaskStarted {
            task_name: task_name.clone(),
            timestamp: Utc::now(),
        });
        let task_timer = Instant::now();

        let mut outcome = TaskOutcome::Successful;
        let mut errors = Vec::new();

        for step in task.steps_mut() {
            let step_name = step.name().to_string();

            if !step.should_run(outcome) {
                debug!(
                    "Skipping step {} (current outcome: {})",
                    step_name, outcome
                );
                self.events.emit(ExecutionEvent::StepSkipped {
                    step_name,
                    timestamp: Utc::now(),
                });
                continue;
            }

            self.events.emit(ExecutionEvent::StepStarted {
                step_name: step_name.clone(),
                timestamp: Utc::now(),
            });
            let step_timer = Instant::now();

            let executor = self.registry.resolve(step.kind())?;
            let ctx = StepContext {
                task_name: task_name.clone(),
                step_name: step_name.clone(),
                run_id: run_id.clone(),
                events: Arc::clone(&self.events),
                progress: Arc::clone(&progress),
                cancellation: cancellation.clone(),
            };

            match executor.execute(step.as_mut(), ctx).await {
                Ok(()) => {
                    debug!("Step {} completed", step_name);
                    self.events.emit(ExecutionEvent::StepEnded {
                        step_name,
                        duration: step_timer.elapsed(),
                        timestamp: Utc::now(),
                    });
                }
                Err(StepError::Canceled) => {
                    warn!("Step {} canceled", step_name);
                    self.events.emit(ExecutionEvent::StepCanceled {
                        step_name,
                        timestamp: Utc::now(),
                    });
                    outcome.escalate_to(TaskOutcome::Canceled);
                }
                Err(StepError::Failed(execution_error)) => {
                    error!("Step {} failed: {}", step_name, execution_error);
                    self.events.emit(ExecutionEvent::StepFailed {
                        step_name,
                        error: execution_error.to_string(),
                        timestamp: Utc::now(),
                    });
                    errors.push(execution_error);
                    outcome.escalate_to(TaskOutcome::Failed);
                }
                Err(StepError::Engine(engine_error)) => {
                    error!("Configuration fault in step {}: {}", step_name, engine_error);
                    return Err(engine_error);
                }
            }
        }

        let result = TaskResult::new(outcome, errors);
        self.events.emit(ExecutionEvent::TaskEnded {
            task_name: task_name.clone(),
            was_canceled: result.was_canceled,
            error_count: result.errors.len(),
            duration: task_timer.elapsed(),
            timestamp: Utc::now(),
        });
        info!(
            "Task execution completed: {} (outcome: {}, errors: {})",
            task_name,
            outcome,
            result.errors.len()
        );

        Ok(result)
    }
}
