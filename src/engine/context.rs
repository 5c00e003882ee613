// ABOUTME: Per-step execution context threaded from the task executor into step executors
// ABOUTME: Bundles the event sink, step-scoped progress sink, and the shared cancellation token

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::engine::events::EventSink;
use crate::engine::progress::ProgressSink;

/// Everything a step executor needs from its surroundings. Cloned freely
/// into stage tasks and workers; all members are shared handles.
#[derive(Clone)]
pub struct StepContext {
    pub task_name: String,
    pub step_name: String,
    pub run_id: String,
    pub events: Arc<dyn EventSink>,
    pub progress: Arc<dyn ProgressSink>,
    pub cancellation: CancellationToken,
}

impl std::fmt::Debug for StepContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepContext")
            .field("task_name", &self.task_name)
            .field("step_name", &self.step_name)
            .field("run_id", &self.run_id)
            .finish()
    }
}
