// ABOUTME: Telemetry event contract emitted synchronously at well-defined execution points
// ABOUTME: A pure side-channel: control flow and results are identical with or without a subscriber

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;

/// Value-type event records. Every event carries a wall-clock timestamp;
/// every `*Ended` event carries a duration measured on the monotonic
/// clock within the boundaries of the work it describes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionEvent {
    TaskStarted {
        task_name: String,
        timestamp: DateTime<Utc>,
    },
    TaskEnded {
        task_name: String,
        was_canceled: bool,
        error_count: usize,
        duration: Duration,
        timestamp: DateTime<Utc>,
    },
    StepStarted {
        step_name: String,
        timestamp: DateTime<Utc>,
    },
    StepEnded {
        step_name: String,
        duration: Duration,
        timestamp: DateTime<Utc>,
    },
    StepSkipped {
        step_name: String,
        timestamp: DateTime<Utc>,
    },
    StepCanceled {
        step_name: String,
        timestamp: DateTime<Utc>,
    },
    StepFailed {
        step_name: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
    BatchStarted {
        step_name: String,
        batch_number: usize,
        timestamp: DateTime<Utc>,
    },
    BatchEnded {
        step_name: String,
        batch_number: usize,
        duration: Duration,
        timestamp: DateTime<Utc>,
    },
    BlockStarted {
        step_name: String,
        block_name: String,
        batch_number: usize,
        timestamp: DateTime<Utc>,
    },
    BlockEnded {
        step_name: String,
        block_name: String,
        batch_number: usize,
        duration: Duration,
        timestamp: DateTime<Utc>,
    },
}

impl ExecutionEvent {
    /// Stable tag for filtering collected events.
    pub fn kind(&self) -> &'static str {
        match self {
            ExecutionEvent::TaskStarted { .. } => "task_started",
            ExecutionEvent::TaskEnded { .. } => "task_ended",
            ExecutionEvent::StepStarted { .. } => "step_started",
            ExecutionEvent::StepEnded { .. } => "step_ended",
            ExecutionEvent::StepSkipped { .. } => "step_skipped",
            ExecutionEvent::StepCanceled { .. } => "step_canceled",
            ExecutionEvent::StepFailed { .. } => "step_failed",
            ExecutionEvent::BatchStarted { .. } => "batch_started",
            ExecutionEvent::BatchEnded { .. } => "batch_ended",
            ExecutionEvent::BlockStarted { .. } => "block_started",
            ExecutionEvent::BlockEnded { .. } => "block_ended",
        }
    }
}

/// Subscriber interface, threaded through the call chain rather than
/// looked up from ambient state. Emission happens synchronously at the
/// documented points, so implementations should be fast and must not
/// block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ExecutionEvent);
}

/// Default sink: discards everything.
#[derive(Debug, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: ExecutionEvent) {}
}

/// Records every emitted event in order of emission. Useful for
/// subscribers that post-process a run and for telemetry assertions in
/// tests.
#[derive(Debug, Default)]
pub struct EventCollector {
    events: Mutex<Vec<ExecutionEvent>>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<ExecutionEvent> {
        self.events.lock().expect("event collector poisoned").clone()
    }

    pub fn count_of(&self, kind: &str) -> usize {
        self.events
            .lock()
            .expect("event collector poisoned")
            .iter()
            .filter(|event| event.kind() == kind)
            .count()
    }
}

impl EventSink for EventCollector {
    fn emit(&self, event: ExecutionEvent) {
        self.events.lock().expect("event collector poisoned").push(event);
    }
}
