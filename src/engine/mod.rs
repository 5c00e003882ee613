// ABOUTME: Task execution engine module for the convoy crate
// ABOUTME: Handles the step loop, executor resolution, telemetry, and progress reporting

pub mod context;
pub mod error;
pub mod events;
pub mod executor;
pub mod progress;
pub mod resolver;
pub mod result;

pub use context::StepContext;
pub use error::{BoxError, EngineError, ExecutionError, StepError};
pub use events::{EventCollector, EventSink, ExecutionEvent, NoopEventSink};
pub use executor::TaskExecutor;
pub use progress::{NoopProgressSink, ProgressSink, StepProgress};
pub use resolver::{StepExecutor, StepExecutorRegistry};
pub use result::{TaskOutcome, TaskResult};
