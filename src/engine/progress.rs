// ABOUTME: Per-step progress reporting scoped by step name
// ABOUTME: Percentage is derived from batch number over expected batch count, else indeterminate

use serde::{Deserialize, Serialize};

/// One progress report. `percent` is `None` when the pipeline input's
/// total batch count is unknown (indeterminate progress).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepProgress {
    pub step_name: String,
    pub percent: Option<u8>,
}

/// Caller-supplied renderer for progress reports.
pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: StepProgress);
}

/// Default sink: discards all reports.
#[derive(Debug, Default)]
pub struct NoopProgressSink;

impl ProgressSink for NoopProgressSink {
    fn report(&self, _progress: StepProgress) {}
}

/// Integer percentage for a finished batch, clamped to 100.
pub(crate) fn batch_percent(batch_number: usize, expected_batch_count: Option<usize>) -> Option<u8> {
    expected_batch_count
        .filter(|&count| count > 0)
        .map(|count| ((batch_number * 100) / count).min(100) as u8)
}

/// Report progress for a finished batch through the step-scoped sink.
pub(crate) fn report_batch(
    progress: &dyn ProgressSink,
    step_name: &str,
    batch_number: usize,
    expected_batch_count: Option<usize>,
) {
    progress.report(StepProgress {
        step_name: step_name.to_string(),
        percent: batch_percent(batch_number, expected_batch_count),
    });
}
