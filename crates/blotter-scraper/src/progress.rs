use blotter_core::SearchStatus;
use std::time::Duration;
use tokio::sync::mpsc;

/// One notification per completed query, in completion (not submission)
/// order.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Position of the query in the submitted batch.
    pub index: usize,
    /// Display form of the query ("Last, First").
    pub query: String,
    pub status: SearchStatus,
    /// Queries completed so far, this one included.
    pub completed: usize,
    pub total: usize,
    pub elapsed: Duration,
}

pub type ProgressSender = mpsc::UnboundedSender<ProgressUpdate>;
pub type ProgressReceiver = mpsc::UnboundedReceiver<ProgressUpdate>;

/// Channel the coordinator writes progress into. Unbounded so reporting
/// never blocks the worker pool; a dropped receiver is simply ignored.
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::unbounded_channel()
}
