use crate::session::Session;
use blotter_core::{FailureReason, SearchQuery, SearchResult};
use std::time::{Duration, Instant};

/// Runs one query against one session under a bounded wait.
#[derive(Debug, Clone)]
pub struct SearchWorker {
    timeout: Duration,
}

impl SearchWorker {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Execute the query. Never blocks past the configured timeout: a search
    /// that outlives it becomes `Failed(Timeout)` rather than hanging the
    /// pool slot.
    pub async fn execute(&self, query: SearchQuery, session: &mut dyn Session) -> SearchResult {
        let started = Instant::now();
        tracing::debug!("Searching for {}", query);

        match tokio::time::timeout(self.timeout, session.search(&query)).await {
            Ok(Ok(records)) => {
                tracing::debug!("Found {} records for {}", records.len(), query);
                SearchResult::completed(query, records, started.elapsed())
            }
            Ok(Err(reason)) => {
                tracing::warn!("Search for {} failed: {}", query, reason);
                SearchResult::failed(query, reason, started.elapsed())
            }
            Err(_) => {
                tracing::warn!("Search for {} timed out after {:?}", query, self.timeout);
                SearchResult::failed(query, FailureReason::Timeout, started.elapsed())
            }
        }
    }
}
