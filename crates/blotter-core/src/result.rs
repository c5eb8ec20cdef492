use crate::query::SearchQuery;
use crate::record::BookingRecord;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Why a single query failed. A failure here is that query's outcome, never
/// the run's: it is recorded and the batch keeps going.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    #[error("timed out waiting for the portal")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("could not parse results page: {0}")]
    Parse(String),

    #[error("portal session authentication expired")]
    AuthExpired,

    #[error("cancelled before the search started")]
    Cancelled,
}

/// Per-query outcome. Zero records with no error is a real answer, kept
/// distinct from a parse failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchStatus {
    Success,
    NoMatch,
    Failed(FailureReason),
}

impl SearchStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, SearchStatus::Failed(_))
    }

    /// Short label for progress lines and summaries.
    pub fn label(&self) -> &'static str {
        match self {
            SearchStatus::Success => "found",
            SearchStatus::NoMatch => "no match",
            SearchStatus::Failed(FailureReason::Timeout) => "timeout",
            SearchStatus::Failed(FailureReason::Network(_)) => "network error",
            SearchStatus::Failed(FailureReason::Parse(_)) => "parse error",
            SearchStatus::Failed(FailureReason::AuthExpired) => "auth expired",
            SearchStatus::Failed(FailureReason::Cancelled) => "cancelled",
        }
    }
}

/// The completed outcome for one query, owned by the coordinator once
/// reported. `elapsed` is display metadata, not identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub query: SearchQuery,
    pub records: Vec<BookingRecord>,
    pub status: SearchStatus,
    #[serde(default)]
    pub elapsed: Duration,
}

impl SearchResult {
    /// A search that ran to completion: Success with records, NoMatch without.
    pub fn completed(query: SearchQuery, records: Vec<BookingRecord>, elapsed: Duration) -> Self {
        let status = if records.is_empty() {
            SearchStatus::NoMatch
        } else {
            SearchStatus::Success
        };
        Self {
            query,
            records,
            status,
            elapsed,
        }
    }

    pub fn failed(query: SearchQuery, reason: FailureReason, elapsed: Duration) -> Self {
        Self {
            query,
            records: Vec::new(),
            status: SearchStatus::Failed(reason),
            elapsed,
        }
    }

    /// A query the run never started.
    pub fn cancelled(query: SearchQuery) -> Self {
        Self::failed(query, FailureReason::Cancelled, Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> SearchQuery {
        SearchQuery::new("Doe", "John").unwrap()
    }

    #[test]
    fn test_completed_distinguishes_no_match() {
        let empty = SearchResult::completed(query(), vec![], Duration::from_secs(1));
        assert_eq!(empty.status, SearchStatus::NoMatch);
        assert!(!empty.status.is_failed());

        let found = SearchResult::completed(
            query(),
            vec![BookingRecord::new()],
            Duration::from_secs(1),
        );
        assert_eq!(found.status, SearchStatus::Success);
    }

    #[test]
    fn test_cancelled_is_failed() {
        let result = SearchResult::cancelled(query());
        assert_eq!(result.status, SearchStatus::Failed(FailureReason::Cancelled));
        assert!(result.records.is_empty());
    }

    #[test]
    fn test_result_round_trips_through_json() {
        let result = SearchResult::failed(
            query(),
            FailureReason::Network("connection reset".into()),
            Duration::from_millis(250),
        );

        let json = serde_json::to_string(&result).unwrap();
        let back: SearchResult = serde_json::from_str(&json).unwrap();

        assert_eq!(back.query, result.query);
        assert_eq!(back.status, result.status);
        assert_eq!(back.elapsed, result.elapsed);
    }
}
