use async_trait::async_trait;
use blotter_core::record::BookingRecord;
use blotter_core::{FailureReason, SearchQuery};

/// An authenticated browsing context that can run one search at a time.
///
/// A session is exclusive to whichever worker holds it; the coordinator never
/// hands one session to two in-flight queries. Session state (current page,
/// cookies in flight) is not safe to interleave.
#[async_trait]
pub trait Session: Send {
    /// Submit one query and parse its results. Zero records is a real
    /// answer, not an error.
    async fn search(
        &mut self,
        query: &SearchQuery,
    ) -> std::result::Result<Vec<BookingRecord>, FailureReason>;

    /// Tear the session down. Called when a slot retires or after a failure
    /// taints the session.
    async fn close(self: Box<Self>);
}

/// Creates authenticated sessions. Credentials are read-only shared state
/// held behind the factory.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create(&self) -> std::result::Result<Box<dyn Session>, FailureReason>;
}
