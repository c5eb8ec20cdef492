use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::pacing::Pacing;
use crate::progress::{ProgressSender, ProgressUpdate};
use crate::session::{Session, SessionFactory};
use crate::worker::SearchWorker;
use blotter_core::{Batch, FailureReason, ScrapeConfig, SearchQuery, SearchResult, SearchStatus};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

/// Fans a batch of queries out over a bounded pool of portal sessions and
/// merges the outcomes back into submission order.
///
/// Every query in the batch produces exactly one result — success, no-match,
/// or a tagged failure — regardless of what happens to the session that ran
/// it. One worker's failure never touches its siblings.
pub struct Coordinator {
    max_workers: usize,
    worker: SearchWorker,
    pacing: Pacing,
}

impl Coordinator {
    pub fn new(config: &ScrapeConfig) -> Self {
        Self {
            max_workers: config.max_workers,
            worker: SearchWorker::new(config.query_timeout()),
            pacing: Pacing::from_config(config),
        }
    }

    /// Override the per-query timeout.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.worker = SearchWorker::new(timeout);
        self
    }

    /// Run the batch. Results come back in submission order, independent of
    /// completion order. Progress (one update per completed query) goes out
    /// on `progress` if supplied; cancellation via `cancel` stops new work
    /// while letting in-flight searches finish.
    ///
    /// Fails as a whole only when not even one session can be created.
    pub async fn run(
        &self,
        factory: Arc<dyn SessionFactory>,
        batch: Batch,
        progress: Option<ProgressSender>,
        cancel: CancelToken,
    ) -> Result<Vec<SearchResult>> {
        if self.max_workers == 0 {
            return Err(Error::InvalidConcurrency);
        }

        let total = batch.len();
        if total == 0 {
            return Ok(Vec::new());
        }

        if cancel.is_cancelled() {
            return Ok(batch.into_iter().map(SearchResult::cancelled).collect());
        }

        let concurrency = self.max_workers.min(total);
        tracing::info!("Starting batch of {} queries with {} workers", total, concurrency);

        // Run-level gate: if the portal won't give us even one session there
        // is nothing to isolate per query.
        let seed = factory
            .create()
            .await
            .map_err(|reason| Error::Session(reason.to_string()))?;

        // Keep a copy so no query can lose its slot even if a worker task dies.
        let queries = batch.clone();

        let state = Arc::new(RunState {
            queue: Mutex::new(batch.into_iter().enumerate().collect()),
            results: Mutex::new((0..total).map(|_| None).collect()),
            completed: AtomicUsize::new(0),
            live_slots: AtomicUsize::new(concurrency),
            total,
            progress,
        });

        let mut seed = Some(seed);
        let mut handles = Vec::with_capacity(concurrency);
        for id in 0..concurrency {
            let slot = Slot {
                id,
                factory: Arc::clone(&factory),
                state: Arc::clone(&state),
                worker: self.worker.clone(),
                pacing: self.pacing.clone(),
                cancel: cancel.clone(),
                session: seed.take(),
            };
            handles.push(tokio::spawn(slot.run()));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("Worker slot terminated abnormally: {e}");
            }
        }

        let mut slots = state.results.lock().await;
        let results = slots
            .iter_mut()
            .zip(queries)
            .map(|(slot, query)| {
                slot.take().unwrap_or_else(|| {
                    // Only reachable if a slot task died mid-query; the query
                    // still gets its one result.
                    SearchResult::failed(
                        query,
                        FailureReason::Network("worker task failed".to_string()),
                        Duration::ZERO,
                    )
                })
            })
            .collect::<Vec<_>>();

        let failed = results.iter().filter(|r| r.status.is_failed()).count();
        tracing::info!(
            "Batch complete: {} queries, {} failed",
            results.len(),
            failed
        );

        Ok(results)
    }
}

/// State shared by every slot in one run. Completed results funnel through
/// the single mutex-guarded slot array; progress leaves through one channel.
struct RunState {
    queue: Mutex<VecDeque<(usize, SearchQuery)>>,
    results: Mutex<Vec<Option<SearchResult>>>,
    completed: AtomicUsize,
    live_slots: AtomicUsize,
    total: usize,
    progress: Option<ProgressSender>,
}

impl RunState {
    async fn record(&self, index: usize, result: SearchResult) {
        let completed = self.completed.fetch_add(1, Ordering::AcqRel) + 1;

        if let Some(sender) = &self.progress {
            // A dropped receiver just means nobody is watching
            let _ = sender.send(ProgressUpdate {
                index,
                query: result.query.to_string(),
                status: result.status.clone(),
                completed,
                total: self.total,
                elapsed: result.elapsed,
            });
        }

        self.results.lock().await[index] = Some(result);
    }
}

/// One pool slot: claims queries off the shared queue and runs them on its
/// own session. The session is recycled across queries and replaced only
/// after a failure that leaves it in an unknown state.
struct Slot {
    id: usize,
    factory: Arc<dyn SessionFactory>,
    state: Arc<RunState>,
    worker: SearchWorker,
    pacing: Pacing,
    cancel: CancelToken,
    session: Option<Box<dyn Session>>,
}

impl Slot {
    async fn run(mut self) {
        self.pacing.startup_jitter().await;

        loop {
            let claimed = self.state.queue.lock().await.pop_front();
            let Some((index, query)) = claimed else { break };

            if self.cancel.is_cancelled() {
                tracing::debug!("Slot {}: run cancelled, skipping {}", self.id, query);
                self.state.record(index, SearchResult::cancelled(query)).await;
                continue;
            }

            let mut session = match self.session.take() {
                Some(session) => session,
                None => match self.factory.create().await {
                    Ok(session) => session,
                    Err(reason) => {
                        self.retire(index, query, reason).await;
                        return;
                    }
                },
            };

            self.pacing.submit_delay().await;
            let result = self.worker.execute(query, session.as_mut()).await;

            if session_tainted(&result.status) {
                tracing::debug!(
                    "Slot {}: session tainted ({}), replacing before next query",
                    self.id,
                    result.status.label()
                );
                session.close().await;
            } else {
                self.session = Some(session);
            }

            self.state.record(index, result).await;
        }

        if let Some(session) = self.session.take() {
            session.close().await;
        }
        self.state.live_slots.fetch_sub(1, Ordering::AcqRel);
    }

    /// Session creation failed: this slot is done. The claimed query gets the
    /// creation error as its outcome; if no other slot is left alive, so does
    /// everything still queued — nothing is ever silently dropped.
    async fn retire(self, index: usize, query: SearchQuery, reason: FailureReason) {
        let survivors = self.state.live_slots.fetch_sub(1, Ordering::AcqRel) - 1;

        if survivors > 0 {
            tracing::warn!(
                "Slot {}: could not create a session ({reason}), retiring; {survivors} slots remain",
                self.id
            );
        } else {
            tracing::error!(
                "Slot {}: could not create a session ({reason}) and no slots remain; failing queued queries",
                self.id
            );
        }

        self.state
            .record(index, SearchResult::failed(query, reason.clone(), Duration::ZERO))
            .await;

        if survivors == 0 {
            loop {
                let next = self.state.queue.lock().await.pop_front();
                let Some((index, query)) = next else { break };
                self.state
                    .record(index, SearchResult::failed(query, reason.clone(), Duration::ZERO))
                    .await;
            }
        }
    }
}

/// Failures after which the session's page and auth state can't be trusted.
fn session_tainted(status: &SearchStatus) -> bool {
    matches!(
        status,
        SearchStatus::Failed(
            FailureReason::Timeout | FailureReason::AuthExpired | FailureReason::Network(_)
        )
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::progress_channel;
    use async_trait::async_trait;
    use blotter_core::record::BookingRecord;
    use std::sync::atomic::AtomicBool;

    #[derive(Clone)]
    enum Outcome {
        /// Sleep, then return this many records.
        Records { count: usize, delay: Duration },
        Fail(FailureReason),
        /// Never respond; the worker timeout has to fire.
        Hang,
    }

    type Script = dyn Fn(&SearchQuery) -> Outcome + Send + Sync;

    #[derive(Default)]
    struct MockStats {
        created: AtomicUsize,
        live: AtomicUsize,
        max_live: AtomicUsize,
        overlaps: AtomicUsize,
    }

    struct MockSession {
        stats: Arc<MockStats>,
        script: Arc<Script>,
        busy: AtomicBool,
    }

    #[async_trait]
    impl Session for MockSession {
        async fn search(
            &mut self,
            query: &SearchQuery,
        ) -> std::result::Result<Vec<BookingRecord>, FailureReason> {
            // Exclusive-use violation detector: a second concurrent search on
            // the same session trips this flag.
            if self.busy.swap(true, Ordering::SeqCst) {
                self.stats.overlaps.fetch_add(1, Ordering::SeqCst);
            }

            let outcome = (self.script)(query);
            let result = match outcome {
                Outcome::Records { count, delay } => {
                    tokio::time::sleep(delay).await;
                    Ok((0..count)
                        .map(|i| {
                            let mut record = BookingRecord::new();
                            record.set("Booking Number", (i + 1).to_string());
                            record
                        })
                        .collect())
                }
                Outcome::Fail(reason) => {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    Err(reason)
                }
                Outcome::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(vec![])
                }
            };

            self.busy.store(false, Ordering::SeqCst);
            result
        }

        async fn close(self: Box<Self>) {
            self.stats.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    struct MockFactory {
        stats: Arc<MockStats>,
        script: Arc<Script>,
        /// Creations allowed before the factory starts failing; None = all.
        create_limit: Option<usize>,
    }

    #[async_trait]
    impl SessionFactory for MockFactory {
        async fn create(&self) -> std::result::Result<Box<dyn Session>, FailureReason> {
            if let Some(limit) = self.create_limit {
                if self.stats.created.load(Ordering::SeqCst) >= limit {
                    return Err(FailureReason::Network("portal refused connection".into()));
                }
            }
            self.stats.created.fetch_add(1, Ordering::SeqCst);
            let live = self.stats.live.fetch_add(1, Ordering::SeqCst) + 1;
            self.stats.max_live.fetch_max(live, Ordering::SeqCst);

            Ok(Box::new(MockSession {
                stats: Arc::clone(&self.stats),
                script: Arc::clone(&self.script),
                busy: AtomicBool::new(false),
            }))
        }
    }

    fn mock<F>(script: F) -> (Arc<MockFactory>, Arc<MockStats>)
    where
        F: Fn(&SearchQuery) -> Outcome + Send + Sync + 'static,
    {
        mock_limited(script, None)
    }

    fn mock_limited<F>(
        script: F,
        create_limit: Option<usize>,
    ) -> (Arc<MockFactory>, Arc<MockStats>)
    where
        F: Fn(&SearchQuery) -> Outcome + Send + Sync + 'static,
    {
        let stats = Arc::new(MockStats::default());
        let factory = Arc::new(MockFactory {
            stats: Arc::clone(&stats),
            script: Arc::new(script),
            create_limit,
        });
        (factory, stats)
    }

    fn batch(count: usize) -> Batch {
        (0..count)
            .map(|i| SearchQuery::new(format!("Name{i}"), "Test").unwrap())
            .collect()
    }

    fn coordinator(workers: usize) -> Coordinator {
        let config = ScrapeConfig {
            max_workers: workers,
            ..Default::default()
        }
        .without_delays();
        Coordinator::new(&config)
    }

    fn quick(count: usize) -> Outcome {
        Outcome::Records {
            count,
            delay: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn test_empty_batch_returns_immediately() {
        let (factory, stats) = mock(|_| quick(1));
        let results = coordinator(3)
            .run(factory, Vec::new(), None, CancelToken::new())
            .await
            .unwrap();

        assert!(results.is_empty());
        assert_eq!(stats.created.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_concurrency_rejected() {
        let (factory, _) = mock(|_| quick(1));
        let err = coordinator(0)
            .run(factory, batch(2), None, CancelToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConcurrency));
    }

    #[tokio::test]
    async fn test_results_preserve_submission_order() {
        // Earlier queries sleep longer, so completion order is reversed
        let queries = batch(6);
        let (factory, _) = mock(|query| {
            let index: u64 = query
                .last_name()
                .trim_start_matches("Name")
                .parse()
                .unwrap();
            Outcome::Records {
                count: 1,
                delay: Duration::from_millis((6 - index) * 15),
            }
        });

        let results = coordinator(3)
            .run(factory, queries.clone(), None, CancelToken::new())
            .await
            .unwrap();

        assert_eq!(results.len(), queries.len());
        for (result, query) in results.iter().zip(&queries) {
            assert_eq!(&result.query, query);
            assert_eq!(result.status, SearchStatus::Success);
        }
    }

    #[tokio::test]
    async fn test_sessions_exclusive_and_bounded() {
        let (factory, stats) = mock(|_| quick(1));

        let results = coordinator(3)
            .run(factory, batch(12), None, CancelToken::new())
            .await
            .unwrap();

        assert_eq!(results.len(), 12);
        assert_eq!(stats.overlaps.load(Ordering::SeqCst), 0);
        assert!(stats.max_live.load(Ordering::SeqCst) <= 3);
        // Healthy sessions are recycled across queries, not recreated
        assert_eq!(stats.created.load(Ordering::SeqCst), 3);
        // Every session is closed by the end of the run
        assert_eq!(stats.live.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_timeout_is_isolated_to_its_query() {
        let (factory, _) = mock(|query| {
            if query.last_name() == "Name1" {
                Outcome::Hang
            } else {
                quick(1)
            }
        });

        let results = coordinator(2)
            .with_query_timeout(Duration::from_millis(50))
            .run(factory, batch(3), None, CancelToken::new())
            .await
            .unwrap();

        assert_eq!(results[0].status, SearchStatus::Success);
        assert_eq!(results[1].status, SearchStatus::Failed(FailureReason::Timeout));
        assert_eq!(results[2].status, SearchStatus::Success);
    }

    #[tokio::test]
    async fn test_failure_never_aborts_siblings() {
        let (factory, _) = mock(|query| {
            if query.last_name() == "Name2" {
                Outcome::Fail(FailureReason::Parse("unexpected markup".into()))
            } else {
                quick(2)
            }
        });

        let results = coordinator(2)
            .run(factory, batch(5), None, CancelToken::new())
            .await
            .unwrap();

        assert_eq!(results.len(), 5);
        assert_eq!(
            results[2].status,
            SearchStatus::Failed(FailureReason::Parse("unexpected markup".into()))
        );
        for index in [0, 1, 3, 4] {
            assert_eq!(results[index].status, SearchStatus::Success);
            assert_eq!(results[index].records.len(), 2);
        }
    }

    #[tokio::test]
    async fn test_identical_runs_yield_identical_results() {
        let script = |query: &SearchQuery| {
            if query.last_name() == "Name1" {
                quick(0)
            } else {
                quick(2)
            }
        };

        let (factory_a, _) = mock(script);
        let (factory_b, _) = mock(script);
        let coordinator = coordinator(3);

        let first = coordinator
            .run(factory_a, batch(4), None, CancelToken::new())
            .await
            .unwrap();
        let second = coordinator
            .run(factory_b, batch(4), None, CancelToken::new())
            .await
            .unwrap();

        // Content equality; elapsed is timing, not identity
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.query, b.query);
            assert_eq!(a.status, b.status);
            assert_eq!(a.records, b.records);
        }
    }

    #[tokio::test]
    async fn test_doe_and_smith_scenario() {
        let queries = vec![
            SearchQuery::new("Doe", "John").unwrap(),
            SearchQuery::new("Smith", "Jane").unwrap(),
        ];
        let (factory, _) = mock(|query| {
            if query.last_name() == "Doe" {
                quick(1)
            } else {
                quick(0)
            }
        });

        let results = coordinator(2)
            .run(factory, queries, None, CancelToken::new())
            .await
            .unwrap();

        assert_eq!(results[0].status, SearchStatus::Success);
        assert_eq!(results[0].records.len(), 1);
        assert_eq!(results[1].status, SearchStatus::NoMatch);
        assert!(results[1].records.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_after_three_sequential_completions() {
        // Concurrency 1 makes the cutoff exact: the third search trips the
        // token mid-flight, finishes normally, and nothing after it starts.
        let cancel = CancelToken::new();
        let trip = cancel.clone();
        let (factory, stats) = mock(move |query| {
            if query.last_name() == "Name2" {
                trip.cancel();
            }
            quick(1)
        });

        let (sender, mut receiver) = progress_channel();
        let results = coordinator(1)
            .run(factory, batch(10), Some(sender), cancel)
            .await
            .unwrap();

        assert_eq!(results.len(), 10);
        for result in &results[..3] {
            assert_eq!(result.status, SearchStatus::Success);
        }
        for result in &results[3..] {
            assert_eq!(
                result.status,
                SearchStatus::Failed(FailureReason::Cancelled)
            );
        }

        // The lone session was created before the cancellation point and
        // nothing was created after it
        assert_eq!(stats.created.load(Ordering::SeqCst), 1);

        // Cancelled queries still emit progress; the stream covers the batch
        let mut updates = 0;
        while receiver.recv().await.is_some() {
            updates += 1;
        }
        assert_eq!(updates, 10);
    }

    #[tokio::test]
    async fn test_cancel_with_concurrent_workers() {
        let cancel = CancelToken::new();
        let trip = cancel.clone();
        let started = Arc::new(AtomicUsize::new(0));
        let started_in_script = Arc::clone(&started);

        let (factory, stats) = mock(move |_| {
            if started_in_script.fetch_add(1, Ordering::SeqCst) + 1 == 3 {
                trip.cancel();
            }
            Outcome::Records {
                count: 1,
                delay: Duration::from_millis(20),
            }
        });

        let results = coordinator(2)
            .run(factory, batch(10), None, cancel.clone())
            .await
            .unwrap();

        let completed = results
            .iter()
            .filter(|r| r.status == SearchStatus::Success)
            .count();
        let cancelled = results
            .iter()
            .filter(|r| r.status == SearchStatus::Failed(FailureReason::Cancelled))
            .count();

        // In-flight searches (at most one besides the tripping one) run to
        // completion; everything else is cancelled without a new session
        assert_eq!(completed + cancelled, 10);
        assert!(completed >= 3);
        assert!(completed <= 4);
        assert!(stats.created.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_run_fails_when_no_session_possible() {
        let (factory, _) = mock_limited(|_| quick(1), Some(0));

        let err = coordinator(2)
            .run(factory, batch(3), None, CancelToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Session(_)));
    }

    #[tokio::test]
    async fn test_tainted_session_is_replaced() {
        // First query expires the session; the slot must fetch a fresh one
        let (factory, stats) = mock(|query| {
            if query.last_name() == "Name0" {
                Outcome::Fail(FailureReason::AuthExpired)
            } else {
                quick(1)
            }
        });

        let results = coordinator(1)
            .run(factory, batch(3), None, CancelToken::new())
            .await
            .unwrap();

        assert_eq!(
            results[0].status,
            SearchStatus::Failed(FailureReason::AuthExpired)
        );
        assert_eq!(results[1].status, SearchStatus::Success);
        assert_eq!(results[2].status, SearchStatus::Success);
        assert_eq!(stats.created.load(Ordering::SeqCst), 2);
        assert_eq!(stats.live.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_parse_failure_keeps_session() {
        // A parse error doesn't invalidate page/auth state; no replacement
        let (factory, stats) = mock(|query| {
            if query.last_name() == "Name0" {
                Outcome::Fail(FailureReason::Parse("odd markup".into()))
            } else {
                quick(1)
            }
        });

        let results = coordinator(1)
            .run(factory, batch(3), None, CancelToken::new())
            .await
            .unwrap();

        assert!(results[0].status.is_failed());
        assert_eq!(stats.created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_last_slot_drains_queue_when_sessions_dry_up() {
        // One session total: query 0 expires it, the replacement fails, and
        // the lone slot must fail the rest instead of dropping them.
        let (factory, stats) = mock_limited(
            |query| {
                if query.last_name() == "Name0" {
                    Outcome::Fail(FailureReason::AuthExpired)
                } else {
                    quick(1)
                }
            },
            Some(1),
        );

        let results = coordinator(1)
            .run(factory, batch(3), None, CancelToken::new())
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(
            results[0].status,
            SearchStatus::Failed(FailureReason::AuthExpired)
        );
        for result in &results[1..] {
            assert_eq!(
                result.status,
                SearchStatus::Failed(FailureReason::Network("portal refused connection".into()))
            );
        }
        assert_eq!(stats.created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_degraded_pool_still_finishes_batch() {
        // Only the seed session exists; slots that can't get one retire after
        // failing their claimed query, and the seeded slot drains the rest.
        let (factory, stats) = mock_limited(|_| quick(1), Some(1));

        let results = coordinator(3)
            .run(factory, batch(8), None, CancelToken::new())
            .await
            .unwrap();

        assert_eq!(results.len(), 8);
        let completed = results
            .iter()
            .filter(|r| r.status == SearchStatus::Success)
            .count();
        let failed = results.iter().filter(|r| r.status.is_failed()).count();

        assert_eq!(completed + failed, 8);
        // At most one claimed query per retired slot was failed
        assert!(failed <= 2);
        assert!(completed >= 6);
        assert_eq!(stats.created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_progress_reports_every_completion() {
        let (factory, _) = mock(|_| quick(1));
        let (sender, mut receiver) = progress_channel();

        let results = coordinator(2)
            .run(factory, batch(5), Some(sender), CancelToken::new())
            .await
            .unwrap();
        assert_eq!(results.len(), 5);

        let mut seen_indices = Vec::new();
        let mut seen_counts = Vec::new();
        while let Some(update) = receiver.recv().await {
            assert_eq!(update.total, 5);
            seen_counts.push(update.completed);
            seen_indices.push(update.index);
        }

        // One update per query; counts cover 1..=5 even if two slots publish
        // out of order
        seen_counts.sort_unstable();
        assert_eq!(seen_counts, vec![1, 2, 3, 4, 5]);
        seen_indices.sort_unstable();
        assert_eq!(seen_indices, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_skips_sessions() {
        let cancel = CancelToken::new();
        cancel.cancel();

        let (factory, stats) = mock(|_| quick(1));
        let results = coordinator(2)
            .run(factory, batch(4), None, cancel)
            .await
            .unwrap();

        assert_eq!(results.len(), 4);
        assert!(
            results
                .iter()
                .all(|r| r.status == SearchStatus::Failed(FailureReason::Cancelled))
        );
        assert_eq!(stats.created.load(Ordering::SeqCst), 0);
    }
}
