//! Bounded-concurrency verification pool.
//!
//! A batch is loaded into a closed FIFO queue and drained by a fixed number
//! of workers. A semaphore caps how many lookups are in flight; workers
//! beyond that cap simply wait for a slot. A worker takes a slot before it
//! claims an item, and a claimed item that is dropped without a recorded
//! verdict goes back to the front of the queue.

use crate::checker::UrlChecker;
use crate::config::MAX_CONCURRENCY;
use crate::error::ThreatCheckError;
use crate::protocols::VerdictSource;
use crate::types::{PoolConfig, ResultSet, ThreatCategory, Verdict};
use futures::future::try_join_all;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Semaphore;
use tracing::{debug, info};

/// Verifies batches of URLs with at most `concurrency` lookups in flight.
#[derive(Debug)]
pub struct VerificationPool {
    checker: UrlChecker,
    limiter: Semaphore,
    config: PoolConfig,
}

impl VerificationPool {
    /// Create a pool with the default timeout and worker count.
    pub fn new(
        source: Arc<dyn VerdictSource>,
        categories: Vec<ThreatCategory>,
        concurrency: usize,
    ) -> Result<Self, ThreatCheckError> {
        Self::with_config(
            source,
            PoolConfig::default()
                .with_categories(categories)
                .with_concurrency(concurrency),
        )
    }

    /// Create a pool from a full configuration.
    ///
    /// # Errors
    ///
    /// `ConfigError` when concurrency or the worker count is outside
    /// `1..=MAX_CONCURRENCY`, the category set is empty, or the timeout is
    /// out of range.
    pub fn with_config(
        source: Arc<dyn VerdictSource>,
        config: PoolConfig,
    ) -> Result<Self, ThreatCheckError> {
        check_bound("Concurrency", config.concurrency)?;
        check_bound("Worker count", config.effective_workers())?;

        let checker = UrlChecker::new(source, config.categories.clone(), config.timeout)?;

        Ok(Self {
            limiter: Semaphore::new(config.concurrency),
            checker,
            config,
        })
    }

    /// Categories queried for every URL.
    pub fn categories(&self) -> &[ThreatCategory] {
        self.checker.categories()
    }

    pub fn concurrency(&self) -> usize {
        self.config.concurrency
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Look up a single URL (one remote call, no retry).
    pub async fn lookup(&self, url: &str) -> Result<Verdict, ThreatCheckError> {
        self.checker.check_url(url).await
    }

    /// Verify every URL in `urls` and return one verdict per distinct URL.
    ///
    /// Each input occurrence is looked up exactly once, duplicates included.
    /// The result set follows first-occurrence order; for a duplicated URL
    /// the verdict of its last occurrence is kept.
    ///
    /// # Errors
    ///
    /// Any unrecognized source failure aborts the batch and is returned;
    /// no partial result set is produced.
    pub async fn verify_all<I, S>(&self, urls: I) -> Result<ResultSet, ThreatCheckError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let urls: Vec<String> = urls.into_iter().map(Into::into).collect();
        if urls.is_empty() {
            return Ok(ResultSet::new());
        }

        let queue = WorkQueue::new(&urls);
        let verdicts: Mutex<Vec<Option<Verdict>>> = Mutex::new(vec![None; urls.len()]);
        let workers = self.config.effective_workers().min(urls.len());

        info!(
            urls = urls.len(),
            workers,
            concurrency = self.config.concurrency,
            "Starting URL verification"
        );

        try_join_all((0..workers).map(|id| self.run_worker(id, &queue, &verdicts))).await?;

        let verdicts = verdicts.into_inner().unwrap_or_else(PoisonError::into_inner);
        let mut results = ResultSet::new();
        for (url, verdict) in urls.into_iter().zip(verdicts) {
            let verdict = verdict.ok_or_else(|| {
                ThreatCheckError::internal(format!("No verdict recorded for '{}'", url))
            })?;
            results.record(url, verdict);
        }

        info!(distinct = results.len(), "URL verification finished");
        Ok(results)
    }

    /// Worker loop: slot, claim, lookup, release, record. Exits on an empty queue.
    async fn run_worker(
        &self,
        id: usize,
        queue: &WorkQueue,
        verdicts: &Mutex<Vec<Option<Verdict>>>,
    ) -> Result<(), ThreatCheckError> {
        loop {
            let permit = self
                .limiter
                .acquire()
                .await
                .map_err(|_| ThreatCheckError::internal("Concurrency limiter closed"))?;

            let Some(claim) = queue.claim() else {
                debug!(worker = id, "Queue drained, worker exiting");
                return Ok(());
            };

            let verdict = self.checker.check_url(claim.url()).await?;
            drop(permit);

            let item = claim.complete();
            lock(verdicts)[item.index] = Some(verdict);
        }
    }
}

/// A URL waiting in the queue, tagged with its input position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct WorkItem {
    index: usize,
    url: String,
}

/// Closed FIFO queue shared by the workers of one batch.
#[derive(Debug)]
struct WorkQueue {
    items: Mutex<VecDeque<WorkItem>>,
}

impl WorkQueue {
    fn new(urls: &[String]) -> Self {
        let items = urls
            .iter()
            .enumerate()
            .map(|(index, url)| WorkItem {
                index,
                url: url.clone(),
            })
            .collect();
        Self {
            items: Mutex::new(items),
        }
    }

    /// Take exclusive ownership of the next item, if any. Never waits.
    fn claim(&self) -> Option<Claim<'_>> {
        let item = lock(&self.items).pop_front()?;
        Some(Claim {
            queue: self,
            item,
            done: false,
        })
    }

    fn requeue(&self, item: WorkItem) {
        lock(&self.items).push_front(item);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        lock(&self.items).len()
    }
}

/// Ownership of one claimed item.
///
/// Dropping a claim before `complete` puts the item back at the head of the
/// queue, so a cancelled or failed worker cannot lose it.
#[derive(Debug)]
struct Claim<'q> {
    queue: &'q WorkQueue,
    item: WorkItem,
    done: bool,
}

impl Claim<'_> {
    fn url(&self) -> &str {
        &self.item.url
    }

    fn complete(mut self) -> WorkItem {
        self.done = true;
        std::mem::take(&mut self.item)
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        if !self.done {
            debug!(url = %self.item.url, "Claim abandoned, re-queueing");
            self.queue.requeue(std::mem::take(&mut self.item));
        }
    }
}

fn check_bound(name: &str, value: usize) -> Result<(), ThreatCheckError> {
    if (1..=MAX_CONCURRENCY).contains(&value) {
        Ok(())
    } else {
        Err(ThreatCheckError::config(format!(
            "{} must be between 1 and {}, got {}",
            name, MAX_CONCURRENCY, value
        )))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::SourceError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Scripted source: per-URL outcomes, call counting and in-flight tracking.
    #[derive(Default)]
    struct ScriptedSource {
        outcomes: HashMap<String, Result<Vec<ThreatCategory>, SourceError>>,
        delay: Duration,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl ScriptedSource {
        fn with(mut self, url: &str, outcome: Result<Vec<ThreatCategory>, SourceError>) -> Self {
            self.outcomes.insert(url.to_string(), outcome);
            self
        }

        fn delayed(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl VerdictSource for ScriptedSource {
        async fn check(
            &self,
            url: &str,
            _categories: &[ThreatCategory],
        ) -> Result<Vec<ThreatCategory>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.outcomes.get(url).cloned().unwrap_or(Ok(vec![]))
        }
    }

    fn pool(source: Arc<ScriptedSource>, config: PoolConfig) -> VerificationPool {
        VerificationPool::with_config(source, config).unwrap()
    }

    #[tokio::test]
    async fn test_every_occurrence_looked_up_once() {
        let source = Arc::new(
            ScriptedSource::default()
                .with("https://malware.com", Ok(vec![ThreatCategory::Malware])),
        );
        let pool = pool(source.clone(), PoolConfig::default().with_concurrency(3));

        let urls = [
            "https://example.com",
            "https://malware.com",
            "https://example.com",
            "https://other.test",
            "https://malware.com",
        ];
        let results = pool.verify_all(urls).await.unwrap();

        assert_eq!(source.calls.load(Ordering::SeqCst), 5);
        assert_eq!(results.len(), 3);
        assert_eq!(results.get("https://example.com"), Some(&Verdict::Safe));
        assert_eq!(
            results.get("https://malware.com"),
            Some(&Verdict::Threats(vec![ThreatCategory::Malware]))
        );
        let order: Vec<&str> = results.iter().map(|(url, _)| url).collect();
        assert_eq!(
            order,
            vec!["https://example.com", "https://malware.com", "https://other.test"]
        );
    }

    #[tokio::test]
    async fn test_concurrency_bound_holds() {
        let source = Arc::new(ScriptedSource::default().delayed(Duration::from_millis(20)));
        let pool = pool(
            source.clone(),
            PoolConfig::default().with_concurrency(2).with_workers(6),
        );

        let urls: Vec<String> = (0..12).map(|i| format!("https://site{}.test", i)).collect();
        let results = pool.verify_all(urls).await.unwrap();

        assert_eq!(results.len(), 12);
        assert_eq!(source.calls.load(Ordering::SeqCst), 12);
        let peak = source.max_in_flight.load(Ordering::SeqCst);
        assert!(peak <= 2, "saw {} lookups in flight", peak);
        assert!(peak >= 1);
    }

    #[tokio::test]
    async fn test_recognized_fault_is_contained() {
        let source = Arc::new(
            ScriptedSource::default()
                .with("https://denied.test", Err(SourceError::PermissionDenied("key".into()))),
        );
        let pool = pool(source, PoolConfig::default());

        let results = pool
            .verify_all(["https://denied.test", "https://ok.test"])
            .await
            .unwrap();
        assert_eq!(results.get("https://denied.test"), Some(&Verdict::Error));
        assert_eq!(results.get("https://ok.test"), Some(&Verdict::Safe));
    }

    #[tokio::test]
    async fn test_unrecognized_fault_aborts_batch() {
        let source = Arc::new(
            ScriptedSource::default()
                .with("https://boom.test", Err(SourceError::Unclassified("HTTP 429".into()))),
        );
        let pool = pool(source, PoolConfig::default().with_concurrency(1));

        let err = pool
            .verify_all(["https://a.test", "https://boom.test", "https://c.test"])
            .await
            .unwrap_err();
        assert!(matches!(err, ThreatCheckError::SourceFailure { .. }));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let source = Arc::new(ScriptedSource::default());
        let pool = pool(source.clone(), PoolConfig::default());
        let results = pool.verify_all(Vec::<String>::new()).await.unwrap();
        assert!(results.is_empty());
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_lookup_single_url() {
        let source = Arc::new(
            ScriptedSource::default()
                .with("https://se.test", Ok(vec![ThreatCategory::SocialEngineering])),
        );
        let pool = pool(source, PoolConfig::default());
        assert_eq!(
            pool.lookup("https://se.test").await.unwrap(),
            Verdict::Threats(vec![ThreatCategory::SocialEngineering])
        );
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let source: Arc<dyn VerdictSource> = Arc::new(ScriptedSource::default());
        let result = VerificationPool::new(source, ThreatCategory::ALL.to_vec(), 0);
        assert!(matches!(result, Err(ThreatCheckError::ConfigError { .. })));
    }

    #[test]
    fn test_concurrency_above_limit_rejected() {
        for concurrency in [MAX_CONCURRENCY + 1, usize::MAX] {
            let source: Arc<dyn VerdictSource> = Arc::new(ScriptedSource::default());
            let result = VerificationPool::new(source, ThreatCategory::ALL.to_vec(), concurrency);
            assert!(matches!(result, Err(ThreatCheckError::ConfigError { .. })));
        }

        let source: Arc<dyn VerdictSource> = Arc::new(ScriptedSource::default());
        let result = VerificationPool::new(source, ThreatCategory::ALL.to_vec(), MAX_CONCURRENCY);
        assert!(result.is_ok());
    }

    #[test]
    fn test_workers_above_limit_rejected() {
        let source: Arc<dyn VerdictSource> = Arc::new(ScriptedSource::default());
        let result = VerificationPool::with_config(
            source,
            PoolConfig::default().with_workers(MAX_CONCURRENCY + 1),
        );
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Worker count must be between 1 and 100"));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let source: Arc<dyn VerdictSource> = Arc::new(ScriptedSource::default());
        let result = VerificationPool::with_config(source, PoolConfig::default().with_workers(0));
        assert!(matches!(result, Err(ThreatCheckError::ConfigError { .. })));
    }

    #[test]
    fn test_pool_exposes_categories() {
        let source: Arc<dyn VerdictSource> = Arc::new(ScriptedSource::default());
        let pool = VerificationPool::new(
            source,
            vec![ThreatCategory::Malware, ThreatCategory::UnwantedSoftware],
            4,
        )
        .unwrap();
        assert_eq!(
            pool.categories(),
            &[ThreatCategory::Malware, ThreatCategory::UnwantedSoftware]
        );
        assert_eq!(pool.concurrency(), 4);
    }

    #[test]
    fn test_abandoned_claim_is_requeued_at_front() {
        let urls = vec!["https://a.test".to_string(), "https://b.test".to_string()];
        let queue = WorkQueue::new(&urls);

        let claim = queue.claim().unwrap();
        assert_eq!(claim.url(), "https://a.test");
        assert_eq!(queue.len(), 1);
        drop(claim);

        assert_eq!(queue.len(), 2);
        let again = queue.claim().unwrap();
        assert_eq!(again.url(), "https://a.test");
        let item = again.complete();
        assert_eq!(item.index, 0);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_claim_on_drained_queue_returns_none() {
        let queue = WorkQueue::new(&["https://only.test".to_string()]);
        let claim = queue.claim().unwrap();
        assert!(queue.claim().is_none());
        claim.complete();
        assert!(queue.claim().is_none());
    }

    #[tokio::test]
    async fn test_cancelled_batch_loses_no_claimed_work() {
        let source = Arc::new(ScriptedSource::default().delayed(Duration::from_secs(5)));
        let pool = pool(source, PoolConfig::default().with_concurrency(2));
        let urls: Vec<String> = (0..4).map(|i| format!("https://slow{}.test", i)).collect();
        let queue = WorkQueue::new(&urls);
        let verdicts = Mutex::new(vec![None; urls.len()]);

        // Two workers claim an item each, then get cancelled mid-lookup.
        let workers = futures::future::join(
            pool.run_worker(0, &queue, &verdicts),
            pool.run_worker(1, &queue, &verdicts),
        );
        let cancelled = tokio::time::timeout(Duration::from_millis(50), workers).await;
        assert!(cancelled.is_err());

        assert_eq!(queue.len(), 4);
        assert!(lock(&verdicts).iter().all(Option::is_none));
    }
}
