//! Test helpers shared by the integration tests.
//!
//! Provides a recording fetcher, an in-memory article store and feed
//! fixtures.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use feedkeeper::article::ReadFilter;
use feedkeeper::{
    ArticleStore, Database, Feed, FeedFetcher, FeedRepository, FeedkeeperError, FetchOutcome,
    NewFeed, RefreshInterval, Result, TaskQueueHandle, UpdateStatus,
};

/// Default timeout for waiting on asynchronous effects.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Fetcher that records every call and tracks peak concurrency.
///
/// When gated, each fetch waits for a permit from [`RecordingFetcher::release`].
/// When a database is attached, successful fetches are recorded on the
/// feed like the real fetcher does.
pub struct RecordingFetcher {
    db: Option<Database>,
    gate: Option<Semaphore>,
    delay: Duration,
    fail_ids: HashSet<i64>,
    started: Mutex<Vec<i64>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl RecordingFetcher {
    /// Fetches complete immediately.
    pub fn new() -> Self {
        Self {
            db: None,
            gate: None,
            delay: Duration::ZERO,
            fail_ids: HashSet::new(),
            started: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Fetches block until released.
    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new()
        }
    }

    pub fn with_db(mut self, db: Database) -> Self {
        self.db = Some(db);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.fail_ids = ids.into_iter().collect();
        self
    }

    /// Let `n` gated fetches complete.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    /// Feed IDs in the order their fetches started.
    pub fn started(&self) -> Vec<i64> {
        self.started.lock().unwrap().clone()
    }

    /// Highest number of fetches observed running at once.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedFetcher for RecordingFetcher {
    async fn fetch_feed(
        &self,
        cancel: &CancellationToken,
        feed: &Feed,
        _is_manual: bool,
    ) -> Result<FetchOutcome> {
        if cancel.is_cancelled() {
            return Err(FeedkeeperError::Cancelled);
        }

        self.started.lock().unwrap().push(feed.id);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        if self.delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.delay).await;
        }

        self.active.fetch_sub(1, Ordering::SeqCst);

        let now = Utc::now();
        if self.fail_ids.contains(&feed.id) {
            if let Some(db) = &self.db {
                FeedRepository::new(db.pool())
                    .record_failure(feed.id, now, "HTTP error: 503")
                    .await?;
            }
            return Err(FeedkeeperError::Fetch("HTTP error: 503".to_string()));
        }

        if let Some(db) = &self.db {
            FeedRepository::new(db.pool())
                .record_success(feed.id, now, feed.articles_per_month)
                .await?;
        }
        Ok(FetchOutcome {
            new_articles: 0,
            articles_per_month: feed.articles_per_month,
        })
    }
}

/// Build a detached feed value for queue tests.
pub fn feed(id: i64) -> Feed {
    Feed {
        id,
        title: format!("Feed {id}"),
        url: format!("https://example.com/{id}.xml"),
        refresh_interval: RefreshInterval::UseGlobal,
        last_updated: None,
        last_update_status: UpdateStatus::Pending,
        last_error: None,
        articles_per_month: 0.0,
        created_at: Utc::now(),
    }
}

/// Insert a feed and optionally backdate its last update.
pub async fn create_feed(
    db: &Database,
    title: &str,
    interval: RefreshInterval,
    last_updated: Option<DateTime<Utc>>,
) -> Feed {
    let repo = FeedRepository::new(db.pool());
    let feed = repo
        .create(
            &NewFeed::new(title, format!("https://example.com/{title}.xml"))
                .with_refresh_interval(interval),
        )
        .await
        .unwrap();
    repo.set_last_updated(feed.id, last_updated).await.unwrap();
    repo.get_by_id(feed.id).await.unwrap().unwrap()
}

/// Wait until the queue is idle.
pub async fn wait_idle(queue: &TaskQueueHandle) {
    tokio::time::timeout(DEFAULT_TIMEOUT, async {
        loop {
            let progress = queue.progress(0).await.unwrap();
            if progress.pool_task_count == 0 && progress.queue_task_count == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("queue did not become idle");
}

/// Wait until `count` fetches have started.
pub async fn wait_started(fetcher: &RecordingFetcher, count: usize) {
    tokio::time::timeout(DEFAULT_TIMEOUT, async {
        while fetcher.started().len() < count {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("fetches did not start");
}

/// An article held by [`MemoryArticleStore`].
#[derive(Debug, Clone)]
pub struct MemArticle {
    pub id: i64,
    pub published_at: DateTime<Utc>,
    pub is_read: bool,
    pub is_favorite: bool,
    pub is_read_later: bool,
    pub size_mb: f64,
}

impl MemArticle {
    pub fn is_protected(&self) -> bool {
        self.is_favorite || self.is_read_later
    }
}

/// In-memory [`ArticleStore`] where every article has a size.
pub struct MemoryArticleStore {
    base_mb: f64,
    articles: Mutex<Vec<MemArticle>>,
    deleted: Mutex<Vec<MemArticle>>,
    compactions: AtomicUsize,
    /// Delete calls allowed before every further call fails.
    failing_after: Option<usize>,
    delete_calls: AtomicUsize,
}

impl MemoryArticleStore {
    pub fn new(base_mb: f64, articles: Vec<MemArticle>) -> Self {
        Self {
            base_mb,
            articles: Mutex::new(articles),
            deleted: Mutex::new(Vec::new()),
            compactions: AtomicUsize::new(0),
            failing_after: None,
            delete_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_after(mut self, calls: usize) -> Self {
        self.failing_after = Some(calls);
        self
    }

    pub fn articles(&self) -> Vec<MemArticle> {
        self.articles.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<MemArticle> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn current_size(&self) -> f64 {
        self.base_mb + self.articles.lock().unwrap().iter().map(|a| a.size_mb).sum::<f64>()
    }

    pub fn compactions(&self) -> usize {
        self.compactions.load(Ordering::SeqCst)
    }

    fn check_failure(&self) -> Result<()> {
        let call = self.delete_calls.fetch_add(1, Ordering::SeqCst);
        match self.failing_after {
            Some(limit) if call >= limit => {
                Err(FeedkeeperError::Database("disk I/O error".to_string()))
            }
            _ => Ok(()),
        }
    }

    fn remove_where(&self, mut selected: impl FnMut(&MemArticle) -> bool) -> u64 {
        let mut articles = self.articles.lock().unwrap();
        let mut deleted = self.deleted.lock().unwrap();
        let before = articles.len();
        articles.retain(|a| {
            if selected(a) {
                deleted.push(a.clone());
                false
            } else {
                true
            }
        });
        (before - articles.len()) as u64
    }
}

#[async_trait]
impl ArticleStore for MemoryArticleStore {
    async fn size_mb(&self) -> Result<f64> {
        Ok(self.current_size())
    }

    async fn delete_published_before(
        &self,
        cutoff: DateTime<Utc>,
        filter: ReadFilter,
    ) -> Result<u64> {
        self.check_failure()?;
        Ok(self.remove_where(|a| {
            !a.is_protected() && filter.matches(a.is_read) && a.published_at < cutoff
        }))
    }

    async fn delete_oldest(&self, filter: ReadFilter, limit: usize) -> Result<u64> {
        self.check_failure()?;

        let mut candidates: Vec<(DateTime<Utc>, i64)> = self
            .articles
            .lock()
            .unwrap()
            .iter()
            .filter(|a| !a.is_protected() && filter.matches(a.is_read))
            .map(|a| (a.published_at, a.id))
            .collect();
        candidates.sort();
        let chosen: HashSet<i64> = candidates.into_iter().take(limit).map(|(_, id)| id).collect();

        Ok(self.remove_where(|a| chosen.contains(&a.id)))
    }

    async fn compact(&self) -> Result<()> {
        self.compactions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Shorthand for building a [`MemArticle`] aged `age_days`.
pub fn mem_article(
    id: i64,
    age_days: i64,
    is_read: bool,
    is_favorite: bool,
    is_read_later: bool,
    size_mb: f64,
) -> MemArticle {
    MemArticle {
        id,
        published_at: Utc::now() - chrono::Duration::days(age_days),
        is_read,
        is_favorite,
        is_read_later,
        size_mb,
    }
}

/// Convenience to share a store with the engine while keeping access.
pub fn shared<T: ArticleStore + 'static>(store: T) -> (Arc<T>, Arc<dyn ArticleStore>) {
    let store = Arc::new(store);
    let dyn_store: Arc<dyn ArticleStore> = store.clone();
    (store, dyn_store)
}
