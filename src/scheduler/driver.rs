//! Background scheduler.
//!
//! Wakes on a fixed tick, reads a fresh settings snapshot, submits every
//! due feed to the task queue after its stagger delay and finally runs the
//! retention engine. The driver itself never touches the network.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use super::interval::{is_due, required_interval};
use super::queue::TaskQueueHandle;
use super::stagger;
use super::task::{SubmitOutcome, Task};
use crate::config::SchedulerConfig;
use crate::db::Database;
use crate::feed::{Feed, FeedRepository};
use crate::retention::{CleanupReport, RetentionEngine, RetentionPolicy};
use crate::settings::SchedulerSettings;
use crate::Result;

/// Timing knobs for the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerOptions {
    /// Period between cycles.
    pub tick_interval: Duration,
    /// Upper bound for stagger delays.
    pub stagger_window: Duration,
    /// Pause between two feed checks.
    pub feed_check_pause: Duration,
}

impl From<&SchedulerConfig> for SchedulerOptions {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            tick_interval: config.tick_interval(),
            stagger_window: config.stagger_window(),
            feed_check_pause: config.feed_check_pause(),
        }
    }
}

/// A due feed and when it should be submitted.
#[derive(Debug, Clone)]
pub struct PlannedRefresh {
    pub feed: Feed,
    pub required_interval: Duration,
    /// Delay before submission.
    pub delay: Duration,
}

/// Decide whether `feed` is due and, if so, when to submit it.
pub fn plan_feed(
    feed: &Feed,
    total_feeds: usize,
    settings: &SchedulerSettings,
    now: DateTime<Utc>,
    stagger_window: Duration,
) -> Option<PlannedRefresh> {
    let required = required_interval(
        feed,
        settings.refresh_mode,
        settings.update_interval_minutes,
    );
    if !is_due(feed, required, now) {
        return None;
    }

    Some(PlannedRefresh {
        feed: feed.clone(),
        required_interval: required,
        delay: stagger::delay(feed.id, total_feeds, stagger_window),
    })
}

/// Plan a whole cycle without side effects.
pub fn plan_cycle(
    feeds: &[Feed],
    settings: &SchedulerSettings,
    now: DateTime<Utc>,
    stagger_window: Duration,
) -> Vec<PlannedRefresh> {
    feeds
        .iter()
        .filter_map(|feed| plan_feed(feed, feeds.len(), settings, now, stagger_window))
        .collect()
}

/// What one cycle did.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// Number of feeds evaluated.
    pub feeds_checked: usize,
    /// IDs of the feeds found due, in evaluation order.
    pub due: Vec<i64>,
    /// Due feeds skipped because an earlier stagger sleep is still pending.
    pub pending: Vec<i64>,
    /// Whether the sweep stopped early because of cancellation.
    pub cancelled: bool,
    /// Retention results, when auto-cleanup ran.
    pub cleanup: Option<CleanupReport>,
}

/// Periodic driver for feed refreshes and cleanup.
pub struct BackgroundScheduler {
    db: Database,
    queue: TaskQueueHandle,
    retention: RetentionEngine,
    options: SchedulerOptions,
    cancel: CancellationToken,
    staggered: TaskTracker,
    pending: Arc<Mutex<HashSet<i64>>>,
}

/// Marks a feed as waiting in its stagger sleep until dropped.
struct PendingStagger {
    pending: Arc<Mutex<HashSet<i64>>>,
    feed_id: i64,
}

impl PendingStagger {
    fn register(pending: &Arc<Mutex<HashSet<i64>>>, feed_id: i64) -> Self {
        lock(pending).insert(feed_id);
        Self {
            pending: Arc::clone(pending),
            feed_id,
        }
    }
}

impl Drop for PendingStagger {
    fn drop(&mut self) {
        lock(&self.pending).remove(&self.feed_id);
    }
}

fn lock(pending: &Mutex<HashSet<i64>>) -> std::sync::MutexGuard<'_, HashSet<i64>> {
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl BackgroundScheduler {
    /// Create a scheduler whose retention engine runs against `db`.
    pub fn new(
        db: Database,
        queue: TaskQueueHandle,
        options: SchedulerOptions,
        cancel: CancellationToken,
    ) -> Self {
        let retention = RetentionEngine::new(Arc::new(db.clone()));
        Self {
            db,
            queue,
            retention,
            options,
            cancel,
            staggered: TaskTracker::new(),
            pending: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Replace the retention engine.
    pub fn with_retention(mut self, retention: RetentionEngine) -> Self {
        self.retention = retention;
        self
    }

    /// Run cycles until the cancellation token fires.
    ///
    /// Pending stagger sleeps observe the token and exit without
    /// submitting; tasks already in the queue are left to finish.
    pub async fn run(&self) {
        info!(
            "Background scheduler started (tick: {}s, stagger window: {}s)",
            self.options.tick_interval.as_secs(),
            self.options.stagger_window.as_secs()
        );

        let mut timer = tokio::time::interval(self.options.tick_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = timer.tick() => {}
            }

            if let Err(e) = self.run_cycle(Utc::now()).await {
                error!("Scheduler cycle failed: {}", e);
            }
        }

        self.wait_for_staggered().await;
        info!("Background scheduler stopped");
    }

    /// Run one cycle as of `now`.
    ///
    /// Fails only when the settings or the feed list cannot be read;
    /// submission and cleanup problems are logged and reported.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleReport> {
        let settings = SchedulerSettings::load(self.db.pool()).await?;
        let feeds = FeedRepository::new(self.db.pool()).list_all().await?;

        debug!(
            "Scheduler cycle: {} feed(s), mode {}, interval {}m",
            feeds.len(),
            settings.refresh_mode,
            settings.update_interval_minutes
        );

        match self
            .queue
            .set_max_concurrency(settings.max_concurrent_refreshes)
            .await
        {
            Ok(_) => {}
            Err(e) => warn!("Could not resize task queue: {}", e),
        }

        let mut report = CycleReport::default();

        for (i, feed) in feeds.iter().enumerate() {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            if i > 0 && !self.pause().await {
                report.cancelled = true;
                break;
            }

            report.feeds_checked += 1;
            if let Some(planned) =
                plan_feed(feed, feeds.len(), &settings, now, self.options.stagger_window)
            {
                if lock(&self.pending).contains(&planned.feed.id) {
                    debug!("Feed {} still waiting in its stagger slot", planned.feed.id);
                    report.pending.push(planned.feed.id);
                    continue;
                }
                report.due.push(planned.feed.id);
                self.dispatch(planned).await;
            }
        }

        if !report.due.is_empty() {
            info!(
                "Scheduler cycle found {} due feed(s) out of {}",
                report.due.len(),
                feeds.len()
            );
        }

        if settings.auto_cleanup_enabled && !report.cancelled {
            let policy = RetentionPolicy::from(&settings);
            report.cleanup = Some(self.retention.run(policy, now).await);
        }

        Ok(report)
    }

    /// Wait until every stagger sleep of previous cycles has submitted or
    /// given up.
    pub async fn wait_for_staggered(&self) {
        self.staggered.close();
        self.staggered.wait().await;
        self.staggered.reopen();
    }

    /// Sleep between feed checks; false if cancelled meanwhile.
    async fn pause(&self) -> bool {
        if self.options.feed_check_pause.is_zero() {
            return true;
        }
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(self.options.feed_check_pause) => true,
        }
    }

    async fn dispatch(&self, planned: PlannedRefresh) {
        let task = Task::scheduled(planned.feed);

        if planned.delay.is_zero() {
            submit(&self.queue, task).await;
            return;
        }

        let queue = self.queue.clone();
        let cancel = self.cancel.clone();
        let delay = planned.delay;
        let guard = PendingStagger::register(&self.pending, task.feed_id());
        self.staggered.spawn(async move {
            let _guard = guard;
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Stagger for feed {} cancelled", task.feed_id());
                }
                _ = tokio::time::sleep(delay) => {
                    if !cancel.is_cancelled() {
                        submit(&queue, task).await;
                    }
                }
            }
        });
    }
}

async fn submit(queue: &TaskQueueHandle, task: Task) {
    let feed_id = task.feed_id();
    match queue.submit_task(task).await {
        Ok(SubmitOutcome::Started) | Ok(SubmitOutcome::Queued { .. }) => {
            debug!("Submitted scheduled refresh of feed {}", feed_id);
        }
        Ok(outcome) => debug!("Feed {} not resubmitted: {:?}", feed_id, outcome),
        Err(e) => error!("Failed to submit feed {}: {}", feed_id, e),
    }
}
