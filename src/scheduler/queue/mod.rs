//! Bounded-concurrency task queue.
//!
//! A single actor owns the running set, the waiting queue and the
//! per-feed error map. At most `max_concurrency` refreshes run at once;
//! further submissions wait in a FIFO queue, except head-priority
//! submissions which jump to the front.

mod handle;
mod messages;
mod runner;

pub use handle::TaskQueueHandle;
pub use messages::QueueMessage;
pub use runner::TaskQueueActor;

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::fetcher::FeedFetcher;

/// Create and start the task queue actor.
///
/// `cancel` is handed to every fetch so that refreshes which have not yet
/// reached the network can be skipped after shutdown is requested.
pub fn spawn_task_queue(
    fetcher: Arc<dyn FeedFetcher>,
    max_concurrency: usize,
    channel_capacity: usize,
    cancel: CancellationToken,
) -> TaskQueueHandle {
    let (sender, receiver) = mpsc::channel(channel_capacity.max(1));

    let actor = TaskQueueActor::new(fetcher, max_concurrency, cancel, receiver);
    tokio::spawn(actor.run());

    TaskQueueHandle::new(sender)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{Feed, RefreshInterval, UpdateStatus};
    use crate::fetcher::FetchOutcome;
    use crate::scheduler::task::{Priority, SubmitOutcome, Task, TaskReason};
    use crate::{FeedkeeperError, Result};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    /// Fetcher that blocks until a permit is released.
    struct GatedFetcher {
        gate: Semaphore,
        calls: AtomicUsize,
        fail_ids: Vec<i64>,
    }

    impl GatedFetcher {
        fn new(fail_ids: Vec<i64>) -> Arc<Self> {
            Arc::new(Self {
                gate: Semaphore::new(0),
                calls: AtomicUsize::new(0),
                fail_ids,
            })
        }

        fn release(&self, n: usize) {
            self.gate.add_permits(n);
        }
    }

    #[async_trait]
    impl FeedFetcher for GatedFetcher {
        async fn fetch_feed(
            &self,
            cancel: &CancellationToken,
            feed: &Feed,
            _is_manual: bool,
        ) -> Result<FetchOutcome> {
            if cancel.is_cancelled() {
                return Err(FeedkeeperError::Cancelled);
            }
            self.calls.fetch_add(1, Ordering::SeqCst);
            let permit = self.gate.acquire().await;
            if let Ok(permit) = permit {
                permit.forget();
            }
            if self.fail_ids.contains(&feed.id) {
                return Err(FeedkeeperError::Fetch("HTTP error: 500".to_string()));
            }
            Ok(FetchOutcome {
                new_articles: 1,
                articles_per_month: 1.0,
            })
        }
    }

    fn feed(id: i64) -> Feed {
        Feed {
            id,
            title: format!("Feed {id}"),
            url: format!("https://example.com/{id}"),
            refresh_interval: RefreshInterval::UseGlobal,
            last_updated: None,
            last_update_status: UpdateStatus::Pending,
            last_error: None,
            articles_per_month: 0.0,
            created_at: Utc::now(),
        }
    }

    async fn settle(handle: &TaskQueueHandle, running: usize, queued: usize) {
        for _ in 0..200 {
            let progress = handle.progress(0).await.unwrap();
            if progress.pool_task_count == running && progress.queue_task_count == queued {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("queue did not reach running={running} queued={queued}");
    }

    #[tokio::test]
    async fn test_starts_then_queues() {
        let fetcher = GatedFetcher::new(vec![]);
        let handle = spawn_task_queue(fetcher.clone(), 2, 16, CancellationToken::new());

        assert_eq!(
            handle.submit_task(Task::scheduled(feed(1))).await.unwrap(),
            SubmitOutcome::Started
        );
        assert_eq!(
            handle.submit_task(Task::scheduled(feed(2))).await.unwrap(),
            SubmitOutcome::Started
        );
        assert_eq!(
            handle.submit_task(Task::scheduled(feed(3))).await.unwrap(),
            SubmitOutcome::Queued { position: 1 }
        );
        assert_eq!(
            handle.submit_task(Task::scheduled(feed(4))).await.unwrap(),
            SubmitOutcome::Queued { position: 2 }
        );

        let queued = handle.queued_tasks(3).await.unwrap();
        assert_eq!(
            queued.iter().map(|q| (q.feed_id, q.queue_position)).collect::<Vec<_>>(),
            vec![(3, 1), (4, 2)]
        );

        fetcher.release(4);
        settle(&handle, 0, 0).await;
    }

    #[tokio::test]
    async fn test_dedup_and_reprioritize() {
        let fetcher = GatedFetcher::new(vec![]);
        let handle = spawn_task_queue(fetcher.clone(), 1, 16, CancellationToken::new());

        handle.submit_task(Task::scheduled(feed(1))).await.unwrap();
        handle.submit_task(Task::scheduled(feed(2))).await.unwrap();
        handle.submit_task(Task::scheduled(feed(3))).await.unwrap();

        assert_eq!(
            handle.submit_task(Task::scheduled(feed(1))).await.unwrap(),
            SubmitOutcome::AlreadyRunning
        );
        assert_eq!(
            handle.submit_task(Task::scheduled(feed(3))).await.unwrap(),
            SubmitOutcome::AlreadyQueued
        );
        assert_eq!(
            handle.submit_task(Task::manual(feed(3))).await.unwrap(),
            SubmitOutcome::Reprioritized
        );
        assert_eq!(
            handle.submit(Task::manual(feed(3)), Priority::Head).await.unwrap(),
            SubmitOutcome::AlreadyQueued
        );

        let queued = handle.queued_tasks(10).await.unwrap();
        assert_eq!(
            queued.iter().map(|q| q.feed_id).collect::<Vec<_>>(),
            vec![3, 2]
        );

        fetcher.release(3);
        settle(&handle, 0, 0).await;
    }

    #[tokio::test]
    async fn test_failed_refresh_recorded_in_errors() {
        let fetcher = GatedFetcher::new(vec![7]);
        let handle = spawn_task_queue(fetcher.clone(), 2, 16, CancellationToken::new());

        handle.submit_task(Task::scheduled(feed(7))).await.unwrap();
        handle.submit_task(Task::scheduled(feed(8))).await.unwrap();
        fetcher.release(2);
        settle(&handle, 0, 0).await;

        let progress = handle.progress(3).await.unwrap();
        assert_eq!(progress.errors.len(), 1);
        assert!(progress.errors[&7].contains("HTTP error: 500"));
    }

    #[tokio::test]
    async fn test_cancellation_drops_queue_without_recording_errors() {
        let fetcher = GatedFetcher::new(vec![]);
        let cancel = CancellationToken::new();
        let handle = spawn_task_queue(fetcher.clone(), 1, 16, cancel.clone());

        handle.submit_task(Task::scheduled(feed(1))).await.unwrap();
        handle.submit_task(Task::scheduled(feed(2))).await.unwrap();
        settle(&handle, 1, 1).await;

        cancel.cancel();
        fetcher.release(1);
        settle(&handle, 0, 0).await;

        // A submission after cancellation starts but never reaches the fetch.
        assert_eq!(
            handle.submit_task(Task::scheduled(feed(3))).await.unwrap(),
            SubmitOutcome::Started
        );
        settle(&handle, 0, 0).await;

        let progress = handle.progress(3).await.unwrap();
        assert!(progress.errors.is_empty());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_resize_promotes_queued() {
        let fetcher = GatedFetcher::new(vec![]);
        let handle = spawn_task_queue(fetcher.clone(), 1, 16, CancellationToken::new());

        for id in 1..=4 {
            handle.submit_task(Task::scheduled(feed(id))).await.unwrap();
        }
        settle(&handle, 1, 3).await;

        assert_eq!(handle.set_max_concurrency(3).await.unwrap(), 3);
        settle(&handle, 3, 1).await;

        // Shrinking never aborts running work.
        assert_eq!(handle.set_max_concurrency(0).await.unwrap(), 1);
        settle(&handle, 3, 1).await;

        fetcher.release(4);
        settle(&handle, 0, 0).await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_shutdown_drops_queue_and_waits() {
        let fetcher = GatedFetcher::new(vec![]);
        let handle = spawn_task_queue(fetcher.clone(), 1, 16, CancellationToken::new());

        handle.submit_task(Task::scheduled(feed(1))).await.unwrap();
        handle.submit_task(Task::scheduled(feed(2))).await.unwrap();
        settle(&handle, 1, 1).await;

        let shutdown = tokio::spawn({
            let handle = handle.clone();
            async move { handle.shutdown().await }
        });
        loop {
            match handle.submit_task(Task::scheduled(feed(9))).await {
                Ok(SubmitOutcome::Rejected) => break,
                Ok(SubmitOutcome::Queued { .. }) | Ok(SubmitOutcome::AlreadyQueued) => {
                    tokio::task::yield_now().await
                }
                other => panic!("unexpected submit result: {other:?}"),
            }
        }
        fetcher.release(1);
        shutdown.await.unwrap().unwrap();

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            handle.submit_task(Task::new(feed(3), TaskReason::ManualRefresh)).await,
            Err(FeedkeeperError::QueueUnavailable)
        ));
    }
}
