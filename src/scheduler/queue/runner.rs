use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::messages::{QueueMessage, TaskFinished};
use crate::fetcher::FeedFetcher;
use crate::FeedkeeperError;
use crate::scheduler::task::{
    Priority, ProgressSnapshot, QueuedTaskInfo, RunningTaskInfo, SubmitOutcome, Task,
};

/// A waiting task and the priority it was queued with.
struct QueuedEntry {
    task: Task,
    priority: Priority,
}

/// Task queue actor.
///
/// Owns all running/queued state; submitters and workers only talk to it
/// through channels.
pub struct TaskQueueActor {
    fetcher: Arc<dyn FeedFetcher>,
    cancel: CancellationToken,
    max_concurrency: usize,
    running: Vec<Task>,
    queue: VecDeque<QueuedEntry>,
    errors: BTreeMap<i64, String>,
    receiver: mpsc::Receiver<QueueMessage>,
    finished_tx: mpsc::UnboundedSender<TaskFinished>,
    finished_rx: mpsc::UnboundedReceiver<TaskFinished>,
    shutdown_waiters: Vec<oneshot::Sender<()>>,
}

impl TaskQueueActor {
    pub fn new(
        fetcher: Arc<dyn FeedFetcher>,
        max_concurrency: usize,
        cancel: CancellationToken,
        receiver: mpsc::Receiver<QueueMessage>,
    ) -> Self {
        let (finished_tx, finished_rx) = mpsc::unbounded_channel();
        Self {
            fetcher,
            cancel,
            max_concurrency: max_concurrency.max(1),
            running: Vec::new(),
            queue: VecDeque::new(),
            errors: BTreeMap::new(),
            receiver,
            finished_tx,
            finished_rx,
            shutdown_waiters: Vec::new(),
        }
    }

    /// Run the actor loop until shut down or every handle is dropped.
    pub async fn run(mut self) {
        info!(
            "Task queue started (max concurrency: {})",
            self.max_concurrency
        );

        loop {
            tokio::select! {
                msg = self.receiver.recv() => match msg {
                    Some(msg) => self.handle_message(msg),
                    None => break,
                },
                Some(finished) = self.finished_rx.recv() => self.handle_finished(finished),
            }

            if self.is_stopped() {
                break;
            }
        }

        for waiter in self.shutdown_waiters.drain(..) {
            let _ = waiter.send(());
        }
        info!("Task queue stopped");
    }

    fn is_stopped(&self) -> bool {
        !self.shutdown_waiters.is_empty() && self.running.is_empty()
    }

    fn is_shutting_down(&self) -> bool {
        !self.shutdown_waiters.is_empty()
    }

    fn handle_message(&mut self, msg: QueueMessage) {
        match msg {
            QueueMessage::Submit {
                task,
                priority,
                reply,
            } => {
                let outcome = self.submit(task, priority);
                let _ = reply.send(outcome);
            }

            QueueMessage::SetMaxConcurrency { max, reply } => {
                self.set_max_concurrency(max);
                let _ = reply.send(self.max_concurrency);
            }

            QueueMessage::RunningTasks { reply } => {
                let _ = reply.send(self.running_snapshot());
            }

            QueueMessage::QueuedTasks { limit, reply } => {
                let _ = reply.send(self.queued_snapshot(limit));
            }

            QueueMessage::Progress { limit, reply } => {
                let _ = reply.send(ProgressSnapshot {
                    pool_task_count: self.running.len(),
                    queue_task_count: self.queue.len(),
                    max_concurrency: self.max_concurrency,
                    running: self.running_snapshot(),
                    queued: self.queued_snapshot(limit),
                    errors: self.errors.clone(),
                });
            }

            QueueMessage::Shutdown { reply } => {
                if !self.queue.is_empty() {
                    info!("Dropping {} queued task(s) on shutdown", self.queue.len());
                    self.queue.clear();
                }
                self.shutdown_waiters.push(reply);
            }
        }
    }

    fn submit(&mut self, task: Task, priority: Priority) -> SubmitOutcome {
        if self.is_shutting_down() {
            return SubmitOutcome::Rejected;
        }

        let feed_id = task.feed_id();

        if self.running.iter().any(|t| t.feed_id() == feed_id) {
            debug!("Feed {} is already refreshing", feed_id);
            return SubmitOutcome::AlreadyRunning;
        }

        if let Some(index) = self.queue.iter().position(|e| e.task.feed_id() == feed_id) {
            if priority <= self.queue[index].priority {
                return SubmitOutcome::AlreadyQueued;
            }
            if let Some(mut entry) = self.queue.remove(index) {
                entry.priority = priority;
                entry.task.reason = task.reason;
                self.queue.push_front(entry);
            }
            debug!("Feed {} moved to the front of the queue", feed_id);
            return SubmitOutcome::Reprioritized;
        }

        if self.running.len() < self.max_concurrency {
            self.start(task);
            return SubmitOutcome::Started;
        }

        let entry = QueuedEntry { task, priority };
        let position = match priority {
            Priority::Head => {
                self.queue.push_front(entry);
                1
            }
            Priority::Normal => {
                self.queue.push_back(entry);
                self.queue.len()
            }
        };
        debug!("Feed {} queued at position {}", feed_id, position);
        SubmitOutcome::Queued { position }
    }

    fn set_max_concurrency(&mut self, max: usize) {
        let max = max.max(1);
        if max != self.max_concurrency {
            info!(
                "Task queue concurrency changed from {} to {}",
                self.max_concurrency, max
            );
            self.max_concurrency = max;
        }
        self.promote();
    }

    /// Start queued tasks while worker slots are free.
    ///
    /// Once the token is cancelled queued tasks are dropped instead.
    fn promote(&mut self) {
        if self.cancel.is_cancelled() && !self.queue.is_empty() {
            info!(
                "Dropping {} queued task(s) after cancellation",
                self.queue.len()
            );
            self.queue.clear();
            return;
        }
        while self.running.len() < self.max_concurrency {
            match self.queue.pop_front() {
                Some(entry) => self.start(entry.task),
                None => break,
            }
        }
    }

    fn start(&mut self, task: Task) {
        let fetcher = Arc::clone(&self.fetcher);
        let cancel = self.cancel.clone();
        let finished_tx = self.finished_tx.clone();
        let feed = task.feed.clone();
        let feed_id = feed.id;
        let is_manual = task.reason.is_manual();

        debug!("Starting refresh of feed {} ({})", feed_id, task.reason);
        self.running.push(task);

        tokio::spawn(async move {
            let worker =
                tokio::spawn(async move { fetcher.fetch_feed(&cancel, &feed, is_manual).await });
            let result = match worker.await {
                Ok(result) => result,
                Err(e) => Err(FeedkeeperError::Fetch(format!("refresh task aborted: {}", e))),
            };
            let _ = finished_tx.send(TaskFinished { feed_id, result });
        });
    }

    fn handle_finished(&mut self, finished: TaskFinished) {
        self.running.retain(|t| t.feed_id() != finished.feed_id);

        match finished.result {
            Ok(outcome) => {
                debug!(
                    "Feed {} refreshed ({} new)",
                    finished.feed_id, outcome.new_articles
                );
                self.errors.remove(&finished.feed_id);
            }
            Err(FeedkeeperError::Cancelled) => {
                debug!("Feed {} refresh skipped after cancellation", finished.feed_id);
            }
            Err(e) => {
                warn!("Feed {} refresh failed: {}", finished.feed_id, e);
                self.errors.insert(finished.feed_id, e.to_string());
            }
        }

        self.promote();
    }

    fn running_snapshot(&self) -> Vec<RunningTaskInfo> {
        self.running.iter().map(RunningTaskInfo::from).collect()
    }

    fn queued_snapshot(&self, limit: usize) -> Vec<QueuedTaskInfo> {
        self.queue
            .iter()
            .take(limit)
            .enumerate()
            .map(|(i, entry)| QueuedTaskInfo {
                feed_id: entry.task.feed.id,
                feed_title: entry.task.feed.title.clone(),
                queue_position: i + 1,
            })
            .collect()
    }
}
