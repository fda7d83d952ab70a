use tokio::sync::{mpsc, oneshot};

use super::messages::QueueMessage;
use crate::scheduler::task::{
    Priority, ProgressSnapshot, QueuedTaskInfo, RunningTaskInfo, SubmitOutcome, Task,
};
use crate::{FeedkeeperError, Result};

/// Handle to the task queue actor.
///
/// Cheap to clone; every method fails with
/// [`FeedkeeperError::QueueUnavailable`] once the actor has stopped.
#[derive(Clone)]
pub struct TaskQueueHandle {
    sender: mpsc::Sender<QueueMessage>,
}

impl TaskQueueHandle {
    pub(super) fn new(sender: mpsc::Sender<QueueMessage>) -> Self {
        Self { sender }
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> QueueMessage) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(build(reply))
            .await
            .map_err(|_| FeedkeeperError::QueueUnavailable)?;
        rx.await.map_err(|_| FeedkeeperError::QueueUnavailable)
    }

    /// Submit a task with an explicit priority.
    ///
    /// Starts the task if a worker slot is free, otherwise queues it. A
    /// feed that is already running or queued is never added twice.
    pub async fn submit(&self, task: Task, priority: Priority) -> Result<SubmitOutcome> {
        self.request(|reply| QueueMessage::Submit {
            task,
            priority,
            reply,
        })
        .await
    }

    /// Submit a task with the priority implied by its reason.
    pub async fn submit_task(&self, task: Task) -> Result<SubmitOutcome> {
        let priority = task.reason.priority();
        self.submit(task, priority).await
    }

    /// Change the concurrency ceiling and return the applied value.
    pub async fn set_max_concurrency(&self, max: usize) -> Result<usize> {
        self.request(|reply| QueueMessage::SetMaxConcurrency { max, reply })
            .await
    }

    /// Tasks currently executing.
    pub async fn running_tasks(&self) -> Result<Vec<RunningTaskInfo>> {
        self.request(|reply| QueueMessage::RunningTasks { reply })
            .await
    }

    /// The first `limit` waiting tasks, in dequeue order.
    pub async fn queued_tasks(&self, limit: usize) -> Result<Vec<QueuedTaskInfo>> {
        self.request(|reply| QueueMessage::QueuedTasks { limit, reply })
            .await
    }

    /// Aggregate counters and snapshots.
    pub async fn progress(&self, limit: usize) -> Result<ProgressSnapshot> {
        self.request(|reply| QueueMessage::Progress { limit, reply })
            .await
    }

    /// Drop queued tasks and wait until running tasks have finished.
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|reply| QueueMessage::Shutdown { reply }).await
    }
}
