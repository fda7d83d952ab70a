use tokio::sync::oneshot;

use crate::fetcher::FetchOutcome;
use crate::Result;
use crate::scheduler::task::{
    Priority, ProgressSnapshot, QueuedTaskInfo, RunningTaskInfo, SubmitOutcome, Task,
};

/// Messages accepted by the task queue actor.
pub enum QueueMessage {
    /// Run or enqueue a refresh.
    Submit {
        task: Task,
        priority: Priority,
        reply: oneshot::Sender<SubmitOutcome>,
    },

    /// Change the concurrency ceiling. Running tasks are never aborted.
    SetMaxConcurrency {
        max: usize,
        reply: oneshot::Sender<usize>,
    },

    /// Snapshot of running tasks.
    RunningTasks {
        reply: oneshot::Sender<Vec<RunningTaskInfo>>,
    },

    /// Snapshot of the first `limit` queued tasks.
    QueuedTasks {
        limit: usize,
        reply: oneshot::Sender<Vec<QueuedTaskInfo>>,
    },

    /// Aggregate progress, listing at most `limit` queued tasks.
    Progress {
        limit: usize,
        reply: oneshot::Sender<ProgressSnapshot>,
    },

    /// Drop queued work and stop once running work has finished.
    Shutdown { reply: oneshot::Sender<()> },
}

/// Internal message: a worker finished.
pub(super) struct TaskFinished {
    pub feed_id: i64,
    pub result: Result<FetchOutcome>,
}
