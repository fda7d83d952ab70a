//! Refresh tasks and the snapshots exposed for introspection.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::feed::Feed;

/// Why a refresh was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskReason {
    /// Submitted by the background scheduler.
    Scheduled,
    /// The user asked for a refresh.
    ManualRefresh,
    /// Opening an article triggered a refresh of its feed.
    ArticleClickTriggered,
}

impl TaskReason {
    /// Queue priority implied by this reason.
    pub fn priority(self) -> Priority {
        match self {
            TaskReason::Scheduled => Priority::Normal,
            TaskReason::ManualRefresh | TaskReason::ArticleClickTriggered => Priority::Head,
        }
    }

    /// Whether the refresh was initiated by the user.
    pub fn is_manual(self) -> bool {
        !matches!(self, TaskReason::Scheduled)
    }

    /// Reason code used in logs and progress output.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskReason::Scheduled => "scheduled",
            TaskReason::ManualRefresh => "manual_refresh",
            TaskReason::ArticleClickTriggered => "article_click_triggered",
        }
    }
}

impl fmt::Display for TaskReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Insertion point in the waiting queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Append at the back.
    Normal,
    /// Insert at the front.
    Head,
}

/// One refresh attempt.
#[derive(Debug, Clone)]
pub struct Task {
    /// Feed to refresh.
    pub feed: Feed,
    /// Why the refresh was requested.
    pub reason: TaskReason,
    /// When the task was created.
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Create a task stamped with the current time.
    pub fn new(feed: Feed, reason: TaskReason) -> Self {
        Self {
            feed,
            reason,
            created_at: Utc::now(),
        }
    }

    /// Scheduled refresh.
    pub fn scheduled(feed: Feed) -> Self {
        Self::new(feed, TaskReason::Scheduled)
    }

    /// User-initiated refresh.
    pub fn manual(feed: Feed) -> Self {
        Self::new(feed, TaskReason::ManualRefresh)
    }

    /// Feed ID of the task.
    pub fn feed_id(&self) -> i64 {
        self.feed.id
    }
}

/// Snapshot of a running task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunningTaskInfo {
    pub feed_id: i64,
    pub feed_title: String,
    pub reason: TaskReason,
    pub created_at: DateTime<Utc>,
}

impl From<&Task> for RunningTaskInfo {
    fn from(task: &Task) -> Self {
        Self {
            feed_id: task.feed.id,
            feed_title: task.feed.title.clone(),
            reason: task.reason,
            created_at: task.created_at,
        }
    }
}

/// Snapshot of a queued task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueuedTaskInfo {
    pub feed_id: i64,
    pub feed_title: String,
    /// 1-based position in the waiting queue.
    pub queue_position: usize,
}

/// Aggregate view of the task queue for a progress API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    /// Number of running tasks.
    pub pool_task_count: usize,
    /// Number of queued tasks.
    pub queue_task_count: usize,
    /// Current concurrency ceiling.
    pub max_concurrency: usize,
    pub running: Vec<RunningTaskInfo>,
    /// The first few queued tasks.
    pub queued: Vec<QueuedTaskInfo>,
    /// Last error per feed, cleared on the feed's next success.
    pub errors: BTreeMap<i64, String>,
}

/// Result of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// A worker slot was free and the task started.
    Started,
    /// The task was queued at the given 1-based position.
    Queued { position: usize },
    /// The feed was already queued and has been moved to the front.
    Reprioritized,
    /// The feed is already being refreshed.
    AlreadyRunning,
    /// The feed is already queued at equal or higher priority.
    AlreadyQueued,
    /// The queue is shutting down.
    Rejected,
}

impl SubmitOutcome {
    /// Whether a new task was created by the submission.
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmitOutcome::Started | SubmitOutcome::Queued { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{RefreshInterval, UpdateStatus};

    fn feed() -> Feed {
        Feed {
            id: 9,
            title: "Wire".to_string(),
            url: "https://example.com/wire".to_string(),
            refresh_interval: RefreshInterval::UseGlobal,
            last_updated: None,
            last_update_status: UpdateStatus::Pending,
            last_error: None,
            articles_per_month: 0.0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_reason_priority() {
        assert_eq!(TaskReason::Scheduled.priority(), Priority::Normal);
        assert_eq!(TaskReason::ManualRefresh.priority(), Priority::Head);
        assert_eq!(TaskReason::ArticleClickTriggered.priority(), Priority::Head);
        assert!(Priority::Head > Priority::Normal);
    }

    #[test]
    fn test_reason_is_manual() {
        assert!(!TaskReason::Scheduled.is_manual());
        assert!(TaskReason::ManualRefresh.is_manual());
        assert!(TaskReason::ArticleClickTriggered.is_manual());
    }

    #[test]
    fn test_running_info_from_task() {
        let task = Task::manual(feed());
        let info = RunningTaskInfo::from(&task);
        assert_eq!(info.feed_id, 9);
        assert_eq!(info.feed_title, "Wire");
        assert_eq!(info.reason, TaskReason::ManualRefresh);
        assert_eq!(info.created_at, task.created_at);
    }

    #[test]
    fn test_progress_serializes() {
        let mut snapshot = ProgressSnapshot {
            pool_task_count: 1,
            max_concurrency: 5,
            ..Default::default()
        };
        snapshot.errors.insert(3, "HTTP error: 503".to_string());

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["pool_task_count"], 1);
        assert_eq!(json["errors"]["3"], "HTTP error: 503");
    }

    #[test]
    fn test_submit_outcome_accepted() {
        assert!(SubmitOutcome::Started.is_accepted());
        assert!(SubmitOutcome::Queued { position: 2 }.is_accepted());
        assert!(!SubmitOutcome::AlreadyQueued.is_accepted());
        assert!(!SubmitOutcome::Rejected.is_accepted());
    }
}
