//! Refresh scheduling.
//!
//! - [`interval`] decides how often a feed must be refreshed.
//! - [`stagger`] spreads due feeds over a window.
//! - [`queue`] runs refreshes with bounded concurrency.
//! - [`driver`] ties them together on a periodic tick.

pub mod driver;
pub mod interval;
pub mod queue;
pub mod stagger;
pub mod task;

pub use driver::{plan_cycle, BackgroundScheduler, CycleReport, PlannedRefresh, SchedulerOptions};
pub use queue::{spawn_task_queue, TaskQueueHandle};
pub use task::{
    Priority, ProgressSnapshot, QueuedTaskInfo, RunningTaskInfo, SubmitOutcome, Task, TaskReason,
};
