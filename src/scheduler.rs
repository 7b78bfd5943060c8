//! Cooperative task queue.
//!
//! Tasks are ordered by [`Priority`] (lower value runs first). Tagged tasks
//! are placed by binary search after every queued task of equal or higher
//! urgency, so equal priorities run FIFO. Untagged tasks always append.
//!
//! The queue only orders and books tasks; running them is the runtime's job:
//!
//! ```text
//! begin_turn ─▶ take_head ─▶ (run action) ─▶ settle ─┐
//!      ▲                                             │
//!      └──────────── while !should_yield ◀───────────┘
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, warn};

use crate::error::{FlactError, FlactResult};
use crate::hooks::EffectHandle;
use crate::platform::{Channel, Platform};
use crate::reconcile::Walk;

// =============================================================================
// Configuration
// =============================================================================

/// Scheduler configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Budget of one scheduler turn
    pub time_slice: Duration,
    /// Failed attempts retried before a task is dropped
    pub max_task_retries: u32,
}

impl SchedulerConfig {
    /// 5 ms slices, 3 retries (up to 4 attempts).
    pub const DEFAULT: Self = Self {
        time_slice: Duration::from_millis(5),
        max_task_retries: 3,
    };

    pub fn new(time_slice: Duration, max_task_retries: u32) -> Self {
        Self {
            time_slice,
            max_task_retries,
        }
    }

    pub fn with_time_slice(mut self, time_slice: Duration) -> Self {
        self.time_slice = time_slice;
        self
    }

    pub fn with_max_retries(mut self, max_task_retries: u32) -> Self {
        self.max_task_retries = max_task_retries;
        self
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// =============================================================================
// Task
// =============================================================================

/// Urgency class of a task. Lower values run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Priority {
    Immediate = 1,
    UserBlock = 2,
    Normal = 4,
    Low = 8,
    Idle = 16,
}

impl Priority {
    #[inline]
    pub const fn as_raw(self) -> u8 {
        self as u8
    }

    /// Turn channel requested when a task of this priority is enqueued.
    pub fn channel(priority: Option<Priority>) -> Channel {
        match priority {
            Some(Priority::Immediate) => Channel::Microtask,
            _ => Channel::Macrotask,
        }
    }
}

/// Queue-unique task identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskId({})", self.0)
    }
}

/// Result of running a task action once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Finished; remove the task
    Done,
    /// Stopped early; keep the task and resume next turn
    Continue,
}

/// Effects queued by one node, run as a single task.
pub struct EffectBatch(pub(crate) Vec<EffectHandle>);

impl EffectBatch {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Arbitrary unit of work.
pub type Job = Box<dyn FnMut() -> FlactResult<Step>>;

/// What a task does when it runs.
pub enum TaskAction {
    /// Render and commit a dirty subtree
    Reconcile(Walk),
    /// Run deferred effects (cleanups first, then bodies)
    RunEffects(EffectBatch),
    Job(Job),
}

impl TaskAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Reconcile(_) => "reconcile",
            Self::RunEffects(_) => "effects",
            Self::Job(_) => "job",
        }
    }
}

impl fmt::Debug for TaskAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reconcile(walk) => f.debug_tuple("Reconcile").field(walk).finish(),
            Self::RunEffects(batch) => write!(f, "RunEffects({})", batch.len()),
            Self::Job(_) => f.write_str("Job"),
        }
    }
}

/// A queued unit of work.
#[derive(Debug)]
pub struct Task {
    id: TaskId,
    /// `None` while the action is out running
    action: Option<TaskAction>,
    priority: Option<Priority>,
    retries: u32,
    created_at: Instant,
}

impl Task {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn priority(&self) -> Option<Priority> {
        self.priority
    }

    /// Failed attempts so far
    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn is_running(&self) -> bool {
        self.action.is_none()
    }
}

// =============================================================================
// Deadline
// =============================================================================

/// End of the current time slice.
#[derive(Clone)]
pub(crate) struct Deadline {
    platform: Arc<dyn Platform>,
    expires_at: Instant,
}

impl Deadline {
    pub(crate) fn new(platform: Arc<dyn Platform>, expires_at: Instant) -> Self {
        Self {
            platform,
            expires_at,
        }
    }

    #[inline]
    pub(crate) fn expired(&self) -> bool {
        self.platform.now() >= self.expires_at
    }
}

// =============================================================================
// Scheduler
// =============================================================================

/// How a task was booked after running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settled {
    Done,
    Continued,
    /// Failed and kept; `attempt` failures so far
    Retrying { attempt: u32 },
    /// Failed past the retry ceiling and removed
    Dropped,
}

/// Priority-ordered task queue.
#[derive(Debug, Default)]
pub struct Scheduler {
    queue: VecDeque<Task>,
    config: SchedulerConfig,
    next_id: u64,
    expires_at: Option<Instant>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.queue.iter()
    }

    /// Queue `action` and return its id.
    pub fn enqueue(&mut self, action: TaskAction, priority: Option<Priority>, now: Instant) -> TaskId {
        self.next_id += 1;
        let id = TaskId(self.next_id);
        debug!(?id, action = action.name(), ?priority, "enqueue task");
        let task = Task {
            id,
            action: Some(action),
            priority,
            retries: 0,
            created_at: now,
        };

        match priority {
            Some(p) if !self.queue.is_empty() => {
                let index = self
                    .queue
                    .partition_point(|t| matches!(t.priority, Some(q) if q <= p));
                self.queue.insert(index, task);
            }
            _ => self.queue.push_back(task),
        }
        id
    }

    /// Open a new time slice starting at `now`.
    pub fn begin_turn(&mut self, now: Instant) -> Instant {
        let expires_at = now + self.config.time_slice;
        self.expires_at = Some(expires_at);
        expires_at
    }

    pub fn should_yield(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now >= at)
    }

    /// Take the head task's action out for running.
    pub fn take_head(&mut self) -> Option<(TaskId, TaskAction)> {
        let task = self.queue.front_mut()?;
        let action = task.action.take()?;
        Some((task.id, action))
    }

    /// Book the outcome of running task `id`, handing its action back.
    pub fn settle(&mut self, id: TaskId, action: TaskAction, outcome: FlactResult<Step>) -> Settled {
        let Some(pos) = self.queue.iter().position(|t| t.id == id) else {
            return Settled::Done;
        };
        match outcome {
            Ok(Step::Done) => {
                self.queue.remove(pos);
                debug!(?id, "task done");
                Settled::Done
            }
            Ok(Step::Continue) => {
                self.queue[pos].action = Some(action);
                debug!(?id, "task yielded");
                Settled::Continued
            }
            Err(err) => {
                let task = &mut self.queue[pos];
                error!(?id, attempt = task.retries + 1, error = %err, "task failed");
                if task.retries >= self.config.max_task_retries {
                    warn!(?id, retries = task.retries, "task dropped after exhausting retries");
                    self.queue.remove(pos);
                    return Settled::Dropped;
                }
                task.retries += 1;
                task.action = Some(action);
                Settled::Retrying {
                    attempt: task.retries,
                }
            }
        }
    }
}

/// Convert a caught panic into a task failure.
pub(crate) fn panic_outcome(
    result: std::thread::Result<FlactResult<Step>>,
) -> FlactResult<Step> {
    result.unwrap_or_else(|payload| Err(FlactError::from_panic(payload)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> TaskAction {
        TaskAction::Job(Box::new(|| Ok(Step::Done)))
    }

    fn order(s: &Scheduler) -> Vec<Option<Priority>> {
        s.tasks().map(Task::priority).collect()
    }

    #[test]
    fn test_priority_order_is_fifo_within_level() {
        let now = Instant::now();
        let mut s = Scheduler::new(SchedulerConfig::DEFAULT);
        let low = s.enqueue(job(), Some(Priority::Low), now);
        let n1 = s.enqueue(job(), Some(Priority::Normal), now);
        let n2 = s.enqueue(job(), Some(Priority::Normal), now);
        let imm = s.enqueue(job(), Some(Priority::Immediate), now);

        let ids: Vec<_> = s.tasks().map(Task::id).collect();
        assert_eq!(ids, vec![imm, n1, n2, low]);
    }

    #[test]
    fn test_untagged_tasks_append() {
        let now = Instant::now();
        let mut s = Scheduler::new(SchedulerConfig::DEFAULT);
        s.enqueue(job(), None, now);
        s.enqueue(job(), None, now);
        assert_eq!(order(&s), vec![None, None]);

        // tagged tasks go ahead of untagged ones
        s.enqueue(job(), Some(Priority::Idle), now);
        s.enqueue(job(), Some(Priority::Normal), now);
        s.enqueue(job(), None, now);
        assert_eq!(
            order(&s),
            vec![Some(Priority::Normal), Some(Priority::Idle), None, None, None]
        );
    }

    #[test]
    fn test_retry_ceiling() {
        let now = Instant::now();
        let mut s = Scheduler::new(SchedulerConfig::DEFAULT.with_max_retries(1));
        let id = s.enqueue(job(), None, now);

        let (taken, action) = s.take_head().unwrap();
        assert_eq!(taken, id);
        assert!(s.tasks().next().unwrap().is_running());
        let settled = s.settle(id, action, Err(FlactError::render("X", "boom")));
        assert_eq!(settled, Settled::Retrying { attempt: 1 });
        assert_eq!(s.tasks().next().unwrap().retries(), 1);

        let (_, action) = s.take_head().unwrap();
        let settled = s.settle(id, action, Err(FlactError::render("X", "boom")));
        assert_eq!(settled, Settled::Dropped);
        assert!(s.is_empty());
    }

    #[test]
    fn test_continue_keeps_task() {
        let now = Instant::now();
        let mut s = Scheduler::new(SchedulerConfig::DEFAULT);
        let id = s.enqueue(job(), None, now);
        let (_, action) = s.take_head().unwrap();

        // a more urgent task arrives while the first one runs
        s.enqueue(job(), Some(Priority::Immediate), now);
        assert_eq!(s.settle(id, action, Ok(Step::Continue)), Settled::Continued);
        assert_eq!(s.len(), 2);
        assert_eq!(s.tasks().nth(1).map(Task::id), Some(id));
    }

    #[test]
    fn test_time_slice() {
        let now = Instant::now();
        let mut s = Scheduler::new(SchedulerConfig::DEFAULT);
        assert!(s.should_yield(now));
        let expires = s.begin_turn(now);
        assert_eq!(expires - now, Duration::from_millis(5));
        assert!(!s.should_yield(now + Duration::from_millis(4)));
        assert!(s.should_yield(now + Duration::from_millis(5)));
    }

    #[test]
    fn test_priority_values() {
        assert_eq!(Priority::Immediate.as_raw(), 1);
        assert_eq!(Priority::Idle.as_raw(), 16);
        assert!(Priority::UserBlock < Priority::Normal);
        assert_eq!(Priority::channel(Some(Priority::Immediate)), Channel::Microtask);
        assert_eq!(Priority::channel(None), Channel::Macrotask);
    }

    #[test]
    fn test_panic_outcome() {
        let caught = std::panic::catch_unwind(|| -> FlactResult<Step> { panic!("kaboom") });
        match panic_outcome(caught) {
            Err(FlactError::TaskPanicked { message }) => assert_eq!(message, "kaboom"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
