//! Engine context
//!
//! A [`Runtime`] owns everything one application needs: the work node arena,
//! the host document, the task queue and (with the `async` feature) a local
//! executor for futures spawned by hooks. Several runtimes can coexist; none
//! of them is global.
//!
//! The runtime never drives itself. Whenever it has work it asks the
//! [`Platform`] for a turn, and the embedder answers with [`Runtime::flush`].
//!
//! ```
//! use std::sync::Arc;
//! use flact::prelude::*;
//!
//! let platform = Arc::new(ManualPlatform::new());
//! let runtime = Runtime::new(MemoryHost::new(), platform.clone());
//! let container = runtime.with_host_mut(|host| host.create_element("main", Namespace::Html)).unwrap();
//!
//! runtime.render(h("p", Props::new(), "hello"), Some(container)).unwrap();
//! assert_eq!(platform.take_turns(), vec![Channel::Microtask]);
//!
//! runtime.flush();
//! assert_eq!(runtime.with_host(|host| host.inner_html(container)), "<p>hello</p>");
//! ```

use std::cell::RefCell;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::{Rc, Weak};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::{FlactError, FlactResult};
use crate::hooks::{UpdateQueue, run_effects};
use crate::host::{Host, HostNode};
use crate::node::{NodeId, Tree, WorkNode};
use crate::platform::{Channel, Platform};
use crate::reconcile::{RenderCtx, Walk};
use crate::scheduler::{
    Deadline, EffectBatch, Priority, Scheduler, SchedulerConfig, Settled, Step, TaskAction, TaskId,
    panic_outcome,
};
use crate::vnode::VNode;

/// Upper bound on turns taken by [`Runtime::run_until_idle`].
const MAX_IDLE_TURNS: usize = 10_000;

// =============================================================================
// Configuration
// =============================================================================

/// Runtime configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub scheduler: SchedulerConfig,
}

impl RuntimeConfig {
    pub const DEFAULT: Self = Self {
        scheduler: SchedulerConfig::DEFAULT,
    };

    pub fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// What one scheduler turn did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TurnReport {
    /// Task attempts made
    pub ran: usize,
    /// Attempts that failed (error or panic)
    pub failed: usize,
    /// Tasks removed after exhausting their retries
    pub dropped: usize,
    /// The turn ended on the deadline or a continuation
    pub yielded: bool,
    /// Tasks still queued
    pub remaining: usize,
}

// =============================================================================
// Runtime
// =============================================================================

/// One running application.
///
/// Cloning is cheap and yields another handle to the same engine, which
/// lets event listeners and jobs hold on to it.
pub struct Runtime<H: Host + 'static> {
    shared: Rc<Shared<H>>,
}

pub(crate) struct Shared<H: Host + 'static> {
    me: Weak<Shared<H>>,
    tree: RefCell<Tree>,
    host: RefCell<H>,
    scheduler: RefCell<Scheduler>,
    platform: Arc<dyn Platform>,
    #[cfg(feature = "async")]
    executor: executor::Executor,
}

impl<H: Host + 'static> Clone for Runtime<H> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<H: Host + 'static> Runtime<H> {
    pub fn new(host: H, platform: Arc<dyn Platform>) -> Self {
        Self::with_config(host, platform, RuntimeConfig::DEFAULT)
    }

    pub fn with_config(host: H, platform: Arc<dyn Platform>, config: RuntimeConfig) -> Self {
        let shared = Rc::new_cyclic(|me| Shared {
            me: me.clone(),
            tree: RefCell::new(Tree::new()),
            host: RefCell::new(host),
            scheduler: RefCell::new(Scheduler::new(config.scheduler)),
            #[cfg(feature = "async")]
            executor: executor::Executor::new(Arc::clone(&platform)),
            platform,
        });
        Self { shared }
    }

    /// Mount `description` into `container`.
    ///
    /// Creates a root work node and queues its reconciliation at
    /// [`Priority::Immediate`]. Nothing touches the host until the next
    /// [`flush`](Self::flush).
    pub fn render(&self, description: VNode, container: Option<HostNode>) -> FlactResult<NodeId> {
        let container = container.ok_or(FlactError::MissingContainer)?;
        let root = self
            .shared
            .tree
            .borrow_mut()
            .insert(WorkNode::root(container, description));
        debug!(?root, ?container, "render root created");
        self.shared
            .enqueue(TaskAction::Reconcile(Walk::new(root)), Some(Priority::Immediate));
        Ok(root)
    }

    /// Queue an arbitrary job.
    ///
    /// A job returning [`Step::Continue`] stays at its queue position and runs
    /// again next turn.
    pub fn schedule(
        &self,
        priority: Option<Priority>,
        job: impl FnMut() -> FlactResult<Step> + 'static,
    ) -> TaskId {
        self.shared.enqueue(TaskAction::Job(Box::new(job)), priority)
    }

    /// Run one scheduler turn.
    pub fn flush(&self) -> TurnReport {
        self.shared.flush()
    }

    /// Flush until no task is left, returning the number of turns taken.
    ///
    /// Futures waiting on the platform clock do not keep the runtime busy.
    pub fn run_until_idle(&self) -> usize {
        let mut turns = 0;
        while turns < MAX_IDLE_TURNS {
            turns += 1;
            let report = self.flush();
            if report.remaining == 0 && !self.shared.has_ready_futures() {
                break;
            }
        }
        turns
    }

    /// Tasks waiting in the queue
    pub fn pending_tasks(&self) -> usize {
        self.shared.scheduler.borrow().len()
    }

    /// Inspect the task queue.
    pub fn with_scheduler<R>(&self, f: impl FnOnce(&Scheduler) -> R) -> R {
        f(&self.shared.scheduler.borrow())
    }

    pub fn with_host<R>(&self, f: impl FnOnce(&H) -> R) -> R {
        f(&self.shared.host.borrow())
    }

    /// Mutable access to the host, for creating containers and the like.
    ///
    /// Must not be called from inside a render or a layout effect.
    pub fn with_host_mut<R>(&self, f: impl FnOnce(&mut H) -> R) -> R {
        f(&mut self.shared.host.borrow_mut())
    }

    pub fn with_tree<R>(&self, f: impl FnOnce(&Tree) -> R) -> R {
        f(&self.shared.tree.borrow())
    }

    pub fn platform(&self) -> &Arc<dyn Platform> {
        &self.shared.platform
    }
}

impl<H: Host + 'static> fmt::Debug for Runtime<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("nodes", &self.shared.tree.borrow().len())
            .field("tasks", &self.shared.scheduler.borrow().len())
            .finish()
    }
}

// =============================================================================
// Turn
// =============================================================================

impl<H: Host + 'static> Shared<H> {
    fn queue(&self) -> Weak<dyn UpdateQueue> {
        self.me.clone()
    }

    fn enqueue(&self, action: TaskAction, priority: Option<Priority>) -> TaskId {
        let now = self.platform.now();
        let id = self.scheduler.borrow_mut().enqueue(action, priority, now);
        let channel = Channel::pick(self.platform.as_ref(), Priority::channel(priority));
        self.platform.request_turn(channel);
        id
    }

    fn flush(&self) -> TurnReport {
        #[cfg(feature = "async")]
        self.executor.poll();

        let mut report = TurnReport::default();
        let expires_at = self.scheduler.borrow_mut().begin_turn(self.platform.now());
        let deadline = Deadline::new(Arc::clone(&self.platform), expires_at);

        loop {
            if self.scheduler.borrow().should_yield(self.platform.now()) {
                report.yielded = !self.scheduler.borrow().is_empty();
                break;
            }
            let Some((id, mut action)) = self.scheduler.borrow_mut().take_head() else {
                break;
            };
            trace!(?id, action = action.name(), "run task");
            let (outcome, passive) = self.run(&mut action, &deadline);
            report.ran += 1;

            let settled = self.scheduler.borrow_mut().settle(id, action, outcome);
            for batch in passive {
                self.enqueue(TaskAction::RunEffects(batch), None);
            }
            match settled {
                Settled::Done => {}
                Settled::Continued => {
                    report.yielded = true;
                    break;
                }
                Settled::Retrying { .. } => report.failed += 1,
                Settled::Dropped => {
                    report.failed += 1;
                    report.dropped += 1;
                }
            }
        }

        #[cfg(feature = "async")]
        self.executor.poll();

        report.remaining = self.scheduler.borrow().len();
        if report.remaining > 0 {
            let channel = Channel::pick(self.platform.as_ref(), Channel::Macrotask);
            self.platform.request_turn(channel);
        }
        debug!(?report, "scheduler turn finished");
        report
    }

    /// Run one attempt of `action`, catching panics.
    ///
    /// No runtime borrow is held while effects or jobs run; a reconcile step
    /// holds the tree and the host.
    fn run(&self, action: &mut TaskAction, deadline: &Deadline) -> (FlactResult<Step>, Vec<EffectBatch>) {
        let mut passive = Vec::new();
        let result = catch_unwind(AssertUnwindSafe(|| match action {
            TaskAction::Reconcile(walk) => {
                let mut tree = self.tree.borrow_mut();
                let mut host = self.host.borrow_mut();
                let mut ctx = RenderCtx {
                    tree: &mut *tree,
                    host: &mut *host,
                    deadline,
                    queue: self.queue(),
                    passive: Vec::new(),
                };
                let outcome = walk.step(&mut ctx);
                passive = ctx.passive;
                outcome
            }
            TaskAction::RunEffects(batch) => {
                run_effects(&batch.0);
                Ok(Step::Done)
            }
            TaskAction::Job(job) => job(),
        }));
        (panic_outcome(result), passive)
    }

    fn has_ready_futures(&self) -> bool {
        #[cfg(feature = "async")]
        {
            self.executor.is_woken()
        }
        #[cfg(not(feature = "async"))]
        {
            false
        }
    }
}

impl<H: Host + 'static> UpdateQueue for Shared<H> {
    fn request_render(&self, node: NodeId) {
        trace!(?node, "re-render requested");
        self.enqueue(TaskAction::Reconcile(Walk::new(node)), None);
    }

    fn platform(&self) -> Arc<dyn Platform> {
        Arc::clone(&self.platform)
    }

    #[cfg(feature = "async")]
    fn spawn_local(&self, future: futures_util::future::LocalBoxFuture<'static, ()>) {
        self.executor.spawn(future);
    }
}

// =============================================================================
// Executor
// =============================================================================

#[cfg(feature = "async")]
mod executor {
    use std::cell::RefCell;
    use std::mem;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::task::{Context, Poll};

    use futures_util::StreamExt;
    use futures_util::future::LocalBoxFuture;
    use futures_util::stream::FuturesUnordered;
    use futures_util::task::{ArcWake, waker};
    use tracing::trace;

    use crate::platform::{Channel, Platform};

    /// Wakes the runtime by asking the platform for a turn.
    struct TurnWaker {
        woken: AtomicBool,
        platform: Arc<dyn Platform>,
    }

    impl ArcWake for TurnWaker {
        fn wake_by_ref(arc_self: &Arc<Self>) {
            if !arc_self.woken.swap(true, Ordering::SeqCst) {
                let channel = Channel::pick(arc_self.platform.as_ref(), Channel::Macrotask);
                arc_self.platform.request_turn(channel);
            }
        }
    }

    /// Single-threaded executor polled at the edges of every scheduler turn.
    pub(super) struct Executor {
        futures: RefCell<FuturesUnordered<LocalBoxFuture<'static, ()>>>,
        incoming: RefCell<Vec<LocalBoxFuture<'static, ()>>>,
        waker: Arc<TurnWaker>,
    }

    impl Executor {
        pub(super) fn new(platform: Arc<dyn Platform>) -> Self {
            Self {
                futures: RefCell::new(FuturesUnordered::new()),
                incoming: RefCell::new(Vec::new()),
                waker: Arc::new(TurnWaker {
                    woken: AtomicBool::new(false),
                    platform,
                }),
            }
        }

        /// Queue a future; it is first polled on the next turn.
        pub(super) fn spawn(&self, future: LocalBoxFuture<'static, ()>) {
            self.incoming.borrow_mut().push(future);
            ArcWake::wake_by_ref(&self.waker);
        }

        pub(super) fn is_woken(&self) -> bool {
            self.waker.woken.load(Ordering::SeqCst)
        }

        /// Poll every future until none can make progress.
        pub(super) fn poll(&self) {
            self.waker.woken.store(false, Ordering::SeqCst);
            let waker = waker(Arc::clone(&self.waker));
            let mut cx = Context::from_waker(&waker);
            loop {
                let incoming = mem::take(&mut *self.incoming.borrow_mut());
                let mut futures = self.futures.borrow_mut();
                futures.extend(incoming);
                match futures.poll_next_unpin(&mut cx) {
                    Poll::Ready(Some(())) => trace!(remaining = futures.len(), "local future completed"),
                    Poll::Ready(None) | Poll::Pending => {
                        if self.incoming.borrow().is_empty() {
                            break;
                        }
                    }
                }
            }
        }
    }
}
