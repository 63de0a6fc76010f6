//! Frame-batched FIFO task queue.
//!
//! Every state change, effect callback and cleanup runs as a task on this
//! queue. Enqueueing arms at most one frame request through the
//! [`FrameDriver`]; each frame drains a bounded batch so a flood of updates
//! is spread over several frames instead of blocking one.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use futures_util::future::LocalBoxFuture;
use futures_util::stream::{FuturesUnordered, StreamExt};
use futures_util::task::{ArcWake, waker};

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + 'static>;

/// Scheduler settings.
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Tasks run per frame at most.
    pub max_updates_per_frame: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_updates_per_frame: 64,
        }
    }
}

impl SchedulerConfig {
    pub fn with_max_updates_per_frame(mut self, max: usize) -> Self {
        self.max_updates_per_frame = max.max(1);
        self
    }
}

/// Something that can arrange for [`Scheduler::run_frame`] to be called
/// soon, typically on the next display refresh.
pub trait FrameDriver {
    fn request_frame(&self);
}

/// A driver that does nothing; frames are run by hand.
#[derive(Default)]
pub struct ManualFrames;

impl FrameDriver for ManualFrames {
    fn request_frame(&self) {}
}

/// What a single frame did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub tasks_run: usize,
    pub tasks_remaining: usize,
    pub futures_completed: usize,
}

/// Waker target shared with spawned futures. Wakes may come from any
/// thread, so it only flips a flag and pokes an optional hook.
#[derive(Default)]
struct FrameWake {
    woken: AtomicBool,
    hook: Mutex<Option<Arc<dyn Fn() + Send + Sync>>>,
}

impl ArcWake for FrameWake {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.woken.store(true, Ordering::SeqCst);
        if let Ok(hook) = arc_self.hook.lock()
            && let Some(hook) = hook.as_ref()
        {
            hook();
        }
    }
}

pub struct Scheduler {
    config: SchedulerConfig,
    queue: RefCell<VecDeque<Task>>,
    armed: Cell<bool>,
    running: Cell<bool>,
    driver: RefCell<Rc<dyn FrameDriver>>,
    futures: RefCell<FuturesUnordered<LocalBoxFuture<'static, ()>>>,
    incoming: RefCell<Vec<LocalBoxFuture<'static, ()>>>,
    wake: Arc<FrameWake>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            queue: RefCell::new(VecDeque::new()),
            armed: Cell::new(false),
            running: Cell::new(false),
            driver: RefCell::new(Rc::new(ManualFrames)),
            futures: RefCell::new(FuturesUnordered::new()),
            incoming: RefCell::new(Vec::new()),
            wake: Arc::new(FrameWake::default()),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Replace the frame driver. A pending frame request is re-issued to
    /// the new driver.
    pub fn set_frame_driver(&self, driver: Rc<dyn FrameDriver>) {
        *self.driver.borrow_mut() = driver;
        if self.armed.get() {
            self.request_frame();
        }
    }

    /// Install a thread-safe callback invoked whenever a spawned future is
    /// woken.
    pub fn set_wake_hook(&self, hook: Arc<dyn Fn() + Send + Sync>) {
        if let Ok(mut slot) = self.wake.hook.lock() {
            *slot = Some(hook);
        }
    }

    /// Append a task to the back of the queue.
    pub fn enqueue(&self, task: Task) {
        self.queue.borrow_mut().push_back(task);
        self.arm();
    }

    /// Hand a future to the scheduler; it is polled at frame boundaries.
    pub fn spawn_local(&self, future: LocalBoxFuture<'static, ()>) {
        self.incoming.borrow_mut().push(future);
        self.wake.woken.store(true, Ordering::SeqCst);
        self.arm();
    }

    /// Whether a frame has been requested or a future wants polling.
    pub fn needs_frame(&self) -> bool {
        self.armed.get() || self.wake.woken.load(Ordering::SeqCst)
    }

    pub fn pending_tasks(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Spawned futures that have not completed yet.
    pub fn pending_futures(&self) -> usize {
        self.futures.borrow().len() + self.incoming.borrow().len()
    }

    fn arm(&self) {
        if !self.armed.replace(true) {
            self.request_frame();
        }
    }

    fn request_frame(&self) {
        let driver = self.driver.borrow().clone();
        driver.request_frame();
    }

    /// Run one frame: poll woken futures, then run up to
    /// `max_updates_per_frame` tasks in FIFO order.
    pub fn run_frame(&self) -> FrameReport {
        if self.running.replace(true) {
            tracing::warn!("run_frame called from inside a frame, ignoring");
            return FrameReport::default();
        }
        let _running = RunningGuard(&self.running);

        let futures_completed = self.poll_futures();

        let batch: Vec<Task> = {
            let mut queue = self.queue.borrow_mut();
            let n = queue.len().min(self.config.max_updates_per_frame);
            queue.drain(..n).collect()
        };
        let tasks_run = batch.len();
        tracing::trace!(tasks = tasks_run, "running frame batch");
        for task in batch {
            task();
        }

        let tasks_remaining = self.queue.borrow().len();
        if tasks_remaining > 0 {
            self.request_frame();
        } else {
            self.armed.set(false);
        }
        FrameReport {
            tasks_run,
            tasks_remaining,
            futures_completed,
        }
    }

    fn poll_futures(&self) -> usize {
        if !self.wake.woken.swap(false, Ordering::SeqCst) {
            return 0;
        }
        let incoming: Vec<_> = self.incoming.borrow_mut().drain(..).collect();
        let mut futures = self.futures.borrow_mut();
        futures.extend(incoming);

        let waker = waker(self.wake.clone());
        let mut cx = Context::from_waker(&waker);
        let mut completed = 0;
        while let Poll::Ready(Some(())) = futures.poll_next_unpin(&mut cx) {
            completed += 1;
        }
        completed
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

/// Spawns local futures onto a scheduler without keeping it alive.
#[derive(Clone)]
pub struct Spawner {
    scheduler: Weak<Scheduler>,
}

impl Spawner {
    pub(crate) fn new(scheduler: Weak<Scheduler>) -> Self {
        Self { scheduler }
    }

    /// Spawn a future; it is dropped silently if the scheduler is gone.
    pub fn spawn_local(&self, future: impl Future<Output = ()> + 'static) {
        match self.scheduler.upgrade() {
            Some(scheduler) => scheduler.spawn_local(Box::pin(future)),
            None => tracing::trace!("scheduler gone, dropping spawned future"),
        }
    }
}

struct RunningGuard<'a>(&'a Cell<bool>);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}
