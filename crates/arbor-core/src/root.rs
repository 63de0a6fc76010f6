//! Roots: the entry point binding a component tree to a host mount node.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::element::{Element, IntoElement, OriginTag};
use crate::error::{Propagation, RootError, RuntimeError};
use crate::host::{Host, NodeHandle};
use crate::inspect::InstanceSnapshot;
use crate::instance::{InstanceId, UpdateCause};
use crate::scheduler::{FrameDriver, FrameReport, Scheduler, SchedulerConfig, Spawner};
use crate::tree::Tree;

/// Frames [`Root::run_until_idle`] runs before giving up.
const MAX_IDLE_FRAMES: usize = 10_000;

/// Options for [`Root::create`].
#[derive(Clone, Debug, Default)]
pub struct RootOptions {
    pub scheduler: SchedulerConfig,
}

impl RootOptions {
    pub fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_max_updates_per_frame(mut self, max: usize) -> Self {
        self.scheduler = self.scheduler.with_max_updates_per_frame(max);
        self
    }
}

pub(crate) struct RootShared {
    tree: RefCell<Tree>,
    scheduler: Rc<Scheduler>,
    element: Rc<RefCell<Element>>,
    fatal: RefCell<Option<RuntimeError>>,
    torn_down: Cell<bool>,
}

impl RootShared {
    fn request(&self, id: InstanceId, rebuild: bool, weak: Weak<RootShared>) {
        self.scheduler.enqueue(Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.run_update(id, rebuild);
            }
        }));
    }

    fn run_update(&self, id: InstanceId, rebuild: bool) {
        let sync = {
            let Ok(mut tree) = self.tree.try_borrow_mut() else {
                tracing::warn!(instance = ?id, "tree is busy, dropping nested update");
                return;
            };
            let result = if rebuild {
                tree.rebuild(id)
            } else {
                tree.update(id, UpdateCause::SelfUpdate)
            };
            if let Err(propagation) = result {
                self.fail(&mut tree, propagation);
            }
            std::mem::take(&mut tree.sync_queue)
        };
        for callback in sync {
            callback();
        }
    }

    fn fail(&self, tree: &mut Tree, propagation: Propagation) {
        let error = propagation.into_runtime_error();
        tracing::error!(%error, "unhandled render error, tearing down the tree");
        tree.teardown();
        tree.sync_queue.clear();
        self.torn_down.set(true);
        self.fatal.replace(Some(error));
    }
}

/// Schedules work on one instance of a root. Held by hooks; does not keep
/// the root alive.
#[derive(Clone)]
pub struct Updater {
    root: Weak<RootShared>,
    instance: InstanceId,
}

impl Updater {
    pub(crate) fn new(root: Weak<RootShared>, instance: InstanceId) -> Self {
        Self { root, instance }
    }

    /// An updater attached to nothing; every request is dropped.
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        Self {
            root: Weak::new(),
            instance: InstanceId::default(),
        }
    }

    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    /// Queue a re-render of the instance.
    pub fn request_update(&self) {
        if let Some(root) = self.root.upgrade() {
            root.request(self.instance, false, self.root.clone());
        }
    }

    /// Queue a from-scratch re-render of the instance.
    pub fn request_rebuild(&self) {
        if let Some(root) = self.root.upgrade() {
            root.request(self.instance, true, self.root.clone());
        }
    }

    pub fn spawner(&self) -> Spawner {
        let scheduler = self
            .root
            .upgrade()
            .map(|root| Rc::downgrade(&root.scheduler))
            .unwrap_or_default();
        Spawner::new(scheduler)
    }
}

/// A component tree mounted into a host node.
///
/// ```ignore
/// let document = Rc::new(RefCell::new(Document::new()));
/// let mount = document.borrow().body();
/// let root = Root::create(document.clone(), mount, RootOptions::default())?;
/// root.render(component(app, ()))?;
/// root.run_until_idle()?;
/// ```
pub struct Root {
    shared: Rc<RootShared>,
}

impl Root {
    /// Bind a new root to `mount`, which must exist and be empty.
    pub fn create(
        host: Rc<RefCell<dyn Host>>,
        mount: NodeHandle,
        options: RootOptions,
    ) -> Result<Root, RootError> {
        {
            let host = host.borrow();
            if !host.contains(mount) {
                return Err(RootError::MissingMount(mount));
            }
            let children = host.children(mount).len();
            if children > 0 {
                return Err(RootError::MountNotEmpty { children });
            }
        }
        let scheduler = Rc::new(Scheduler::new(options.scheduler));
        let element = Rc::new(RefCell::new(Element::Empty));
        let shared = Rc::new_cyclic(|weak: &Weak<RootShared>| RootShared {
            tree: RefCell::new(Tree::new(
                host,
                mount,
                scheduler.clone(),
                weak.clone(),
                element.clone(),
            )),
            scheduler,
            element,
            fatal: RefCell::new(None),
            torn_down: Cell::new(false),
        });
        tracing::debug!(?mount, "created root");
        Ok(Root { shared })
    }

    /// Request that `element` becomes the root's output. Applied on the next
    /// frame, in order with every other queued update.
    #[track_caller]
    pub fn render(&self, element: impl IntoElement) -> Result<(), RootError> {
        if self.shared.torn_down.get() {
            return Err(RootError::TornDown);
        }
        let element = element.into_element(OriginTag::caller());
        let root_id = self.shared.tree.borrow().root;
        tracing::debug!("root render requested");
        let weak = Rc::downgrade(&self.shared);
        self.shared.scheduler.enqueue(Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                *shared.element.borrow_mut() = element;
                shared.run_update(root_id, false);
            }
        }));
        Ok(())
    }

    /// Run one frame. A render error no component handled is returned
    /// once, after which the root is torn down.
    pub fn run_frame(&self) -> Result<FrameReport, RuntimeError> {
        tracing::trace!("frame start");
        let report = self.shared.scheduler.run_frame();
        tracing::trace!(?report, "frame finish");
        match self.shared.fatal.borrow_mut().take() {
            Some(error) => Err(error),
            None => Ok(report),
        }
    }

    /// Run frames until no work is queued.
    pub fn run_until_idle(&self) -> Result<(), RuntimeError> {
        for _ in 0..MAX_IDLE_FRAMES {
            if !self.needs_frame() {
                return Ok(());
            }
            self.run_frame()?;
        }
        Err(RuntimeError::NotIdle {
            frames: MAX_IDLE_FRAMES,
        })
    }

    pub fn needs_frame(&self) -> bool {
        self.shared.scheduler.needs_frame()
    }

    /// Spawned futures still waiting to complete.
    pub fn pending_futures(&self) -> usize {
        self.shared.scheduler.pending_futures()
    }

    pub fn set_frame_driver(&self, driver: Rc<dyn FrameDriver>) {
        self.shared.scheduler.set_frame_driver(driver);
    }

    /// Callback run (possibly from another thread) when a spawned future
    /// is woken.
    pub fn set_wake_hook(&self, hook: Arc<dyn Fn() + Send + Sync>) {
        self.shared.scheduler.set_wake_hook(hook);
    }

    pub fn is_torn_down(&self) -> bool {
        self.shared.torn_down.get()
    }

    /// The instance tree, or `None` once torn down.
    pub fn snapshot(&self) -> Option<InstanceSnapshot> {
        let tree = self.shared.tree.try_borrow().ok()?;
        tree.snapshot(tree.root)
    }

    /// Tear the tree down: every instance is hidden and destroyed and the
    /// mount node is left empty. Cleanups are queued on the scheduler.
    pub fn unmount(&self) -> Result<(), RootError> {
        if self.shared.torn_down.replace(true) {
            return Err(RootError::TornDown);
        }
        let Ok(mut tree) = self.shared.tree.try_borrow_mut() else {
            return Err(RootError::TornDown);
        };
        tracing::debug!("unmounting root");
        tree.teardown();
        tree.sync_queue.clear();
        Ok(())
    }
}
