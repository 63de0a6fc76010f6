//! Arena records for component instances and their render caches.

use std::any::Any;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use crate::component::AnyComponent;
use crate::element::PropValue;
use crate::hooks::{HookMeta, HookScope};
use crate::host::NodeHandle;
use crate::identity::IdentityId;
use crate::lifetime::{CacheId, LifetimeKind};
use crate::scheduler::Task;

slotmap::new_key_type! {
    /// Handle to a component instance in the runtime arena.
    pub struct InstanceId;
}

/// One entry of an instance's output: a host node it owns directly, or a
/// child instance whose own output is spliced in at this position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ChildSlot {
    Node(NodeHandle),
    Instance(InstanceId),
}

/// Instances addressable by identity within one lifetime scope.
pub(crate) struct RenderCache {
    pub(crate) owner: Option<InstanceId>,
    pub(crate) entries: HashMap<IdentityId, InstanceId>,
}

impl RenderCache {
    pub(crate) fn owned_by(owner: InstanceId) -> Self {
        Self {
            owner: Some(owner),
            entries: HashMap::new(),
        }
    }
}

pub(crate) enum LiveKind {
    Host(Rc<str>),
    Text(Rc<str>),
}

/// A host node produced by the last applied render, keyed by identity in
/// the owning instance.
pub(crate) struct LiveNode {
    pub(crate) kind: LiveKind,
    pub(crate) props: BTreeMap<String, PropValue>,
    pub(crate) style: BTreeMap<String, String>,
    pub(crate) handle: NodeHandle,
    pub(crate) children: Vec<ChildSlot>,
}

/// Why an instance is rendering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum UpdateCause {
    /// The parent rendered it with (possibly new) props.
    Props,
    /// It requested an update itself.
    SelfUpdate,
}

/// A cleanup callback that may be replaced and runs at most once.
#[derive(Default)]
pub(crate) struct CleanupSlot(RefCell<Option<Box<dyn FnOnce()>>>);

impl CleanupSlot {
    pub(crate) fn replace(&self, cleanup: impl FnOnce() + 'static) {
        *self.0.borrow_mut() = Some(Box::new(cleanup));
    }

    pub(crate) fn run(&self) {
        let cleanup = self.0.borrow_mut().take();
        if let Some(cleanup) = cleanup {
            cleanup();
        }
    }

    pub(crate) fn runner(self: &Rc<Self>) -> Task {
        let slot = self.clone();
        Box::new(move || slot.run())
    }
}

#[derive(Default)]
pub(crate) struct EffectQueues {
    /// Cleanups of effects about to re-run; flushed when the render applies.
    pub(crate) before_render: Vec<Task>,
    /// Effects deferred through the scheduler after the render applies.
    pub(crate) on_render: Vec<Task>,
    /// Effects run synchronously right after the host is mutated.
    pub(crate) when_render: Vec<Task>,
    /// Undo hook bookkeeping done by a render that ends up not applied.
    pub(crate) rollback: Vec<Task>,
    pub(crate) will_unmount: Vec<Rc<CleanupSlot>>,
    pub(crate) will_destroy: Vec<Rc<CleanupSlot>>,
}

pub(crate) struct RenderEffects {
    pub(crate) before_render: Vec<Task>,
    pub(crate) on_render: Vec<Task>,
    pub(crate) when_render: Vec<Task>,
    pub(crate) rollback: Vec<Task>,
}

pub(crate) struct ErrorHandlerEntry {
    pub(crate) registration: u64,
    pub(crate) handler: Rc<dyn Fn(&anyhow::Error) -> bool>,
}

pub(crate) struct HookSlot {
    pub(crate) value: Rc<dyn Any>,
    pub(crate) meta: HookMeta,
}

/// Per-instance hook state. Taken out of the instance while it renders and
/// installed as the current frame.
pub(crate) struct HookFrame {
    pub(crate) scope: HookScope,
    pub(crate) props: Rc<dyn Any>,
    pub(crate) slots: Vec<HookSlot>,
    pub(crate) cursor: usize,
    pub(crate) first_render: bool,
    /// First render, or the first render after being hidden.
    pub(crate) entering: bool,
    pub(crate) cause: UpdateCause,
    pub(crate) skip_update: bool,
    pub(crate) comparer_seen: bool,
    pub(crate) effects: EffectQueues,
    pub(crate) error_handlers: Vec<ErrorHandlerEntry>,
    pub(crate) render_count: usize,
}

impl HookFrame {
    pub(crate) fn new(scope: HookScope, props: Rc<dyn Any>) -> Self {
        Self {
            scope,
            props,
            slots: Vec::new(),
            cursor: 0,
            first_render: true,
            entering: true,
            cause: UpdateCause::Props,
            skip_update: false,
            comparer_seen: false,
            effects: EffectQueues::default(),
            error_handlers: Vec::new(),
            render_count: 0,
        }
    }

    pub(crate) fn begin(&mut self, cause: UpdateCause, visible: bool) {
        self.cursor = 0;
        self.cause = cause;
        self.entering = self.first_render || !visible;
        self.skip_update = false;
        self.comparer_seen = false;
    }

    /// Offer an error to this instance's handlers, most recent first.
    pub(crate) fn handle_error(&self, error: &anyhow::Error) -> bool {
        self.error_handlers
            .iter()
            .rev()
            .any(|entry| (entry.handler)(error))
    }

    pub(crate) fn take_render_effects(&mut self) -> RenderEffects {
        RenderEffects {
            before_render: std::mem::take(&mut self.effects.before_render),
            on_render: std::mem::take(&mut self.effects.on_render),
            when_render: std::mem::take(&mut self.effects.when_render),
            rollback: std::mem::take(&mut self.effects.rollback),
        }
    }

    /// Forget everything the last render queued, as if it never ran.
    pub(crate) fn discard_render(&mut self) {
        let effects = self.take_render_effects();
        for undo in effects.rollback {
            undo();
        }
    }

    /// Callbacks to flush when the instance leaves the visible state.
    pub(crate) fn unmount_callbacks(&mut self) -> Vec<Task> {
        let mut tasks = std::mem::take(&mut self.effects.before_render);
        self.effects.on_render.clear();
        self.effects.when_render.clear();
        self.effects.rollback.clear();
        tasks.extend(self.effects.will_unmount.iter().map(CleanupSlot::runner));
        tasks
    }

    pub(crate) fn destroy_callbacks(&self) -> Vec<Task> {
        self.effects
            .will_destroy
            .iter()
            .map(CleanupSlot::runner)
            .collect()
    }

    /// Drop all hook state, returning the cleanups that must still run.
    pub(crate) fn reset(&mut self) -> Vec<Task> {
        let mut tasks = self.unmount_callbacks();
        tasks.extend(self.destroy_callbacks());
        self.slots.clear();
        self.error_handlers.clear();
        self.effects = EffectQueues::default();
        self.first_render = true;
        tasks
    }

    pub(crate) fn hook_meta(&self) -> Vec<HookMeta> {
        self.slots.iter().map(|slot| slot.meta.clone()).collect()
    }
}

/// A component instance.
pub(crate) struct Instance {
    pub(crate) component: Rc<dyn AnyComponent>,
    pub(crate) parent: Option<InstanceId>,
    pub(crate) identity: Option<IdentityId>,
    pub(crate) lifetime: LifetimeKind,
    pub(crate) lifetime_cache: Option<CacheId>,
    /// Cache for inherit-lifetime children; doubles as this instance's
    /// lifetime flag.
    pub(crate) own_cache: CacheId,
    /// Cache for dynamic-lifetime children of the latest pass.
    pub(crate) dynamic_cache: CacheId,
    pub(crate) children: Vec<InstanceId>,
    pub(crate) host_parent: NodeHandle,
    pub(crate) output: Vec<ChildSlot>,
    pub(crate) nodes: HashMap<IdentityId, LiveNode>,
    pub(crate) visible: bool,
    pub(crate) frame: Option<HookFrame>,
}

impl Instance {
    pub(crate) fn name(&self) -> &'static str {
        self.component.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn cleanup_slots_run_once() {
        let runs = Rc::new(Cell::new(0));
        let slot = Rc::new(CleanupSlot::default());
        let counter = runs.clone();
        slot.replace(move || counter.set(counter.get() + 1));
        let first = slot.runner();
        let second = slot.runner();
        first();
        second();
        assert_eq!(runs.get(), 1);
    }
}
