//! The instance arena and the lifecycle transitions of component instances.
//!
//! An instance moves through `mounting → visible ⇄ updating → hidden →
//! destroyed`. Rendering and reconciliation live in [`crate::reconcile`];
//! this module owns creation, the update entry point, hiding, destruction
//! and the propagation of render errors up the instance chain.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use slotmap::SlotMap;

use crate::component::{AnyComponent, Component, RenderResult, Typed};
use crate::element::Element;
use crate::error::{Propagation, StackFrame};
use crate::hooks::{self, HookScope};
use crate::host::{Host, NodeHandle};
use crate::identity::IdentityId;
use crate::instance::{ChildSlot, HookFrame, Instance, InstanceId, RenderCache, UpdateCause};
use crate::lifetime::{CacheId, LifetimeKind};
use crate::root::{RootShared, Updater};
use crate::scheduler::{Scheduler, Task};

/// The synthetic component at the top of every tree. It renders whatever
/// element was last passed to `Root::render`.
pub(crate) struct RootComponent {
    element: Rc<RefCell<Element>>,
}

impl Component for RootComponent {
    type Props = ();

    fn render(&self, _: &()) -> RenderResult {
        Ok(self.element.borrow().clone())
    }

    fn name(&self) -> &'static str {
        "Root"
    }
}

pub(crate) struct NewInstance {
    pub(crate) component: Rc<dyn AnyComponent>,
    pub(crate) props: Rc<dyn Any>,
    pub(crate) parent: Option<InstanceId>,
    pub(crate) identity: Option<IdentityId>,
    pub(crate) lifetime: LifetimeKind,
    pub(crate) lifetime_cache: Option<CacheId>,
    pub(crate) host_parent: NodeHandle,
}

/// What became of a render request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Outcome {
    Applied,
    /// The props comparer asked to skip the update.
    Skipped,
    /// The render failed and the instance's own handler accepted the error.
    Recovered,
    /// The instance no longer exists or is already rendering.
    Gone,
}

pub(crate) struct Tree {
    pub(crate) host: Rc<RefCell<dyn Host>>,
    pub(crate) instances: SlotMap<InstanceId, Instance>,
    pub(crate) caches: SlotMap<CacheId, RenderCache>,
    pub(crate) root: InstanceId,
    pub(crate) mount: NodeHandle,
    pub(crate) scheduler: Rc<Scheduler>,
    pub(crate) shared: Weak<RootShared>,
    /// Owner and identity of every live host node an instance created, so
    /// the desired children of any host node can be recomputed.
    pub(crate) host_index: HashMap<NodeHandle, (InstanceId, IdentityId)>,
    /// Ref callbacks and layout effects, run once the tree is released.
    pub(crate) sync_queue: Vec<Task>,
}

impl Tree {
    pub(crate) fn new(
        host: Rc<RefCell<dyn Host>>,
        mount: NodeHandle,
        scheduler: Rc<Scheduler>,
        shared: Weak<RootShared>,
        element: Rc<RefCell<Element>>,
    ) -> Self {
        let mut tree = Self {
            host,
            instances: SlotMap::with_key(),
            caches: SlotMap::with_key(),
            root: InstanceId::default(),
            mount,
            scheduler,
            shared,
            host_index: HashMap::new(),
            sync_queue: Vec::new(),
        };
        tree.root = tree.create_instance(NewInstance {
            component: Rc::new(Typed(RootComponent { element })),
            props: Rc::new(()),
            parent: None,
            identity: None,
            lifetime: LifetimeKind::Root,
            lifetime_cache: None,
            host_parent: mount,
        });
        tree
    }

    pub(crate) fn is_live(&self) -> bool {
        self.instances.contains_key(self.root)
    }

    pub(crate) fn create_instance(&mut self, new: NewInstance) -> InstanceId {
        let NewInstance {
            component,
            props,
            parent,
            identity,
            lifetime,
            lifetime_cache,
            host_parent,
        } = new;
        let name = component.name();
        let registered = identity.clone();
        let shared = self.shared.clone();
        let caches = &mut self.caches;
        let id = self.instances.insert_with_key(|id| {
            let own_cache = caches.insert(RenderCache::owned_by(id));
            let dynamic_cache = caches.insert(RenderCache::owned_by(id));
            let scope = HookScope {
                instance: id,
                updater: Updater::new(shared, id),
                own_cache,
            };
            Instance {
                component,
                parent,
                identity,
                lifetime,
                lifetime_cache,
                own_cache,
                dynamic_cache,
                children: Vec::new(),
                host_parent,
                output: Vec::new(),
                nodes: HashMap::new(),
                visible: false,
                frame: Some(HookFrame::new(scope, props)),
            }
        });

        if let (Some(cache), Some(identity)) = (lifetime_cache, registered)
            && let Some(cache) = self.caches.get_mut(cache)
        {
            cache.entries.insert(identity, id);
        }
        if let Some(parent) = parent
            && let Some(parent) = self.instances.get_mut(parent)
        {
            parent.children.push(id);
        }
        tracing::debug!(instance = ?id, component = name, lifetime = lifetime.label(), "created instance");
        id
    }

    pub(crate) fn stack_frame(&self, id: InstanceId) -> StackFrame {
        match self.instances.get(id) {
            Some(instance) => StackFrame {
                component: instance.name(),
                identity: instance.identity.as_ref().map(ToString::to_string),
            },
            None => StackFrame {
                component: "<destroyed>",
                identity: None,
            },
        }
    }

    /// Render an instance and apply the result.
    ///
    /// `props` replaces the stored props when the parent passes new ones.
    pub(crate) fn run_instance(
        &mut self,
        id: InstanceId,
        cause: UpdateCause,
        props: Option<Rc<dyn Any>>,
    ) -> Result<Outcome, Propagation> {
        let Some(instance) = self.instances.get_mut(id) else {
            return Ok(Outcome::Gone);
        };
        let Some(mut frame) = instance.frame.take() else {
            tracing::warn!(instance = ?id, "instance is already rendering, dropping nested render");
            return Ok(Outcome::Gone);
        };
        if let Some(props) = props {
            frame.props = props;
        }
        let was_visible = instance.visible;
        frame.begin(cause, was_visible);
        let component = instance.component.clone();
        let props = frame.props.clone();

        let (mut frame, result) = hooks::render_with(frame, || component.render_any(props.as_ref()));
        frame.render_count += 1;
        let first_render = frame.first_render;

        let element = match result {
            Ok(element) => element,
            Err(error) => {
                let handled = frame.handle_error(&error);
                frame.discard_render();
                self.put_frame(id, frame);
                if handled {
                    // A first mount that recovers itself keeps an empty output
                    // and must stay reachable for the update its handler queues.
                    if !was_visible {
                        if let Some(instance) = self.instances.get_mut(id) {
                            instance.visible = true;
                        }
                    }
                    tracing::debug!(instance = ?id, component = component.name(), %error, "render error handled by the failing instance");
                    return Ok(Outcome::Recovered);
                }
                return Err(Propagation::new(error, self.stack_frame(id)));
            }
        };

        frame.first_render = false;
        if frame.skip_update && was_visible && !first_render {
            frame.skip_update = false;
            frame.discard_render();
            self.put_frame(id, frame);
            tracing::debug!(instance = ?id, component = component.name(), "props unchanged, skipping update");
            return Ok(Outcome::Skipped);
        }
        frame.skip_update = false;
        let effects = frame.take_render_effects();
        self.put_frame(id, frame);

        for cleanup in effects.before_render {
            self.scheduler.enqueue(cleanup);
        }
        self.apply(id, &element, !was_visible)?;
        if let Some(instance) = self.instances.get_mut(id) {
            instance.visible = true;
        }
        self.sync_queue.extend(effects.when_render);
        for effect in effects.on_render {
            self.scheduler.enqueue(effect);
        }
        tracing::debug!(
            instance = ?id,
            component = component.name(),
            mounted = !was_visible,
            "applied render"
        );
        Ok(Outcome::Applied)
    }

    fn put_frame(&mut self, id: InstanceId, frame: HookFrame) {
        if let Some(instance) = self.instances.get_mut(id) {
            instance.frame = Some(frame);
        }
    }

    /// Offer a propagating error to `id`'s handlers.
    pub(crate) fn offer_to(&self, id: InstanceId, propagation: &Propagation) -> bool {
        self.instances
            .get(id)
            .and_then(|instance| instance.frame.as_ref())
            .is_some_and(|frame| frame.handle_error(&propagation.error))
    }

    /// Entry point for updates an instance requested itself.
    ///
    /// Hidden and destroyed instances drop the request. Errors that no
    /// ancestor handles come back to the caller as fatal.
    pub(crate) fn update(&mut self, id: InstanceId, cause: UpdateCause) -> Result<(), Propagation> {
        let Some(instance) = self.instances.get(id) else {
            tracing::trace!(instance = ?id, "dropping update for destroyed instance");
            return Ok(());
        };
        if !instance.visible && id != self.root {
            tracing::trace!(instance = ?id, "dropping update for hidden instance");
            return Ok(());
        }
        let host_parent = instance.host_parent;
        match self.run_instance(id, cause, None) {
            Ok(Outcome::Applied) => {
                self.resync(host_parent);
                Ok(())
            }
            Ok(_) => Ok(()),
            Err(propagation) => self.recover(id, propagation),
        }
    }

    /// Walk ancestors of `failed` looking for a handler. The first that
    /// accepts destroys its child on the error path.
    fn recover(&mut self, failed: InstanceId, mut propagation: Propagation) -> Result<(), Propagation> {
        let mut child = failed;
        while let Some(parent) = self.instances.get(child).and_then(|instance| instance.parent) {
            if self.offer_to(parent, &propagation) {
                tracing::debug!(
                    handler = self.instances.get(parent).map(Instance::name),
                    error = %propagation.error,
                    "render error handled by ancestor"
                );
                let host_parent = self.instances.get(child).map(|instance| instance.host_parent);
                self.destroy(child);
                if let Some(host_parent) = host_parent {
                    self.resync(host_parent);
                }
                return Ok(());
            }
            propagation = propagation.through(self.stack_frame(parent));
            child = parent;
        }
        Err(propagation)
    }

    /// Discard an instance's hook state and render it from scratch.
    pub(crate) fn rebuild(&mut self, id: InstanceId) -> Result<(), Propagation> {
        let Some(frame) = self.instances.get_mut(id).and_then(|instance| instance.frame.as_mut()) else {
            return Ok(());
        };
        let cleanups = frame.reset();
        tracing::debug!(instance = ?id, "rebuilding instance");
        for cleanup in cleanups {
            self.scheduler.enqueue(cleanup);
        }
        self.update(id, UpdateCause::SelfUpdate)
    }

    /// Transition a visible instance to hidden.
    pub(crate) fn hide(&mut self, id: InstanceId) {
        let Some(instance) = self.instances.get_mut(id) else {
            return;
        };
        if !instance.visible {
            return;
        }
        instance.visible = false;
        tracing::debug!(instance = ?id, component = instance.name(), "hiding instance");
        let children = instance.children.clone();

        for &child in &children {
            if self.lifetime_of(child) == Some(LifetimeKind::Dynamic) {
                self.destroy(child);
            }
        }
        for child in children {
            self.hide(child);
        }
        self.detach(id);

        let callbacks = self
            .instances
            .get_mut(id)
            .and_then(|instance| instance.frame.as_mut())
            .map(HookFrame::unmount_callbacks)
            .unwrap_or_default();
        for callback in callbacks {
            self.scheduler.enqueue(callback);
        }
    }

    /// Destroy an instance and everything whose lifetime it owns.
    pub(crate) fn destroy(&mut self, id: InstanceId) {
        if !self.instances.contains_key(id) {
            return;
        }
        self.hide(id);
        let Some(instance) = self.instances.get(id) else {
            return;
        };
        tracing::debug!(instance = ?id, component = instance.name(), "destroying instance");
        if let Some(frame) = &instance.frame {
            for callback in frame.destroy_callbacks() {
                self.scheduler.enqueue(callback);
            }
        }

        let owned: Vec<InstanceId> = [instance.own_cache, instance.dynamic_cache]
            .iter()
            .filter_map(|cache| self.caches.get(*cache))
            .flat_map(|cache| cache.entries.values().copied())
            .collect();
        for child in owned {
            self.destroy(child);
        }

        let Some(instance) = self.instances.remove(id) else {
            return;
        };
        for child in &instance.children {
            if let Some(orphan) = self.instances.get_mut(*child) {
                orphan.parent = None;
            }
        }
        if let Some(parent) = instance.parent.and_then(|parent| self.instances.get_mut(parent)) {
            parent.children.retain(|child| *child != id);
        }
        if let (Some(cache), Some(identity)) = (instance.lifetime_cache, &instance.identity)
            && let Some(cache) = self.caches.get_mut(cache)
            && cache.entries.get(identity) == Some(&id)
        {
            cache.entries.remove(identity);
        }
        self.caches.remove(instance.own_cache);
        self.caches.remove(instance.dynamic_cache);
        for node in instance.nodes.values() {
            self.host_index.remove(&node.handle);
        }
    }

    /// Hide and destroy the whole tree.
    pub(crate) fn teardown(&mut self) {
        let root = self.root;
        self.destroy(root);
        let leftovers: Vec<InstanceId> = self.instances.keys().collect();
        for id in leftovers {
            self.destroy(id);
        }
    }

    fn lifetime_of(&self, id: InstanceId) -> Option<LifetimeKind> {
        self.instances.get(id).map(|instance| instance.lifetime)
    }

    /// Like [`Tree::flatten`], but skips instances another owner has
    /// adopted since `owner` last rendered.
    fn owned_nodes(&self, owner: InstanceId, slots: &[ChildSlot], out: &mut Vec<NodeHandle>) {
        for slot in slots {
            match *slot {
                ChildSlot::Node(node) => out.push(node),
                ChildSlot::Instance(child) => {
                    if let Some(instance) = self.instances.get(child)
                        && instance.visible
                        && instance.parent == Some(owner)
                    {
                        self.owned_nodes(child, &instance.output, out);
                    }
                }
            }
        }
    }

    /// Remove an instance's top-level nodes from its host parent.
    fn detach(&mut self, id: InstanceId) {
        let Some(instance) = self.instances.get(id) else {
            return;
        };
        let host_parent = instance.host_parent;
        let mut nodes = Vec::new();
        self.owned_nodes(id, &instance.output, &mut nodes);
        let mut host = self.host.borrow_mut();
        for node in nodes {
            if host.parent(node) == Some(host_parent) {
                tracing::trace!(parent = ?host_parent, ?node, "detaching node");
                host.remove_child(host_parent, node);
            }
        }
    }
}
