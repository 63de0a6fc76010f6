//! Reconciliation: turning a rendered element tree into host mutations.
//!
//! Each applied render runs one [`Pass`] over the element tree the instance
//! returned. Host and text nodes are matched to the previous pass by
//! identity and patched in place; component descriptors are matched to
//! instances through the render cache selected by their lifetime. The
//! children of every host node touched are then brought into the desired
//! order with the fewest `insert_before` calls the host allows.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

use crate::element::{ComponentElement, Element, HostElement, PropValue, TextElement};
use crate::error::Propagation;
use crate::host::{NodeHandle, event_name};
use crate::identity::{IdentityAllocator, IdentityId};
use crate::instance::{ChildSlot, InstanceId, LiveKind, LiveNode, RenderCache, UpdateCause};
use crate::lifetime::{CacheId, Lifetime, LifetimeKind};
use crate::tree::{NewInstance, Tree};

/// State of one reconciliation pass over one instance's output.
struct Pass {
    owner: InstanceId,
    entering: bool,
    dynamic_cache: CacheId,
    ids: IdentityAllocator,
    old_nodes: HashMap<IdentityId, LiveNode>,
    nodes: HashMap<IdentityId, LiveNode>,
    seen: HashSet<InstanceId>,
}

impl Tree {
    /// Reconcile `element` as the new output of instance `id`.
    pub(crate) fn apply(&mut self, id: InstanceId, element: &Element, entering: bool) -> Result<(), Propagation> {
        let Some(instance) = self.instances.get_mut(id) else {
            return Ok(());
        };
        let host_parent = instance.host_parent;
        let old_nodes = std::mem::take(&mut instance.nodes);
        let old_dynamic = instance.dynamic_cache;
        let dynamic_cache = self.caches.insert(RenderCache::owned_by(id));
        if let Some(instance) = self.instances.get_mut(id) {
            instance.dynamic_cache = dynamic_cache;
        }

        let mut pass = Pass {
            owner: id,
            entering,
            dynamic_cache,
            ids: IdentityAllocator::default(),
            old_nodes,
            nodes: HashMap::new(),
            seen: HashSet::new(),
        };
        let mut output = Vec::new();
        let result = pass.reconcile(self, element, host_parent, None, &mut output);

        let Pass {
            nodes,
            old_nodes,
            seen,
            ..
        } = pass;
        for stale in old_nodes.values() {
            self.host_index.remove(&stale.handle);
        }
        if let Some(instance) = self.instances.get_mut(id) {
            instance.nodes = nodes;
            instance.output = output;
        }
        if let Some(previous) = self.caches.remove(old_dynamic) {
            for child in previous.entries.into_values() {
                self.destroy(child);
            }
        }
        result?;

        let children = self
            .instances
            .get(id)
            .map(|instance| instance.children.clone())
            .unwrap_or_default();
        for child in children {
            if seen.contains(&child) {
                continue;
            }
            // An inherit child gets one pass of grace while hidden; missing
            // from the next applied pass as well, it is evicted.
            match self.instances.get(child).map(|instance| (instance.lifetime, instance.visible)) {
                Some((LifetimeKind::Dynamic, _)) | Some((LifetimeKind::Inherit, false)) => self.destroy(child),
                Some(_) => self.hide(child),
                None => {}
            }
        }
        Ok(())
    }

    /// Collect the host nodes a list of slots currently stands for.
    pub(crate) fn flatten(&self, slots: &[ChildSlot], out: &mut Vec<NodeHandle>) {
        for slot in slots {
            match *slot {
                ChildSlot::Node(node) => out.push(node),
                ChildSlot::Instance(id) => {
                    if let Some(instance) = self.instances.get(id)
                        && instance.visible
                    {
                        self.flatten(&instance.output, out);
                    }
                }
            }
        }
    }

    /// Make the host children of `parent` exactly `desired`, in order.
    ///
    /// Nodes that are not desired are removed; the rest are moved into
    /// place with `insert_before`. Nodes already in position are untouched,
    /// so an unchanged list produces no host calls.
    pub(crate) fn sync_children(&self, parent: NodeHandle, desired: &[NodeHandle]) {
        let mut host = self.host.borrow_mut();
        let mut current = host.children(parent);
        if current == desired {
            return;
        }
        let wanted: HashSet<NodeHandle> = desired.iter().copied().collect();
        for node in current.iter().filter(|node| !wanted.contains(*node)) {
            tracing::trace!(?parent, ?node, "removing node");
            host.remove_child(parent, *node);
        }
        current.retain(|node| wanted.contains(node));

        for (index, &node) in desired.iter().enumerate() {
            if current.get(index) == Some(&node) {
                continue;
            }
            let reference = current.get(index).copied();
            tracing::trace!(?parent, ?node, ?reference, "inserting node");
            host.insert_before(parent, node, reference);
            if let Some(position) = current.iter().position(|existing| *existing == node) {
                current.remove(position);
            }
            current.insert(index, node);
        }
    }

    /// Re-synchronize the children of a host node from the output recorded
    /// by whichever instance created it. Used after an instance updates on
    /// its own, since its parent's pass did not run.
    pub(crate) fn resync(&mut self, host_parent: NodeHandle) {
        let slots = if host_parent == self.mount {
            self.instances.get(self.root).map(|root| root.output.clone())
        } else {
            self.host_index
                .get(&host_parent)
                .and_then(|(owner, identity)| self.instances.get(*owner)?.nodes.get(identity))
                .filter(|node| node.handle == host_parent)
                .map(|node| node.children.clone())
        };
        let Some(slots) = slots else {
            tracing::trace!(?host_parent, "host parent no longer rendered, skipping resync");
            return;
        };
        let mut desired = Vec::new();
        self.flatten(&slots, &mut desired);
        self.sync_children(host_parent, &desired);
    }

    fn resolve_lifetime(
        &self,
        owner: InstanceId,
        lifetime: Lifetime,
        dynamic_cache: CacheId,
    ) -> (LifetimeKind, CacheId) {
        let inherit = || {
            let cache = self
                .instances
                .get(owner)
                .map(|instance| instance.own_cache)
                .unwrap_or_default();
            (LifetimeKind::Inherit, cache)
        };
        match lifetime {
            Lifetime::Inherit => inherit(),
            Lifetime::Dynamic => (LifetimeKind::Dynamic, dynamic_cache),
            Lifetime::Static => match self.instances.get(self.root) {
                Some(root) => (LifetimeKind::Static, root.own_cache),
                None => inherit(),
            },
            Lifetime::Flag(flag) if self.caches.contains_key(flag.cache) => (LifetimeKind::Flag, flag.cache),
            Lifetime::Flag(_) => {
                tracing::warn!("lifetime flag owner has been destroyed, falling back to inherit");
                inherit()
            }
        }
    }

    /// Make `owner` the structural parent of `child` and point the child at
    /// its new host parent.
    fn adopt(&mut self, child: InstanceId, owner: InstanceId, host_parent: NodeHandle) {
        let Some(instance) = self.instances.get_mut(child) else {
            return;
        };
        instance.host_parent = host_parent;
        let previous = instance.parent.replace(owner);
        if previous == Some(owner) {
            return;
        }
        tracing::debug!(instance = ?child, from = ?previous, to = ?owner, "reparenting instance");
        if let Some(previous) = previous.and_then(|previous| self.instances.get_mut(previous)) {
            previous.children.retain(|existing| *existing != child);
        }
        if let Some(owner) = self.instances.get_mut(owner) {
            owner.children.push(child);
        }
    }

    fn diff_props(&self, node: NodeHandle, old: &BTreeMap<String, PropValue>, new: &BTreeMap<String, PropValue>) {
        let mut host = self.host.borrow_mut();
        for key in old.keys().filter(|key| !new.contains_key(*key)) {
            match event_name(key) {
                Some(event) => host.set_event_handler(node, &event, None),
                None => host.remove_attribute(node, key),
            }
        }
        for (key, value) in new {
            if old.get(key) == Some(value) {
                continue;
            }
            match (event_name(key), value) {
                (Some(event), PropValue::Handler(handler)) => {
                    host.set_event_handler(node, &event, Some(handler.clone()))
                }
                (Some(_), _) => {
                    tracing::warn!(property = %key, "event property without a handler value, ignoring")
                }
                (None, value) => {
                    if let Some(attribute) = value.to_attribute() {
                        host.set_attribute(node, key, &attribute);
                    }
                }
            }
        }
    }

    fn diff_style(&self, node: NodeHandle, old: &BTreeMap<String, String>, new: &BTreeMap<String, String>) {
        let mut host = self.host.borrow_mut();
        for key in old.keys().filter(|key| !new.contains_key(*key)) {
            if host.supports_style(key) {
                host.set_style(node, key, None);
            }
        }
        for (key, value) in new {
            if old.get(key) == Some(value) {
                continue;
            }
            if !host.supports_style(key) {
                tracing::warn!(property = %key, "unsupported style property, ignoring");
                continue;
            }
            host.set_style(node, key, Some(value));
        }
    }
}

impl Pass {
    fn reconcile(
        &mut self,
        tree: &mut Tree,
        element: &Element,
        host_parent: NodeHandle,
        scope: Option<&Rc<IdentityId>>,
        out: &mut Vec<ChildSlot>,
    ) -> Result<(), Propagation> {
        match element {
            Element::Empty => {}
            Element::Text(text) => {
                let identity = self.ids.resolve(scope, text.origin, text.key.as_ref());
                let node = self.text(tree, identity, text);
                out.push(ChildSlot::Node(node));
            }
            Element::Host(host) => {
                let identity = self.ids.resolve(scope, host.origin, host.key.as_ref());
                let node = self.host(tree, identity, host, scope)?;
                out.push(ChildSlot::Node(node));
            }
            Element::Fragment(fragment) => {
                let keyed = fragment
                    .key
                    .as_ref()
                    .map(|key| Rc::new(self.ids.resolve(scope, fragment.origin, Some(key))));
                let scope = keyed.as_ref().or(scope);
                for child in &fragment.children {
                    self.reconcile(tree, child, host_parent, scope, out)?;
                }
            }
            Element::Component(component) => {
                let identity = self.ids.resolve(scope, component.origin, component.key.as_ref());
                if let Some(instance) = self.component(tree, identity, component, host_parent)? {
                    out.push(ChildSlot::Instance(instance));
                }
            }
        }
        Ok(())
    }

    fn text(&mut self, tree: &mut Tree, identity: IdentityId, element: &TextElement) -> NodeHandle {
        let handle = match self.old_nodes.remove(&identity) {
            Some(LiveNode {
                kind: LiveKind::Text(old),
                handle,
                ..
            }) => {
                if *old != *element.text {
                    tracing::trace!(node = ?handle, "updating text");
                    tree.host.borrow_mut().set_text(handle, &element.text);
                }
                handle
            }
            replaced => {
                if let Some(replaced) = replaced {
                    tree.host_index.remove(&replaced.handle);
                }
                let handle = tree.host.borrow_mut().create_text(&element.text);
                tracing::trace!(node = ?handle, "created text node");
                handle
            }
        };
        self.nodes.insert(
            identity,
            LiveNode {
                kind: LiveKind::Text(element.text.clone()),
                props: BTreeMap::new(),
                style: BTreeMap::new(),
                handle,
                children: Vec::new(),
            },
        );
        handle
    }

    fn host(
        &mut self,
        tree: &mut Tree,
        identity: IdentityId,
        element: &HostElement,
        scope: Option<&Rc<IdentityId>>,
    ) -> Result<NodeHandle, Propagation> {
        let reused = match self.old_nodes.remove(&identity) {
            Some(old) if matches!(&old.kind, LiveKind::Host(tag) if *tag == element.tag) => Some(old),
            Some(replaced) => {
                tree.host_index.remove(&replaced.handle);
                None
            }
            None => None,
        };
        let (handle, created) = match reused {
            Some(old) => {
                tree.diff_props(old.handle, &old.props, &element.props);
                tree.diff_style(old.handle, &old.style, &element.style);
                (old.handle, false)
            }
            None => {
                let handle = tree.host.borrow_mut().create_element(&element.tag);
                tracing::trace!(node = ?handle, tag = %element.tag, "created element");
                tree.diff_props(handle, &BTreeMap::new(), &element.props);
                tree.diff_style(handle, &BTreeMap::new(), &element.style);
                (handle, true)
            }
        };
        tree.host_index.insert(handle, (self.owner, identity.clone()));

        if let Some(node_ref) = &element.node_ref
            && (created || self.entering)
        {
            let node_ref = node_ref.clone();
            tree.sync_queue.push(Box::new(move || node_ref.invoke(handle)));
        }

        let keyed = element.key.as_ref().map(|_| Rc::new(identity.clone()));
        let child_scope = keyed.as_ref().or(scope);
        let mut children = Vec::new();
        for child in &element.children {
            self.reconcile(tree, child, handle, child_scope, &mut children)?;
        }
        let mut desired = Vec::new();
        tree.flatten(&children, &mut desired);
        tree.sync_children(handle, &desired);

        self.nodes.insert(
            identity,
            LiveNode {
                kind: LiveKind::Host(element.tag.clone()),
                props: element.props.clone(),
                style: element.style.clone(),
                handle,
                children,
            },
        );
        Ok(handle)
    }

    fn component(
        &mut self,
        tree: &mut Tree,
        identity: IdentityId,
        element: &ComponentElement,
        host_parent: NodeHandle,
    ) -> Result<Option<InstanceId>, Propagation> {
        let (lifetime, cache) = tree.resolve_lifetime(self.owner, element.lifetime, self.dynamic_cache);
        let component_type = element.component.component_type();
        let existing = tree
            .caches
            .get(cache)
            .and_then(|cache| cache.entries.get(&identity))
            .copied()
            .filter(|id| tree.instances.contains_key(*id));

        let new_instance = |identity: IdentityId, lifetime: LifetimeKind, lifetime_cache: Option<CacheId>| NewInstance {
            component: element.component.clone(),
            props: element.props.clone(),
            parent: Some(self.owner),
            identity: Some(identity),
            lifetime,
            lifetime_cache,
            host_parent,
        };

        let child = match existing {
            Some(existing) if self.seen.contains(&existing) => {
                tracing::warn!(
                    component = element.name(),
                    %identity,
                    "duplicate key among siblings, rendering an ephemeral instance"
                );
                tree.create_instance(new_instance(identity, LifetimeKind::Dynamic, None))
            }
            Some(existing)
                if tree
                    .instances
                    .get(existing)
                    .is_some_and(|instance| instance.component.component_type() == component_type) =>
            {
                tree.adopt(existing, self.owner, host_parent);
                if let Some(instance) = tree.instances.get_mut(existing) {
                    instance.component = element.component.clone();
                }
                existing
            }
            Some(existing) => {
                tracing::debug!(instance = ?existing, component = element.name(), "component type changed, replacing instance");
                tree.destroy(existing);
                tree.create_instance(new_instance(identity, lifetime, Some(cache)))
            }
            None => tree.create_instance(new_instance(identity, lifetime, Some(cache))),
        };
        self.seen.insert(child);

        match tree.run_instance(child, UpdateCause::Props, Some(element.props.clone())) {
            Ok(_) => Ok(Some(child)),
            Err(propagation) => {
                if tree.offer_to(self.owner, &propagation) {
                    tracing::debug!(
                        instance = ?child,
                        error = %propagation.error,
                        "render error handled by parent, dropping the failed subtree"
                    );
                    tree.destroy(child);
                    self.seen.remove(&child);
                    Ok(None)
                } else {
                    Err(propagation.through(tree.stack_frame(self.owner)))
                }
            }
        }
    }
}
