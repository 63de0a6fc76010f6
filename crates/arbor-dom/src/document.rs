//! The document arena and its [`Host`] implementation.

use std::cell::RefCell;
use std::collections::BTreeMap;

use arbor_core::{EventHandler, Host, NodeHandle};

use crate::config::DocumentConfig;
use crate::error::DomError;

/// One structural or content change made to a [`Document`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mutation {
    CreateElement { node: NodeHandle, tag: String },
    CreateText { node: NodeHandle, text: String },
    SetText { node: NodeHandle, text: String },
    SetAttribute { node: NodeHandle, name: String, value: String },
    RemoveAttribute { node: NodeHandle, name: String },
    SetHandler { node: NodeHandle, event: String },
    RemoveHandler { node: NodeHandle, event: String },
    SetStyle { node: NodeHandle, property: String, value: Option<String> },
    Insert { parent: NodeHandle, child: NodeHandle, before: Option<NodeHandle> },
    Remove { parent: NodeHandle, child: NodeHandle },
}

impl Mutation {
    /// Whether the mutation changes which node is where.
    pub fn is_structural(&self) -> bool {
        matches!(self, Mutation::Insert { .. } | Mutation::Remove { .. })
    }
}

pub(crate) enum NodeData {
    Element {
        tag: String,
        attributes: BTreeMap<String, String>,
        styles: BTreeMap<String, String>,
        handlers: BTreeMap<String, EventHandler>,
    },
    Text(String),
}

pub(crate) struct Node {
    pub(crate) data: NodeData,
    pub(crate) parent: Option<NodeHandle>,
    pub(crate) children: Vec<NodeHandle>,
}

/// An in-memory element tree.
///
/// Nodes are never freed: a node removed from its parent stays addressable
/// (and can be re-inserted) for as long as the document lives. Every change
/// made through [`Host`] is appended to a mutation log.
pub struct Document {
    nodes: Vec<Node>,
    body: NodeHandle,
    config: DocumentConfig,
    mutations: Vec<Mutation>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self::with_config(DocumentConfig::default())
    }

    pub fn with_config(config: DocumentConfig) -> Self {
        let body = Node {
            data: NodeData::Element {
                tag: "body".into(),
                attributes: BTreeMap::new(),
                styles: BTreeMap::new(),
                handlers: BTreeMap::new(),
            },
            parent: None,
            children: Vec::new(),
        };
        Self {
            nodes: vec![body],
            body: NodeHandle::from_raw(0),
            config,
            mutations: Vec::new(),
        }
    }

    /// The root element every document starts with.
    pub fn body(&self) -> NodeHandle {
        self.body
    }

    pub fn config(&self) -> &DocumentConfig {
        &self.config
    }

    /// Mutations recorded since the last take or clear.
    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    pub fn take_mutations(&mut self) -> Vec<Mutation> {
        std::mem::take(&mut self.mutations)
    }

    pub fn clear_mutations(&mut self) {
        self.mutations.clear();
    }

    pub(crate) fn node(&self, handle: NodeHandle) -> Result<&Node, DomError> {
        usize::try_from(handle.to_raw())
            .ok()
            .and_then(|index| self.nodes.get(index))
            .ok_or(DomError::UnknownNode(handle))
    }

    fn node_mut(&mut self, handle: NodeHandle) -> Result<&mut Node, DomError> {
        usize::try_from(handle.to_raw())
            .ok()
            .and_then(|index| self.nodes.get_mut(index))
            .ok_or(DomError::UnknownNode(handle))
    }

    fn push(&mut self, data: NodeData) -> NodeHandle {
        let handle = NodeHandle::from_raw(self.nodes.len() as u64);
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
        });
        handle
    }

    fn record(&mut self, mutation: Mutation) {
        tracing::trace!(?mutation, "document mutation");
        self.mutations.push(mutation);
    }

    pub fn tag(&self, node: NodeHandle) -> Option<&str> {
        match &self.node(node).ok()?.data {
            NodeData::Element { tag, .. } => Some(tag),
            NodeData::Text(_) => None,
        }
    }

    /// Content of a text node.
    pub fn text(&self, node: NodeHandle) -> Option<&str> {
        match &self.node(node).ok()?.data {
            NodeData::Text(text) => Some(text),
            NodeData::Element { .. } => None,
        }
    }

    pub fn attribute(&self, node: NodeHandle, name: &str) -> Option<&str> {
        match &self.node(node).ok()?.data {
            NodeData::Element { attributes, .. } => attributes.get(name).map(String::as_str),
            NodeData::Text(_) => None,
        }
    }

    pub fn style(&self, node: NodeHandle, property: &str) -> Option<&str> {
        match &self.node(node).ok()?.data {
            NodeData::Element { styles, .. } => styles.get(property).map(String::as_str),
            NodeData::Text(_) => None,
        }
    }

    /// The handler installed for `event` on `node`, if any.
    pub fn handler(&self, node: NodeHandle, event: &str) -> Option<EventHandler> {
        match &self.node(node).ok()?.data {
            NodeData::Element { handlers, .. } => handlers.get(event).cloned(),
            NodeData::Text(_) => None,
        }
    }

    /// Concatenated text of `node` and all its descendants.
    pub fn text_content(&self, node: NodeHandle) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeHandle, out: &mut String) {
        let Ok(node) = self.node(node) else {
            return;
        };
        match &node.data {
            NodeData::Text(text) => out.push_str(text),
            NodeData::Element { .. } => {
                for child in &node.children {
                    self.collect_text(*child, out);
                }
            }
        }
    }

    /// Descendants of the body, depth-first in document order.
    pub fn descendants(&self) -> Vec<NodeHandle> {
        let mut out = Vec::new();
        self.collect_descendants(self.body, &mut out);
        out
    }

    fn collect_descendants(&self, node: NodeHandle, out: &mut Vec<NodeHandle>) {
        let Ok(entry) = self.node(node) else {
            return;
        };
        for child in &entry.children {
            out.push(*child);
            self.collect_descendants(*child, out);
        }
    }

    /// First attached element whose attribute `name` equals `value`.
    pub fn find_by_attr(&self, name: &str, value: &str) -> Option<NodeHandle> {
        self.descendants()
            .into_iter()
            .find(|node| self.attribute(*node, name) == Some(value))
    }

    /// Every attached element with the given tag, in document order.
    pub fn elements_by_tag(&self, tag: &str) -> Vec<NodeHandle> {
        self.descendants()
            .into_iter()
            .filter(|node| self.tag(*node) == Some(tag))
            .collect()
    }

    /// Whether `ancestor` is `node` or one of its ancestors.
    fn is_inclusive_ancestor(&self, ancestor: NodeHandle, node: NodeHandle) -> bool {
        let mut current = Some(node);
        while let Some(handle) = current {
            if handle == ancestor {
                return true;
            }
            current = self.node(handle).ok().and_then(|node| node.parent);
        }
        false
    }

    /// Checked DOM `insertBefore`. An attached `child` is moved.
    pub fn try_insert_before(
        &mut self,
        parent: NodeHandle,
        child: NodeHandle,
        reference: Option<NodeHandle>,
    ) -> Result<(), DomError> {
        if !matches!(self.node(parent)?.data, NodeData::Element { .. }) {
            return Err(DomError::NotAnElement(parent));
        }
        self.node(child)?;
        if self.is_inclusive_ancestor(child, parent) {
            return Err(DomError::WouldCycle { parent, child });
        }
        if let Some(reference) = reference
            && !self.node(parent)?.children.contains(&reference)
        {
            return Err(DomError::NotAChild { parent, child: reference });
        }
        if reference == Some(child) {
            return Ok(());
        }

        if let Some(old_parent) = self.node(child)?.parent {
            self.node_mut(old_parent)?.children.retain(|existing| *existing != child);
        }
        let siblings = &mut self.node_mut(parent)?.children;
        let index = reference
            .and_then(|reference| siblings.iter().position(|existing| *existing == reference))
            .unwrap_or(siblings.len());
        siblings.insert(index, child);
        self.node_mut(child)?.parent = Some(parent);
        self.record(Mutation::Insert { parent, child, before: reference });
        Ok(())
    }

    pub fn append_child(&mut self, parent: NodeHandle, child: NodeHandle) -> Result<(), DomError> {
        self.try_insert_before(parent, child, None)
    }

    /// Checked DOM `removeChild`.
    pub fn try_remove_child(&mut self, parent: NodeHandle, child: NodeHandle) -> Result<(), DomError> {
        if self.node(child)?.parent != Some(parent) {
            return Err(DomError::NotAChild { parent, child });
        }
        self.node_mut(parent)?.children.retain(|existing| *existing != child);
        self.node_mut(child)?.parent = None;
        self.record(Mutation::Remove { parent, child });
        Ok(())
    }

    fn element_mut(
        &mut self,
        node: NodeHandle,
    ) -> Result<
        (
            &mut BTreeMap<String, String>,
            &mut BTreeMap<String, String>,
            &mut BTreeMap<String, EventHandler>,
        ),
        DomError,
    > {
        match &mut self.node_mut(node)?.data {
            NodeData::Element {
                attributes,
                styles,
                handlers,
                ..
            } => Ok((attributes, styles, handlers)),
            NodeData::Text(_) => Err(DomError::NotAnElement(node)),
        }
    }
}

fn report(operation: &'static str, result: Result<(), DomError>) {
    if let Err(error) = result {
        tracing::warn!(operation, %error, "ignoring invalid host operation");
    }
}

impl Host for Document {
    fn create_element(&mut self, tag: &str) -> NodeHandle {
        let node = self.push(NodeData::Element {
            tag: tag.to_string(),
            attributes: BTreeMap::new(),
            styles: BTreeMap::new(),
            handlers: BTreeMap::new(),
        });
        self.record(Mutation::CreateElement { node, tag: tag.to_string() });
        node
    }

    fn create_text(&mut self, text: &str) -> NodeHandle {
        let node = self.push(NodeData::Text(text.to_string()));
        self.record(Mutation::CreateText { node, text: text.to_string() });
        node
    }

    fn set_text(&mut self, node: NodeHandle, text: &str) {
        let result = match self.node_mut(node) {
            Ok(Node {
                data: NodeData::Text(content),
                ..
            }) => {
                *content = text.to_string();
                Ok(())
            }
            Ok(_) => Err(DomError::NotText(node)),
            Err(error) => Err(error),
        };
        if result.is_ok() {
            self.record(Mutation::SetText { node, text: text.to_string() });
        }
        report("set_text", result);
    }

    fn set_attribute(&mut self, node: NodeHandle, name: &str, value: &str) {
        let result = self.element_mut(node).map(|(attributes, _, _)| {
            attributes.insert(name.to_string(), value.to_string());
        });
        if result.is_ok() {
            self.record(Mutation::SetAttribute {
                node,
                name: name.to_string(),
                value: value.to_string(),
            });
        }
        report("set_attribute", result);
    }

    fn remove_attribute(&mut self, node: NodeHandle, name: &str) {
        let result = self.element_mut(node).map(|(attributes, _, _)| attributes.remove(name).is_some());
        match result {
            Ok(true) => self.record(Mutation::RemoveAttribute { node, name: name.to_string() }),
            Ok(false) => {}
            Err(error) => report("remove_attribute", Err(error)),
        }
    }

    fn set_event_handler(&mut self, node: NodeHandle, event: &str, handler: Option<EventHandler>) {
        let installing = handler.is_some();
        let result = self.element_mut(node).map(|(_, _, handlers)| match handler {
            Some(handler) => {
                handlers.insert(event.to_string(), handler);
            }
            None => {
                handlers.remove(event);
            }
        });
        if result.is_ok() {
            let event = event.to_string();
            self.record(if installing {
                Mutation::SetHandler { node, event }
            } else {
                Mutation::RemoveHandler { node, event }
            });
        }
        report("set_event_handler", result);
    }

    fn supports_style(&self, property: &str) -> bool {
        self.config.supports(property)
    }

    fn set_style(&mut self, node: NodeHandle, property: &str, value: Option<&str>) {
        let result = self.element_mut(node).map(|(_, styles, _)| match value {
            Some(value) => {
                styles.insert(property.to_string(), value.to_string());
            }
            None => {
                styles.remove(property);
            }
        });
        if result.is_ok() {
            self.record(Mutation::SetStyle {
                node,
                property: property.to_string(),
                value: value.map(str::to_string),
            });
        }
        report("set_style", result);
    }

    fn contains(&self, node: NodeHandle) -> bool {
        self.node(node).is_ok()
    }

    fn parent(&self, node: NodeHandle) -> Option<NodeHandle> {
        self.node(node).ok()?.parent
    }

    fn children(&self, node: NodeHandle) -> Vec<NodeHandle> {
        self.node(node).map(|node| node.children.clone()).unwrap_or_default()
    }

    fn insert_before(&mut self, parent: NodeHandle, child: NodeHandle, reference: Option<NodeHandle>) {
        let result = self.try_insert_before(parent, child, reference);
        report("insert_before", result);
    }

    fn remove_child(&mut self, parent: NodeHandle, child: NodeHandle) {
        let result = self.try_remove_child(parent, child);
        report("remove_child", result);
    }
}

/// Dispatch `event` at `node`, bubbling through its ancestors.
///
/// Handlers are cloned out before being invoked, so a handler is free to
/// borrow the document again. Returns whether any handler ran.
pub fn dispatch_event(document: &RefCell<Document>, node: NodeHandle, event: &str) -> bool {
    let handlers: Vec<EventHandler> = {
        let document = document.borrow();
        let mut handlers = Vec::new();
        let mut current = Some(node);
        while let Some(handle) = current {
            handlers.extend(document.handler(handle, event));
            current = document.parent(handle);
        }
        handlers
    };
    tracing::debug!(?node, event, handlers = handlers.len(), "dispatching event");
    for handler in &handlers {
        handler.invoke();
    }
    !handlers.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn insert_before_moves_attached_nodes() {
        let mut doc = Document::new();
        let body = doc.body();
        let a = doc.create_element("a");
        let b = doc.create_element("b");
        let c = doc.create_element("c");
        for node in [a, b, c] {
            doc.insert_before(body, node, None);
        }
        doc.clear_mutations();

        doc.insert_before(body, c, Some(a));
        assert_eq!(doc.children(body), vec![c, a, b]);
        assert_eq!(
            doc.take_mutations(),
            vec![Mutation::Insert {
                parent: body,
                child: c,
                before: Some(a)
            }]
        );
    }

    #[test]
    fn inserting_before_itself_keeps_position() {
        let mut doc = Document::new();
        let body = doc.body();
        let a = doc.create_element("a");
        let b = doc.create_element("b");
        doc.append_child(body, a).unwrap();
        doc.append_child(body, b).unwrap();
        doc.clear_mutations();
        doc.try_insert_before(body, a, Some(a)).unwrap();
        assert_eq!(doc.children(body), vec![a, b]);
        assert!(doc.mutations().is_empty());
    }

    #[test]
    fn checked_api_rejects_misuse() {
        let mut doc = Document::new();
        let body = doc.body();
        let div = doc.create_element("div");
        let text = doc.create_text("hi");
        let missing = NodeHandle::from_raw(99);

        assert_eq!(doc.append_child(missing, div), Err(DomError::UnknownNode(missing)));
        assert_eq!(doc.append_child(text, div), Err(DomError::NotAnElement(text)));
        doc.append_child(body, div).unwrap();
        assert_eq!(
            doc.append_child(div, body),
            Err(DomError::WouldCycle { parent: div, child: body })
        );
        assert_eq!(
            doc.try_remove_child(body, text),
            Err(DomError::NotAChild { parent: body, child: text })
        );
    }

    #[test]
    fn host_ignores_unknown_nodes() {
        let mut doc = Document::new();
        let missing = NodeHandle::from_raw(42);
        doc.set_attribute(missing, "id", "x");
        doc.set_text(missing, "x");
        doc.remove_child(doc.body(), missing);
        assert!(doc.mutations().is_empty());
        assert!(!doc.contains(missing));
    }

    #[test]
    fn removing_an_absent_attribute_is_silent() {
        let mut doc = Document::new();
        let div = doc.create_element("div");
        doc.clear_mutations();
        doc.remove_attribute(div, "title");
        assert!(doc.mutations().is_empty());
    }

    #[test]
    fn queries_walk_attached_nodes_only() {
        let mut doc = Document::new();
        let body = doc.body();
        let list = doc.create_element("ul");
        let item = doc.create_element("li");
        let orphan = doc.create_element("li");
        doc.set_attribute(item, "data-id", "1");
        doc.set_attribute(orphan, "data-id", "2");
        doc.append_child(body, list).unwrap();
        doc.append_child(list, item).unwrap();

        assert_eq!(doc.find_by_attr("data-id", "1"), Some(item));
        assert_eq!(doc.find_by_attr("data-id", "2"), None);
        assert_eq!(doc.elements_by_tag("li"), vec![item]);
    }

    #[test]
    fn text_content_concatenates_descendants() {
        let mut doc = Document::new();
        let body = doc.body();
        let p = doc.create_element("p");
        let hello = doc.create_text("Hello, ");
        let em = doc.create_element("em");
        let world = doc.create_text("world");
        doc.append_child(body, p).unwrap();
        doc.append_child(p, hello).unwrap();
        doc.append_child(p, em).unwrap();
        doc.append_child(em, world).unwrap();
        assert_eq!(doc.text_content(body), "Hello, world");
    }

    #[test]
    fn dispatch_bubbles_to_ancestors() {
        let doc = RefCell::new(Document::new());
        let clicks = Rc::new(Cell::new(0));
        let (outer, inner) = {
            let mut doc = doc.borrow_mut();
            let body = doc.body();
            let outer = doc.create_element("div");
            let inner = doc.create_element("button");
            doc.append_child(body, outer).unwrap();
            doc.append_child(outer, inner).unwrap();
            for node in [outer, inner] {
                let clicks = clicks.clone();
                doc.set_event_handler(
                    node,
                    "click",
                    Some(EventHandler::new(move || clicks.set(clicks.get() + 1))),
                );
            }
            (outer, inner)
        };

        assert!(dispatch_event(&doc, inner, "click"));
        assert_eq!(clicks.get(), 2);
        assert!(!dispatch_event(&doc, outer, "input"));

        doc.borrow_mut().set_event_handler(inner, "click", None);
        assert!(dispatch_event(&doc, inner, "click"));
        assert_eq!(clicks.get(), 3);
    }
}
