//! Element descriptors and the builders that construct them.
//!
//! An [`Element`] is an immutable description of intended output. Render
//! functions build a tree of them; the reconciler turns that tree into host
//! mutations. Every descriptor carries an [`OriginTag`] stamped by the
//! `#[track_caller]` builder that created it, which is how instances and
//! nodes keep their identity between renders without explicit keys.
//!
//! ```ignore
//! use arbor::prelude::*;
//!
//! fn greeting(name: &String) -> RenderResult {
//!     Ok(h("p")
//!         .attr("class", "greeting")
//!         .style("color", "teal")
//!         .child("Hello, ")
//!         .child(name.clone())
//!         .into())
//! }
//!
//! fn app(_: &()) -> RenderResult {
//!     Ok(h("main")
//!         .child(component(greeting, "world".to_string()))
//!         .into())
//! }
//! ```

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::Location;
use std::rc::Rc;

use crate::component::{AnyComponent, Component, FnComponent, RenderResult, Typed};
use crate::host::{NodeHandle, event_prop_key, is_event_prop};
use crate::lifetime::Lifetime;

/// Source position of the builder call that produced a descriptor.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OriginTag {
    file: &'static str,
    line: u32,
    column: u32,
}

impl OriginTag {
    /// The location of the caller (propagated through `#[track_caller]`).
    #[track_caller]
    pub fn caller() -> Self {
        let location = Location::caller();
        Self {
            file: location.file(),
            line: location.line(),
            column: location.column(),
        }
    }

    /// A tag that does not come from a source location, for descriptors
    /// built by generic helpers that want a stable identity of their own.
    pub const fn named(name: &'static str) -> Self {
        Self {
            file: name,
            line: 0,
            column: 0,
        }
    }

    pub fn file(&self) -> &'static str {
        self.file
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn column(&self) -> u32 {
        self.column
    }
}

impl fmt::Debug for OriginTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for OriginTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 {
            write!(f, "{}", self.file)
        } else {
            write!(f, "{}:{}:{}", self.file, self.line, self.column)
        }
    }
}

/// Explicit identity key for a descriptor among its siblings.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Str(Rc<str>),
    Int(i64),
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Str(s) => write!(f, "{s:?}"),
            Key::Int(n) => write!(f, "{n}"),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Str(s) => f.write_str(s),
            Key::Int(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Str(Rc::from(value))
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Str(Rc::from(value))
    }
}

impl From<&String> for Key {
    fn from(value: &String) -> Self {
        Key::Str(Rc::from(value.as_str()))
    }
}

impl From<Rc<str>> for Key {
    fn from(value: Rc<str>) -> Self {
        Key::Str(value)
    }
}

macro_rules! int_key {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Key {
            fn from(value: $ty) -> Self {
                Key::Int(value as i64)
            }
        })*
    };
}

int_key!(i32, i64, u32, u64, usize);

/// An event handler installed on a host node.
///
/// Two handlers are equal only when they share the same allocation, so a
/// handler re-created on every render is re-installed on every render.
#[derive(Clone)]
pub struct EventHandler(Rc<dyn Fn()>);

impl EventHandler {
    pub fn new(f: impl Fn() + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn invoke(&self) {
        (self.0)()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for EventHandler {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EventHandler(..)")
    }
}

/// Callback receiving the host node created for a host descriptor.
#[derive(Clone)]
pub struct NodeRef(Rc<dyn Fn(NodeHandle)>);

impl NodeRef {
    pub fn new(f: impl Fn(NodeHandle) + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn invoke(&self, node: NodeHandle) {
        (self.0)(node)
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NodeRef(..)")
    }
}

/// Value of a host property.
#[derive(Clone, Debug, PartialEq)]
pub enum PropValue {
    Str(Rc<str>),
    Int(i64),
    Float(f64),
    Bool(bool),
    Handler(EventHandler),
}

impl PropValue {
    /// The attribute string for this value, `None` for handlers.
    pub fn to_attribute(&self) -> Option<String> {
        match self {
            PropValue::Str(s) => Some(s.to_string()),
            PropValue::Int(n) => Some(n.to_string()),
            PropValue::Float(x) => Some(x.to_string()),
            PropValue::Bool(b) => Some(b.to_string()),
            PropValue::Handler(_) => None,
        }
    }

    pub fn as_handler(&self) -> Option<&EventHandler> {
        match self {
            PropValue::Handler(handler) => Some(handler),
            _ => None,
        }
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Str(Rc::from(value))
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Str(Rc::from(value))
    }
}

impl From<i32> for PropValue {
    fn from(value: i32) -> Self {
        PropValue::Int(value.into())
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        PropValue::Int(value)
    }
}

impl From<usize> for PropValue {
    fn from(value: usize) -> Self {
        PropValue::Int(value as i64)
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Float(value)
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<EventHandler> for PropValue {
    fn from(value: EventHandler) -> Self {
        PropValue::Handler(value)
    }
}

/// A node in the descriptor tree.
#[derive(Clone, Debug, Default)]
pub enum Element {
    /// Renders nothing.
    #[default]
    Empty,
    /// A text node.
    Text(TextElement),
    /// A platform node with properties and children.
    Host(HostElement),
    /// A user component to instantiate.
    Component(ComponentElement),
    /// A group of children spliced into the parent without a wrapper node.
    Fragment(FragmentElement),
}

impl Element {
    pub fn key(&self) -> Option<&Key> {
        match self {
            Element::Empty => None,
            Element::Text(t) => t.key.as_ref(),
            Element::Host(h) => h.key.as_ref(),
            Element::Component(c) => c.key.as_ref(),
            Element::Fragment(f) => f.key.as_ref(),
        }
    }

    pub fn origin(&self) -> Option<OriginTag> {
        match self {
            Element::Empty => None,
            Element::Text(t) => Some(t.origin),
            Element::Host(h) => Some(h.origin),
            Element::Component(c) => Some(c.origin),
            Element::Fragment(f) => Some(f.origin),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Element::Empty)
    }
}

#[derive(Clone, Debug)]
pub struct TextElement {
    pub(crate) text: Rc<str>,
    pub(crate) key: Option<Key>,
    pub(crate) origin: OriginTag,
}

impl TextElement {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn origin(mut self, origin: OriginTag) -> Self {
        self.origin = origin;
        self
    }
}

#[derive(Clone, Debug)]
pub struct HostElement {
    pub(crate) tag: Rc<str>,
    pub(crate) props: BTreeMap<String, PropValue>,
    pub(crate) style: BTreeMap<String, String>,
    pub(crate) node_ref: Option<NodeRef>,
    pub(crate) children: Vec<Element>,
    pub(crate) key: Option<Key>,
    pub(crate) origin: OriginTag,
}

impl HostElement {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn props(&self) -> &BTreeMap<String, PropValue> {
        &self.props
    }

    pub fn styles(&self) -> &BTreeMap<String, String> {
        &self.style
    }

    pub fn child_elements(&self) -> &[Element] {
        &self.children
    }

    /// Set a property. Handler-named keys (`onClick`) only accept handlers;
    /// anything else under such a key is dropped.
    pub fn prop(mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
        let key = key.into();
        let value = value.into();
        match (&value, is_event_prop(&key)) {
            (PropValue::Handler(_), false) => {
                tracing::warn!(key = %key, tag = %self.tag, "event handler given to a non-event property, dropping it");
            }
            (PropValue::Handler(_), true) | (_, false) => {
                if key == "style" || key == "ref" {
                    tracing::warn!(key = %key, tag = %self.tag, "reserved property key, use the dedicated builder method");
                } else {
                    self.props.insert(key, value);
                }
            }
            (_, true) => {
                tracing::warn!(key = %key, tag = %self.tag, "event property given a non-handler value, dropping it");
            }
        }
        self
    }

    /// Alias of [`prop`](Self::prop) for plain attributes.
    pub fn attr(self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.prop(name, value)
    }

    /// Install a handler for `event` (`"click"` becomes the `onClick` prop).
    pub fn on(self, event: &str, handler: impl Fn() + 'static) -> Self {
        self.prop(event_prop_key(event), EventHandler::new(handler))
    }

    /// Set one style property (camelCase, e.g. `backgroundColor`).
    pub fn style(mut self, property: impl Into<String>, value: impl Into<String>) -> Self {
        self.style.insert(property.into(), value.into());
        self
    }

    pub fn node_ref(mut self, f: impl Fn(NodeHandle) + 'static) -> Self {
        self.node_ref = Some(NodeRef::new(f));
        self
    }

    #[track_caller]
    pub fn child(mut self, child: impl IntoElement) -> Self {
        self.children.push(child.into_element(OriginTag::caller()));
        self
    }

    #[track_caller]
    pub fn children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator,
        I::Item: IntoElement,
    {
        let origin = OriginTag::caller();
        self.children
            .extend(children.into_iter().map(|child| child.into_element(origin)));
        self
    }

    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn origin(mut self, origin: OriginTag) -> Self {
        self.origin = origin;
        self
    }
}

#[derive(Clone)]
pub struct ComponentElement {
    pub(crate) component: Rc<dyn AnyComponent>,
    pub(crate) props: Rc<dyn Any>,
    pub(crate) key: Option<Key>,
    pub(crate) origin: OriginTag,
    pub(crate) lifetime: Lifetime,
}

impl ComponentElement {
    pub fn name(&self) -> &'static str {
        self.component.name()
    }

    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Choose which render cache owns the instance (defaults to
    /// [`Lifetime::Inherit`]).
    pub fn lifetime(mut self, lifetime: impl Into<Lifetime>) -> Self {
        self.lifetime = lifetime.into();
        self
    }

    pub fn origin(mut self, origin: OriginTag) -> Self {
        self.origin = origin;
        self
    }
}

impl fmt::Debug for ComponentElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentElement")
            .field("component", &self.component.name())
            .field("key", &self.key)
            .field("origin", &self.origin)
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct FragmentElement {
    pub(crate) children: Vec<Element>,
    pub(crate) key: Option<Key>,
    pub(crate) origin: OriginTag,
}

impl FragmentElement {
    #[track_caller]
    pub fn child(mut self, child: impl IntoElement) -> Self {
        self.children.push(child.into_element(OriginTag::caller()));
        self
    }

    #[track_caller]
    pub fn children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator,
        I::Item: IntoElement,
    {
        let origin = OriginTag::caller();
        self.children
            .extend(children.into_iter().map(|child| child.into_element(origin)));
        self
    }

    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn origin(mut self, origin: OriginTag) -> Self {
        self.origin = origin;
        self
    }
}

/// Conversion into a descriptor. Values without an origin of their own
/// (strings, numbers) take the origin passed in.
pub trait IntoElement {
    fn into_element(self, origin: OriginTag) -> Element;
}

impl IntoElement for Element {
    fn into_element(self, _origin: OriginTag) -> Element {
        self
    }
}

impl IntoElement for TextElement {
    fn into_element(self, _origin: OriginTag) -> Element {
        Element::Text(self)
    }
}

impl IntoElement for HostElement {
    fn into_element(self, _origin: OriginTag) -> Element {
        Element::Host(self)
    }
}

impl IntoElement for ComponentElement {
    fn into_element(self, _origin: OriginTag) -> Element {
        Element::Component(self)
    }
}

impl IntoElement for FragmentElement {
    fn into_element(self, _origin: OriginTag) -> Element {
        Element::Fragment(self)
    }
}

impl<T: IntoElement> IntoElement for Option<T> {
    fn into_element(self, origin: OriginTag) -> Element {
        match self {
            Some(inner) => inner.into_element(origin),
            None => Element::Empty,
        }
    }
}

impl IntoElement for Vec<Element> {
    fn into_element(self, origin: OriginTag) -> Element {
        Element::Fragment(FragmentElement {
            children: self,
            key: None,
            origin,
        })
    }
}

macro_rules! text_into_element {
    ($($ty:ty),*) => {
        $(impl IntoElement for $ty {
            fn into_element(self, origin: OriginTag) -> Element {
                Element::Text(TextElement {
                    text: Rc::from(self.to_string()),
                    key: None,
                    origin,
                })
            }
        })*
    };
}

text_into_element!(&str, String, &String, char, i32, i64, u32, u64, usize, f32, f64, bool);

impl From<TextElement> for Element {
    fn from(value: TextElement) -> Self {
        Element::Text(value)
    }
}

impl From<HostElement> for Element {
    fn from(value: HostElement) -> Self {
        Element::Host(value)
    }
}

impl From<ComponentElement> for Element {
    fn from(value: ComponentElement) -> Self {
        Element::Component(value)
    }
}

impl From<FragmentElement> for Element {
    fn from(value: FragmentElement) -> Self {
        Element::Fragment(value)
    }
}

/// A host element descriptor.
#[track_caller]
pub fn h(tag: &str) -> HostElement {
    HostElement {
        tag: Rc::from(tag),
        props: BTreeMap::new(),
        style: BTreeMap::new(),
        node_ref: None,
        children: Vec::new(),
        key: None,
        origin: OriginTag::caller(),
    }
}

/// A text descriptor.
#[track_caller]
pub fn text(content: impl fmt::Display) -> TextElement {
    TextElement {
        text: Rc::from(content.to_string()),
        key: None,
        origin: OriginTag::caller(),
    }
}

/// An empty fragment; add children with the builder methods.
#[track_caller]
pub fn fragment() -> FragmentElement {
    FragmentElement {
        children: Vec::new(),
        key: None,
        origin: OriginTag::caller(),
    }
}

/// A component descriptor for a render function.
///
/// Every function item and closure has its own type, which is what the
/// reconciler compares to decide whether an instance can be reused.
#[track_caller]
pub fn component<P, F>(render: F, props: P) -> ComponentElement
where
    P: 'static,
    F: Fn(&P) -> RenderResult + 'static,
{
    component_of(FnComponent::new(render), props)
}

/// A component descriptor for a [`Component`] implementation.
#[track_caller]
pub fn component_of<C: Component>(component: C, props: C::Props) -> ComponentElement {
    ComponentElement {
        component: Rc::new(Typed(component)),
        props: Rc::new(props),
        key: None,
        origin: OriginTag::caller(),
        lifetime: Lifetime::Inherit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn builders_stamp_distinct_origins() {
        let a = h("div");
        let b = h("div");
        assert_ne!(a.origin, b.origin);
        assert_eq!(a.origin.file(), file!());
    }

    #[test]
    fn child_strings_take_the_child_call_site() {
        let el = h("p").child("a").child(7);
        let origins: Vec<_> = el.children.iter().filter_map(Element::origin).collect();
        assert_eq!(origins.len(), 2);
        assert_ne!(origins[0], origins[1]);
        match &el.children[1] {
            Element::Text(t) => assert_eq!(t.text(), "7"),
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn event_props_only_accept_handlers() {
        let el = h("button")
            .prop("onClick", "not a handler")
            .prop("title", EventHandler::new(|| {}))
            .on("click", || {});
        assert!(el.props["onClick"].as_handler().is_some());
        assert!(!el.props.contains_key("title"));
    }

    #[test]
    fn reserved_keys_are_not_props() {
        let el = h("div").prop("style", "color: red").prop("ref", 1);
        assert!(el.props.is_empty());
    }

    #[test]
    fn handlers_compare_by_identity() {
        let calls = Rc::new(Cell::new(0));
        let a = EventHandler::new({
            let calls = calls.clone();
            move || calls.set(calls.get() + 1)
        });
        let b = a.clone();
        let c = EventHandler::new(|| {});
        assert_eq!(PropValue::Handler(a.clone()), PropValue::Handler(b));
        assert_ne!(PropValue::Handler(a.clone()), PropValue::Handler(c));
        a.invoke();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn children_share_the_call_site() {
        let el = h("ul").children((0..3).map(|i| h("li").key(i)));
        assert_eq!(el.children.len(), 3);
        assert!(el.children.iter().all(|c| c.key().is_some()));
    }

    #[test]
    fn none_becomes_empty() {
        let el = h("div").child(None::<TextElement>);
        assert!(el.children[0].is_empty());
    }
}
