//! The host contract: the live platform tree the reconciler mutates.
//!
//! A [`Host`] owns real nodes (DOM elements, widgets, terminal cells, an
//! in-memory document in tests) and hands out opaque [`NodeHandle`]s. The
//! reconciler never inspects a node beyond what this trait exposes.

use std::fmt;

use crate::element::EventHandler;

/// Opaque reference to a node owned by a [`Host`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(u64);

impl NodeHandle {
    /// Wrap a host-specific raw id.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw id this handle was created from.
    pub const fn to_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Platform operations required by the reconciler.
///
/// Operations on handles the host does not know are expected to be ignored
/// (and logged) rather than panic: the reconciler treats the host as the
/// source of truth for structure and re-reads children before reordering.
pub trait Host {
    /// Create a detached element node.
    fn create_element(&mut self, tag: &str) -> NodeHandle;

    /// Create a detached text node.
    fn create_text(&mut self, text: &str) -> NodeHandle;

    /// Replace the content of a text node.
    fn set_text(&mut self, node: NodeHandle, text: &str);

    fn set_attribute(&mut self, node: NodeHandle, name: &str, value: &str);

    fn remove_attribute(&mut self, node: NodeHandle, name: &str);

    /// Install (`Some`) or clear (`None`) the handler slot for `event`.
    ///
    /// `event` is the lower-cased name without the `on` prefix, so the
    /// property `onClick` arrives here as `click`.
    fn set_event_handler(&mut self, node: NodeHandle, event: &str, handler: Option<EventHandler>);

    /// Whether `property` is a style property the platform understands.
    fn supports_style(&self, property: &str) -> bool;

    /// Set (`Some`) or clear (`None`) a single style property.
    fn set_style(&mut self, node: NodeHandle, property: &str, value: Option<&str>);

    fn contains(&self, node: NodeHandle) -> bool;

    fn parent(&self, node: NodeHandle) -> Option<NodeHandle>;

    fn children(&self, node: NodeHandle) -> Vec<NodeHandle>;

    /// Insert `child` into `parent` before `reference`, or append when
    /// `reference` is `None`. An attached `child` is moved, not copied.
    fn insert_before(&mut self, parent: NodeHandle, child: NodeHandle, reference: Option<NodeHandle>);

    fn remove_child(&mut self, parent: NodeHandle, child: NodeHandle);
}

/// Whether a property key follows the event-handler naming convention:
/// `on` followed by an upper-case ASCII letter (`onClick`, `onKeyDown`).
pub fn is_event_prop(key: &str) -> bool {
    key.strip_prefix("on")
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| c.is_ascii_uppercase())
}

/// The event name a handler property installs into (`onKeyDown` → `keydown`).
pub fn event_name(key: &str) -> Option<String> {
    if !is_event_prop(key) {
        return None;
    }
    Some(key[2..].to_ascii_lowercase())
}

/// Build the handler property key for an event name (`click` → `onClick`).
pub fn event_prop_key(event: &str) -> String {
    let mut chars = event.chars();
    match chars.next() {
        Some(first) => {
            let mut key = String::with_capacity(event.len() + 2);
            key.push_str("on");
            key.push(first.to_ascii_uppercase());
            key.push_str(chars.as_str());
            key
        }
        None => String::from("on"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_event_props() {
        assert!(is_event_prop("onClick"));
        assert!(is_event_prop("onKeyDown"));
        assert!(!is_event_prop("onclick"));
        assert!(!is_event_prop("on"));
        assert!(!is_event_prop("one"));
        assert!(!is_event_prop("class"));
    }

    #[test]
    fn event_names_round_trip() {
        assert_eq!(event_name("onKeyDown").as_deref(), Some("keydown"));
        assert_eq!(event_name("title"), None);
        assert_eq!(event_prop_key("click"), "onClick");
        assert_eq!(event_name(&event_prop_key("input")).as_deref(), Some("input"));
    }
}
