//! HTML serialization of a document subtree.

use std::fmt::Write;

use arbor_core::NodeHandle;

use crate::document::{Document, NodeData};

const VOID_ELEMENTS: &[&str] = &["area", "br", "col", "hr", "img", "input", "link", "meta", "source"];

/// Escape HTML special characters in a string.
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// `backgroundColor` → `background-color`.
fn kebab_case(property: &str) -> String {
    let mut out = String::with_capacity(property.len() + 4);
    for c in property.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

impl Document {
    /// Serialize `node` and its descendants. Event handlers are not part of
    /// the output.
    pub fn to_html(&self, node: NodeHandle) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out);
        out
    }

    /// Serialize the children of `node` without the node itself.
    pub fn inner_html(&self, node: NodeHandle) -> String {
        let mut out = String::new();
        if let Ok(entry) = self.node(node) {
            for child in &entry.children {
                self.write_html(*child, &mut out);
            }
        }
        out
    }

    fn write_html(&self, node: NodeHandle, out: &mut String) {
        let Ok(entry) = self.node(node) else {
            return;
        };
        let (tag, attributes, styles) = match &entry.data {
            NodeData::Text(text) => {
                out.push_str(&escape_html(text));
                return;
            }
            NodeData::Element {
                tag,
                attributes,
                styles,
                ..
            } => (tag, attributes, styles),
        };

        let _ = write!(out, "<{tag}");
        for (name, value) in attributes {
            let _ = write!(out, " {name}=\"{}\"", escape_html(value));
        }
        if !styles.is_empty() {
            let style = styles
                .iter()
                .map(|(property, value)| format!("{}: {value};", kebab_case(property)))
                .collect::<Vec<_>>()
                .join(" ");
            let _ = write!(out, " style=\"{}\"", escape_html(&style));
        }
        out.push('>');
        if VOID_ELEMENTS.contains(&tag.as_str()) {
            return;
        }
        for child in &entry.children {
            self.write_html(*child, out);
        }
        let _ = write!(out, "</{tag}>");
    }
}
