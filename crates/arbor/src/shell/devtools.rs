//! Text dumps of the instance tree for debugging.

use std::fmt::Write;

use arbor_core::InstanceSnapshot;

/// Render a snapshot as an indented tree, one instance per line.
///
/// ```text
/// Root [root] renders=1
///   counter [inherit] renders=3 at src/main.rs:12:5#0
///     hooks: use_state<i32>, use_effect<()>
/// ```
pub fn render_tree(snapshot: &InstanceSnapshot) -> String {
    let mut out = String::new();
    write_instance(snapshot, 0, &mut out);
    out
}

fn write_instance(snapshot: &InstanceSnapshot, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    let _ = write!(
        out,
        "{indent}{} [{}] renders={}",
        snapshot.name, snapshot.lifetime, snapshot.renders
    );
    if let Some(identity) = &snapshot.identity {
        let _ = write!(out, " at {identity}");
    }
    if !snapshot.visible {
        out.push_str(" (hidden)");
    }
    out.push('\n');
    if !snapshot.hooks.is_empty() {
        let hooks = snapshot
            .hooks
            .iter()
            .map(|hook| format!("{}<{}>", hook.hook_type, short_type(hook.value_type)))
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(out, "{indent}  hooks: {hooks}");
    }
    for child in &snapshot.children {
        write_instance(child, depth + 1, out);
    }
}

/// Strip module paths from a type name, keeping generic structure.
fn short_type(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut segment = String::new();
    for c in name.chars() {
        if c.is_alphanumeric() || c == '_' || c == ':' {
            segment.push(c);
        } else {
            out.push_str(segment.rsplit("::").next().unwrap_or(&segment));
            segment.clear();
            out.push(c);
        }
    }
    out.push_str(segment.rsplit("::").next().unwrap_or(&segment));
    out
}
