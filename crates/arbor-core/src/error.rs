//! Runtime error types.

use std::fmt;

use thiserror::Error;

use crate::host::NodeHandle;

/// Errors from creating or driving a [`Root`](crate::root::Root).
#[derive(Debug, Error)]
pub enum RootError {
    #[error("mount node {0} does not exist in the host")]
    MissingMount(NodeHandle),
    #[error("mount node must be empty, found {children} child node(s)")]
    MountNotEmpty { children: usize },
    #[error("root has been torn down")]
    TornDown,
}

/// Errors surfaced by frame execution.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A render error no component handled. The tree has been torn down.
    #[error("unhandled render error: {error}\n{component_stack}")]
    Unhandled {
        error: anyhow::Error,
        component_stack: ComponentStack,
    },
    #[error("scheduler still busy after {frames} frames")]
    NotIdle { frames: usize },
}

/// One component on the path of a propagating render error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StackFrame {
    pub component: &'static str,
    pub identity: Option<String>,
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.identity {
            Some(identity) => write!(f, "in {} (at {identity})", self.component),
            None => write!(f, "in {}", self.component),
        }
    }
}

/// Path of components an error travelled through, innermost first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ComponentStack(pub Vec<StackFrame>);

impl ComponentStack {
    pub fn frames(&self) -> &[StackFrame] {
        &self.0
    }

    /// Component names, innermost first.
    pub fn names(&self) -> Vec<&'static str> {
        self.0.iter().map(|frame| frame.component).collect()
    }
}

impl fmt::Display for ComponentStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for frame in &self.0 {
            writeln!(f, "    {frame}")?;
        }
        Ok(())
    }
}

/// A render error on its way up the instance tree.
pub(crate) struct Propagation {
    pub(crate) error: anyhow::Error,
    pub(crate) stack: Vec<StackFrame>,
}

impl Propagation {
    pub(crate) fn new(error: anyhow::Error, origin: StackFrame) -> Self {
        Self {
            error,
            stack: vec![origin],
        }
    }

    pub(crate) fn through(mut self, frame: StackFrame) -> Self {
        self.stack.push(frame);
        self
    }

    pub(crate) fn into_runtime_error(self) -> RuntimeError {
        RuntimeError::Unhandled {
            error: self.error,
            component_stack: ComponentStack(self.stack),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unhandled_error_lists_the_component_path() {
        let err = Propagation::new(
            anyhow::anyhow!("boom"),
            StackFrame {
                component: "leaf",
                identity: Some("app.rs:3:9#0".into()),
            },
        )
        .through(StackFrame {
            component: "Root",
            identity: None,
        })
        .into_runtime_error();
        let message = err.to_string();
        assert!(message.contains("boom"));
        assert!(message.contains("in leaf (at app.rs:3:9#0)"));
        assert!(message.contains("in Root"));
    }
}
