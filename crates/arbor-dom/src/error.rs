use arbor_core::NodeHandle;
use thiserror::Error;

/// Errors from the checked [`Document`](crate::Document) API.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomError {
    #[error("node {0} does not exist")]
    UnknownNode(NodeHandle),
    #[error("node {0} is not an element")]
    NotAnElement(NodeHandle),
    #[error("node {0} is not a text node")]
    NotText(NodeHandle),
    #[error("node {child} is not a child of {parent}")]
    NotAChild { parent: NodeHandle, child: NodeHandle },
    #[error("inserting {child} into {parent} would create a cycle")]
    WouldCycle { parent: NodeHandle, child: NodeHandle },
}
