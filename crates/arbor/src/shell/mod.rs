//! Shell module - frame loop and developer tooling.

pub mod devtools;
pub mod runtime;

pub use devtools::render_tree;
pub use runtime::{App, ShellError, block_on};
