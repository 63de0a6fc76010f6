//! Arbor - a small hooks-based UI component runtime.
//!
//! Components are plain functions from props to an [`Element`] tree. The
//! runtime keeps one instance per rendered component, gives it stable hook
//! slots across renders, and applies the minimal set of mutations to a
//! host tree. The bundled host is an in-memory [`Document`](dom::Document).
//!
//! # Quick Start
//!
//! ```ignore
//! use arbor::prelude::*;
//!
//! fn counter(_: &()) -> RenderResult {
//!     let (count, set_count) = use_state(|| 0);
//!     Ok(h("button")
//!         .on("click", move || set_count.update(|n| *n += 1))
//!         .child(format!("Clicked {count} times"))
//!         .into())
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = RuntimeConfig::default();
//!     block_on(&config, async {
//!         let app = App::new(config.clone())?;
//!         app.render(component(counter, ()))?;
//!         app.run_until_idle().await?;
//!         println!("{}", app.html());
//!         Ok::<_, ShellError>(())
//!     })??;
//!     Ok(())
//! }
//! ```
//!
//! # Hooks
//!
//! | Hook | Purpose |
//! |------|---------|
//! | [`use_state`] | `(value, setter)` state that schedules a re-render |
//! | [`use_ref`] | Mutable cell that doesn't trigger re-renders |
//! | [`use_effect`] | Side effects when dependencies change |
//! | [`use_effect_cleanup`] | Effects with cleanup functions |
//! | [`use_mount`] | Effect each time the instance becomes visible |
//! | [`use_memo`] | Memoized computations |
//! | [`use_error_handler`] | Catch render errors of a given type from descendants |
//!
//! See [`arbor_core::hooks`] for the full list and the rules of hooks.
//!
//! [`use_state`]: prelude::use_state
//! [`use_ref`]: prelude::use_ref
//! [`use_effect`]: prelude::use_effect
//! [`use_effect_cleanup`]: prelude::use_effect_cleanup
//! [`use_mount`]: prelude::use_mount
//! [`use_memo`]: prelude::use_memo
//! [`use_error_handler`]: prelude::use_error_handler

pub mod config;
pub mod shell;

pub mod prelude {
    //! Common imports for arbor applications.
    pub use crate::config::RuntimeConfig;
    pub use crate::shell::{App, ShellError, block_on};
    pub use arbor_core::builtins::{Deferred, Lazy, SuspenseProps, lazy, suspense};
    pub use arbor_core::element::*;
    pub use arbor_core::hooks::*;
    pub use arbor_core::{Component, Lifetime, LifetimeFlag, RenderResult, Root, RootOptions};
    pub use arbor_dom::{Document, dispatch_event};
}

// Re-export core types at crate root
pub use arbor_core::{Element, RenderResult, Root, RootError, RuntimeError};
pub use config::{RuntimeConfig, init_tracing};
pub use shell::{App, ShellError, block_on, render_tree};

pub use arbor_core as core;
pub use arbor_dom as dom;
