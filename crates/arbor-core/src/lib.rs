//! Core runtime for arbor: element descriptors, component instances, hooks,
//! the reconciler and the frame scheduler.
//!
//! This crate knows nothing about any concrete platform. Everything it does
//! to the outside world goes through the [`Host`] trait.

pub mod builtins;
pub mod component;
pub mod element;
pub mod error;
pub mod hooks;
pub mod host;
pub mod identity;
pub mod inspect;
pub mod instance;
pub mod lifetime;
mod reconcile;
pub mod root;
pub mod scheduler;
mod tree;

// Re-export the types most applications touch
pub use builtins::{Deferred, Lazy, Suspense, SuspenseProps, lazy, suspense};
pub use component::{Component, RenderResult};
pub use element::{
    ComponentElement, Element, EventHandler, FragmentElement, HostElement, IntoElement, Key,
    OriginTag, PropValue, TextElement, component, component_of, fragment, h, text,
};
pub use error::{ComponentStack, RootError, RuntimeError, StackFrame};
pub use hooks::{
    HookMeta, HookScope, Rebuild, RefHandle, StateSetter, use_callback, use_effect,
    use_effect_cleanup, use_error_handler, use_hook, use_id, use_id_with, use_layout_effect,
    use_lifetime_effect, use_lifetime_flag, use_memo, use_mount, use_props_comparer, use_rebuild,
    use_ref, use_spawner, use_state,
};
pub use host::{Host, NodeHandle};
pub use inspect::InstanceSnapshot;
pub use instance::InstanceId;
pub use lifetime::{Lifetime, LifetimeFlag};
pub use root::{Root, RootOptions, Updater};
pub use scheduler::{FrameDriver, FrameReport, ManualFrames, SchedulerConfig, Spawner};
