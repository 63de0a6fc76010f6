//! Components that ship with the runtime.

mod suspense;

pub use suspense::{Deferred, Lazy, RejectHandler, Suspense, SuspenseProps, lazy, suspense};
