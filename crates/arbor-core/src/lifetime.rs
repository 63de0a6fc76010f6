//! Lifetime annotations: which render cache owns a component instance.
//!
//! The owning cache decides when an instance is destroyed, independently of
//! where it sits in the structural tree:
//!
//! | Lifetime | Owner | Destroyed when |
//! |----------|-------|----------------|
//! | [`Lifetime::Inherit`] | the rendering component | that component is destroyed |
//! | [`Lifetime::Dynamic`] | one render pass | it is not rendered by the next pass, or hidden |
//! | [`Lifetime::Static`] | the root | the root is torn down |
//! | [`Lifetime::Flag`] | the component that created the flag | that component is destroyed |

slotmap::new_key_type! {
    /// Handle to a render cache in the runtime arena.
    pub struct CacheId;
}

/// A render cache exposed to descendants via `use_lifetime_flag`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LifetimeFlag {
    pub(crate) cache: CacheId,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Lifetime {
    #[default]
    Inherit,
    Dynamic,
    Static,
    Flag(LifetimeFlag),
}

impl From<LifetimeFlag> for Lifetime {
    fn from(flag: LifetimeFlag) -> Self {
        Lifetime::Flag(flag)
    }
}

/// Lifetime as recorded on an instance after its cache has been resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum LifetimeKind {
    Root,
    Inherit,
    Dynamic,
    Static,
    Flag,
}

impl LifetimeKind {
    pub(crate) fn label(self) -> &'static str {
        match self {
            LifetimeKind::Root => "root",
            LifetimeKind::Inherit => "inherit",
            LifetimeKind::Dynamic => "dynamic",
            LifetimeKind::Static => "static",
            LifetimeKind::Flag => "flag",
        }
    }
}
