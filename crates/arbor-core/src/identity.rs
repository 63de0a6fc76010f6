//! Positional identity of descriptors across renders.
//!
//! An [`IdentityId`] combines the descriptor's origin tag with either its
//! explicit key or its occurrence number among descriptors of the same
//! origin in the same scope. The scope is the identity of the nearest keyed
//! host or fragment ancestor in the pass, so the contents of a keyed list
//! item follow the item when the list is reordered.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::element::{Key, OriginTag};

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Slot {
    Key(Key),
    Occurrence(u32),
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct IdentityId {
    scope: Option<Rc<IdentityId>>,
    origin: OriginTag,
    slot: Slot,
}

impl IdentityId {
    pub fn origin(&self) -> OriginTag {
        self.origin
    }

    pub fn slot(&self) -> &Slot {
        &self.slot
    }

    pub fn scope(&self) -> Option<&IdentityId> {
        self.scope.as_deref()
    }

    pub fn is_keyed(&self) -> bool {
        matches!(self.slot, Slot::Key(_))
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(scope) = &self.scope {
            write!(f, "{scope}/")?;
        }
        match &self.slot {
            Slot::Key(key) => write!(f, "{}[{key}]", self.origin),
            Slot::Occurrence(n) => write!(f, "{}#{n}", self.origin),
        }
    }
}

impl fmt::Debug for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdentityId({self})")
    }
}

/// Per-pass occurrence counters.
#[derive(Default)]
pub(crate) struct IdentityAllocator {
    counters: HashMap<(Option<Rc<IdentityId>>, OriginTag), u32>,
}

impl IdentityAllocator {
    pub(crate) fn resolve(
        &mut self,
        scope: Option<&Rc<IdentityId>>,
        origin: OriginTag,
        key: Option<&Key>,
    ) -> IdentityId {
        let slot = match key {
            Some(key) => Slot::Key(key.clone()),
            None => {
                let counter = self.counters.entry((scope.cloned(), origin)).or_insert(0);
                let n = *counter;
                *counter += 1;
                Slot::Occurrence(n)
            }
        };
        IdentityId {
            scope: scope.cloned(),
            origin,
            slot,
        }
    }
}
