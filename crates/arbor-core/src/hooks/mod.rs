//! React-style hooks: per-instance state addressed by call order.
//!
//! Every component instance owns an ordered list of hook slots. While an
//! instance renders, its slots are installed as the current frame on a
//! thread-local stack; each hook call claims the slot at the cursor and
//! advances it. The first time a position is reached the hook's `init`
//! runs and the slot is appended, later renders get the stored value back.
//!
//! # Available Hooks
//!
//! | Hook | Purpose |
//! |------|---------|
//! | [`use_hook`] | The primitive every other hook is built on |
//! | [`use_state`] | `(value, setter)` state that schedules a re-render |
//! | [`use_ref`] | Mutable cell that doesn't trigger re-renders |
//! | [`use_memo`] / [`use_callback`] | Values recomputed only when deps change |
//! | [`use_id`] | A unique id string, fixed for the instance's lifetime |
//! | [`use_effect`] / [`use_effect_cleanup`] | Deferred side effects keyed on deps |
//! | [`use_mount`] | Effect on every transition into the visible state |
//! | [`use_layout_effect`] | Effect run synchronously after the host is mutated |
//! | [`use_lifetime_effect`] | Effect aligned with creation and destruction |
//! | [`use_lifetime_flag`] | Hand this instance's render cache to descendants |
//! | [`use_props_comparer`] | Skip renders whose props compare equal |
//! | [`use_error_handler`] | Catch typed render errors from this subtree |
//! | [`use_rebuild`] | Throw away all hook state and render from scratch |
//! | [`use_spawner`] | Run local futures on the scheduler |
//!
//! # Rules of Hooks
//!
//! Hooks must be called in the **exact same order** on every render: they
//! are identified by position, not by name. Calling a hook inside a
//! condition or a loop with a varying trip count shifts every later slot.
//! A slot that turns out to hold a different type is re-initialized with a
//! warning, so the component keeps running with reset state.
//!
//! Hooks may only be called while a component renders; calling one from
//! an event handler or a spawned future panics.

mod control;
mod effect;
mod state;

pub use control::{
    Rebuild, use_error_handler, use_lifetime_flag, use_props_comparer, use_rebuild, use_spawner,
};
pub use effect::{use_effect, use_effect_cleanup, use_layout_effect, use_lifetime_effect, use_mount};
pub use state::{RefHandle, StateSetter, use_callback, use_id, use_id_with, use_memo, use_ref, use_state};

use std::any::type_name;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::instance::{HookFrame, HookSlot, InstanceId};
use crate::lifetime::{CacheId, LifetimeFlag};
use crate::root::Updater;
use crate::scheduler::Spawner;

/// Metadata about a hook for debugging purposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookMeta {
    /// The hook function name (e.g., "use_state", "use_effect")
    pub hook_type: &'static str,
    /// The type of value stored (from std::any::type_name)
    pub value_type: &'static str,
}

/// The owning instance of a hook, handed to `init` when a slot is created.
#[derive(Clone)]
pub struct HookScope {
    pub(crate) instance: InstanceId,
    pub(crate) updater: Updater,
    pub(crate) own_cache: CacheId,
}

impl HookScope {
    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    /// Handle that schedules re-renders of the owning instance.
    pub fn updater(&self) -> &Updater {
        &self.updater
    }

    pub fn lifetime_flag(&self) -> LifetimeFlag {
        LifetimeFlag {
            cache: self.own_cache,
        }
    }

    pub fn spawner(&self) -> Spawner {
        self.updater.spawner()
    }
}

thread_local! {
    static RENDER_STACK: RefCell<Vec<HookFrame>> = const { RefCell::new(Vec::new()) };
}

/// Install `frame` as the current frame for the duration of `render`.
///
/// The frame is popped again even if `render` unwinds.
pub(crate) fn render_with<R>(frame: HookFrame, render: impl FnOnce() -> R) -> (HookFrame, R) {
    RENDER_STACK.with(|stack| stack.borrow_mut().push(frame));
    let guard = FrameGuard { finished: false };
    let result = render();
    let frame = guard.finish();
    (frame, result)
}

struct FrameGuard {
    finished: bool,
}

impl FrameGuard {
    fn finish(mut self) -> HookFrame {
        self.finished = true;
        match RENDER_STACK.with(|stack| stack.borrow_mut().pop()) {
            Some(frame) => frame,
            None => unreachable!("render stack emptied while a component was rendering"),
        }
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        if !self.finished {
            RENDER_STACK.with(|stack| {
                stack.borrow_mut().pop();
            });
        }
    }
}

/// Run `f` against the frame of the instance currently rendering.
pub(crate) fn with_frame<R>(hook_type: &'static str, f: impl FnOnce(&mut HookFrame) -> R) -> R {
    RENDER_STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        match stack.last_mut() {
            Some(frame) => f(frame),
            None => panic!(
                "\n\n\x1b[1;31marbor hooks error: `{hook_type}` called outside of render!\x1b[0m\n\
                Hooks can only be called while a component renders.\n\
                Make sure you're not calling hooks in:\n\
                - Event handlers\n\
                - Effects or spawned futures\n\
                - Static initializers\n"
            ),
        }
    })
}

/// Whether a component is currently rendering on this thread.
pub fn is_rendering() -> bool {
    RENDER_STACK.with(|stack| !stack.borrow().is_empty())
}

/// Attach to the hook slot at the cursor, creating it with `init` the first
/// time this position is reached.
///
/// `init` receives the owning instance scope and a weak handle to the slot
/// being created (it cannot be upgraded until `init` returns). Any state
/// that must change over time needs interior mutability inside `T`.
///
/// ```ignore
/// fn ticker(_: &()) -> RenderResult {
///     let renders = use_hook(|_, _| Cell::new(0u32));
///     renders.set(renders.get() + 1);
///     Ok(text(renders.get()).into())
/// }
/// ```
pub fn use_hook<T: 'static>(init: impl FnOnce(&HookScope, Weak<T>) -> T) -> Rc<T> {
    use_named_hook("use_hook", init)
}

pub(crate) fn use_named_hook<T: 'static>(
    hook_type: &'static str,
    init: impl FnOnce(&HookScope, Weak<T>) -> T,
) -> Rc<T> {
    let (index, existing, scope) = with_frame(hook_type, |frame| {
        let index = frame.cursor;
        frame.cursor += 1;
        let existing = frame.slots.get(index).map(|slot| slot.value.clone());
        (index, existing, frame.scope.clone())
    });

    if let Some(existing) = existing {
        match existing.downcast::<T>() {
            Ok(value) => return value,
            Err(_) => tracing::warn!(
                index,
                hook_type,
                value_type = type_name::<T>(),
                "hook slot holds a different type, resetting it; hooks must be called in the same order every render"
            ),
        }
    }

    // The frame is not borrowed here, so `init` may itself call hooks or
    // queue effects.
    let value = Rc::new_cyclic(|weak| init(&scope, weak.clone()));
    let slot = HookSlot {
        value: value.clone(),
        meta: HookMeta {
            hook_type,
            value_type: type_name::<T>(),
        },
    };
    with_frame(hook_type, |frame| {
        if index < frame.slots.len() {
            frame.slots[index] = slot;
        } else {
            frame.slots.push(slot);
        }
    });
    value
}


#[cfg(test)]
mod tests {
    use super::testing::TestFrame;
    use super::*;
    use std::cell::Cell;

    #[test]
    fn use_hook_persists_across_renders() {
        let mut frame = TestFrame::new();
        let first = frame.render(|| use_hook(|_, _| Cell::new(1)));
        first.set(5);
        let second = frame.render(|| use_hook(|_, _| Cell::new(0)));
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(second.get(), 5);
    }

    #[test]
    fn init_receives_its_own_slot() {
        let mut frame = TestFrame::new();
        let value = frame.render(|| {
            use_hook(|_, weak: Weak<Cell<u8>>| {
                assert!(weak.upgrade().is_none());
                Cell::new(3)
            })
        });
        assert_eq!(value.get(), 3);
    }

    #[test]
    fn cursor_resets_every_render() {
        let mut frame = TestFrame::new();
        frame.render(|| {
            use_hook(|_, _| 1u8);
            use_hook(|_, _| 2u8);
        });
        let (a, b) = frame.render(|| (*use_hook(|_, _| 0u8), *use_hook(|_, _| 0u8)));
        assert_eq!((a, b), (1, 2));
        assert_eq!(frame.frame().slots.len(), 2);
    }

    #[test]
    fn type_mismatch_resets_the_slot() {
        let mut frame = TestFrame::new();
        frame.render(|| {
            use_hook(|_, _| 7u32);
        });
        let value = frame.render(|| use_hook(|_, _| String::from("fresh")));
        assert_eq!(*value, "fresh");
        assert_eq!(frame.frame().hook_meta()[0].value_type, type_name::<String>());
    }

    #[test]
    fn frame_is_cleared_after_render() {
        let mut frame = TestFrame::new();
        frame.render(|| assert!(is_rendering()));
        assert!(!is_rendering());
    }

    #[test]
    #[should_panic(expected = "outside of render")]
    fn hook_outside_render_panics() {
        let _ = use_hook(|_, _| 0);
    }

    #[test]
    fn frame_is_popped_on_unwind() {
        let mut frame = TestFrame::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            frame.render(|| panic!("render failed"));
        }));
        assert!(result.is_err());
        assert!(!is_rendering());
    }
}
