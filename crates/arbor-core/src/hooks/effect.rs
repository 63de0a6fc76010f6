//! Effect hooks.
//!
//! Effects never run during render. [`use_effect`] and friends queue their
//! callback on the owning instance; when the render is applied the queue is
//! handed to the scheduler, so the effect runs as its own task after the
//! host has been updated. Cleanups are queued the same way, ahead of the
//! next run of the same effect or when the instance is hidden.

use std::cell::RefCell;
use std::rc::Rc;

use super::{use_named_hook, with_frame};
use crate::instance::CleanupSlot;

struct EffectState<D> {
    deps: Option<D>,
    cleanup: Rc<CleanupSlot>,
}

/// Run a side effect after render when dependencies change, or when the
/// instance becomes visible.
///
/// ```ignore
/// fn title(props: &String) -> RenderResult {
///     let label = props.clone();
///     use_effect(move || tracing::info!(%label, "title changed"), props.clone());
///     Ok(h("h1").child(props.clone()).into())
/// }
/// ```
pub fn use_effect<F, D>(effect_fn: F, deps: D)
where
    F: FnOnce() + 'static,
    D: PartialEq + 'static,
{
    effect_hook("use_effect", move || {
        effect_fn();
        || {}
    }, deps);
}

/// Run a side effect with a cleanup function when dependencies change.
///
/// The cleanup runs before the next run of the effect and whenever the
/// instance is hidden.
///
/// ```ignore
/// use_effect_cleanup(|| {
///     let subscription = subscribe(id);
///     move || subscription.unsubscribe()
/// }, id);
/// ```
pub fn use_effect_cleanup<F, C, D>(effect_fn: F, deps: D)
where
    F: FnOnce() -> C + 'static,
    C: FnOnce() + 'static,
    D: PartialEq + 'static,
{
    effect_hook("use_effect_cleanup", effect_fn, deps);
}

/// Run an effect every time the instance becomes visible; the returned
/// cleanup runs every time it stops being visible.
pub fn use_mount<F, C>(effect_fn: F)
where
    F: FnOnce() -> C + 'static,
    C: FnOnce() + 'static,
{
    effect_hook("use_mount", effect_fn, ());
}

fn effect_hook<F, C, D>(hook_type: &'static str, effect_fn: F, deps: D)
where
    F: FnOnce() -> C + 'static,
    C: FnOnce() + 'static,
    D: PartialEq + 'static,
{
    let state = use_named_hook(hook_type, |_, _| {
        let cleanup = Rc::new(CleanupSlot::default());
        let registered = cleanup.clone();
        with_frame(hook_type, |frame| frame.effects.will_unmount.push(registered));
        RefCell::new(EffectState::<D> {
            deps: None,
            cleanup,
        })
    });

    let entering = with_frame(hook_type, |frame| frame.entering);
    let (cleanup, previous) = {
        let mut guard = state.borrow_mut();
        if !entering && guard.deps.as_ref() == Some(&deps) {
            return;
        }
        (guard.cleanup.clone(), guard.deps.replace(deps))
    };

    with_frame(hook_type, |frame| {
        frame
            .effects
            .rollback
            .push(Box::new(move || state.borrow_mut().deps = previous));
        frame.effects.before_render.push(cleanup.runner());
        frame.effects.on_render.push(Box::new(move || {
            let next = effect_fn();
            cleanup.replace(next);
        }));
    });
}

/// Run an effect synchronously right after this render's host mutations
/// are applied, before any other queued work.
pub fn use_layout_effect<F, D>(effect_fn: F, deps: D)
where
    F: FnOnce() + 'static,
    D: PartialEq + 'static,
{
    let state = use_named_hook("use_layout_effect", |_, _| RefCell::new(None::<D>));
    let entering = with_frame("use_layout_effect", |frame| frame.entering);
    let previous = {
        let mut stored = state.borrow_mut();
        if !entering && stored.as_ref() == Some(&deps) {
            return;
        }
        stored.replace(deps)
    };
    with_frame("use_layout_effect", |frame| {
        frame
            .effects
            .rollback
            .push(Box::new(move || *state.borrow_mut() = previous));
        frame.effects.when_render.push(Box::new(effect_fn));
    });
}

/// Run an effect when the instance is created and when deps change; the
/// cleanup runs before the next run and when the instance is destroyed.
///
/// Unlike [`use_effect`], hiding and re-showing the instance does not run
/// the effect or its cleanup.
pub fn use_lifetime_effect<F, C, D>(effect_fn: F, deps: D)
where
    F: FnOnce() -> C + 'static,
    C: FnOnce() + 'static,
    D: PartialEq + 'static,
{
    let state = use_named_hook("use_lifetime_effect", |_, _| {
        let cleanup = Rc::new(CleanupSlot::default());
        let registered = cleanup.clone();
        with_frame("use_lifetime_effect", |frame| {
            frame.effects.will_destroy.push(registered)
        });
        RefCell::new(EffectState::<D> {
            deps: None,
            cleanup,
        })
    });

    let (cleanup, previous) = {
        let mut guard = state.borrow_mut();
        if guard.deps.as_ref() == Some(&deps) {
            return;
        }
        (guard.cleanup.clone(), guard.deps.replace(deps))
    };

    with_frame("use_lifetime_effect", |frame| {
        frame
            .effects
            .rollback
            .push(Box::new(move || state.borrow_mut().deps = previous));
        frame.effects.on_render.push(Box::new(move || {
            cleanup.run();
            let next = effect_fn();
            cleanup.replace(next);
        }));
    });
}
