//! Hooks that steer the runtime rather than hold state.

use std::any::{Any, type_name};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{use_named_hook, with_frame};
use crate::instance::{ErrorHandlerEntry, UpdateCause};
use crate::lifetime::LifetimeFlag;
use crate::root::Updater;
use crate::scheduler::Spawner;

type Comparer = Box<dyn Fn(&dyn Any, &dyn Any) -> Option<bool>>;

struct ComparerState {
    comparer: Comparer,
    previous: RefCell<Option<Rc<dyn Any>>>,
}

/// Skip re-renders caused by the parent when the new props compare equal
/// to the previous ones. Updates the instance requests itself always run.
///
/// Only one comparer per component is honoured; further calls are ignored.
///
/// ```ignore
/// fn row(props: &RowProps) -> RenderResult {
///     use_props_comparer(|a: &RowProps, b: &RowProps| a.id == b.id && a.label == b.label);
///     Ok(h("li").child(props.label.clone()).into())
/// }
/// ```
pub fn use_props_comparer<P: 'static>(props_are_equal: impl Fn(&P, &P) -> bool + 'static) {
    let state = use_named_hook("use_props_comparer", |_, _| ComparerState {
        comparer: Box::new(move |a: &dyn Any, b: &dyn Any| {
            Some(props_are_equal(a.downcast_ref::<P>()?, b.downcast_ref::<P>()?))
        }),
        previous: RefCell::new(None),
    });

    let (duplicate, props, cause) = with_frame("use_props_comparer", |frame| {
        let duplicate = frame.comparer_seen;
        frame.comparer_seen = true;
        (duplicate, frame.props.clone(), frame.cause)
    });
    if duplicate {
        tracing::warn!("use_props_comparer called more than once in one component, ignoring");
        return;
    }

    let previous = state.previous.replace(Some(props.clone()));
    let Some(previous) = previous else {
        return;
    };
    if cause != UpdateCause::Props {
        return;
    }
    match (state.comparer)(previous.as_ref(), props.as_ref()) {
        Some(true) => with_frame("use_props_comparer", |frame| frame.skip_update = true),
        Some(false) => {}
        None => tracing::warn!(
            props_type = type_name::<P>(),
            "props comparer registered for a different props type"
        ),
    }
}

static NEXT_REGISTRATION: AtomicU64 = AtomicU64::new(1);

/// Catch render errors of type `E` raised by this component or any
/// descendant.
///
/// Handlers are tried most recent first. When one accepts the error, the
/// failing subtree is destroyed and this component keeps rendering; if the
/// failing component is this one, its previous output stays on screen.
/// Registering again from the same hook position replaces the earlier
/// handler and makes it the most recent.
///
/// ```ignore
/// #[derive(Debug, thiserror::Error)]
/// #[error("not found: {0}")]
/// struct NotFound(String);
///
/// fn boundary(_: &()) -> RenderResult {
///     let (failed, set_failed) = use_state(|| None::<String>);
///     use_error_handler(move |err: &NotFound| set_failed.set(Some(err.0.clone())));
///     ...
/// }
/// ```
pub fn use_error_handler<E, F>(handler: F)
where
    E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    F: Fn(&E) + 'static,
{
    let registration = use_named_hook("use_error_handler", |_, _| {
        NEXT_REGISTRATION.fetch_add(1, Ordering::Relaxed)
    });
    let registration = *registration;
    let entry = ErrorHandlerEntry {
        registration,
        handler: Rc::new(move |error: &anyhow::Error| match error.downcast_ref::<E>() {
            Some(error) => {
                handler(error);
                true
            }
            None => false,
        }),
    };
    with_frame("use_error_handler", |frame| {
        frame
            .error_handlers
            .retain(|existing| existing.registration != registration);
        frame.error_handlers.push(entry);
    });
}

/// Handle returned by [`use_rebuild`].
#[derive(Clone)]
pub struct Rebuild {
    updater: Updater,
}

impl Rebuild {
    /// Discard all hook state of the instance and render it from scratch.
    /// Pending unmount and destroy cleanups run first.
    pub fn rebuild(&self) {
        self.updater.request_rebuild();
    }
}

pub fn use_rebuild() -> Rebuild {
    let updater = use_named_hook("use_rebuild", |scope, _| scope.updater().clone());
    Rebuild {
        updater: (*updater).clone(),
    }
}

/// This instance's render cache as a lifetime owner. Descendants rendered
/// with `.lifetime(flag)` survive being hidden or moved and are destroyed
/// together with this instance.
pub fn use_lifetime_flag() -> LifetimeFlag {
    *use_named_hook("use_lifetime_flag", |scope, _| scope.lifetime_flag())
}

/// Spawn local futures on the scheduler that owns this instance.
pub fn use_spawner() -> Spawner {
    (*use_named_hook("use_spawner", |scope, _| scope.spawner())).clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::testing::TestFrame;
    use std::cell::Cell;

    #[derive(Debug, thiserror::Error)]
    #[error("missing {0}")]
    struct Missing(&'static str);

    #[derive(Debug, thiserror::Error)]
    #[error("other")]
    struct Other;

    #[test]
    fn comparer_skips_equal_props_from_parent() {
        let mut frame = TestFrame::new();
        let render = |frame: &mut TestFrame, props: u32, cause| {
            frame.render_with_props(Rc::new(props), cause, || {
                use_props_comparer(|a: &u32, b: &u32| a == b)
            });
            frame.frame().skip_update
        };
        assert!(!render(&mut frame, 1, UpdateCause::Props));
        assert!(render(&mut frame, 1, UpdateCause::Props));
        assert!(!render(&mut frame, 2, UpdateCause::Props));
        assert!(!render(&mut frame, 2, UpdateCause::SelfUpdate));
    }

    #[test]
    fn only_the_first_comparer_counts() {
        let mut frame = TestFrame::new();
        let render = |frame: &mut TestFrame| {
            frame.render_with_props(Rc::new(1u32), UpdateCause::Props, || {
                use_props_comparer(|_: &u32, _: &u32| false);
                use_props_comparer(|_: &u32, _: &u32| true);
            });
            frame.frame().skip_update
        };
        assert!(!render(&mut frame));
        assert!(!render(&mut frame));
    }

    #[test]
    fn error_handlers_match_by_type() {
        let mut frame = TestFrame::new();
        let seen = Rc::new(Cell::new(0));
        let counter = seen.clone();
        frame.render(move || {
            use_error_handler(move |err: &Missing| {
                assert_eq!(err.0, "page");
                counter.set(counter.get() + 1);
            })
        });
        assert!(frame.frame().handle_error(&anyhow::Error::new(Missing("page"))));
        assert!(!frame.frame().handle_error(&anyhow::Error::new(Other)));
        assert_eq!(seen.get(), 1);
    }

    #[test]
    fn re_registration_replaces_and_moves_to_front() {
        let mut frame = TestFrame::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for round in 0..2 {
            let (a, b) = (log.clone(), log.clone());
            frame.render(move || {
                use_error_handler(move |_: &Missing| a.borrow_mut().push(("first", round)));
                use_error_handler(move |_: &Missing| b.borrow_mut().push(("second", round)));
            });
        }
        assert_eq!(frame.frame().error_handlers.len(), 2);
        frame.frame().handle_error(&anyhow::Error::new(Missing("x")));
        assert_eq!(*log.borrow(), vec![("second", 1)]);
    }

    #[test]
    fn lifetime_flag_is_stable() {
        let mut frame = TestFrame::new();
        let first = frame.render(use_lifetime_flag);
        let second = frame.render(use_lifetime_flag);
        assert_eq!(first, second);
    }
}
