//! State-holding hooks.

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::use_named_hook;
use crate::root::Updater;

struct StateCell<T> {
    value: RefCell<T>,
    updater: Updater,
}

/// Setter returned by [`use_state`]. Every call schedules a re-render of
/// the owning instance, even if the value did not change.
pub struct StateSetter<T> {
    cell: Rc<StateCell<T>>,
}

impl<T> Clone for StateSetter<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
        }
    }
}

impl<T> StateSetter<T> {
    pub fn set(&self, value: T) {
        *self.cell.value.borrow_mut() = value;
        self.cell.updater.request_update();
    }

    /// Modify the value in place.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        f(&mut self.cell.value.borrow_mut());
        self.cell.updater.request_update();
    }
}

impl<T: Clone> StateSetter<T> {
    /// The latest stored value, which may be newer than the one this
    /// render saw.
    pub fn get(&self) -> T {
        self.cell.value.borrow().clone()
    }
}

/// Create or retrieve a value with a setter that schedules a re-render.
///
/// ```ignore
/// fn counter(_: &()) -> RenderResult {
///     let (count, set_count) = use_state(|| 0);
///     Ok(h("button")
///         .on("click", move || set_count.update(|n| *n += 1))
///         .child(count)
///         .into())
/// }
/// ```
pub fn use_state<T: Clone + 'static>(init: impl FnOnce() -> T) -> (T, StateSetter<T>) {
    let cell = use_named_hook("use_state", |scope, _| StateCell {
        value: RefCell::new(init()),
        updater: scope.updater().clone(),
    });
    let value = cell.value.borrow().clone();
    (value, StateSetter { cell })
}

/// Create a mutable reference that persists across renders and never
/// triggers one.
pub fn use_ref<T: 'static>(init: impl FnOnce() -> T) -> RefHandle<T> {
    let inner = use_named_hook("use_ref", |_, _| RefCell::new(init()));
    RefHandle { inner }
}

/// Handle to a ref value created by `use_ref`.
pub struct RefHandle<T> {
    inner: Rc<RefCell<T>>,
}

impl<T> Clone for RefHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> RefHandle<T> {
    /// Get a reference to the current value.
    pub fn borrow(&self) -> Ref<'_, T> {
        self.inner.borrow()
    }

    /// Get a mutable reference to the current value.
    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.inner.borrow_mut()
    }

    /// Set the value directly.
    pub fn set(&self, value: T) {
        *self.inner.borrow_mut() = value;
    }
}

impl<T: Clone> RefHandle<T> {
    /// Get a clone of the current value.
    pub fn get(&self) -> T {
        self.inner.borrow().clone()
    }
}

struct MemoState<T, D> {
    value: Option<T>,
    deps: Option<D>,
}

/// Memoize an expensive computation.
///
/// Returns the cached value on subsequent renders if deps are the same.
pub fn use_memo<T, F, D>(compute: F, deps: D) -> T
where
    T: Clone + 'static,
    F: FnOnce() -> T,
    D: PartialEq + 'static,
{
    let state = use_named_hook("use_memo", |_, _| {
        RefCell::new(MemoState::<T, D> {
            value: None,
            deps: None,
        })
    });
    let mut guard = state.borrow_mut();
    let state = &mut *guard;
    if let (Some(value), Some(old)) = (&state.value, &state.deps)
        && *old == deps
    {
        return value.clone();
    }
    let value = compute();
    state.value = Some(value.clone());
    state.deps = Some(deps);
    value
}

/// Keep the same callback across renders until deps change.
///
/// Handy when a callback is compared by identity further down, for example
/// an [`EventHandler`](crate::element::EventHandler) prop.
pub fn use_callback<F, D>(callback: F, deps: D) -> F
where
    F: Clone + 'static,
    D: PartialEq + 'static,
{
    use_memo(|| callback, deps)
}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// A process-unique id, fixed for the lifetime of the instance.
pub fn use_id() -> String {
    use_id_with("[id]")
}

/// Like [`use_id`], substituting the id for every `[id]` in `template`.
/// The template is only read on the first render.
pub fn use_id_with(template: &str) -> String {
    let id = use_named_hook("use_id", |_, _| {
        let n = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        template.replace("[id]", &format!("arbor-{n}"))
    });
    (*id).clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::testing::TestFrame;
    use std::cell::Cell;

    #[test]
    fn use_state_persists_across_renders() {
        let mut frame = TestFrame::new();
        let (first, set) = frame.render(|| use_state(|| 42));
        assert_eq!(first, 42);
        set.set(100);
        let (second, _) = frame.render(|| use_state(|| 0));
        assert_eq!(second, 100);
    }

    #[test]
    fn setter_update_mutates_in_place() {
        let mut frame = TestFrame::new();
        let (_, set) = frame.render(|| use_state(Vec::<u8>::new));
        set.update(|v| v.push(1));
        set.update(|v| v.push(2));
        assert_eq!(set.get(), vec![1, 2]);
    }

    #[test]
    fn use_ref_persists_without_rerenders() {
        let mut frame = TestFrame::new();
        let first = frame.render(|| use_ref(|| 0));
        *first.borrow_mut() = 42;
        let second = frame.render(|| use_ref(|| 0));
        assert_eq!(*second.borrow(), 42);
    }

    #[test]
    fn use_memo_recomputes_only_on_dep_change() {
        let mut frame = TestFrame::new();
        let computes = Cell::new(0);
        let mut render = |dep: &'static str| {
            frame.render(|| {
                use_memo(
                    || {
                        computes.set(computes.get() + 1);
                        format!("computed {dep}")
                    },
                    dep,
                )
            })
        };
        assert_eq!(render("a"), "computed a");
        assert_eq!(render("a"), "computed a");
        assert_eq!(render("b"), "computed b");
        assert_eq!(computes.get(), 2);
    }

    #[test]
    fn use_callback_keeps_the_first_closure() {
        let mut frame = TestFrame::new();
        let one: Rc<dyn Fn() -> i32> = Rc::new(|| 1);
        let two: Rc<dyn Fn() -> i32> = Rc::new(|| 2);
        let first = frame.render(|| use_callback(one, ()));
        let second = frame.render(|| use_callback(two, ()));
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(second(), 1);
    }

    #[test]
    fn ids_are_unique_and_stable() {
        let mut a = TestFrame::new();
        let mut b = TestFrame::new();
        let first = a.render(|| use_id_with("field-[id]"));
        let again = a.render(|| use_id_with("ignored"));
        let other = b.render(use_id);
        assert_eq!(first, again);
        assert!(first.starts_with("field-arbor-"));
        assert_ne!(first, other);
    }
}
