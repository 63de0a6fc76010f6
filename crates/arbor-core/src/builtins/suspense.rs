//! Suspense: render a fallback until deferred content resolves.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::FutureExt;
use futures_util::future::{LocalBoxFuture, Shared};

use crate::component::{Component, RenderResult};
use crate::element::{ComponentElement, Element, component_of};
use crate::hooks::{use_lifetime_effect, use_ref, use_spawner, use_state};

type SharedRender = Shared<LocalBoxFuture<'static, Result<Element, Rc<anyhow::Error>>>>;

static NEXT_DEFERRED: AtomicU64 = AtomicU64::new(1);

/// Content that becomes available later.
///
/// Clones share the same underlying future and resolve together. Two
/// `Deferred` values are the same content only if one is a clone of the
/// other.
#[derive(Clone)]
pub struct Deferred {
    id: u64,
    future: SharedRender,
}

impl Deferred {
    pub fn new(future: impl Future<Output = RenderResult> + 'static) -> Self {
        let future = future.map(|result| result.map_err(Rc::new)).boxed_local().shared();
        Self {
            id: NEXT_DEFERRED.fetch_add(1, Ordering::Relaxed),
            future,
        }
    }

    /// Content that is available immediately.
    pub fn ready(element: impl Into<Element>) -> Self {
        let element = element.into();
        Self::new(async move { Ok(element) })
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl PartialEq for Deferred {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred").field("id", &self.id).finish()
    }
}

/// A component whose implementation arrives asynchronously.
///
/// The loader runs once, on first poll. Every [`Lazy::with`] shares its
/// result, so the same `Lazy` can back any number of [`suspense`] boundaries.
///
/// ```ignore
/// let chart = lazy(async { Ok(Chart::load_theme().await?) });
/// suspense(SuspenseProps::new(text("Loading chart"), chart.with(data)))
/// ```
pub struct Lazy<C> {
    loaded: Shared<LocalBoxFuture<'static, Result<Rc<C>, Rc<anyhow::Error>>>>,
}

impl<C> Clone for Lazy<C> {
    fn clone(&self) -> Self {
        Self {
            loaded: self.loaded.clone(),
        }
    }
}

pub fn lazy<C, F>(loader: F) -> Lazy<C>
where
    C: Component,
    F: Future<Output = anyhow::Result<C>> + 'static,
{
    let loaded = loader
        .map(|result| result.map(Rc::new).map_err(Rc::new))
        .boxed_local()
        .shared();
    Lazy { loaded }
}

impl<C: Component> Lazy<C> {
    /// Content rendering the loaded component with `props`.
    pub fn with(&self, props: C::Props) -> Deferred {
        let loaded = self.loaded.clone();
        Deferred::new(async move {
            let component = loaded
                .await
                .map_err(|error| anyhow::anyhow!("failed to load component: {error:#}"))?;
            Ok(component_of(Loaded(component), props).into())
        })
    }
}

struct Loaded<C>(Rc<C>);

impl<C: Component> Component for Loaded<C> {
    type Props = C::Props;

    fn render(&self, props: &C::Props) -> RenderResult {
        self.0.render(props)
    }

    fn name(&self) -> &'static str {
        self.0.name()
    }

    fn variant(&self) -> Option<usize> {
        self.0.variant()
    }
}

/// Callback for deferred content that failed.
pub type RejectHandler = Rc<dyn Fn(&anyhow::Error)>;

#[derive(Clone)]
pub struct SuspenseProps {
    pub fallback: Element,
    pub content: Deferred,
    pub on_reject: Option<RejectHandler>,
}

impl SuspenseProps {
    pub fn new(fallback: impl Into<Element>, content: Deferred) -> Self {
        Self {
            fallback: fallback.into(),
            content,
            on_reject: None,
        }
    }

    pub fn on_reject(mut self, handler: impl Fn(&anyhow::Error) + 'static) -> Self {
        self.on_reject = Some(Rc::new(handler));
        self
    }
}

/// A Suspense descriptor.
///
/// ```ignore
/// let profile = Deferred::new(async move {
///     let user = fetch_user(id).await?;
///     Ok(h("p").child(user.name).into())
/// });
/// suspense(SuspenseProps::new(text("Loading…"), profile))
/// ```
#[track_caller]
pub fn suspense(props: SuspenseProps) -> ComponentElement {
    component_of(Suspense, props)
}

/// Renders `fallback` until `content` resolves, then the resolved element.
///
/// A new [`Deferred`] in the props starts over from the fallback; results
/// of deferreds that have been replaced are discarded. A rejected deferred
/// leaves the fallback in place.
pub struct Suspense;

impl Component for Suspense {
    type Props = SuspenseProps;

    fn render(&self, props: &SuspenseProps) -> RenderResult {
        render_suspense(props)
    }
}

fn render_suspense(props: &SuspenseProps) -> RenderResult {
    let resolved = use_ref(|| None::<Element>);
    let (fulfilled, set_fulfilled) = use_state(|| false);
    let latest = use_ref(|| 0u64);
    let hanging = use_ref(|| props.content.clone());
    let on_reject = use_ref(|| props.on_reject.clone());
    on_reject.set(props.on_reject.clone());
    let spawner = use_spawner();

    let same_content = *hanging.borrow() == props.content;
    if !same_content {
        hanging.set(props.content.clone());
        resolved.set(None);
    }

    let content = props.content.clone();
    let content_id = content.id();
    use_lifetime_effect(
        {
            let latest = latest.clone();
            let resolved = resolved.clone();
            move || {
                let token = {
                    let mut latest = latest.borrow_mut();
                    *latest += 1;
                    *latest
                };
                if set_fulfilled.get() {
                    set_fulfilled.set(false);
                }
                let current = latest.clone();
                spawner.spawn_local(async move {
                    let result = content.future.await;
                    if *current.borrow() != token {
                        tracing::trace!(token, "discarding stale deferred result");
                        return;
                    }
                    match result {
                        Ok(element) => {
                            resolved.set(Some(element));
                            set_fulfilled.set(true);
                        }
                        Err(error) => match on_reject.get() {
                            Some(handler) => handler(&error),
                            None => tracing::error!(%error, "deferred content failed"),
                        },
                    }
                });
                move || *latest.borrow_mut() += 1
            }
        },
        content_id,
    );

    if same_content && fulfilled {
        Ok(resolved.get().unwrap_or_default())
    } else {
        Ok(props.fallback.clone())
    }
}
