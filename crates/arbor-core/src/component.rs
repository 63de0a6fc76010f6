//! Components: render functions from typed props to descriptors.

use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::marker::PhantomData;

use crate::element::Element;

/// Result of a render call. Errors are type-erased so handlers can match
/// on the concrete type with `downcast_ref`.
pub type RenderResult = anyhow::Result<Element>;

/// A component that can be instantiated by the reconciler.
///
/// ```ignore
/// struct Badge;
///
/// impl Component for Badge {
///     type Props = u32;
///
///     fn render(&self, count: &u32) -> RenderResult {
///         Ok(h("span").attr("class", "badge").child(*count).into())
///     }
/// }
/// ```
pub trait Component: 'static {
    type Props: 'static;

    fn render(&self, props: &Self::Props) -> RenderResult;

    /// Name used in logs, component stacks and devtools.
    fn name(&self) -> &'static str {
        short_type_name(type_name::<Self>())
    }

    /// Tells apart components that share one Rust type, such as different
    /// functions passed through the same `fn` pointer type.
    fn variant(&self) -> Option<usize> {
        None
    }
}

/// The identity of a component: two descriptors refer to the same component
/// exactly when their types and variants match.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentType {
    id: TypeId,
    variant: Option<usize>,
    name: &'static str,
}

impl ComponentType {
    pub fn of<C: Component>(component: &C) -> Self {
        Self {
            id: TypeId::of::<C>(),
            variant: component.variant(),
            name: component.name(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Type-erased component, as stored in descriptors and instances.
pub trait AnyComponent {
    fn component_type(&self) -> ComponentType;
    fn render_any(&self, props: &dyn Any) -> RenderResult;
    fn name(&self) -> &'static str;
}

pub(crate) struct Typed<C>(pub(crate) C);

impl<C: Component> AnyComponent for Typed<C> {
    fn component_type(&self) -> ComponentType {
        ComponentType::of(&self.0)
    }

    fn render_any(&self, props: &dyn Any) -> RenderResult {
        match props.downcast_ref::<C::Props>() {
            Some(props) => self.0.render(props),
            None => Err(anyhow::anyhow!(
                "props passed to `{}` are not `{}`",
                self.0.name(),
                type_name::<C::Props>()
            )),
        }
    }

    fn name(&self) -> &'static str {
        self.0.name()
    }
}

/// Adapter turning a render function into a [`Component`].
///
/// Function items and closures each have their own type. A plain
/// `fn(&P) -> RenderResult` pointer does not, so its address stands in.
pub struct FnComponent<F, P> {
    render: F,
    address: Option<usize>,
    _props: PhantomData<fn(&P)>,
}

impl<F, P> FnComponent<F, P>
where
    F: Fn(&P) -> RenderResult + 'static,
    P: 'static,
{
    pub fn new(render: F) -> Self {
        let address = (&render as &dyn Any)
            .downcast_ref::<fn(&P) -> RenderResult>()
            .map(|pointer| *pointer as usize);
        Self {
            render,
            address,
            _props: PhantomData,
        }
    }
}

impl<F, P> Component for FnComponent<F, P>
where
    F: Fn(&P) -> RenderResult + 'static,
    P: 'static,
{
    type Props = P;

    fn render(&self, props: &P) -> RenderResult {
        (self.render)(props)
    }

    fn name(&self) -> &'static str {
        match self.address {
            Some(_) => "fn",
            None => short_type_name(type_name::<F>()),
        }
    }

    fn variant(&self) -> Option<usize> {
        self.address
    }
}

/// Strip the module path from a type name, keeping closure markers so that
/// `app::{{closure}}` stays recognizable.
fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    let mut segments = base.rsplit("::");
    match (segments.next(), segments.next()) {
        (Some(last), Some(parent)) if last.starts_with("{{") => {
            let start = base.len() - last.len() - parent.len() - 2;
            &base[start..]
        }
        (Some(last), _) => last,
        _ => full,
    }
}
