//! View descriptions: the immutable values produced by every render pass.
//!
//! A [`View`] is either a composite (a user [`Component`] with a render
//! function), a host primitive understood by a [`Renderer`](crate::Renderer),
//! or [`View::Empty`]. The reconciler only ever compares descriptions by their
//! [`ViewTag`]; property values are opaque to it.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::hooks::RenderScope;

/// Statically declared kind of a view.
///
/// Two descriptions are the same kind of node iff their tags are equal. Every
/// instantiation of a generic component shares one tag, so changing type
/// parameters or property values keeps the mounted node (and its state) alive,
/// while changing the kind replaces it.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct ViewTag(&'static str);

impl ViewTag {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub const fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Debug for ViewTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ViewTag({})", self.0)
    }
}

impl fmt::Display for ViewTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Declares a [`ViewTag`] qualified with the calling module path.
///
/// ```
/// use arbor_core::{view_tag, ViewTag};
///
/// const CARD: ViewTag = view_tag!(Card);
/// assert!(CARD.name().ends_with("::Card"));
/// ```
#[macro_export]
macro_rules! view_tag {
    ($name:ident) => {
        $crate::ViewTag::new(concat!(module_path!(), "::", stringify!($name)))
    };
}

/// A user-defined view whose output comes from its render function.
pub trait Component: 'static {
    /// Kind shared by every instantiation of this component.
    const TAG: ViewTag;

    /// Produces the child description. Hooks are requested through `scope`
    /// and must be called unconditionally, in the same order on every render.
    fn render(&self, scope: &mut RenderScope<'_>) -> View;

    /// The component's own property equality. Returning `true` lets the
    /// reconciler skip re-rendering this node when nothing else changed.
    fn props_eq(&self, _previous: &Self) -> bool {
        false
    }
}

/// A renderer-native view kind. Renderers downcast the properties with
/// [`HostView::props`].
pub trait Primitive: 'static {
    const TAG: ViewTag;
}

pub(crate) trait AnyComponent {
    fn tag(&self) -> ViewTag;
    fn render(&self, scope: &mut RenderScope<'_>) -> View;
    fn props_eq(&self, previous: &dyn AnyComponent) -> bool;
    fn as_any(&self) -> &dyn Any;
}

impl<C: Component> AnyComponent for C {
    fn tag(&self) -> ViewTag {
        C::TAG
    }

    fn render(&self, scope: &mut RenderScope<'_>) -> View {
        Component::render(self, scope)
    }

    fn props_eq(&self, previous: &dyn AnyComponent) -> bool {
        previous
            .as_any()
            .downcast_ref::<C>()
            .is_some_and(|previous| Component::props_eq(self, previous))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Description of a composite node.
#[derive(Clone)]
pub struct CompositeView {
    component: Rc<dyn AnyComponent>,
}

impl CompositeView {
    pub fn new<C: Component>(component: C) -> Self {
        Self {
            component: Rc::new(component),
        }
    }

    pub fn tag(&self) -> ViewTag {
        self.component.tag()
    }

    pub fn downcast_ref<C: Component>(&self) -> Option<&C> {
        self.component.as_any().downcast_ref::<C>()
    }

    pub(crate) fn render(&self, scope: &mut RenderScope<'_>) -> View {
        self.component.render(scope)
    }

    pub(crate) fn props_eq(&self, previous: &CompositeView) -> bool {
        self.component.props_eq(&*previous.component)
    }
}

/// Description of a host node: a primitive's properties plus its children.
#[derive(Clone)]
pub struct HostView {
    tag: ViewTag,
    props: Rc<dyn Any>,
    children: Vec<View>,
}

impl HostView {
    pub fn new<P: Primitive>(props: P, children: Vec<View>) -> Self {
        Self {
            tag: P::TAG,
            props: Rc::new(props),
            children,
        }
    }

    pub fn tag(&self) -> ViewTag {
        self.tag
    }

    /// Properties of this host view, if it was built from `P`.
    pub fn props<P: Primitive>(&self) -> Option<&P> {
        self.props.downcast_ref::<P>()
    }

    pub fn is<P: Primitive>(&self) -> bool {
        self.props.is::<P>()
    }

    pub fn children(&self) -> &[View] {
        &self.children
    }
}

/// An immutable view description.
#[derive(Clone, Default)]
pub enum View {
    /// Renders nothing; keeps its position without a mounted node.
    #[default]
    Empty,
    Composite(CompositeView),
    Host(HostView),
}

impl View {
    pub fn composite<C: Component>(component: C) -> Self {
        View::Composite(CompositeView::new(component))
    }

    pub fn host<P: Primitive>(props: P, children: impl IntoIterator<Item = View>) -> Self {
        View::Host(HostView::new(props, children.into_iter().collect()))
    }

    /// A host view without children.
    pub fn leaf<P: Primitive>(props: P) -> Self {
        View::Host(HostView::new(props, Vec::new()))
    }

    pub fn tag(&self) -> Option<ViewTag> {
        match self {
            View::Empty => None,
            View::Composite(view) => Some(view.tag()),
            View::Host(view) => Some(view.tag()),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, View::Empty)
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            View::Empty => f.write_str("Empty"),
            View::Composite(view) => f.debug_tuple("Composite").field(&view.tag()).finish(),
            View::Host(view) => f
                .debug_struct("Host")
                .field("tag", &view.tag())
                .field("children", &view.children())
                .finish(),
        }
    }
}
