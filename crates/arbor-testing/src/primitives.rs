//! Host primitives understood by [`TestRenderer`](crate::TestRenderer).

use std::fmt;
use std::rc::Rc;

use arbor_core::{EnvironmentKey, Primitive, View, ViewTag};

/// A run of text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Text {
    pub content: String,
}

impl Primitive for Text {
    const TAG: ViewTag = ViewTag::new("Text");
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Axis {
    #[default]
    Vertical,
    Horizontal,
}

/// Container laying its children out along `axis`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stack {
    pub axis: Axis,
}

impl Primitive for Stack {
    const TAG: ViewTag = ViewTag::new("Stack");
}

/// Clickable label; [`TestRenderer::click`](crate::TestRenderer::click) runs `action`.
#[derive(Clone)]
pub struct Button {
    pub label: String,
    pub action: Rc<dyn Fn()>,
}

impl fmt::Debug for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Button").field("label", &self.label).finish()
    }
}

impl Primitive for Button {
    const TAG: ViewTag = ViewTag::new("Button");
}

/// Grouping with no native object of its own; its children attach to the
/// enclosing target.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Group;

impl Primitive for Group {
    const TAG: ViewTag = ViewTag::new("Group");
}

/// How text targets render their content.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Case {
    #[default]
    AsIs,
    Upper,
}

/// Environment key read by the renderer when it realises [`Text`].
pub struct TextCase;

impl EnvironmentKey for TextCase {
    type Value = Case;

    fn default_value() -> Case {
        Case::AsIs
    }
}

pub fn text(content: impl Into<String>) -> View {
    View::leaf(Text {
        content: content.into(),
    })
}

pub fn vstack(children: impl IntoIterator<Item = View>) -> View {
    View::host(
        Stack {
            axis: Axis::Vertical,
        },
        children,
    )
}

pub fn hstack(children: impl IntoIterator<Item = View>) -> View {
    View::host(
        Stack {
            axis: Axis::Horizontal,
        },
        children,
    )
}

pub fn button(label: impl Into<String>, action: impl Fn() + 'static) -> View {
    View::leaf(Button {
        label: label.into(),
        action: Rc::new(action),
    })
}

pub fn group(children: impl IntoIterator<Item = View>) -> View {
    View::host(Group, children)
}
