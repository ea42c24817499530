//! Testing utilities and harness for Arbor

pub mod primitives;
pub mod test_renderer;
pub mod testing;

pub use primitives::*;
pub use test_renderer::{RenderOp, TargetId, TargetKind, TestRenderer, TestTarget};
pub use testing::*;

pub mod prelude {
    pub use crate::primitives::*;
    pub use crate::test_renderer::{RenderOp, TargetId, TargetKind, TestRenderer};
    pub use crate::testing::*;
    pub use arbor_core::{
        Component, EffectResult, MutableCell, Primitive, RenderScope, StateSetter, View, ViewTag,
    };
}
