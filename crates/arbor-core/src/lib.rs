#![doc = r"Stack reconciler for declarative view trees: mounting, hooks, environment and the renderer contract."]

pub mod cell;
pub mod environment;
mod error;
mod hooks;
mod node;
pub mod platform;
mod queue;
mod reconciler;
pub mod renderer;
pub mod view;

pub use cell::MutableCell;
pub use environment::{Environment, EnvironmentKey};
pub use error::{HookDiagnostic, HookError, ReconcileError};
pub use hooks::{EffectResult, HookKind, RenderScope, StateSetter};
pub use node::{MountedKind, NodeId, NodeInfo};
pub use platform::{DefaultScheduler, RuntimeScheduler};
pub use queue::UpdateHandle;
pub use reconciler::{HookMismatchPolicy, Reconciler, ReconcilerOptions};
pub use renderer::{Renderer, UnmountCompletion};
pub use view::{Component, CompositeView, HostView, Primitive, View, ViewTag};
