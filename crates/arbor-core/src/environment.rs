//! Inherited, immutable context propagated down the mounted tree.

use std::any::{Any, TypeId};
use std::fmt;
use std::rc::Rc;

/// Typed key into an [`Environment`].
///
/// ```
/// use arbor_core::{Environment, EnvironmentKey};
///
/// struct FontSize;
///
/// impl EnvironmentKey for FontSize {
///     type Value = f32;
///
///     fn default_value() -> f32 {
///         14.0
///     }
/// }
///
/// let root = Environment::new();
/// let large = root.with::<FontSize>(20.0);
/// assert_eq!(root.get::<FontSize>(), 14.0);
/// assert_eq!(large.get::<FontSize>(), 20.0);
/// ```
pub trait EnvironmentKey: 'static {
    type Value: Clone + 'static;

    fn default_value() -> Self::Value;
}

struct Frame {
    key: TypeId,
    value: Rc<dyn Any>,
    parent: Option<Rc<Frame>>,
}

/// Persistent chain of bindings. Overriding a key pushes a frame in front of
/// the current chain, so a subtree's environment shares every ancestor frame
/// with its parent instead of copying the map.
#[derive(Clone, Default)]
pub struct Environment {
    head: Option<Rc<Frame>>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value bound for `K`, falling back to [`EnvironmentKey::default_value`].
    pub fn get<K: EnvironmentKey>(&self) -> K::Value {
        self.try_get::<K>().unwrap_or_else(K::default_value)
    }

    /// Value explicitly bound for `K` by some ancestor, if any.
    pub fn try_get<K: EnvironmentKey>(&self) -> Option<K::Value> {
        let key = TypeId::of::<K>();
        self.frames()
            .find(|frame| frame.key == key)
            .and_then(|frame| frame.value.downcast_ref::<K::Value>())
            .cloned()
    }

    pub fn contains<K: EnvironmentKey>(&self) -> bool {
        let key = TypeId::of::<K>();
        self.frames().any(|frame| frame.key == key)
    }

    /// Returns a new environment binding `K` to `value`; `self` is unchanged.
    pub fn with<K: EnvironmentKey>(&self, value: K::Value) -> Environment {
        Environment {
            head: Some(Rc::new(Frame {
                key: TypeId::of::<K>(),
                value: Rc::new(value),
                parent: self.head.clone(),
            })),
        }
    }

    /// Whether both environments are the very same chain.
    pub fn ptr_eq(&self, other: &Environment) -> bool {
        match (&self.head, &other.head) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    /// Number of bindings in the chain, shadowed ones included.
    pub fn depth(&self) -> usize {
        self.frames().count()
    }

    fn frames(&self) -> impl Iterator<Item = &Frame> {
        std::iter::successors(self.head.as_deref(), |&frame| frame.parent.as_deref())
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("depth", &self.depth())
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/environment_tests.rs"]
mod tests;
