//! Contract between the reconciler and a target-specific renderer.

use std::fmt;
use std::rc::Weak;

use log::{debug, warn};

use crate::environment::Environment;
use crate::queue::UpdateQueueInner;
use crate::view::{HostView, ViewTag};

/// Creates, mutates and destroys renderer-native objects on behalf of a
/// [`Reconciler`](crate::Reconciler).
///
/// The reconciler only calls into the renderer for host views. It guarantees
/// that `update` and `unmount` are only ever called with targets that
/// `mount_target` returned and that have not been unmounted yet, and that a
/// host's children are unmounted before the host itself. Sibling targets under
/// one parent are kept in description order.
pub trait Renderer {
    /// Handle to a renderer-native object.
    type Target: Clone;

    /// Whether this renderer can realise hosts of kind `tag`. Mounting a host
    /// the renderer rejects is a framework bug and panics.
    fn accepts(&self, _tag: ViewTag) -> bool {
        true
    }

    /// Creates a native object for `host` and attaches it under `parent`,
    /// immediately before `before` when given, else as the last child.
    /// `before` is always a live child of `parent`. Returning `None` makes the
    /// host a pass-through: its children attach to `parent` directly.
    fn mount_target(
        &mut self,
        parent: &Self::Target,
        before: Option<&Self::Target>,
        host: &HostView,
        environment: &Environment,
    ) -> Option<Self::Target>;

    /// Applies new property values to an existing target.
    fn update(&mut self, target: &Self::Target, host: &HostView, environment: &Environment);

    /// Detaches `target` from `parent` and destroys it. `completion` must be
    /// fired once teardown, including any renderer-side animation, is done.
    fn unmount(
        &mut self,
        target: Self::Target,
        parent: &Self::Target,
        host: &HostView,
        completion: UnmountCompletion,
    );
}

/// One-shot token a renderer fires when a target's teardown has finished.
#[must_use = "an unmount completion should be fired with `complete()`"]
pub struct UnmountCompletion {
    tag: ViewTag,
    queue: Weak<UpdateQueueInner>,
    fired: bool,
}

impl UnmountCompletion {
    pub(crate) fn new(tag: ViewTag, queue: Weak<UpdateQueueInner>) -> Self {
        if let Some(queue) = queue.upgrade() {
            queue.unmount_started();
        }
        Self {
            tag,
            queue,
            fired: false,
        }
    }

    pub fn tag(&self) -> ViewTag {
        self.tag
    }

    /// Reports the teardown as finished. Consumes the token, so it can fire
    /// at most once.
    pub fn complete(mut self) {
        self.fire();
    }

    fn fire(&mut self) {
        self.fired = true;
        debug!("unmount of {} completed", self.tag);
        if let Some(queue) = self.queue.upgrade() {
            queue.unmount_completed();
        }
    }
}

impl Drop for UnmountCompletion {
    fn drop(&mut self) {
        if !self.fired {
            warn!(
                "unmount completion for {} dropped without firing; counting it as done",
                self.tag
            );
            self.fire();
        }
    }
}

impl fmt::Debug for UnmountCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnmountCompletion")
            .field("tag", &self.tag)
            .field("fired", &self.fired)
            .finish()
    }
}
