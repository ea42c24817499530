//! Update-request queue shared between a reconciler and its state setters.
//!
//! The reconciler owns the only strong reference. Setters, event handlers and
//! unmount completions hold [`UpdateHandle`]s, which quietly stop working once
//! the reconciler is gone.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::Arc;

use log::trace;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::node::NodeId;
use crate::platform::RuntimeScheduler;

pub(crate) struct UpdateQueueInner {
    scheduler: Arc<dyn RuntimeScheduler>,
    needs_pass: Cell<bool>,
    /// Last value written per `(node, state cell)` since the previous batch.
    pending_values: RefCell<FxHashMap<(NodeId, usize), Box<dyn Any>>>,
    dirty_nodes: RefCell<FxHashSet<NodeId>>,
    dirty_queue: RefCell<Vec<NodeId>>,
    outstanding_unmounts: Cell<usize>,
}

impl UpdateQueueInner {
    fn new(scheduler: Arc<dyn RuntimeScheduler>) -> Self {
        Self {
            scheduler,
            needs_pass: Cell::new(false),
            pending_values: RefCell::new(FxHashMap::default()),
            dirty_nodes: RefCell::new(FxHashSet::default()),
            dirty_queue: RefCell::new(Vec::new()),
            outstanding_unmounts: Cell::new(0),
        }
    }

    fn schedule(&self) {
        if !self.needs_pass.replace(true) {
            self.scheduler.schedule_frame();
        }
    }

    fn mark_dirty(&self, node: NodeId) {
        if self.dirty_nodes.borrow_mut().insert(node) {
            self.dirty_queue.borrow_mut().push(node);
        }
        self.schedule();
    }

    fn enqueue_state(&self, node: NodeId, index: usize, value: Box<dyn Any>) {
        trace!("queued state #{index} for {node}");
        self.pending_values.borrow_mut().insert((node, index), value);
        self.mark_dirty(node);
    }

    pub(crate) fn unmount_started(&self) {
        self.outstanding_unmounts
            .set(self.outstanding_unmounts.get() + 1);
    }

    pub(crate) fn unmount_completed(&self) {
        let outstanding = self.outstanding_unmounts.get();
        debug_assert!(outstanding > 0, "unmount completion count underflowed");
        self.outstanding_unmounts.set(outstanding.saturating_sub(1));
    }
}

/// Everything queued since the previous batch.
pub(crate) struct PendingBatch {
    pub(crate) values: Vec<((NodeId, usize), Box<dyn Any>)>,
    pub(crate) dirty: Vec<NodeId>,
}

impl PendingBatch {
    pub(crate) fn is_empty(&self) -> bool {
        self.values.is_empty() && self.dirty.is_empty()
    }
}

pub(crate) struct UpdateQueue {
    inner: Rc<UpdateQueueInner>,
}

impl UpdateQueue {
    pub(crate) fn new(scheduler: Arc<dyn RuntimeScheduler>) -> Self {
        Self {
            inner: Rc::new(UpdateQueueInner::new(scheduler)),
        }
    }

    pub(crate) fn handle(&self) -> UpdateHandle {
        UpdateHandle {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub(crate) fn has_pending(&self) -> bool {
        !self.inner.dirty_queue.borrow().is_empty()
    }

    pub(crate) fn take_batch(&self) -> PendingBatch {
        self.inner.needs_pass.set(false);
        let values = self.inner.pending_values.borrow_mut().drain().collect();
        self.inner.dirty_nodes.borrow_mut().clear();
        let dirty = std::mem::take(&mut *self.inner.dirty_queue.borrow_mut());
        PendingBatch { values, dirty }
    }

    pub(crate) fn outstanding_unmounts(&self) -> usize {
        self.inner.outstanding_unmounts.get()
    }
}

/// Weak handle for requesting updates from outside a render call.
#[derive(Clone)]
pub struct UpdateHandle {
    inner: Weak<UpdateQueueInner>,
}

impl UpdateHandle {
    /// Queues `value` for state cell `index` of the composite owning `node`.
    ///
    /// Returns `false` when the reconciler no longer exists. Requests naming a
    /// node that has since been unmounted are accepted here and dropped by the
    /// next batch.
    pub fn queue_state<T: 'static>(&self, node: NodeId, index: usize, value: T) -> bool {
        match self.inner.upgrade() {
            Some(inner) => {
                inner.enqueue_state(node, index, Box::new(value));
                true
            }
            None => false,
        }
    }

    /// Asks for a re-render of the composite owning `node` without touching state.
    pub fn request_update(&self, node: NodeId) -> bool {
        match self.inner.upgrade() {
            Some(inner) => {
                inner.mark_dirty(node);
                true
            }
            None => false,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }

    pub(crate) fn downgrade_inner(&self) -> Weak<UpdateQueueInner> {
        self.inner.clone()
    }
}
