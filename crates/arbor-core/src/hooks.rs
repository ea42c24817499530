//! Per-component hook storage and the render-time API that reads it.
//!
//! Every composite node owns a [`HookStorage`]. While its render function
//! runs, the reconciler lends that storage to a [`RenderScope`] together with
//! the node's environment and a handle to the update queue. Hooks are matched
//! to cells purely by call order; the storage records the kind of every call
//! site so that a render which calls hooks in a different order or number
//! than the previous one is detected instead of silently misreading cells.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

use log::{debug, trace};
use smallvec::SmallVec;

use crate::cell::MutableCell;
use crate::environment::{Environment, EnvironmentKey};
use crate::error::HookError;
use crate::node::NodeId;
use crate::queue::UpdateHandle;

/// Kind of hook recorded for a call site.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum HookKind {
    State,
    Effect,
    Ref,
}

type Finalizer = Box<dyn FnOnce()>;
type EffectBody = Box<dyn FnOnce() -> EffectResult>;

/// What an effect body returns: optionally, a finalizer to run before the
/// effect's next run or when its node unmounts.
#[derive(Default)]
pub struct EffectResult {
    finalizer: Option<Finalizer>,
}

impl EffectResult {
    pub fn new(finalizer: impl FnOnce() + 'static) -> Self {
        Self {
            finalizer: Some(Box::new(finalizer)),
        }
    }

    /// No cleanup needed.
    pub fn none() -> Self {
        Self::default()
    }

    fn into_finalizer(self) -> Option<Finalizer> {
        self.finalizer
    }
}

impl fmt::Debug for EffectResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectResult")
            .field("has_finalizer", &self.finalizer.is_some())
            .finish()
    }
}

#[derive(Default)]
struct EffectCell {
    /// `None` for effects that run after every render.
    dependency: Option<Box<dyn Any>>,
    pending: Option<EffectBody>,
    finalizer: Option<Finalizer>,
}

impl EffectCell {
    fn run_finalizer(&mut self) {
        if let Some(finalizer) = self.finalizer.take() {
            finalizer();
        }
    }

    fn run_pending(&mut self) {
        if let Some(body) = self.pending.take() {
            self.run_finalizer();
            self.finalizer = body().into_finalizer();
        }
    }
}

impl Drop for EffectCell {
    fn drop(&mut self) {
        self.run_finalizer();
    }
}

#[derive(Default)]
pub(crate) struct HookStorage {
    /// Kind of every call site, in call order, as of the last render.
    schema: Vec<HookKind>,
    states: Vec<Box<dyn Any>>,
    effects: Vec<EffectCell>,
    refs: Vec<Box<dyn Any>>,
    /// Effect cells whose body is due in the next effect flush.
    scheduled: SmallVec<[usize; 4]>,
    /// Finalizers of effect cells discarded by a misaligned render.
    retired: Vec<Finalizer>,
    renders: usize,
}

impl HookStorage {
    /// Overwrites state cell `index` with a value queued by a setter. A value
    /// of a different type than the cell holds is dropped.
    pub(crate) fn write_state(&mut self, index: usize, value: Box<dyn Any>) -> bool {
        match self.states.get_mut(index) {
            Some(cell) if (**cell).type_id() == (*value).type_id() => {
                *cell = value;
                true
            }
            Some(_) => {
                debug!("state cell #{index} holds another type; queued value dropped");
                false
            }
            None => false,
        }
    }

    pub(crate) fn has_pending_effects(&self) -> bool {
        !self.scheduled.is_empty() || !self.retired.is_empty()
    }

    /// Runs scheduled effects in call order, each after its previous finalizer.
    pub(crate) fn run_effects(&mut self) {
        for finalizer in self.retired.drain(..) {
            finalizer();
        }
        for index in std::mem::take(&mut self.scheduled) {
            if let Some(cell) = self.effects.get_mut(index) {
                cell.run_pending();
            }
        }
    }

    /// Runs every live finalizer; pending effect bodies are discarded.
    pub(crate) fn finalize(&mut self) {
        self.scheduled.clear();
        for finalizer in self.retired.drain(..) {
            finalizer();
        }
        for cell in &mut self.effects {
            cell.pending = None;
            cell.run_finalizer();
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.schema.len()
    }

    /// Drops every cell from call site `cursor.call_site` on.
    fn truncate(&mut self, call_site: usize, cursor: &Cursor) {
        self.schema.truncate(call_site);
        self.states.truncate(cursor.state);
        self.refs.truncate(cursor.reference);
        for mut cell in self.effects.drain(cursor.effect..) {
            cell.pending = None;
            if let Some(finalizer) = cell.finalizer.take() {
                self.retired.push(finalizer);
            }
        }
        let live = cursor.effect;
        self.scheduled.retain(|index| *index < live);
    }
}

#[derive(Default, Clone, Copy)]
struct Cursor {
    call_site: usize,
    state: usize,
    effect: usize,
    reference: usize,
}

enum Claim {
    Existing,
    Fresh,
}

/// Result of one render, handed back to the reconciler.
pub(crate) struct RenderOutcome {
    pub(crate) child_environment: Option<Environment>,
    pub(crate) errors: Vec<HookError>,
}

/// Hook and environment access for one render of one composite node.
///
/// Only obtainable inside [`Component::render`](crate::Component::render),
/// which ties every hook call to exactly one mounted node.
pub struct RenderScope<'a> {
    node: NodeId,
    hooks: &'a mut HookStorage,
    updates: &'a UpdateHandle,
    environment: &'a Environment,
    provided: Option<Environment>,
    cursor: Cursor,
    previous_len: usize,
    first_render: bool,
    errors: Vec<HookError>,
}

impl<'a> RenderScope<'a> {
    pub(crate) fn new(
        node: NodeId,
        hooks: &'a mut HookStorage,
        updates: &'a UpdateHandle,
        environment: &'a Environment,
    ) -> Self {
        let previous_len = hooks.len();
        let first_render = hooks.renders == 0;
        Self {
            node,
            hooks,
            updates,
            environment,
            provided: None,
            cursor: Cursor::default(),
            previous_len,
            first_render,
            errors: Vec::new(),
        }
    }

    /// The node being rendered.
    pub fn node_id(&self) -> NodeId {
        self.node
    }

    /// Handle for requesting updates from event handlers created in this render.
    pub fn update_handle(&self) -> UpdateHandle {
        self.updates.clone()
    }

    /// Environment inherited by this node.
    pub fn environment(&self) -> &Environment {
        self.environment
    }

    pub fn read<K: EnvironmentKey>(&self) -> K::Value {
        self.environment.get::<K>()
    }

    /// Overrides `K` for this node's subtree. The node's own reads are not
    /// affected.
    pub fn provide<K: EnvironmentKey>(&mut self, value: K::Value) {
        let base = self
            .provided
            .take()
            .unwrap_or_else(|| self.environment.clone());
        self.provided = Some(base.with::<K>(value));
    }

    /// State cell initialised with `initial` on first render. Later renders
    /// return the stored value; `initial` is ignored.
    pub fn state<T: Clone + 'static>(&mut self, initial: T) -> (T, StateSetter<T>) {
        let call_site = self.cursor.call_site;
        let index = self.cursor.state;
        let claim = self.claim(HookKind::State);
        self.cursor.state += 1;
        let value = match claim {
            Claim::Fresh => {
                self.hooks.states.push(Box::new(initial.clone()));
                initial
            }
            Claim::Existing => match self.hooks.states[index].downcast_ref::<T>() {
                Some(value) => value.clone(),
                None => {
                    self.errors.push(HookError::TypeChanged {
                        index: call_site,
                        kind: HookKind::State,
                    });
                    self.hooks.states[index] = Box::new(initial.clone());
                    initial
                }
            },
        };
        (value, StateSetter::new(self.node, index, self.updates.clone()))
    }

    /// Effect that runs after the first render and after every render in
    /// which `dependency` differs from the previous one.
    pub fn effect<D, F>(&mut self, dependency: D, body: F)
    where
        D: PartialEq + 'static,
        F: FnOnce() -> EffectResult + 'static,
    {
        let call_site = self.cursor.call_site;
        let index = self.cursor.effect;
        let claim = self.claim(HookKind::Effect);
        self.cursor.effect += 1;
        let changed = match claim {
            Claim::Fresh => {
                self.hooks.effects.push(EffectCell::default());
                true
            }
            Claim::Existing => match self.hooks.effects[index].dependency.as_deref() {
                Some(previous) => match previous.downcast_ref::<D>() {
                    Some(previous) => *previous != dependency,
                    None => {
                        self.errors.push(HookError::TypeChanged {
                            index: call_site,
                            kind: HookKind::Effect,
                        });
                        true
                    }
                },
                None => true,
            },
        };
        if changed {
            self.hooks.effects[index].dependency = Some(Box::new(dependency));
            self.schedule(index, Box::new(body));
        } else {
            trace!("effect #{index} of {} unchanged", self.node);
        }
    }

    /// Effect that runs after every render.
    pub fn effect_every_render<F>(&mut self, body: F)
    where
        F: FnOnce() -> EffectResult + 'static,
    {
        let index = self.cursor.effect;
        if let Claim::Fresh = self.claim(HookKind::Effect) {
            self.hooks.effects.push(EffectCell::default());
        }
        self.cursor.effect += 1;
        self.hooks.effects[index].dependency = None;
        self.schedule(index, Box::new(body));
    }

    /// Stable mutable cell. Writing to it never schedules a render.
    pub fn use_ref<T: 'static>(&mut self, initial: T) -> MutableCell<T> {
        let call_site = self.cursor.call_site;
        let index = self.cursor.reference;
        let claim = self.claim(HookKind::Ref);
        self.cursor.reference += 1;
        match claim {
            Claim::Fresh => {
                let cell = MutableCell::new(initial);
                self.hooks.refs.push(Box::new(cell.clone()));
                cell
            }
            Claim::Existing => match self.hooks.refs[index].downcast_ref::<MutableCell<T>>() {
                Some(cell) => cell.clone(),
                None => {
                    self.errors.push(HookError::TypeChanged {
                        index: call_site,
                        kind: HookKind::Ref,
                    });
                    let cell = MutableCell::new(initial);
                    self.hooks.refs[index] = Box::new(cell.clone());
                    cell
                }
            },
        }
    }

    fn schedule(&mut self, index: usize, body: EffectBody) {
        self.hooks.effects[index].pending = Some(body);
        if !self.hooks.scheduled.contains(&index) {
            self.hooks.scheduled.push(index);
        }
    }

    /// Validates the next call site against the recorded schema. On a kind
    /// mismatch every cell from this call site on is discarded and the hook
    /// starts fresh.
    fn claim(&mut self, kind: HookKind) -> Claim {
        let call_site = self.cursor.call_site;
        self.cursor.call_site += 1;
        match self.hooks.schema.get(call_site).copied() {
            Some(recorded) if recorded == kind => Claim::Existing,
            Some(recorded) => {
                debug!(
                    "{}: hook #{call_site} was {recorded:?}, now {kind:?}; resetting from here",
                    self.node
                );
                self.errors.push(HookError::OrderChanged {
                    index: call_site,
                    expected: recorded,
                    found: kind,
                });
                self.hooks.truncate(call_site, &self.cursor);
                self.hooks.schema.push(kind);
                Claim::Fresh
            }
            None => {
                self.hooks.schema.push(kind);
                Claim::Fresh
            }
        }
    }

    pub(crate) fn finish(self) -> RenderOutcome {
        let RenderScope {
            hooks,
            provided,
            cursor,
            previous_len,
            first_render,
            mut errors,
            ..
        } = self;
        let current = cursor.call_site;
        if current < hooks.len() {
            hooks.truncate(current, &cursor);
        }
        if !first_render && current != previous_len {
            errors.push(HookError::CountChanged {
                previous: previous_len,
                current,
            });
        }
        hooks.renders += 1;
        RenderOutcome {
            child_environment: provided,
            errors,
        }
    }
}

/// Queues new values for one state cell.
///
/// Setting never mutates the cell synchronously: the value is queued and the
/// owning node re-renders in the next update pass. Several writes before that
/// pass collapse to the last one.
pub struct StateSetter<T> {
    node: NodeId,
    index: usize,
    updates: UpdateHandle,
    _marker: PhantomData<fn(T)>,
}

impl<T> Clone for StateSetter<T> {
    fn clone(&self) -> Self {
        Self {
            node: self.node,
            index: self.index,
            updates: self.updates.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: 'static> StateSetter<T> {
    fn new(node: NodeId, index: usize, updates: UpdateHandle) -> Self {
        Self {
            node,
            index,
            updates,
            _marker: PhantomData,
        }
    }

    pub fn set(&self, value: T) {
        if !self.updates.queue_state(self.node, self.index, value) {
            debug!("dropping state update for {}: reconciler is gone", self.node);
        }
    }

    /// Node owning the cell.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Position of the cell among the node's state hooks.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl<T> fmt::Debug for StateSetter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateSetter")
            .field("node", &self.node)
            .field("index", &self.index)
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/hook_tests.rs"]
mod tests;
