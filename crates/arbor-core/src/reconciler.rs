//! The stack reconciler: owns the mounted tree and keeps it in line with the
//! view descriptions that renders produce.
//!
//! Mounting walks a description depth-first, rendering composites and asking
//! the [`Renderer`] for a target per host. Updates are never applied
//! synchronously: setters queue values, the [`RuntimeScheduler`] is told that
//! a pass is due, and [`Reconciler::process_pending_updates`] later re-renders
//! only the affected composites. Children are matched to the previous render
//! by position and [`ViewTag`](crate::ViewTag): the same tag updates the
//! existing node in place, any other tag replaces it.

use std::fmt::Write as _;
use std::sync::Arc;

use log::{debug, trace, warn};
use rustc_hash::FxHashSet;

use crate::environment::Environment;
use crate::error::{HookDiagnostic, HookError, ReconcileError};
use crate::hooks::RenderScope;
use crate::node::{Lifecycle, MountedNode, NodeArena, NodeId, NodeInfo, NodeKind};
use crate::platform::{DefaultScheduler, RuntimeScheduler};
use crate::queue::{UpdateHandle, UpdateQueue};
use crate::renderer::{Renderer, UnmountCompletion};
use crate::view::View;

/// What to do when a composite calls its hooks differently than last render.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum HookMismatchPolicy {
    /// Recover, finish the pass and return [`ReconcileError::HookMisuse`].
    #[default]
    Report,
    /// Panic at the offending render.
    Panic,
}

#[derive(Clone, Debug)]
pub struct ReconcilerOptions {
    pub hook_mismatch: HookMismatchPolicy,
    /// Upper bound on batches run by [`Reconciler::run_until_idle`].
    pub max_update_passes: usize,
    /// Environment the root is mounted with.
    pub environment: Environment,
}

impl Default for ReconcilerOptions {
    fn default() -> Self {
        Self {
            hook_mismatch: HookMismatchPolicy::Report,
            max_update_passes: 100,
            environment: Environment::new(),
        }
    }
}

pub struct Reconciler<R: Renderer> {
    renderer: R,
    root_target: R::Target,
    root: Option<NodeId>,
    nodes: NodeArena<R::Target>,
    queue: UpdateQueue,
    handle: UpdateHandle,
    options: ReconcilerOptions,
    /// Composites with effects due, in post-order.
    pending_effects: Vec<NodeId>,
    /// Composites rendered during the current batch.
    rendered: FxHashSet<NodeId>,
    diagnostics: Vec<HookDiagnostic>,
}

impl<R: Renderer> Reconciler<R> {
    /// Mounts `root_view` under `root_target` with default options.
    pub fn new(renderer: R, root_target: R::Target, root_view: View) -> Self {
        Self::with_options(
            renderer,
            root_target,
            root_view,
            ReconcilerOptions::default(),
            Arc::new(DefaultScheduler),
        )
    }

    pub fn with_options(
        renderer: R,
        root_target: R::Target,
        root_view: View,
        options: ReconcilerOptions,
        scheduler: Arc<dyn RuntimeScheduler>,
    ) -> Self {
        let queue = UpdateQueue::new(scheduler);
        let handle = queue.handle();
        let mut reconciler = Self {
            renderer,
            root_target,
            root: None,
            nodes: NodeArena::default(),
            queue,
            handle,
            options,
            pending_effects: Vec::new(),
            rendered: FxHashSet::default(),
            diagnostics: Vec::new(),
        };
        let target = reconciler.root_target.clone();
        let environment = reconciler.options.environment.clone();
        reconciler.root = reconciler.mount_view(root_view, None, 0, 0, target, environment);
        if let Err(error) = reconciler.commit() {
            warn!("initial mount: {error}");
        }
        reconciler
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn root_target(&self) -> &R::Target {
        &self.root_target
    }

    pub fn options(&self) -> &ReconcilerOptions {
        &self.options
    }

    /// Number of live mounted nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_info(&self, id: NodeId) -> Option<NodeInfo> {
        self.nodes.get(id).map(|node| node.info(id))
    }

    /// Unmount completions handed to the renderer that have not fired yet.
    pub fn outstanding_unmounts(&self) -> usize {
        self.queue.outstanding_unmounts()
    }

    pub fn update_handle(&self) -> UpdateHandle {
        self.handle.clone()
    }

    /// Queues `value` for state cell `index` owned by `node`, or by its
    /// nearest composite ancestor when `node` is a host.
    pub fn queue_state<T: 'static>(&self, node: NodeId, index: usize, value: T) {
        self.handle.queue_state(node, index, value);
    }

    pub fn has_pending_updates(&self) -> bool {
        self.queue.has_pending()
    }

    /// Runs one batch. Returns whether there was anything to do.
    pub fn process_pending_updates(&mut self) -> Result<bool, ReconcileError> {
        let batch = self.queue.take_batch();
        if batch.is_empty() {
            return Ok(false);
        }
        debug!(
            "update batch: {} value(s), {} request(s)",
            batch.values.len(),
            batch.dirty.len()
        );

        for ((node, index), value) in batch.values {
            let Some(owner) = self.owning_composite(node) else {
                debug!("dropping state update for stale node {node}");
                continue;
            };
            if let NodeKind::Composite(composite) = &mut self.nodes.expect_mut(owner).kind {
                if !composite.hooks.write_state(index, value) {
                    debug!("state update for {owner} cell #{index} dropped");
                }
            }
        }

        let mut seen = FxHashSet::default();
        let mut dirty = Vec::with_capacity(batch.dirty.len());
        for node in batch.dirty {
            match self.owning_composite(node) {
                Some(owner) => {
                    if seen.insert(owner) {
                        dirty.push((self.nodes.expect(owner).depth, owner));
                    }
                }
                None => debug!("dropping update request for stale node {node}"),
            }
        }
        dirty.sort_by_key(|(depth, _)| *depth);

        self.rendered.clear();
        for (_, id) in dirty {
            if !self.nodes.contains(id) {
                trace!("{id} was unmounted earlier in this batch");
                continue;
            }
            if self.rendered.contains(&id) {
                trace!("{id} already rendered in this batch");
                continue;
            }
            self.nodes.expect_mut(id).update_count += 1;
            self.render_and_diff(id);
        }
        self.commit()?;
        Ok(true)
    }

    /// Runs batches until no updates are pending. Returns the number of
    /// batches run; hook diagnostics from all of them are reported together.
    pub fn run_until_idle(&mut self) -> Result<usize, ReconcileError> {
        let mut passes = 0;
        let mut diagnostics = Vec::new();
        while self.has_pending_updates() {
            if passes == self.options.max_update_passes {
                return Err(ReconcileError::UpdateLoop { passes });
            }
            match self.process_pending_updates() {
                Ok(_) => {}
                Err(ReconcileError::HookMisuse(found)) => diagnostics.extend(found),
                Err(error) => return Err(error),
            }
            passes += 1;
        }
        if diagnostics.is_empty() {
            Ok(passes)
        } else {
            Err(ReconcileError::HookMisuse(diagnostics))
        }
    }

    /// Diffs a new root description against the mounted root.
    pub fn set_root(&mut self, view: View) -> Result<(), ReconcileError> {
        let target = self.root_target.clone();
        let environment = self.options.environment.clone();
        let previous = self.root.take();
        self.rendered.clear();
        self.root = self.reconcile_child(None, 0, 0, &target, &environment, previous, view);
        self.commit()
    }

    /// Tears the whole tree down. Calling it again does nothing.
    pub fn unmount(&mut self) {
        if let Some(root) = self.root.take() {
            debug!("unmounting root {root}");
            self.unmount_node(root);
            self.flush_effects();
        }
    }

    /// Indented outline of the mounted tree.
    pub fn dump_tree(&self) -> String {
        let mut output = String::new();
        match self.root {
            Some(root) => self.dump_node(&mut output, root, 0),
            None => output.push_str("(no root)\n"),
        }
        output
    }

    fn dump_node(&self, output: &mut String, id: NodeId, depth: usize) {
        let indent = "  ".repeat(depth);
        let Some(node) = self.nodes.get(id) else {
            let _ = writeln!(output, "{indent}[{id}] (missing)");
            return;
        };
        let _ = match &node.kind {
            NodeKind::Host(host) if host.target.is_none() => {
                writeln!(output, "{indent}[{id}] {} (pass-through)", node.tag())
            }
            _ => writeln!(output, "{indent}[{id}] {}", node.tag()),
        };
        for child in &node.children {
            match child {
                Some(child) => self.dump_node(output, *child, depth + 1),
                None => {
                    let _ = writeln!(output, "{indent}  (empty)");
                }
            }
        }
    }

    fn mount_view(
        &mut self,
        view: View,
        parent: Option<NodeId>,
        slot: usize,
        depth: usize,
        parent_target: R::Target,
        environment: Environment,
    ) -> Option<NodeId> {
        let node = MountedNode::from_view(view, parent, slot, depth, parent_target, environment)?;
        let id = self.nodes.insert(node);
        self.mount_node(id);
        Some(id)
    }

    fn mount_node(&mut self, id: NodeId) {
        let node = self.nodes.expect_mut(id);
        assert_eq!(node.lifecycle, Lifecycle::Created, "{id} mounted twice");
        node.lifecycle = Lifecycle::Mounted;
        debug!("mount {} {id}", node.tag());
        if node.is_composite() {
            self.render_and_diff(id);
        } else {
            self.mount_host(id);
        }
    }

    fn mount_host(&mut self, id: NodeId) {
        let node = self.nodes.expect(id);
        let NodeKind::Host(host) = &node.kind else {
            unreachable!("{id} is not a host");
        };
        let tag = host.view.tag();
        assert!(
            self.renderer.accepts(tag),
            "renderer cannot handle host kind `{tag}`"
        );
        let before = self.next_sibling_target(id);
        let target = self.renderer.mount_target(
            &node.parent_target,
            before.as_ref(),
            &host.view,
            &node.environment,
        );
        if target.is_none() {
            trace!("{tag} {id} is a pass-through");
        }
        let children = host.view.children().to_vec();
        if let NodeKind::Host(host) = &mut self.nodes.expect_mut(id).kind {
            host.target = target;
        }
        self.reconcile_children(id, children);
    }

    fn update_node(&mut self, id: NodeId, view: View, environment: &Environment) {
        let node = self.nodes.expect_mut(id);
        assert_eq!(
            node.lifecycle,
            Lifecycle::Mounted,
            "update of {id} which is not mounted"
        );
        let environment_changed = !node.environment.ptr_eq(environment);
        node.environment = environment.clone();
        let tag = node.tag();
        let is_host = match (&mut node.kind, view) {
            (NodeKind::Composite(composite), View::Composite(view)) => {
                let unchanged = !environment_changed && view.props_eq(&composite.view);
                composite.view = view;
                if unchanged {
                    trace!("{id} unchanged; render skipped");
                    return;
                }
                false
            }
            (NodeKind::Host(host), View::Host(view)) => {
                host.view = view;
                true
            }
            (_, view) => panic!("identity mismatch: {tag} {id} cannot take {view:?}"),
        };
        node.update_count += 1;
        debug!("update {tag} {id}");
        if is_host {
            self.update_host(id);
        } else {
            self.render_and_diff(id);
        }
    }

    fn update_host(&mut self, id: NodeId) {
        let node = self.nodes.expect(id);
        let NodeKind::Host(host) = &node.kind else {
            unreachable!("{id} is not a host");
        };
        if let Some(target) = &host.target {
            self.renderer.update(target, &host.view, &node.environment);
        }
        let children = host.view.children().to_vec();
        self.reconcile_children(id, children);
    }

    /// Renders composite `id` and diffs its single child.
    fn render_and_diff(&mut self, id: NodeId) {
        let child = self.render(id);
        self.reconcile_children(id, vec![child]);
        if let NodeKind::Composite(composite) = &self.nodes.expect(id).kind {
            if composite.hooks.has_pending_effects() {
                self.pending_effects.push(id);
            }
        }
    }

    fn render(&mut self, id: NodeId) -> View {
        let node = self.nodes.expect_mut(id);
        node.render_count += 1;
        let tag = node.tag();
        let environment = node.environment.clone();
        let NodeKind::Composite(composite) = &mut node.kind else {
            unreachable!("{id} is not a composite");
        };
        let view = composite.view.clone();
        let mut hooks = std::mem::take(&mut composite.hooks);

        trace!("render {tag} {id}");
        let mut scope = RenderScope::new(id, &mut hooks, &self.handle, &environment);
        let child = view.render(&mut scope);
        let outcome = scope.finish();

        if let NodeKind::Composite(composite) = &mut self.nodes.expect_mut(id).kind {
            composite.hooks = hooks;
            composite.child_environment = outcome.child_environment.unwrap_or(environment);
        }
        self.rendered.insert(id);
        if !outcome.errors.is_empty() {
            self.report_hook_errors(id, outcome.errors);
        }
        child
    }

    fn report_hook_errors(&mut self, node: NodeId, errors: Vec<HookError>) {
        let tag = self.nodes.expect(node).tag();
        for error in errors {
            let diagnostic = HookDiagnostic { node, tag, error };
            if self.options.hook_mismatch == HookMismatchPolicy::Panic {
                panic!("hook misuse: {diagnostic}");
            }
            warn!("hook misuse: {diagnostic}");
            self.diagnostics.push(diagnostic);
        }
    }

    /// Positional diff of `parent`'s children against `new`.
    ///
    /// The child list is rewritten slot by slot so that later, not yet
    /// diffed siblings stay visible to [`Self::next_sibling_target`].
    fn reconcile_children(&mut self, parent: NodeId, new: Vec<View>) {
        let node = self.nodes.expect(parent);
        let depth = node.depth + 1;
        let (target, environment) = node.child_context();
        let count = new.len();

        for (slot, view) in new.into_iter().enumerate() {
            let previous = self.nodes.expect(parent).children.get(slot).copied().flatten();
            let child = self.reconcile_child(
                Some(parent),
                slot,
                depth,
                &target,
                &environment,
                previous,
                view,
            );
            let children = &mut self.nodes.expect_mut(parent).children;
            if slot < children.len() {
                children[slot] = child;
            } else {
                children.push(child);
            }
        }

        let children = &mut self.nodes.expect_mut(parent).children;
        let surplus: Vec<NodeId> = children.iter().skip(count).flatten().copied().collect();
        children.truncate(count);
        for child in surplus {
            self.unmount_node(child);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn reconcile_child(
        &mut self,
        parent: Option<NodeId>,
        slot: usize,
        depth: usize,
        target: &R::Target,
        environment: &Environment,
        previous: Option<NodeId>,
        view: View,
    ) -> Option<NodeId> {
        if let Some(previous) = previous {
            if view.tag() == Some(self.nodes.expect(previous).tag()) {
                self.update_node(previous, view, environment);
                return Some(previous);
            }
            self.unmount_node(previous);
        }
        self.mount_view(view, parent, slot, depth, target.clone(), environment.clone())
    }

    fn unmount_node(&mut self, id: NodeId) {
        let node = self.nodes.expect_mut(id);
        assert_eq!(
            node.lifecycle,
            Lifecycle::Mounted,
            "unmount of {id} which is not mounted"
        );
        node.lifecycle = Lifecycle::Unmounting;
        let children = std::mem::take(&mut node.children);
        for child in children.into_iter().flatten() {
            self.unmount_node(child);
        }

        let Some(node) = self.nodes.remove(id) else {
            unreachable!("{id} vanished while unmounting");
        };
        debug!("unmount {} {id}", node.tag());
        match node.kind {
            NodeKind::Composite(mut composite) => composite.hooks.finalize(),
            NodeKind::Host(host) => {
                if let Some(target) = host.target {
                    let completion =
                        UnmountCompletion::new(host.view.tag(), self.handle.downgrade_inner());
                    self.renderer
                        .unmount(target, &node.parent_target, &host.view, completion);
                }
            }
        }
    }

    /// First target mounted after `id` under the same renderer parent, found
    /// by walking later sibling slots up through composites and pass-through
    /// hosts. `None` when `id` belongs at the end.
    fn next_sibling_target(&self, mut id: NodeId) -> Option<R::Target> {
        loop {
            let node = self.nodes.get(id)?;
            let parent_id = node.parent?;
            let parent = self.nodes.get(parent_id)?;
            let later = parent.children.iter().skip(node.slot + 1).flatten();
            if let Some(target) = later.filter_map(|sibling| self.first_target(*sibling)).next() {
                return Some(target);
            }
            if let NodeKind::Host(host) = &parent.kind {
                if host.target.is_some() {
                    return None;
                }
            }
            id = parent_id;
        }
    }

    /// Leftmost target in the subtree rooted at `id`.
    fn first_target(&self, id: NodeId) -> Option<R::Target> {
        let node = self.nodes.get(id)?;
        if let NodeKind::Host(host) = &node.kind {
            if let Some(target) = &host.target {
                return Some(target.clone());
            }
        }
        node.children
            .iter()
            .flatten()
            .find_map(|child| self.first_target(*child))
    }

    /// The node itself if it is a composite, else its nearest composite
    /// ancestor. `None` for stale ids.
    fn owning_composite(&self, mut id: NodeId) -> Option<NodeId> {
        loop {
            let node = self.nodes.get(id)?;
            if node.is_composite() {
                return Some(id);
            }
            id = node.parent?;
        }
    }

    fn finalize_subtree(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        let children = std::mem::take(&mut node.children);
        for child in children.into_iter().flatten() {
            self.finalize_subtree(child);
        }
        if let Some(node) = self.nodes.get_mut(id) {
            if let NodeKind::Composite(composite) = &mut node.kind {
                composite.hooks.finalize();
            }
        }
    }

    fn flush_effects(&mut self) {
        for id in std::mem::take(&mut self.pending_effects) {
            if let Some(node) = self.nodes.get_mut(id) {
                if let NodeKind::Composite(composite) = &mut node.kind {
                    composite.hooks.run_effects();
                }
            }
        }
    }

    /// Ends a pass: runs due effects, then reports collected diagnostics.
    fn commit(&mut self) -> Result<(), ReconcileError> {
        self.flush_effects();
        let diagnostics = std::mem::take(&mut self.diagnostics);
        if diagnostics.is_empty() {
            Ok(())
        } else {
            Err(ReconcileError::HookMisuse(diagnostics))
        }
    }
}

impl<R: Renderer> Drop for Reconciler<R> {
    /// Runs outstanding effect finalizers children first. Targets are left to
    /// the renderer.
    fn drop(&mut self) {
        if let Some(root) = self.root.take() {
            self.finalize_subtree(root);
        }
    }
}

#[cfg(test)]
#[path = "tests/reconciler_tests.rs"]
mod tests;
