//! Mounted nodes and the generational arena that owns them.

use std::fmt;

use smallvec::SmallVec;

use crate::environment::Environment;
use crate::hooks::HookStorage;
use crate::view::{CompositeView, HostView, View, ViewTag};

/// Stable, generation-checked handle to a mounted node.
///
/// A handle outlives the node it names: once the node is unmounted its slot's
/// generation moves on, so lookups through an old handle miss instead of
/// reaching whatever node reuses the slot.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    #[cfg(test)]
    pub(crate) const fn from_raw(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// Positional child list. `None` marks a position rendered as [`View::Empty`].
pub(crate) type Children = SmallVec<[Option<NodeId>; 4]>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Lifecycle {
    Created,
    Mounted,
    Unmounting,
}

pub(crate) struct CompositeNode {
    pub(crate) view: CompositeView,
    pub(crate) hooks: HookStorage,
    /// Environment handed to the child; differs from the node's own one when
    /// the last render provided overrides.
    pub(crate) child_environment: Environment,
}

pub(crate) struct HostNode<T> {
    pub(crate) view: HostView,
    /// `None` for pass-through hosts.
    pub(crate) target: Option<T>,
}

pub(crate) enum NodeKind<T> {
    Composite(CompositeNode),
    Host(HostNode<T>),
}

pub(crate) struct MountedNode<T> {
    pub(crate) parent: Option<NodeId>,
    /// Position in the parent's child list. Fixed for the node's lifetime.
    pub(crate) slot: usize,
    pub(crate) depth: usize,
    pub(crate) parent_target: T,
    pub(crate) environment: Environment,
    pub(crate) children: Children,
    pub(crate) kind: NodeKind<T>,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) render_count: usize,
    pub(crate) update_count: usize,
}

impl<T> MountedNode<T> {
    /// Builds an unmounted node for `view`, or `None` for [`View::Empty`].
    pub(crate) fn from_view(
        view: View,
        parent: Option<NodeId>,
        slot: usize,
        depth: usize,
        parent_target: T,
        environment: Environment,
    ) -> Option<Self> {
        let kind = match view {
            View::Empty => return None,
            View::Composite(view) => NodeKind::Composite(CompositeNode {
                view,
                hooks: HookStorage::default(),
                child_environment: environment.clone(),
            }),
            View::Host(view) => NodeKind::Host(HostNode { view, target: None }),
        };
        Some(Self {
            parent,
            slot,
            depth,
            parent_target,
            environment,
            children: Children::new(),
            kind,
            lifecycle: Lifecycle::Created,
            render_count: 0,
            update_count: 0,
        })
    }

    pub(crate) fn tag(&self) -> ViewTag {
        match &self.kind {
            NodeKind::Composite(node) => node.view.tag(),
            NodeKind::Host(node) => node.view.tag(),
        }
    }

    pub(crate) fn is_composite(&self) -> bool {
        matches!(self.kind, NodeKind::Composite(_))
    }
}

impl<T: Clone> MountedNode<T> {
    /// Target and environment this node's children mount under.
    pub(crate) fn child_context(&self) -> (T, Environment) {
        match &self.kind {
            NodeKind::Composite(node) => {
                (self.parent_target.clone(), node.child_environment.clone())
            }
            NodeKind::Host(node) => (
                node.target
                    .clone()
                    .unwrap_or_else(|| self.parent_target.clone()),
                self.environment.clone(),
            ),
        }
    }
}

/// Which variant a mounted node is.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MountedKind {
    Composite,
    Host,
}

/// Read-only snapshot of a mounted node, for tests and tooling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeInfo {
    pub id: NodeId,
    pub tag: ViewTag,
    pub kind: MountedKind,
    pub parent: Option<NodeId>,
    pub depth: usize,
    pub children: Vec<Option<NodeId>>,
    /// Times the render function ran (composites only).
    pub render_count: usize,
    /// Times the node was updated in place after its mount.
    pub update_count: usize,
    /// Whether the renderer created a target for this node (hosts only).
    pub has_target: bool,
}

impl<T> MountedNode<T> {
    pub(crate) fn info(&self, id: NodeId) -> NodeInfo {
        let (kind, has_target) = match &self.kind {
            NodeKind::Composite(_) => (MountedKind::Composite, false),
            NodeKind::Host(node) => (MountedKind::Host, node.target.is_some()),
        };
        NodeInfo {
            id,
            tag: self.tag(),
            kind,
            parent: self.parent,
            depth: self.depth,
            children: self.children.to_vec(),
            render_count: self.render_count,
            update_count: self.update_count,
            has_target,
        }
    }
}

struct Slot<T> {
    generation: u32,
    node: Option<MountedNode<T>>,
}

/// Slot storage for mounted nodes, addressed by [`NodeId`].
pub(crate) struct NodeArena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Default for NodeArena<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }
}

impl<T> NodeArena<T> {
    pub(crate) fn insert(&mut self, node: MountedNode<T>) -> NodeId {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            return NodeId {
                index,
                generation: slot.generation,
            };
        }
        let index = u32::try_from(self.slots.len()).expect("node arena exhausted");
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        NodeId {
            index,
            generation: 0,
        }
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<&MountedNode<T>> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut MountedNode<T>> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    /// Lookup for ids the reconciler itself holds; a miss is a shadow-tree bug.
    pub(crate) fn expect(&self, id: NodeId) -> &MountedNode<T> {
        match self.get(id) {
            Some(node) => node,
            None => panic!("mounted node {id} is missing from the arena"),
        }
    }

    pub(crate) fn expect_mut(&mut self, id: NodeId) -> &mut MountedNode<T> {
        match self.get_mut(id) {
            Some(node) => node,
            None => panic!("mounted node {id} is missing from the arena"),
        }
    }

    pub(crate) fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub(crate) fn remove(&mut self, id: NodeId) -> Option<MountedNode<T>> {
        let slot = self
            .slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation)?;
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;
        Some(node)
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }
}
