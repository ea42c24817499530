use std::fmt;
use std::fmt::Write as _;
use std::rc::Rc;

use arbor_core::{Environment, HostView, Renderer, UnmountCompletion, ViewTag};
use log::debug;

use crate::primitives::{Axis, Button, Case, Group, Stack, Text, TextCase};

/// Handle to a target owned by [`TestRenderer`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(usize);

impl TargetId {
    /// The container everything is mounted under.
    pub const ROOT: TargetId = TargetId(0);

    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TargetKind {
    Root,
    Text(String),
    Stack(Axis),
    Button(String),
}

#[derive(Clone)]
pub struct TestTarget {
    pub kind: TargetKind,
    pub parent: Option<TargetId>,
    pub children: Vec<TargetId>,
    action: Option<Rc<dyn Fn()>>,
}

impl fmt::Debug for TestTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestTarget")
            .field("kind", &self.kind)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .finish()
    }
}

/// One call the reconciler made into the renderer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderOp {
    Mount {
        target: TargetId,
        parent: TargetId,
        tag: ViewTag,
    },
    Update {
        target: TargetId,
        tag: ViewTag,
    },
    Unmount {
        target: TargetId,
        tag: ViewTag,
    },
}

impl RenderOp {
    pub fn target(&self) -> TargetId {
        match self {
            RenderOp::Mount { target, .. }
            | RenderOp::Update { target, .. }
            | RenderOp::Unmount { target, .. } => *target,
        }
    }
}

/// In-memory renderer that records every call and checks the renderer
/// contract: calls naming targets that are not alive panic.
pub struct TestRenderer {
    targets: Vec<Option<TestTarget>>,
    ops: Vec<RenderOp>,
    rejected: Vec<ViewTag>,
    defer_completions: bool,
    deferred: Vec<UnmountCompletion>,
}

impl Default for TestRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TestRenderer {
    pub fn new() -> Self {
        Self {
            targets: vec![Some(TestTarget {
                kind: TargetKind::Root,
                parent: None,
                children: Vec::new(),
                action: None,
            })],
            ops: Vec::new(),
            rejected: Vec::new(),
            defer_completions: false,
            deferred: Vec::new(),
        }
    }

    /// Makes [`Renderer::accepts`] refuse hosts of kind `tag`.
    pub fn reject(&mut self, tag: ViewTag) {
        self.rejected.push(tag);
    }

    /// Holds unmount completions back until [`complete_deferred`](Self::complete_deferred),
    /// as a renderer with exit animations would.
    pub fn set_defer_completions(&mut self, defer: bool) {
        self.defer_completions = defer;
    }

    /// Fires every held completion; returns how many fired.
    pub fn complete_deferred(&mut self) -> usize {
        let deferred = std::mem::take(&mut self.deferred);
        let count = deferred.len();
        for completion in deferred {
            completion.complete();
        }
        count
    }

    pub fn ops(&self) -> &[RenderOp] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<RenderOp> {
        std::mem::take(&mut self.ops)
    }

    pub fn target(&self, id: TargetId) -> Option<&TestTarget> {
        self.targets.get(id.0).and_then(Option::as_ref)
    }

    /// Live targets, the root container excluded.
    pub fn live_targets(&self) -> usize {
        self.targets.iter().flatten().count() - 1
    }

    /// Text contents in tree order.
    pub fn texts(&self) -> Vec<String> {
        let mut texts = Vec::new();
        self.collect_texts(TargetId::ROOT, &mut texts);
        texts
    }

    fn collect_texts(&self, id: TargetId, texts: &mut Vec<String>) {
        let Some(target) = self.target(id) else {
            return;
        };
        if let TargetKind::Text(content) = &target.kind {
            texts.push(content.clone());
        }
        for child in &target.children {
            self.collect_texts(*child, texts);
        }
    }

    /// Runs the action of the first button labelled `label`.
    pub fn click(&self, label: &str) -> bool {
        let action = self.targets.iter().flatten().find_map(|target| match &target.kind {
            TargetKind::Button(text) if text == label => target.action.clone(),
            _ => None,
        });
        match action {
            Some(action) => {
                action();
                true
            }
            None => false,
        }
    }

    /// Indented outline of the target tree.
    pub fn dump(&self) -> String {
        let mut output = String::new();
        self.dump_target(&mut output, TargetId::ROOT, 0);
        output
    }

    fn dump_target(&self, output: &mut String, id: TargetId, depth: usize) {
        let Some(target) = self.target(id) else {
            return;
        };
        let _ = writeln!(output, "{}{id} {:?}", "  ".repeat(depth), target.kind);
        for child in &target.children {
            self.dump_target(output, *child, depth + 1);
        }
    }

    fn live_mut(&mut self, id: TargetId, operation: &str) -> &mut TestTarget {
        match self.targets.get_mut(id.0).and_then(Option::as_mut) {
            Some(target) => target,
            None => panic!("{operation} on target {id}, which is not mounted"),
        }
    }

    fn realise(host: &HostView, environment: &Environment) -> (TargetKind, Option<Rc<dyn Fn()>>) {
        if let Some(text) = host.props::<Text>() {
            let content = match environment.get::<TextCase>() {
                Case::AsIs => text.content.clone(),
                Case::Upper => text.content.to_uppercase(),
            };
            (TargetKind::Text(content), None)
        } else if let Some(stack) = host.props::<Stack>() {
            (TargetKind::Stack(stack.axis), None)
        } else if let Some(button) = host.props::<Button>() {
            (
                TargetKind::Button(button.label.clone()),
                Some(button.action.clone()),
            )
        } else {
            panic!("TestRenderer cannot realise host kind `{}`", host.tag())
        }
    }
}

impl Renderer for TestRenderer {
    type Target = TargetId;

    fn accepts(&self, tag: ViewTag) -> bool {
        !self.rejected.contains(&tag)
    }

    fn mount_target(
        &mut self,
        parent: &TargetId,
        before: Option<&TargetId>,
        host: &HostView,
        environment: &Environment,
    ) -> Option<TargetId> {
        self.live_mut(*parent, "mount");
        if host.is::<Group>() {
            return None;
        }
        let (kind, action) = Self::realise(host, environment);
        let id = TargetId(self.targets.len());
        self.targets.push(Some(TestTarget {
            kind,
            parent: Some(*parent),
            children: Vec::new(),
            action,
        }));
        let siblings = &mut self.live_mut(*parent, "mount").children;
        match before {
            Some(before) => match siblings.iter().position(|child| child == before) {
                Some(index) => siblings.insert(index, id),
                None => panic!("mount before {before}, which is not a child of {parent}"),
            },
            None => siblings.push(id),
        }
        self.ops.push(RenderOp::Mount {
            target: id,
            parent: *parent,
            tag: host.tag(),
        });
        Some(id)
    }

    fn update(&mut self, target: &TargetId, host: &HostView, environment: &Environment) {
        let (kind, action) = Self::realise(host, environment);
        let live = self.live_mut(*target, "update");
        live.kind = kind;
        live.action = action;
        self.ops.push(RenderOp::Update {
            target: *target,
            tag: host.tag(),
        });
    }

    fn unmount(
        &mut self,
        target: TargetId,
        parent: &TargetId,
        host: &HostView,
        completion: UnmountCompletion,
    ) {
        let live = self.live_mut(target, "unmount");
        assert_eq!(
            live.parent,
            Some(*parent),
            "target {target} unmounted from the wrong parent"
        );
        assert!(
            live.children.is_empty(),
            "target {target} unmounted before its children"
        );
        self.targets[target.0] = None;
        self.live_mut(*parent, "detach").children.retain(|child| *child != target);
        self.ops.push(RenderOp::Unmount {
            target,
            tag: host.tag(),
        });
        if self.defer_completions {
            debug!("holding unmount completion for {target}");
            self.deferred.push(completion);
        } else {
            completion.complete();
        }
    }
}
