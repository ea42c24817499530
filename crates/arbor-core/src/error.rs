use std::fmt;

use crate::hooks::HookKind;
use crate::node::NodeId;
use crate::view::ViewTag;

/// Hook call sites of one node no longer line up with its previous render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookError {
    /// The hook at call site `index` is a different kind than last render.
    OrderChanged {
        index: usize,
        expected: HookKind,
        found: HookKind,
    },
    /// The cell at call site `index` holds a value of a different type.
    TypeChanged { index: usize, kind: HookKind },
    /// The render made a different number of hook calls than last render.
    CountChanged { previous: usize, current: usize },
}

impl fmt::Display for HookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookError::OrderChanged {
                index,
                expected,
                found,
            } => write!(
                f,
                "hook #{index} changed kind: expected {expected:?}, found {found:?}"
            ),
            HookError::TypeChanged { index, kind } => {
                write!(f, "{kind:?} hook #{index} changed value type")
            }
            HookError::CountChanged { previous, current } => {
                write!(f, "hook count changed from {previous} to {current}")
            }
        }
    }
}

impl std::error::Error for HookError {}

/// A [`HookError`] attributed to the node whose render produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookDiagnostic {
    pub node: NodeId,
    pub tag: ViewTag,
    pub error: HookError,
}

impl fmt::Display for HookDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.tag, self.node, self.error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    /// Hook misuse was detected and recovered from; the pass was committed.
    HookMisuse(Vec<HookDiagnostic>),
    /// Update passes kept producing more updates.
    UpdateLoop { passes: usize },
}

impl ReconcileError {
    pub fn diagnostics(&self) -> &[HookDiagnostic] {
        match self {
            ReconcileError::HookMisuse(diagnostics) => diagnostics,
            ReconcileError::UpdateLoop { .. } => &[],
        }
    }
}

impl fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileError::HookMisuse(diagnostics) => {
                write!(f, "{} hook misuse diagnostic(s)", diagnostics.len())?;
                for diagnostic in diagnostics {
                    write!(f, "; {diagnostic}")?;
                }
                Ok(())
            }
            ReconcileError::UpdateLoop { passes } => {
                write!(f, "updates still pending after {passes} passes")
            }
        }
    }
}

impl std::error::Error for ReconcileError {}
