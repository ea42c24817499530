use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arbor_core::{NodeId, ReconcileError, Reconciler, ReconcilerOptions, RuntimeScheduler, View};

use crate::test_renderer::{RenderOp, TargetId, TestRenderer};

/// Scheduler that only counts how often a pass was requested.
#[derive(Debug, Default)]
pub struct CountingScheduler {
    frames: AtomicUsize,
}

impl CountingScheduler {
    pub fn frames(&self) -> usize {
        self.frames.load(Ordering::SeqCst)
    }
}

impl RuntimeScheduler for CountingScheduler {
    fn schedule_frame(&self) {
        self.frames.fetch_add(1, Ordering::SeqCst);
    }
}

/// Headless harness for exercising a reconciler in tests.
///
/// Owns a [`Reconciler`] over a [`TestRenderer`] and a [`CountingScheduler`],
/// and exposes helpers to install content, drive update passes and inspect
/// both the mounted tree and the renderer's target tree.
pub struct ReconcilerTestRule {
    reconciler: Option<Reconciler<TestRenderer>>,
    renderer: Option<TestRenderer>,
    scheduler: Arc<CountingScheduler>,
    options: ReconcilerOptions,
}

impl ReconcilerTestRule {
    pub fn new() -> Self {
        Self::with_options(ReconcilerOptions::default())
    }

    pub fn with_options(options: ReconcilerOptions) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        Self {
            reconciler: None,
            renderer: Some(TestRenderer::new()),
            scheduler: Arc::new(CountingScheduler::default()),
            options,
        }
    }

    /// Renderer to mount the first content with. Only available until
    /// content is set.
    pub fn renderer_before_content(&mut self) -> &mut TestRenderer {
        self.renderer
            .as_mut()
            .expect("content already set; use renderer_mut()")
    }

    /// Mounts `view` on first use, then diffs later content against the
    /// mounted tree.
    pub fn set_content(&mut self, view: View) -> Result<(), ReconcileError> {
        if let Some(reconciler) = self.reconciler.as_mut() {
            return reconciler.set_root(view);
        }
        let renderer = self.renderer.take().unwrap_or_default();
        self.reconciler = Some(Reconciler::with_options(
            renderer,
            TargetId::ROOT,
            view,
            self.options.clone(),
            self.scheduler.clone(),
        ));
        Ok(())
    }

    /// Runs update passes until nothing is pending; returns how many ran.
    pub fn pump_until_idle(&mut self) -> Result<usize, ReconcileError> {
        match self.reconciler.as_mut() {
            Some(reconciler) => reconciler.run_until_idle(),
            None => Ok(0),
        }
    }

    /// Clicks the button labelled `label`, then pumps.
    pub fn click(&mut self, label: &str) -> Result<usize, ReconcileError> {
        assert!(
            self.renderer().click(label),
            "no button labelled {label:?}"
        );
        self.pump_until_idle()
    }

    pub fn has_content(&self) -> bool {
        self.reconciler.is_some()
    }

    pub fn root_id(&self) -> Option<NodeId> {
        self.reconciler.as_ref().and_then(Reconciler::root)
    }

    pub fn reconciler(&self) -> &Reconciler<TestRenderer> {
        self.reconciler.as_ref().expect("no content set")
    }

    pub fn reconciler_mut(&mut self) -> &mut Reconciler<TestRenderer> {
        self.reconciler.as_mut().expect("no content set")
    }

    pub fn renderer(&self) -> &TestRenderer {
        self.reconciler().renderer()
    }

    pub fn renderer_mut(&mut self) -> &mut TestRenderer {
        self.reconciler_mut().renderer_mut()
    }

    pub fn texts(&self) -> Vec<String> {
        self.renderer().texts()
    }

    pub fn take_ops(&mut self) -> Vec<RenderOp> {
        self.renderer_mut().take_ops()
    }

    /// Number of times the reconciler asked for an update pass.
    pub fn scheduled_frames(&self) -> usize {
        self.scheduler.frames()
    }

    pub fn dump_tree(&self) -> String {
        match self.reconciler.as_ref() {
            Some(reconciler) => reconciler.dump_tree(),
            None => "(no content)\n".to_string(),
        }
    }

    pub fn unmount(&mut self) {
        if let Some(reconciler) = self.reconciler.as_mut() {
            reconciler.unmount();
        }
    }
}

impl Default for ReconcilerTestRule {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for tests that only need temporary access to a
/// `ReconcilerTestRule`.
pub fn run_test_reconciler<R>(f: impl FnOnce(&mut ReconcilerTestRule) -> R) -> R {
    let mut rule = ReconcilerTestRule::new();
    f(&mut rule)
}

#[cfg(test)]
#[path = "tests/testing_tests.rs"]
mod tests;

#[cfg(test)]
#[path = "tests/scenario_tests.rs"]
mod scenario_tests;
