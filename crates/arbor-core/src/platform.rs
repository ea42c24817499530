//! Platform abstraction for scheduling reconciler work.
//!
//! The reconciler never drives its own event loop. When the first state
//! update arrives after an idle period it asks the host, through
//! [`RuntimeScheduler`], to call
//! [`Reconciler::process_pending_updates`](crate::Reconciler::process_pending_updates)
//! on its next tick.

/// Schedules update passes for a reconciler.
pub trait RuntimeScheduler: Send + Sync {
    /// Request that the host run an update pass soon.
    fn schedule_frame(&self);
}

/// Scheduler that ignores requests; the host polls
/// [`Reconciler::has_pending_updates`](crate::Reconciler::has_pending_updates) instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultScheduler;

impl RuntimeScheduler for DefaultScheduler {
    fn schedule_frame(&self) {}
}
