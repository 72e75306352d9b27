//! Event system for invocation monitoring.
//!
//! Listeners registered on an [`InvocationEventSupport`] are notified when a
//! solver process starts, when it yields a solution, and when it finishes.
//! All listener methods are called synchronously on the task driving the
//! invocation, so they should return quickly.
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use mznforge_solver::event::{CountingEventListener, InvocationEventSupport};
//!
//! let counter = Arc::new(CountingEventListener::new());
//! let mut support = InvocationEventSupport::new();
//! support.add_listener(counter.clone());
//!
//! assert!(support.has_listeners());
//! assert_eq!(counter.started_count(), 0);
//! ```

use std::fmt::Debug;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::parser::SolutionRecord;
use crate::stream::RunOutcome;

/// Listener for invocation lifecycle events.
///
/// Every method has an empty default, so implementors override only what
/// they need.
pub trait InvocationListener: Send + Sync + Debug {
    /// Called after the solver process was launched.
    fn on_invocation_started(&self, _id: Uuid, _model: &str) {}

    /// Called for every solution record, in stream order.
    fn on_solution(&self, _id: Uuid, _record: &SolutionRecord) {}

    /// Called once the process has exited and its outcome is known.
    fn on_invocation_finished(&self, _id: Uuid, _outcome: &RunOutcome) {}
}

/// Central broadcaster for invocation events.
///
/// Listeners are called in registration order. Clones share the listeners.
#[derive(Default, Clone)]
pub struct InvocationEventSupport {
    listeners: Vec<Arc<dyn InvocationListener>>,
}

impl InvocationEventSupport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&mut self, listener: Arc<dyn InvocationListener>) {
        self.listeners.push(listener);
    }

    pub fn clear_listeners(&mut self) {
        self.listeners.clear();
    }

    pub fn fire_invocation_started(&self, id: Uuid, model: &str) {
        for listener in &self.listeners {
            listener.on_invocation_started(id, model);
        }
    }

    pub fn fire_solution(&self, id: Uuid, record: &SolutionRecord) {
        for listener in &self.listeners {
            listener.on_solution(id, record);
        }
    }

    pub fn fire_invocation_finished(&self, id: Uuid, outcome: &RunOutcome) {
        for listener in &self.listeners {
            listener.on_invocation_finished(id, outcome);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn has_listeners(&self) -> bool {
        !self.listeners.is_empty()
    }
}

impl Debug for InvocationEventSupport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationEventSupport")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// A listener that reports events through `tracing`.
#[derive(Debug, Clone, Default)]
pub struct LoggingEventListener {
    prefix: String,
}

impl LoggingEventListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a logging listener with a custom prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl InvocationListener for LoggingEventListener {
    fn on_invocation_started(&self, id: Uuid, model: &str) {
        info!("{}invocation {id} started for model {model}", self.prefix);
    }

    fn on_solution(&self, id: Uuid, record: &SolutionRecord) {
        info!("{}invocation {id} found solution {}", self.prefix, record.index);
    }

    fn on_invocation_finished(&self, id: Uuid, outcome: &RunOutcome) {
        info!(
            "{}invocation {id} finished: {} after {} solution(s)",
            self.prefix,
            outcome.status.label(),
            outcome.solution_count
        );
    }
}

/// A counting listener that tracks event occurrences and how many
/// invocations are alive at once.
///
/// Useful for testing and statistics collection.
#[derive(Debug, Default)]
pub struct CountingEventListener {
    started: AtomicUsize,
    solutions: AtomicUsize,
    finished: AtomicUsize,
    live: AtomicUsize,
    peak_live: AtomicUsize,
}

impl CountingEventListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn started_count(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn solution_count(&self) -> usize {
        self.solutions.load(Ordering::SeqCst)
    }

    pub fn finished_count(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    /// Invocations started but not yet finished.
    pub fn live_count(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// The largest number of invocations alive at the same time.
    pub fn peak_live_count(&self) -> usize {
        self.peak_live.load(Ordering::SeqCst)
    }

    /// Resets all counters to zero.
    pub fn reset(&self) {
        for counter in [
            &self.started,
            &self.solutions,
            &self.finished,
            &self.live,
            &self.peak_live,
        ] {
            counter.store(0, Ordering::SeqCst);
        }
    }
}

impl InvocationListener for CountingEventListener {
    fn on_invocation_started(&self, _id: Uuid, _model: &str) {
        self.started.fetch_add(1, Ordering::SeqCst);
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_live.fetch_max(live, Ordering::SeqCst);
    }

    fn on_solution(&self, _id: Uuid, _record: &SolutionRecord) {
        self.solutions.fetch_add(1, Ordering::SeqCst);
    }

    fn on_invocation_finished(&self, _id: Uuid, _outcome: &RunOutcome) {
        self.finished.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
