//! # Auto-Resolution Scheduler
//!
//! One tokio task per patient waiting on an automatic step.
//!
//! The registry keeps the task handle next to the flow revision it was
//! scheduled for. Scheduling again for the same patient aborts the previous
//! task, and [`Scheduler::cancel`] aborts it outright. A task that wakes up
//! calls [`Scheduler::release`] first: if it is no longer the registered
//! task for its patient it must not touch the flow.
//!
//! Aborting is an optimization. The core rejects a tick whose revision is
//! stale, so a task that slips past `release` still cannot apply an
//! outdated transition.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use triage_core::PatientId;

#[derive(Debug)]
struct Scheduled {
    revision: u64,
    handle: JoinHandle<()>,
}

/// Registry of pending auto-resolution tasks, keyed by patient.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    tasks: Arc<Mutex<HashMap<PatientId, Scheduled>>>,
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `task` as the pending resolution of `id` at `revision`,
    /// aborting whatever was scheduled for that patient before.
    pub fn schedule<F>(&self, id: PatientId, revision: u64, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        // Held across the spawn: a task must be registered before it can release.
        let mut tasks = self.lock();
        let handle = tokio::spawn(task);
        if let Some(previous) = tasks.insert(id, Scheduled { revision, handle }) {
            previous.handle.abort();
        }
    }

    /// Abort the pending task of `id`. Returns whether one existed.
    pub fn cancel(&self, id: &PatientId) -> bool {
        match self.lock().remove(id) {
            Some(scheduled) => {
                scheduled.handle.abort();
                tracing::debug!(event = "cancel", patient = %id, "Pending resolution cancelled");
                true
            }
            None => false,
        }
    }

    /// Unregister the task of `id` for `revision` as it starts running.
    ///
    /// Returns `false` when a different task is registered (or none), in
    /// which case the caller was superseded.
    pub fn release(&self, id: &PatientId, revision: u64) -> bool {
        let mut tasks = self.lock();
        match tasks.get(id) {
            Some(scheduled) if scheduled.revision == revision => {
                tasks.remove(id);
                true
            }
            _ => false,
        }
    }

    /// Whether a task is registered for `id`.
    #[must_use]
    pub fn is_scheduled(&self, id: &PatientId) -> bool {
        self.lock().contains_key(id)
    }

    /// Number of registered tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PatientId, Scheduled>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// TESTS
// =============================================================================
