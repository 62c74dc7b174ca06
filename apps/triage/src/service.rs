//! # Triage Service
//!
//! The async face of the core for long-running hosts.
//!
//! Owns the protocol, the flow repository and the [`Scheduler`]. Every
//! operation takes the single writer lock, runs one [`Session`] transition
//! with the current wall-clock time, then brings the scheduler in line with
//! the saved flow: a pending resolution gets a task, anything else cancels
//! the patient's task.

use crate::scheduler::Scheduler;
use chrono::{Local, NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use triage_core::{
    ClinicalObservation, FlowRepository, FlowUpdate, PatientFlow, PatientId, PatientRecord,
    Protocol, Session, TriageError,
};

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn now_ms() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}

/// The local calendar date, used for patient ages.
#[must_use]
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

struct Inner {
    protocol: Protocol,
    repository: Arc<dyn FlowRepository>,
    writer: Mutex<()>,
    auto_delay_ms: u64,
    scheduler: Scheduler,
}

/// Shared handle to the triage engine. Cheap to clone.
#[derive(Clone)]
pub struct TriageService {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for TriageService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriageService")
            .field("protocol", &self.inner.protocol.name)
            .field("auto_delay_ms", &self.inner.auto_delay_ms)
            .field("scheduled", &self.inner.scheduler.len())
            .finish()
    }
}

impl TriageService {
    #[must_use]
    pub fn new(protocol: Protocol, repository: Arc<dyn FlowRepository>, auto_delay_ms: u64) -> Self {
        Self {
            inner: Arc::new(Inner {
                protocol,
                repository,
                writer: Mutex::new(()),
                auto_delay_ms,
                scheduler: Scheduler::new(),
            }),
        }
    }

    #[must_use]
    pub fn protocol(&self) -> &Protocol {
        &self.inner.protocol
    }

    #[must_use]
    pub fn auto_delay_ms(&self) -> u64 {
        self.inner.auto_delay_ms
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    fn session(&self) -> Session<'_> {
        Session::new(
            &self.inner.protocol,
            self.inner.repository.as_ref(),
            self.inner.auto_delay_ms,
        )
    }

    // =========================================================================
    // OPERATIONS
    // =========================================================================

    pub async fn admit(&self, record: PatientRecord) -> Result<FlowUpdate, TriageError> {
        let _writer = self.inner.writer.lock().await;
        self.session().admit(record, today())
    }

    pub async fn load(&self, id: &PatientId) -> Result<PatientFlow, TriageError> {
        let _writer = self.inner.writer.lock().await;
        self.session().load(id)
    }

    pub async fn list(&self) -> Result<Vec<PatientFlow>, TriageError> {
        let _writer = self.inner.writer.lock().await;
        self.session().list()
    }

    pub async fn advance(&self, id: &PatientId, index: usize) -> Result<FlowUpdate, TriageError> {
        let _writer = self.inner.writer.lock().await;
        let update = self.session().advance(id, index, now_ms())?;
        self.track(&update.flow);
        Ok(update)
    }

    pub async fn go_back(&self, id: &PatientId) -> Result<FlowUpdate, TriageError> {
        let _writer = self.inner.writer.lock().await;
        let update = self.session().go_back(id)?;
        self.track(&update.flow);
        Ok(update)
    }

    pub async fn restart(&self, id: &PatientId) -> Result<FlowUpdate, TriageError> {
        let _writer = self.inner.writer.lock().await;
        let update = self.session().restart(id)?;
        self.track(&update.flow);
        Ok(update)
    }

    pub async fn observe(
        &self,
        id: &PatientId,
        observation: &ClinicalObservation,
    ) -> Result<FlowUpdate, TriageError> {
        let _writer = self.inner.writer.lock().await;
        let update = self.session().observe(id, observation, now_ms())?;
        self.track(&update.flow);
        Ok(update)
    }

    /// Resolve the current automatic step without waiting.
    pub async fn resolve(&self, id: &PatientId) -> Result<FlowUpdate, TriageError> {
        let _writer = self.inner.writer.lock().await;
        let update = self.session().resolve(id, now_ms())?;
        self.track(&update.flow);
        Ok(update)
    }

    /// Schedule every stored flow that still has a pending resolution.
    ///
    /// Called at server start so resolutions planned before a restart are
    /// not lost. Overdue ones fire immediately.
    pub async fn resume_pending(&self) -> Result<usize, TriageError> {
        let flows = self.list().await?;
        let mut resumed = 0;
        for flow in flows.iter().filter(|flow| flow.pending.is_some()) {
            self.track(flow);
            resumed += 1;
        }
        if resumed > 0 {
            tracing::info!(count = resumed, "Resumed pending auto resolutions");
        }
        Ok(resumed)
    }

    // =========================================================================
    // SCHEDULING
    // =========================================================================

    fn track(&self, flow: &PatientFlow) {
        let Some(pending) = &flow.pending else {
            self.inner.scheduler.cancel(flow.id());
            return;
        };
        let delay = Duration::from_millis(pending.due_at_ms.saturating_sub(now_ms()));
        let revision = pending.revision;
        let id = flow.id().clone();
        let service = self.clone();
        self.inner.scheduler.schedule(id.clone(), revision, async move {
            tokio::time::sleep(delay).await;
            service.fire(id, revision).await;
        });
    }

    async fn fire(&self, id: PatientId, revision: u64) {
        if !self.inner.scheduler.release(&id, revision) {
            return;
        }
        let _writer = self.inner.writer.lock().await;
        match self.session().tick(&id, revision, now_ms()) {
            Ok(Some(update)) => self.track(&update.flow),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(event = "tick", patient = %id, error = %e, "Auto resolution failed");
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
