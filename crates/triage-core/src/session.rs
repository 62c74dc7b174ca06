//! # Session Module
//!
//! Patient flows and the operations hosts call on them.
//!
//! A [`PatientFlow`] is everything stored for one patient: the intake record,
//! the protocol state, the latest observation snapshot and, while the patient
//! stands on an automatic step, the pending deferred transition.
//!
//! A [`Session`] binds a protocol to a [`FlowRepository`]. Each operation
//! loads the flow, applies one transition and saves the result: the save is
//! the update notification, emitted after every `advance`, `go_back`,
//! `restart`, `observe` and auto resolution.
//!
//! ## Deferred Auto-Resolution
//!
//! Entering an automatic step plans its routing and stores it as
//! [`PendingAuto`], due `auto_delay_ms` later. The core has no clock: the host
//! calls [`Session::tick`] with the current time and the revision it
//! scheduled for. Every other transition bumps the flow's revision and drops
//! the pending entry, so a tick that arrives after `go_back` or `restart` is
//! stale and ignored.
//!
//! Callers must serialize operations per patient; different patients are
//! independent.

use crate::engine::{AutoResolution, FlowState, Navigator};
use crate::escalation::{self, Escalation};
use crate::observation::ClinicalObservation;
use crate::patient::{ClassifierContext, PatientRecord};
use crate::primitives::MAX_PATIENT_ID_LENGTH;
use crate::protocol::Protocol;
use crate::storage::FlowRepository;
use crate::{PatientId, TriageError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// =============================================================================
// PATIENT FLOW
// =============================================================================

/// A planned automatic transition waiting for its delay to elapse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAuto {
    /// Flow revision the plan was made for.
    pub revision: u64,
    pub resolution: AutoResolution,
    /// Milliseconds since the Unix epoch.
    pub due_at_ms: u64,
}

/// Everything stored for one patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientFlow {
    pub patient: PatientRecord,
    /// Patient facts for the classifiers, fixed at intake.
    pub context: ClassifierContext,
    pub state: FlowState,
    pub observation: ClinicalObservation,
    pub pending: Option<PendingAuto>,
    /// Bumped on every transition.
    pub revision: u64,
}

impl PatientFlow {
    /// A fresh flow at `start`.
    #[must_use]
    pub fn admit(patient: PatientRecord, today: NaiveDate) -> Self {
        let context = patient.context(today);
        Self {
            patient,
            context,
            state: FlowState::initial(),
            observation: ClinicalObservation::new(),
            pending: None,
            revision: 0,
        }
    }

    #[must_use]
    pub fn id(&self) -> &PatientId {
        &self.patient.id
    }

    /// Replace the state and cancel anything pending.
    fn transition(&mut self, state: FlowState) {
        if self.pending.take().is_some() {
            tracing::debug!(
                event = "cancel",
                patient = %self.patient.id,
                step = %self.state.current_step,
                "Pending auto resolution cancelled"
            );
        }
        self.state = state;
        self.revision = self.revision.saturating_add(1);
    }
}

/// Result of one session operation.
#[derive(Debug, Clone)]
pub struct FlowUpdate {
    /// The flow as saved.
    pub flow: PatientFlow,
    /// The operation moved the patient onto `end`.
    pub completed: bool,
    /// Escalation found in the observation snapshot, if any.
    pub escalation: Option<Escalation>,
    /// The automatic resolution applied by this operation, if any.
    pub resolution: Option<AutoResolution>,
}

// =============================================================================
// SESSION
// =============================================================================

/// Protocol operations over a flow repository.
pub struct Session<'a> {
    navigator: Navigator<'a>,
    repository: &'a dyn FlowRepository,
    auto_delay_ms: u64,
}

impl std::fmt::Debug for Session<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("protocol", &self.navigator.protocol().name)
            .field("auto_delay_ms", &self.auto_delay_ms)
            .finish()
    }
}

impl<'a> Session<'a> {
    #[must_use]
    pub fn new(protocol: &'a Protocol, repository: &'a dyn FlowRepository, auto_delay_ms: u64) -> Self {
        Self {
            navigator: Navigator::new(protocol),
            repository,
            auto_delay_ms,
        }
    }

    #[must_use]
    pub fn navigator(&self) -> &Navigator<'a> {
        &self.navigator
    }

    /// Register a new patient at `start`.
    pub fn admit(&self, patient: PatientRecord, today: NaiveDate) -> Result<FlowUpdate, TriageError> {
        validate_patient_id(&patient.id)?;
        if self.repository.load(&patient.id)?.is_some() {
            return Err(TriageError::DuplicatePatient(patient.id));
        }
        let flow = PatientFlow::admit(patient, today);
        tracing::info!(event = "admit", patient = %flow.id(), "Patient admitted");
        self.commit(flow, false, None)
    }

    /// Load a flow, resetting it to `start` if its current step is unknown.
    ///
    /// The reset happens in memory only; the next mutation saves it.
    pub fn load(&self, id: &PatientId) -> Result<PatientFlow, TriageError> {
        self.fetch(id).map(|(flow, _)| flow)
    }

    /// All stored flows, ordered by patient id.
    pub fn list(&self) -> Result<Vec<PatientFlow>, TriageError> {
        self.repository
            .list()?
            .iter()
            .map(|id| self.load(id))
            .collect()
    }

    /// Choose option `index` on the current step.
    pub fn advance(&self, id: &PatientId, index: usize, now_ms: u64) -> Result<FlowUpdate, TriageError> {
        let (mut flow, recovered) = self.fetch(id)?;
        if recovered {
            // The option belongs to a step that no longer exists.
            return self.commit(flow, false, None);
        }
        let was_complete = flow.state.is_complete();
        let next = self.navigator.advance(&flow.state, index)?;
        tracing::info!(
            event = "advance",
            patient = %id,
            step = %next.current_step,
            progress = next.progress,
            "Patient advanced"
        );
        flow.transition(next);
        self.schedule(&mut flow, now_ms);
        self.commit(flow, !was_complete, None)
    }

    /// Return to the previous step. Cancels a pending auto resolution and
    /// does not schedule a new one: going back onto an automatic step waits
    /// for new observations or an explicit `resolve`.
    pub fn go_back(&self, id: &PatientId) -> Result<FlowUpdate, TriageError> {
        let mut flow = self.load(id)?;
        let previous = self.navigator.go_back(&flow.state);
        tracing::info!(event = "back", patient = %id, step = %previous.current_step, "Patient went back");
        flow.transition(previous);
        self.commit(flow, false, None)
    }

    /// Reset the patient to `start`. Observations are kept.
    pub fn restart(&self, id: &PatientId) -> Result<FlowUpdate, TriageError> {
        let mut flow = self.load(id)?;
        flow.transition(self.navigator.restart());
        tracing::info!(event = "restart", patient = %id, "Protocol restarted");
        self.commit(flow, false, None)
    }

    /// Merge new measurements into the snapshot.
    ///
    /// On an automatic step the routing is planned again against the merged
    /// snapshot. The returned update carries the detector's finding.
    pub fn observe(
        &self,
        id: &PatientId,
        update: &ClinicalObservation,
        now_ms: u64,
    ) -> Result<FlowUpdate, TriageError> {
        let mut flow = self.load(id)?;
        flow.observation.merge(update);
        if self.is_on_auto_step(&flow) {
            let state = flow.state.clone();
            flow.transition(state);
            self.schedule(&mut flow, now_ms);
        }
        let escalation = escalation::detect(&flow.observation);
        if let Some(found) = &escalation {
            tracing::warn!(
                event = "escalation",
                patient = %id,
                trigger = %found.trigger,
                group = %found.suggested_group,
                "Escalation finding"
            );
        }
        let mut result = self.commit(flow, false, None)?;
        result.escalation = escalation;
        Ok(result)
    }

    /// Resolve the current automatic step now, without waiting for the delay.
    pub fn resolve(&self, id: &PatientId, now_ms: u64) -> Result<FlowUpdate, TriageError> {
        let mut flow = self.load(id)?;
        let (next, resolution) =
            self.navigator
                .resolve_auto(&flow.state, &flow.observation, &flow.context)?;
        self.apply(&mut flow, next, &resolution, now_ms);
        self.commit(flow, true, Some(resolution))
    }

    /// Apply the pending transition scheduled for `revision` if it is due.
    ///
    /// Returns `None` when there is nothing to do: no pending transition, a
    /// stale revision, or a transition not yet due.
    pub fn tick(&self, id: &PatientId, revision: u64, now_ms: u64) -> Result<Option<FlowUpdate>, TriageError> {
        let mut flow = self.load(id)?;
        let Some(pending) = flow.pending.clone() else {
            return Ok(None);
        };
        if pending.revision != revision || flow.revision != revision {
            tracing::debug!(event = "stale", patient = %id, revision, "Ignoring stale tick");
            return Ok(None);
        }
        if now_ms < pending.due_at_ms {
            return Ok(None);
        }

        match self.navigator.apply_auto(&flow.state, &pending.resolution) {
            Ok(next) => {
                self.apply(&mut flow, next, &pending.resolution, now_ms);
                self.commit(flow, true, Some(pending.resolution)).map(Some)
            }
            Err(e) => {
                tracing::debug!(event = "stale", patient = %id, error = %e, "Dropping pending resolution");
                flow.pending = None;
                self.repository.save(&flow)?;
                Ok(None)
            }
        }
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    /// The stored flow, and whether its unknown current step was reset.
    fn fetch(&self, id: &PatientId) -> Result<(PatientFlow, bool), TriageError> {
        let mut flow = self
            .repository
            .load(id)?
            .ok_or_else(|| TriageError::PatientNotFound(id.clone()))?;
        let (state, recovered) = self.navigator.recover(&flow.state);
        if recovered {
            flow.transition(state);
        }
        Ok((flow, recovered))
    }

    fn is_on_auto_step(&self, flow: &PatientFlow) -> bool {
        self.navigator
            .current_step(&flow.state)
            .is_some_and(|step| step.is_auto())
    }

    fn apply(&self, flow: &mut PatientFlow, next: FlowState, resolution: &AutoResolution, now_ms: u64) {
        tracing::info!(
            event = "auto",
            patient = %flow.id(),
            step = %resolution.step,
            next = %resolution.next,
            reason = %resolution.reason,
            "Automatic step resolved"
        );
        flow.transition(next);
        self.schedule(flow, now_ms);
    }

    /// Plan the routing of an automatic step and store it as pending.
    fn schedule(&self, flow: &mut PatientFlow, now_ms: u64) {
        if !self.is_on_auto_step(flow) {
            return;
        }
        match self
            .navigator
            .plan_auto(&flow.state, &flow.observation, &flow.context)
        {
            Ok(resolution) => {
                tracing::debug!(
                    event = "schedule",
                    patient = %flow.id(),
                    step = %resolution.step,
                    next = %resolution.next,
                    delay_ms = self.auto_delay_ms,
                    "Auto resolution scheduled"
                );
                flow.pending = Some(PendingAuto {
                    revision: flow.revision,
                    resolution,
                    due_at_ms: now_ms.saturating_add(self.auto_delay_ms),
                });
            }
            Err(e) => {
                tracing::debug!(event = "wait", patient = %flow.id(), reason = %e, "Auto resolution not planned");
            }
        }
    }

    /// Save the flow and build the update; `check_completion` reports a move onto `end`.
    fn commit(
        &self,
        flow: PatientFlow,
        check_completion: bool,
        resolution: Option<AutoResolution>,
    ) -> Result<FlowUpdate, TriageError> {
        self.repository.save(&flow)?;
        let completed = check_completion && flow.state.is_complete();
        if completed {
            tracing::info!(
                event = "complete",
                patient = %flow.id(),
                group = ?flow.state.group,
                "Protocol completed"
            );
        }
        Ok(FlowUpdate {
            flow,
            completed,
            escalation: None,
            resolution,
        })
    }
}

fn validate_patient_id(id: &PatientId) -> Result<(), TriageError> {
    let text = id.as_str();
    if text.is_empty() || text.len() > MAX_PATIENT_ID_LENGTH {
        return Err(TriageError::InvalidInput(format!(
            "patient id must be 1 to {} bytes",
            MAX_PATIENT_ID_LENGTH
        )));
    }
    if !text
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(TriageError::InvalidInput(format!("invalid patient id: {}", text)));
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryRepository;
    use crate::{Group, Measure, StepId};

    const DELAY: u64 = 1200;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).expect("valid date")
    }

    fn admit(session: &Session<'_>, id: &str) -> PatientId {
        let pid = PatientId::new(id);
        session
            .admit(PatientRecord::new(pid.clone()), today())
            .expect("admit");
        pid
    }

    fn walk(session: &Session<'_>, id: &PatientId, choices: &[usize]) -> FlowUpdate {
        let mut last = None;
        for &choice in choices {
            last = Some(session.advance(id, choice, 0).expect("advance"));
        }
        last.expect("at least one choice")
    }

    fn labs(ht: i64, hb: i64) -> ClinicalObservation {
        ClinicalObservation {
            hematocrit: Some(Measure::from_whole(ht)),
            hemoglobin: Some(Measure::from_whole(hb)),
            ..Default::default()
        }
    }

    fn retire_current_step(repo: &MemoryRepository, id: &PatientId) {
        let mut flow = repo.load(id).expect("load").expect("stored");
        flow.state.history.push(flow.state.current_step.clone());
        flow.state.current_step = StepId::new("retired_step");
        flow.state.progress = 40;
        repo.save(&flow).expect("save");
    }

    #[test]
    fn advance_on_unknown_step_only_resets() {
        let protocol = Protocol::dengue().expect("protocol");
        let repo = MemoryRepository::new();
        let session = Session::new(&protocol, &repo, DELAY);
        let id = admit(&session, "p-stale");
        retire_current_step(&repo, &id);

        let update = session.advance(&id, 0, 0).expect("advance");
        assert_eq!(update.flow.state, FlowState::initial());
        assert!(!update.completed);

        let stored = repo.load(&id).expect("load").expect("stored");
        assert_eq!(stored.state, FlowState::initial());

        let update = session.advance(&id, 0, 0).expect("advance");
        assert_eq!(update.flow.state.current_step, "alarm_check");
    }

    #[test]
    fn reads_reset_unknown_step_without_saving() {
        let protocol = Protocol::dengue().expect("protocol");
        let repo = MemoryRepository::new();
        let session = Session::new(&protocol, &repo, DELAY);
        let id = admit(&session, "p-stale");
        retire_current_step(&repo, &id);

        assert_eq!(session.load(&id).expect("load").state, FlowState::initial());
        let listed = session.list().expect("list");
        assert_eq!(listed[0].state, FlowState::initial());

        let stored = repo.load(&id).expect("load").expect("stored");
        assert_eq!(stored.state.current_step, "retired_step");
    }

    #[test]
    fn admit_rejects_duplicates_and_bad_ids() {
        let protocol = Protocol::dengue().expect("protocol");
        let repo = MemoryRepository::new();
        let session = Session::new(&protocol, &repo, DELAY);

        admit(&session, "p-1");
        let again = session.admit(PatientRecord::new(PatientId::new("p-1")), today());
        assert!(matches!(again, Err(TriageError::DuplicatePatient(_))));

        let bad = session.admit(PatientRecord::new(PatientId::new("bad id")), today());
        assert!(matches!(bad, Err(TriageError::InvalidInput(_))));

        let missing = session.advance(&PatientId::new("nobody"), 0, 0);
        assert!(matches!(missing, Err(TriageError::PatientNotFound(_))));
    }

    #[test]
    fn completion_is_reported_once() {
        let protocol = Protocol::dengue().expect("protocol");
        let repo = MemoryRepository::new();
        let session = Session::new(&protocol, &repo, DELAY);
        let id = admit(&session, "p-2");

        let update = walk(&session, &id, &[0, 0, 0, 0, 0, 0]);
        assert!(update.completed);
        assert_eq!(update.flow.state.progress, 100);
        assert_eq!(update.flow.state.group, Some(Group::A));

        let restarted = session.advance(&id, 0, 0).expect("restart option");
        assert!(!restarted.completed);
        assert_eq!(restarted.flow.state, FlowState::initial());
    }

    #[test]
    fn auto_step_waits_for_labs_then_ticks() {
        let protocol = Protocol::dengue().expect("protocol");
        let repo = MemoryRepository::new();
        let session = Session::new(&protocol, &repo, DELAY);
        let id = admit(&session, "p-3");

        let update = walk(&session, &id, &[0, 0, 1, 0, 0]);
        assert_eq!(update.flow.state.current_step, "wait_labs_b");
        assert!(update.flow.pending.is_none());

        let observed = session.observe(&id, &labs(48, 12), 1_000).expect("observe");
        let pending = observed.flow.pending.clone().expect("scheduled");
        assert_eq!(pending.due_at_ms, 1_000 + DELAY);
        assert_eq!(pending.resolution.next, "group_c");

        assert!(session.tick(&id, pending.revision, 1_500).expect("tick").is_none());

        let applied = session
            .tick(&id, pending.revision, 2_200)
            .expect("tick")
            .expect("applied");
        assert_eq!(applied.flow.state.current_step, "group_c");
        assert_eq!(applied.flow.state.group, Some(Group::C));
        assert!(applied.flow.pending.is_none());
    }

    #[test]
    fn go_back_cancels_pending_resolution() {
        let protocol = Protocol::dengue().expect("protocol");
        let repo = MemoryRepository::new();
        let session = Session::new(&protocol, &repo, DELAY);
        let id = admit(&session, "p-4");

        walk(&session, &id, &[0, 1, 0, 0]);
        let at_reassess = session.advance(&id, 0, 10).expect("advance");
        assert_eq!(at_reassess.flow.state.current_step, "reassess_c");
        let pending = at_reassess.flow.pending.clone().expect("scheduled");

        let back = session.go_back(&id).expect("back");
        assert_eq!(back.flow.state.current_step, "hydration_c");
        assert!(back.flow.pending.is_none());

        assert!(session.tick(&id, pending.revision, 99_999).expect("tick").is_none());
        let flow = session.load(&id).expect("load");
        assert_eq!(flow.state.current_step, "hydration_c");
    }

    #[test]
    fn restart_during_pending_wins() {
        let protocol = Protocol::dengue().expect("protocol");
        let repo = MemoryRepository::new();
        let session = Session::new(&protocol, &repo, DELAY);
        let id = admit(&session, "p-5");

        let update = walk(&session, &id, &[0, 1, 0, 0, 0]);
        let pending = update.flow.pending.clone().expect("scheduled");

        session.restart(&id).expect("restart");
        assert!(session.tick(&id, pending.revision, 99_999).expect("tick").is_none());
        assert_eq!(session.load(&id).expect("load").state, FlowState::initial());
    }

    #[test]
    fn observe_reports_escalation_without_moving() {
        let protocol = Protocol::dengue().expect("protocol");
        let repo = MemoryRepository::new();
        let session = Session::new(&protocol, &repo, DELAY);
        let id = admit(&session, "p-6");

        let hr = ClinicalObservation {
            heart_rate: Some(Measure::from_whole(170)),
            ..Default::default()
        };
        let update = session.observe(&id, &hr, 0).expect("observe");
        let found = update.escalation.expect("escalation");
        assert_eq!(found.trigger, "severe HR alteration");
        assert_eq!(update.flow.state.current_step, "start");
        assert_eq!(update.flow.observation.heart_rate, hr.heart_rate);
    }

    #[test]
    fn explicit_resolve_skips_delay() {
        let protocol = Protocol::dengue().expect("protocol");
        let repo = MemoryRepository::new();
        let session = Session::new(&protocol, &repo, DELAY);
        let id = admit(&session, "p-7");

        walk(&session, &id, &[0, 0, 1, 0, 0]);
        session.observe(&id, &labs(36, 12), 0).expect("observe");
        let update = session.resolve(&id, 0).expect("resolve");
        assert_eq!(update.flow.state.current_step, "labs_normal_b");
        let resolution = update.resolution.expect("resolution");
        assert_eq!(resolution.alert, None);
    }

    #[test]
    fn unknown_stored_step_is_reset_on_load() {
        let protocol = Protocol::dengue().expect("protocol");
        let repo = MemoryRepository::new();
        let session = Session::new(&protocol, &repo, DELAY);
        let id = admit(&session, "p-8");

        let mut flow = session.load(&id).expect("load");
        flow.state.current_step = StepId::new("retired_step");
        flow.state.progress = 50;
        repo.save(&flow).expect("save");

        let loaded = session.load(&id).expect("load");
        assert_eq!(loaded.state, FlowState::initial());
    }
}
