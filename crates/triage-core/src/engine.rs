//! # Navigation Engine
//!
//! The protocol state machine. Every operation takes a [`FlowState`] by
//! reference and returns the next one; nothing is mutated in place, so a
//! failed operation leaves the caller's state untouched.
//!
//! ## Transitions
//!
//! | Operation | Effect |
//! |-----------|--------|
//! | `advance` | push current onto history, move to the chosen option's step, record its answer |
//! | `go_back` | pop the last history entry; its recorded answer is dropped |
//! | `restart` | back to `start` with nothing recorded |
//! | `plan_auto` / `apply_auto` | compute and apply the routing of an automatic step |
//!
//! Progress and group are recomputed on every forward and backward move.
//! Following an option that leads back to `start` is a restart.
//!
//! ## Recovery
//!
//! A state whose current step is not in the graph (e.g. stored under an older
//! protocol) is reset to the initial state with a warning. That is never an
//! error for the caller.

use crate::classifier::{self, Metric, Tier};
use crate::escalation::{self, AlertTier};
use crate::graph::{AutoCheck, Step};
use crate::observation::ClinicalObservation;
use crate::patient::ClassifierContext;
use crate::primitives::{END_STEP, MAX_HISTORY_LENGTH, START_STEP};
use crate::progress::calculate_progress;
use crate::protocol::Protocol;
use crate::{Group, StepId, TriageError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::iter;

// =============================================================================
// FLOW STATE
// =============================================================================

/// Where a patient stands in the protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowState {
    pub current_step: StepId,
    /// Steps already visited, oldest first. Never contains `current_step`.
    pub history: Vec<StepId>,
    /// Answer recorded at each visited step.
    pub answers: BTreeMap<StepId, String>,
    /// Estimated completion, 0–100.
    pub progress: u8,
    pub group: Option<Group>,
}

impl Default for FlowState {
    fn default() -> Self {
        Self::initial()
    }
}

impl FlowState {
    /// The state every run starts from.
    #[must_use]
    pub fn initial() -> Self {
        Self {
            current_step: StepId::new(START_STEP),
            history: Vec::new(),
            answers: BTreeMap::new(),
            progress: 0,
            group: None,
        }
    }

    /// Whether the run reached the terminal step.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.current_step == END_STEP
    }

    /// History followed by the current step.
    pub fn path(&self) -> impl Iterator<Item = &StepId> {
        self.history.iter().chain(iter::once(&self.current_step))
    }
}

// =============================================================================
// AUTO RESOLUTION
// =============================================================================

/// The computed routing of an automatic step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoResolution {
    /// The automatic step being resolved.
    pub step: StepId,
    /// Where the patient goes next.
    pub next: StepId,
    /// Alert level that decided the route; `None` when nothing alarming was found.
    pub alert: Option<AlertTier>,
    /// Group of the destination step, if it has one.
    pub group: Option<Group>,
    /// Finding behind the decision.
    pub reason: String,
}

impl AutoResolution {
    /// Answer recorded at the automatic step once applied.
    #[must_use]
    pub fn answer(&self) -> &'static str {
        match self.alert {
            Some(AlertTier::Red) => "red",
            Some(AlertTier::Yellow) => "yellow",
            None => "clear",
        }
    }
}

// =============================================================================
// NAVIGATOR
// =============================================================================

/// Applies protocol transitions to flow states.
#[derive(Debug, Clone, Copy)]
pub struct Navigator<'p> {
    protocol: &'p Protocol,
}

impl<'p> Navigator<'p> {
    #[must_use]
    pub fn new(protocol: &'p Protocol) -> Self {
        Self { protocol }
    }

    /// The protocol being navigated.
    #[must_use]
    pub fn protocol(&self) -> &'p Protocol {
        self.protocol
    }

    /// The step the patient stands on, if it exists.
    #[must_use]
    pub fn current_step(&self, state: &FlowState) -> Option<&'p Step> {
        self.protocol.graph.get(state.current_step.as_str())
    }

    /// Reset a state whose current step is unknown; other states pass through.
    ///
    /// Returns the state and whether a reset happened.
    #[must_use]
    pub fn recover(&self, state: &FlowState) -> (FlowState, bool) {
        if self.protocol.graph.contains(&state.current_step) {
            return (state.clone(), false);
        }
        tracing::warn!(
            event = "recover",
            step = %state.current_step,
            "Unknown current step, resetting flow to start"
        );
        (self.restart(), true)
    }

    /// Choose option `index` on the current step.
    pub fn advance(&self, state: &FlowState, index: usize) -> Result<FlowState, TriageError> {
        let (state, recovered) = self.recover(state);
        if recovered {
            return Ok(state);
        }
        let step = self.protocol.graph.lookup(&state.current_step)?;
        let option = step.option(index).ok_or_else(|| TriageError::InvalidOption {
            step: step.id.clone(),
            index,
        })?;
        self.move_to(&state, &option.next, option.value.clone())
    }

    /// Return to the previous step; a no-op at the beginning of a run.
    #[must_use]
    pub fn go_back(&self, state: &FlowState) -> FlowState {
        let (mut state, recovered) = self.recover(state);
        if recovered {
            return state;
        }
        let Some(previous) = state.history.pop() else {
            return state;
        };
        state.answers.remove(&previous);
        self.settle(previous, state.history, state.answers)
    }

    /// The initial state. Identical whatever the state it replaces.
    #[must_use]
    pub fn restart(&self) -> FlowState {
        FlowState::initial()
    }

    /// Compute the routing of the current automatic step against `obs`.
    ///
    /// Fails with `NotAutoStep` on a manual step and `LabsPending` when the
    /// step requires labs that are not recorded yet.
    pub fn plan_auto(
        &self,
        state: &FlowState,
        obs: &ClinicalObservation,
        ctx: &ClassifierContext,
    ) -> Result<AutoResolution, TriageError> {
        let step = self.protocol.graph.lookup(&state.current_step)?;
        let rule = match (&step.auto, step.is_auto()) {
            (Some(rule), true) => rule,
            _ => return Err(TriageError::NotAutoStep(step.id.clone())),
        };

        let escalation = escalation::detect(obs);
        let detector_alert = escalation.as_ref().map(|e| e.tier);

        let (alert, reason) = match rule.check {
            AutoCheck::Escalation => match escalation {
                Some(found) => (Some(found.tier), found.trigger),
                None => (None, "no escalation findings".to_string()),
            },
            AutoCheck::Hemoconcentration => {
                let ratio = classifier::classify(Metric::HtHbRatio, obs, ctx);
                if step.requires_labs && ratio.is_empty() {
                    return Err(TriageError::LabsPending(step.id.clone()));
                }
                let ratio_alert = match ratio.tier {
                    Some(Tier::Extreme) => Some(AlertTier::Red),
                    Some(Tier::Moderate | Tier::Severe) => Some(AlertTier::Yellow),
                    _ => None,
                };
                match escalation {
                    Some(found) if detector_alert > ratio_alert => (detector_alert, found.trigger),
                    _ => {
                        let reason = match ratio.derived {
                            Some(value) => format!("Ht/Hb ratio {}: {}", value, ratio.label),
                            None => ratio.label,
                        };
                        (ratio_alert, reason)
                    }
                }
            }
        };

        let next = match alert {
            Some(AlertTier::Red) => &rule.on_red,
            Some(AlertTier::Yellow) => &rule.on_yellow,
            None => &rule.otherwise,
        };
        let group = self.protocol.graph.lookup(next)?.group;

        Ok(AutoResolution {
            step: step.id.clone(),
            next: next.clone(),
            alert,
            group,
            reason,
        })
    }

    /// Apply a planned resolution.
    ///
    /// The resolution must have been planned for the state's current step and
    /// lead to one of its rule's destinations.
    pub fn apply_auto(
        &self,
        state: &FlowState,
        resolution: &AutoResolution,
    ) -> Result<FlowState, TriageError> {
        let step = self.protocol.graph.lookup(&state.current_step)?;
        if step.id != resolution.step {
            return Err(TriageError::InvalidInput(format!(
                "resolution for {} does not apply at {}",
                resolution.step, step.id
            )));
        }
        let rule = step
            .auto
            .as_ref()
            .ok_or_else(|| TriageError::NotAutoStep(step.id.clone()))?;
        if !rule.targets().contains(&&resolution.next) {
            return Err(TriageError::InvalidInput(format!(
                "{} is not a destination of {}",
                resolution.next, step.id
            )));
        }
        self.move_to(state, &resolution.next, Some(resolution.answer().to_string()))
    }

    /// Plan and apply the current automatic step immediately.
    pub fn resolve_auto(
        &self,
        state: &FlowState,
        obs: &ClinicalObservation,
        ctx: &ClassifierContext,
    ) -> Result<(FlowState, AutoResolution), TriageError> {
        let resolution = self.plan_auto(state, obs, ctx)?;
        let next = self.apply_auto(state, &resolution)?;
        Ok((next, resolution))
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn move_to(
        &self,
        state: &FlowState,
        next: &StepId,
        answer: Option<String>,
    ) -> Result<FlowState, TriageError> {
        if next == START_STEP {
            return Ok(self.restart());
        }
        if state.history.len() >= MAX_HISTORY_LENGTH {
            return Err(TriageError::InvalidInput(format!(
                "history exceeds {} steps",
                MAX_HISTORY_LENGTH
            )));
        }

        let mut history = state.history.clone();
        history.push(state.current_step.clone());
        let mut answers = state.answers.clone();
        if let Some(value) = answer {
            answers.insert(state.current_step.clone(), value);
        }
        Ok(self.settle(next.clone(), history, answers))
    }

    fn settle(
        &self,
        current: StepId,
        history: Vec<StepId>,
        answers: BTreeMap<StepId, String>,
    ) -> FlowState {
        let progress = calculate_progress(&current, &history, &self.protocol.milestones);
        let mut state = FlowState {
            current_step: current,
            history,
            answers,
            progress,
            group: None,
        };
        state.group = self.derive_group(&state);
        state
    }

    /// Latest group named on the path: a group step, or an answer naming one.
    fn derive_group(&self, state: &FlowState) -> Option<Group> {
        let path: Vec<&StepId> = state.path().collect();
        path.into_iter().rev().find_map(|id| {
            self.protocol
                .graph
                .get(id.as_str())
                .and_then(|step| step.group)
                .or_else(|| state.answers.get(id).and_then(|v| Group::from_answer(v)))
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
