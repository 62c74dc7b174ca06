//! # Step Graph
//!
//! The immutable definition of a triage protocol.
//!
//! Steps are pure data: an id, a kind, the options a clinician can choose and,
//! for `wait_labs` steps, the rule that routes the patient automatically.
//! Titles and descriptions live in the presentation table
//! (`protocol::Presentation`), never here.
//!
//! Steps are stored in an arena (`Vec<Step>`) with a `BTreeMap` index from id
//! to slot, so lookups are deterministic and the declaration order is kept for
//! listing.
//!
//! ## Integrity
//!
//! `StepGraph::new` refuses any table where:
//! - `start` or `end` is missing, or an id is duplicated
//! - an option or auto-rule target does not resolve
//! - a non-terminal step has no way forward
//! - a cycle exists other than the restart edge `end → start`
//! - a step cannot be reached from `start`

use crate::primitives::{
    END_STEP, MAX_ANSWER_LENGTH, MAX_PROTOCOL_STEPS, MAX_STEP_ID_LENGTH, START_STEP,
};
use crate::{Group, StepId, StepKind, TriageError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// STEP DATA
// =============================================================================

/// An option the clinician can choose on a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOption {
    /// Label shown on the button.
    pub text: String,
    /// Destination step.
    pub next: StepId,
    /// Answer recorded for the step when this option is chosen.
    #[serde(default)]
    pub value: Option<String>,
}

/// What an automatic step evaluates before routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoCheck {
    /// Run the escalation detector over the vital signs.
    Escalation,
    /// Check the hematocrit/hemoglobin ratio; a red escalation still wins.
    Hemoconcentration,
}

/// Routing table of an automatic step, by outcome severity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoRule {
    pub check: AutoCheck,
    /// Destination for a critical (red) outcome.
    pub on_red: StepId,
    /// Destination for an alarming (yellow) outcome.
    pub on_yellow: StepId,
    /// Destination when nothing alarming was found.
    pub otherwise: StepId,
}

impl AutoRule {
    /// Create a rule with its three destinations.
    #[must_use]
    pub fn new(
        check: AutoCheck,
        on_red: impl Into<StepId>,
        on_yellow: impl Into<StepId>,
        otherwise: impl Into<StepId>,
    ) -> Self {
        Self {
            check,
            on_red: on_red.into(),
            on_yellow: on_yellow.into(),
            otherwise: otherwise.into(),
        }
    }

    pub(crate) fn targets(&self) -> [&StepId; 3] {
        [&self.on_red, &self.on_yellow, &self.otherwise]
    }
}

/// A single protocol step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    pub kind: StepKind,
    #[serde(default)]
    pub options: Vec<StepOption>,
    /// Severity group entered when the patient reaches this step.
    #[serde(default)]
    pub group: Option<Group>,
    #[serde(default)]
    pub requires_labs: bool,
    /// Routing of `wait_labs` steps.
    #[serde(default)]
    pub auto: Option<AutoRule>,
}

impl Step {
    /// Create a step with no options.
    #[must_use]
    pub fn new(id: impl Into<StepId>, kind: StepKind) -> Self {
        Self {
            id: id.into(),
            kind,
            options: Vec::new(),
            group: None,
            requires_labs: false,
            auto: None,
        }
    }

    /// Add an option that records no answer.
    #[must_use]
    pub fn with_option(mut self, text: &str, next: &str) -> Self {
        self.options.push(StepOption {
            text: text.to_string(),
            next: StepId::new(next),
            value: None,
        });
        self
    }

    /// Add an option that records `value` as the step's answer.
    #[must_use]
    pub fn with_answer(mut self, text: &str, next: &str, value: &str) -> Self {
        self.options.push(StepOption {
            text: text.to_string(),
            next: StepId::new(next),
            value: Some(value.to_string()),
        });
        self
    }

    /// Mark the step as belonging to a severity group.
    #[must_use]
    pub fn in_group(mut self, group: Group) -> Self {
        self.group = Some(group);
        self
    }

    /// Mark the step as waiting on laboratory results.
    #[must_use]
    pub fn requiring_labs(mut self) -> Self {
        self.requires_labs = true;
        self
    }

    /// Attach the automatic routing rule.
    #[must_use]
    pub fn with_auto(mut self, rule: AutoRule) -> Self {
        self.auto = Some(rule);
        self
    }

    /// Get an option by position.
    #[must_use]
    pub fn option(&self, index: usize) -> Option<&StepOption> {
        self.options.get(index)
    }

    /// Whether the engine routes this step without user input.
    #[must_use]
    pub fn is_auto(&self) -> bool {
        self.kind.is_auto()
    }

    /// Whether this is the terminal step.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.id == END_STEP
    }

    /// Every step id this step can lead to.
    pub fn successors(&self) -> impl Iterator<Item = &StepId> {
        self.options
            .iter()
            .map(|o| &o.next)
            .chain(self.auto.iter().flat_map(|rule| rule.targets()))
    }
}

// =============================================================================
// STEP GRAPH
// =============================================================================

/// Immutable, validated protocol graph.
#[derive(Debug, Clone)]
pub struct StepGraph {
    steps: Vec<Step>,
    index: BTreeMap<StepId, usize>,
    start: usize,
}

impl StepGraph {
    /// Build a graph from a step table, validating its integrity.
    pub fn new(steps: Vec<Step>) -> Result<Self, TriageError> {
        if steps.is_empty() {
            return Err(TriageError::InvalidProtocol("protocol has no steps".into()));
        }
        if steps.len() > MAX_PROTOCOL_STEPS {
            return Err(TriageError::InvalidProtocol(format!(
                "protocol has {} steps, maximum is {}",
                steps.len(),
                MAX_PROTOCOL_STEPS
            )));
        }

        let mut index = BTreeMap::new();
        for (slot, step) in steps.iter().enumerate() {
            validate_id(&step.id)?;
            if index.insert(step.id.clone(), slot).is_some() {
                return Err(TriageError::InvalidProtocol(format!(
                    "duplicate step id: {}",
                    step.id
                )));
            }
        }

        let start = *index
            .get(&StepId::new(START_STEP))
            .ok_or_else(|| TriageError::InvalidProtocol("missing start step".into()))?;
        if !index.contains_key(&StepId::new(END_STEP)) {
            return Err(TriageError::InvalidProtocol("missing end step".into()));
        }

        let graph = Self {
            steps,
            index,
            start,
        };
        graph.validate_steps()?;
        graph.validate_acyclic()?;
        graph.validate_reachable()?;
        Ok(graph)
    }

    /// Look up a step by id.
    pub fn lookup(&self, id: &StepId) -> Result<&Step, TriageError> {
        self.get(id.as_str())
            .ok_or_else(|| TriageError::StepNotFound(id.clone()))
    }

    /// Look up a step by id, returning `None` when absent.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Step> {
        self.index
            .get(&StepId::new(id))
            .and_then(|&slot| self.steps.get(slot))
    }

    /// Check if a step exists.
    #[must_use]
    pub fn contains(&self, id: &StepId) -> bool {
        self.index.contains_key(id)
    }

    /// The entry step.
    #[must_use]
    pub fn start(&self) -> &Step {
        &self.steps[self.start]
    }

    /// All steps in declaration order.
    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter()
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the graph has no steps (never true for a validated graph).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    // =========================================================================
    // VALIDATION
    // =========================================================================

    fn validate_steps(&self) -> Result<(), TriageError> {
        for step in &self.steps {
            for next in step.successors() {
                if !self.contains(next) {
                    return Err(TriageError::InvalidProtocol(format!(
                        "step {} points to unknown step {}",
                        step.id, next
                    )));
                }
                if next == START_STEP && !step.is_terminal() {
                    return Err(TriageError::InvalidProtocol(format!(
                        "only {} may lead back to {}, found on {}",
                        END_STEP, START_STEP, step.id
                    )));
                }
            }

            if let Some(value) = step
                .options
                .iter()
                .filter_map(|o| o.value.as_deref())
                .find(|v| v.is_empty() || v.len() > MAX_ANSWER_LENGTH)
            {
                return Err(TriageError::InvalidProtocol(format!(
                    "answer value on step {} must be 1..={} bytes: {:?}",
                    step.id, MAX_ANSWER_LENGTH, value
                )));
            }

            match (step.is_auto(), &step.auto) {
                (true, None) => {
                    return Err(TriageError::InvalidProtocol(format!(
                        "automatic step {} has no routing rule",
                        step.id
                    )));
                }
                (true, Some(_)) if !step.options.is_empty() => {
                    return Err(TriageError::InvalidProtocol(format!(
                        "automatic step {} must not offer options",
                        step.id
                    )));
                }
                (false, Some(_)) => {
                    return Err(TriageError::InvalidProtocol(format!(
                        "step {} has a routing rule but is not automatic",
                        step.id
                    )));
                }
                (false, None) if step.options.is_empty() && !step.is_terminal() => {
                    return Err(TriageError::InvalidProtocol(format!(
                        "step {} is a dead end",
                        step.id
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Depth-first search for back edges, ignoring the restart edge.
    fn validate_acyclic(&self) -> Result<(), TriageError> {
        // 0 = unvisited, 1 = on stack, 2 = done
        let mut state = vec![0u8; self.steps.len()];

        for root in 0..self.steps.len() {
            if state[root] != 0 {
                continue;
            }
            let mut stack: Vec<(usize, Vec<usize>)> = vec![(root, self.forward_slots(root))];
            state[root] = 1;

            while let Some((slot, pending)) = stack.last_mut() {
                match pending.pop() {
                    Some(next) => match state[next] {
                        0 => {
                            state[next] = 1;
                            let children = self.forward_slots(next);
                            stack.push((next, children));
                        }
                        1 => {
                            return Err(TriageError::InvalidProtocol(format!(
                                "cycle through step {}",
                                self.steps[next].id
                            )));
                        }
                        _ => {}
                    },
                    None => {
                        state[*slot] = 2;
                        stack.pop();
                    }
                }
            }
        }
        Ok(())
    }

    fn validate_reachable(&self) -> Result<(), TriageError> {
        let mut seen = BTreeSet::new();
        let mut frontier = vec![self.start];
        seen.insert(self.start);

        while let Some(slot) = frontier.pop() {
            for next in self.forward_slots(slot) {
                if seen.insert(next) {
                    frontier.push(next);
                }
            }
        }

        match self.steps.iter().enumerate().find(|(slot, _)| !seen.contains(slot)) {
            Some((_, step)) => Err(TriageError::InvalidProtocol(format!(
                "step {} is unreachable from {}",
                step.id, START_STEP
            ))),
            None => Ok(()),
        }
    }

    /// Successor slots, excluding the restart edge into `start`.
    fn forward_slots(&self, slot: usize) -> Vec<usize> {
        let mut slots: Vec<usize> = self.steps[slot]
            .successors()
            .filter(|id| *id != START_STEP)
            .filter_map(|id| self.index.get(id).copied())
            .collect();
        slots.sort_unstable();
        slots.dedup();
        slots
    }
}

fn validate_id(id: &StepId) -> Result<(), TriageError> {
    let s = id.as_str();
    if s.is_empty() || s.len() > MAX_STEP_ID_LENGTH {
        return Err(TriageError::InvalidProtocol(format!(
            "step id must be 1..={} bytes: {:?}",
            MAX_STEP_ID_LENGTH, s
        )));
    }
    if !s
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    {
        return Err(TriageError::InvalidProtocol(format!(
            "step id contains invalid characters: {:?}",
            s
        )));
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny() -> Vec<Step> {
        vec![
            Step::new("start", StepKind::Question)
                .with_answer("Mild", "mild", "A")
                .with_answer("Severe", "severe", "D"),
            Step::new("mild", StepKind::Group)
                .in_group(Group::A)
                .with_option("Done", "end"),
            Step::new("severe", StepKind::Group)
                .in_group(Group::D)
                .with_option("Done", "end"),
            Step::new("end", StepKind::Result).with_option("Restart", "start"),
        ]
    }

    #[test]
    fn valid_graph_builds() {
        let graph = StepGraph::new(tiny()).expect("valid");
        assert_eq!(graph.len(), 4);
        assert_eq!(graph.start().id, "start");
        assert!(graph.lookup(&StepId::new("mild")).is_ok());
    }

    #[test]
    fn lookup_unknown_is_not_found() {
        let graph = StepGraph::new(tiny()).expect("valid");
        let result = graph.lookup(&StepId::new("nowhere"));
        assert!(matches!(result, Err(TriageError::StepNotFound(_))));
    }

    #[test]
    fn dangling_target_rejected() {
        let mut steps = tiny();
        steps[1] = Step::new("mild", StepKind::Group).with_option("Done", "missing");
        assert!(matches!(
            StepGraph::new(steps),
            Err(TriageError::InvalidProtocol(_))
        ));
    }

    #[test]
    fn missing_end_rejected() {
        let steps = vec![Step::new("start", StepKind::Question).with_option("x", "start")];
        assert!(StepGraph::new(steps).is_err());
    }

    #[test]
    fn duplicate_id_rejected() {
        let mut steps = tiny();
        steps.push(Step::new("mild", StepKind::Result).with_option("Done", "end"));
        assert!(StepGraph::new(steps).is_err());
    }

    #[test]
    fn cycle_outside_restart_rejected() {
        let mut steps = tiny();
        steps[1] = Step::new("mild", StepKind::Group).with_option("Again", "severe");
        steps[2] = Step::new("severe", StepKind::Group).with_option("Again", "mild");
        let result = StepGraph::new(steps);
        assert!(matches!(result, Err(TriageError::InvalidProtocol(msg)) if msg.contains("cycle")));
    }

    #[test]
    fn restart_only_from_end() {
        let mut steps = tiny();
        steps[1] = Step::new("mild", StepKind::Group).with_option("Back to start", "start");
        assert!(StepGraph::new(steps).is_err());
    }

    #[test]
    fn unreachable_step_rejected() {
        let mut steps = tiny();
        steps.push(Step::new("orphan", StepKind::Action).with_option("Go", "end"));
        let result = StepGraph::new(steps);
        assert!(matches!(result, Err(TriageError::InvalidProtocol(msg)) if msg.contains("orphan")));
    }

    #[test]
    fn auto_step_needs_rule_and_no_options() {
        let mut steps = tiny();
        steps[1] = Step::new("mild", StepKind::WaitLabs);
        assert!(StepGraph::new(steps.clone()).is_err());

        steps[1] = Step::new("mild", StepKind::WaitLabs)
            .with_auto(AutoRule::new(AutoCheck::Escalation, "severe", "severe", "end"))
            .with_option("Skip", "end");
        assert!(StepGraph::new(steps.clone()).is_err());

        steps[1] = Step::new("mild", StepKind::WaitLabs).with_auto(AutoRule::new(
            AutoCheck::Escalation,
            "severe",
            "severe",
            "end",
        ));
        assert!(StepGraph::new(steps).is_ok());
    }

    #[test]
    fn invalid_step_id_rejected() {
        let mut steps = tiny();
        steps.push(Step::new("has space", StepKind::Action).with_option("Go", "end"));
        assert!(StepGraph::new(steps).is_err());
    }

    #[test]
    fn successors_include_auto_targets() {
        let step = Step::new("wait", StepKind::WaitLabs).with_auto(AutoRule::new(
            AutoCheck::Hemoconcentration,
            "d",
            "c",
            "b",
        ));
        let next: Vec<&str> = step.successors().map(|s| s.as_str()).collect();
        assert_eq!(next, vec!["d", "c", "b"]);
    }
}
