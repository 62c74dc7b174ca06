//! # Progress Estimation
//!
//! Heuristic completion percentage of a protocol run.
//!
//! The expected path length depends on how deep into the flowchart the
//! patient has gone: a milestone step on the path raises the expectation
//! (Group B labs → 8, Group C/D treatment → 10, intensive care → 12, bleeding
//! investigation → 14; a plain Group A run expects 6).
//!
//! ## Rules
//!
//! | Condition | Progress |
//! |-----------|----------|
//! | current step is `end` | 100 |
//! | nothing answered yet (empty history) | 0 |
//! | otherwise | `min(round(len(path) / expected × 100), 95)` |
//!
//! Raising the expectation mid-path would make the raw ratio drop, so the
//! reported value is the maximum over every prefix of the path. That keeps
//! progress non-decreasing along a forward path, and `go_back` (which only
//! shortens the path) restores exactly the value held before.

use crate::primitives::{END_STEP, MIN_EXPECTED_PATH, PROGRESS_CAP};
use crate::StepId;
use std::collections::BTreeMap;
use std::iter;

/// Milestone step ids and the path length they imply.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Milestones {
    expected: BTreeMap<StepId, usize>,
}

impl Milestones {
    /// Build a milestone table from `(step id, expected path length)` pairs.
    pub fn new<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, usize)>,
        K: Into<StepId>,
    {
        Self {
            expected: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Milestones of the built-in dengue flowchart.
    #[must_use]
    pub fn dengue() -> Self {
        let group_b = ["group_b", "hydration_b", "wait_labs_b", "labs_normal_b"];
        let treatment = [
            "group_c",
            "hydration_c",
            "reassess_c",
            "reexpansion_c",
            "response_c",
            "maintenance_c",
            "group_d",
            "resuscitation_d",
            "reassess_d",
        ];

        Self::new(
            group_b
                .iter()
                .map(|id| (*id, 8))
                .chain(treatment.iter().map(|id| (*id, 10)))
                .chain([("intensive_care", 12), ("bleeding_investigation", 14)]),
        )
    }

    /// Expected path length implied by a step, if it is a milestone.
    #[must_use]
    pub fn expected_for(&self, id: &StepId) -> Option<usize> {
        self.expected.get(id).copied()
    }

    /// Iterate over `(step id, expected length)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&StepId, usize)> {
        self.expected.iter().map(|(k, v)| (k, *v))
    }
}

/// Estimate progress (0–100) for a patient standing on `current`.
#[must_use]
pub fn calculate_progress(current: &StepId, history: &[StepId], milestones: &Milestones) -> u8 {
    if current == END_STEP {
        return 100;
    }
    if history.is_empty() {
        return 0;
    }

    let mut expected = MIN_EXPECTED_PATH;
    let mut best: u8 = 0;

    for (position, id) in history.iter().chain(iter::once(current)).enumerate() {
        if let Some(milestone) = milestones.expected_for(id) {
            expected = expected.max(milestone);
        }
        if position == 0 {
            continue;
        }
        let len = position.saturating_add(1);
        best = best.max(percent_of(len, expected));
    }

    best
}

/// `round(len / expected × 100)`, capped at `PROGRESS_CAP`.
fn percent_of(len: usize, expected: usize) -> u8 {
    let expected = expected.max(1) as u64;
    let doubled = (len as u64).saturating_mul(200).saturating_add(expected);
    let percent = doubled / expected.saturating_mul(2);
    percent.min(u64::from(PROGRESS_CAP)) as u8
}

// =============================================================================
// TESTS
// =============================================================================
