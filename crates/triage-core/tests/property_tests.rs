//! # Property-Based Tests
//!
//! Invariants of navigation, progress and classification under random
//! walks and random inputs.

use proptest::collection::vec;
use proptest::prelude::*;
use triage_core::{
    ClassifierContext, ClinicalObservation, FlowState, Measure, Metric, Navigator, Protocol,
    Tier, Tone, calculate_progress, classify,
};

/// Walk the protocol, picking options by `choices` and resolving automatic
/// steps against `obs`. Stops before an option would restart the run.
fn random_walk(nav: &Navigator<'_>, choices: &[usize], obs: &ClinicalObservation) -> Vec<FlowState> {
    let ctx = ClassifierContext::default();
    let mut states = vec![nav.restart()];
    for &choice in choices {
        let Some(state) = states.last() else { break };
        if state.is_complete() {
            break;
        }
        let Some(step) = nav.current_step(state) else { break };
        let next = if step.is_auto() {
            nav.resolve_auto(state, obs, &ctx).expect("resolve").0
        } else {
            let index = choice % step.options.len();
            nav.advance(state, index).expect("advance")
        };
        states.push(next);
    }
    states
}

fn labs_strategy() -> impl Strategy<Value = ClinicalObservation> {
    (2_000i64..7_000, 500i64..2_000, prop::option::of(2_000i64..20_000)).prop_map(
        |(ht, hb, hr)| ClinicalObservation {
            hematocrit: Some(Measure::from_hundredths(ht)),
            hemoglobin: Some(Measure::from_hundredths(hb)),
            heart_rate: hr.map(Measure::from_hundredths),
            ..Default::default()
        },
    )
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// goBack undoes advance.
    #[test]
    fn back_forward_symmetry(choices in vec(0usize..4, 1..16), obs in labs_strategy()) {
        let protocol = Protocol::dengue().expect("protocol");
        let nav = Navigator::new(&protocol);

        for state in random_walk(&nav, &choices, &obs) {
            let Some(step) = nav.current_step(&state) else { continue };
            for index in 0..step.options.len() {
                let forward = nav.advance(&state, index).expect("advance");
                if forward == FlowState::initial() {
                    continue;
                }
                let back = nav.go_back(&forward);
                prop_assert_eq!(&back.current_step, &state.current_step);
                prop_assert_eq!(back.progress, state.progress);
            }
        }
    }

    /// Restart yields the same state from anywhere.
    #[test]
    fn restart_is_idempotent(choices in vec(0usize..4, 0..16), obs in labs_strategy()) {
        let protocol = Protocol::dengue().expect("protocol");
        let nav = Navigator::new(&protocol);
        for _state in random_walk(&nav, &choices, &obs) {
            prop_assert_eq!(nav.restart(), FlowState::initial());
        }
    }

    /// Progress stays within bounds and never decreases along a forward walk.
    #[test]
    fn progress_bounded_and_monotone(choices in vec(0usize..4, 1..20), obs in labs_strategy()) {
        let protocol = Protocol::dengue().expect("protocol");
        let nav = Navigator::new(&protocol);
        let states = random_walk(&nav, &choices, &obs);

        let mut last = 0u8;
        for state in &states {
            if state.is_complete() {
                prop_assert_eq!(state.progress, 100);
            } else {
                prop_assert!(state.progress <= 95);
            }
            prop_assert!(state.progress >= last);
            last = state.progress;
        }
    }

    /// The end step is always complete, whatever the history.
    #[test]
    fn terminal_progress(len in 0usize..30) {
        let protocol = Protocol::dengue().expect("protocol");
        let ids: Vec<_> = protocol.graph.steps().map(|s| s.id.clone()).collect();
        let history: Vec<_> = ids.iter().cycle().take(len).cloned().collect();
        let end = triage_core::StepId::new("end");
        prop_assert_eq!(calculate_progress(&end, &history, &protocol.milestones), 100);
    }

    /// Every metric classifies any value without failing, with a tone
    /// consistent with its tier.
    #[test]
    fn classifier_is_total(
        a in -50_000i64..100_000_000,
        b in -50_000i64..100_000_000,
        weight in prop::option::of(-1_000i64..20_000),
        age in prop::option::of(0u32..1_200),
    ) {
        let obs = ClinicalObservation {
            temperature: Some(Measure::from_hundredths(a)),
            heart_rate: Some(Measure::from_hundredths(a)),
            respiratory_rate: Some(Measure::from_hundredths(a)),
            spo2: Some(Measure::from_hundredths(a)),
            systolic_bp: Some(Measure::from_hundredths(a)),
            diastolic_bp: Some(Measure::from_hundredths(b)),
            hemoglobin: Some(Measure::from_hundredths(b)),
            hematocrit: Some(Measure::from_hundredths(a)),
            platelets: Some(Measure::from_hundredths(a)),
            albumin: Some(Measure::from_hundredths(a)),
            alt: Some(Measure::from_hundredths(a)),
            ast: Some(Measure::from_hundredths(a)),
            diuresis_ml_per_hour: Some(Measure::from_hundredths(a)),
            ..Default::default()
        };
        let ctx = ClassifierContext {
            age_months: age,
            weight: weight.map(Measure::from_hundredths),
            ..Default::default()
        };

        for metric in Metric::ALL {
            let c = classify(metric, &obs, &ctx);
            match c.tier {
                None => prop_assert_eq!(c.tone, Tone::Neutral),
                Some(Tier::Normal) => prop_assert_eq!(c.tone, Tone::Ok),
                Some(tier) => prop_assert_eq!(c.tone, tier.tone()),
            }
        }
    }

    /// Text form of a measure reads back to the same value.
    #[test]
    fn measure_text_roundtrip(h in -10_000_000i64..10_000_000) {
        let m = Measure::from_hundredths(h);
        let back: Measure = m.to_string().parse().expect("parse");
        prop_assert_eq!(back, m);
    }
}
