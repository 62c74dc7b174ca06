//! # Escalation Detector
//!
//! Scans an observation for findings that must pull the patient into a more
//! severe group, in a fixed order:
//!
//! temperature → blood pressure → heart rate → respiratory rate → SpO₂ → glucose
//!
//! The first metric at moderate tier or worse is reported and the scan stops,
//! so only one trigger is ever returned even when several metrics are
//! critical. Severe and extreme findings are red (suggest Group D); moderate
//! findings are yellow (suggest Group C).
//!
//! Pure function: raising an alert or rerouting is the caller's business.

use crate::classifier::{self, Classification, Metric, Tier};
use crate::observation::ClinicalObservation;
use crate::patient::ClassifierContext;
use crate::Group;
use serde::{Deserialize, Serialize};

/// Scan order of the detector.
pub const SCAN_ORDER: [Metric; 6] = [
    Metric::Temperature,
    Metric::BloodPressure,
    Metric::HeartRate,
    Metric::RespiratoryRate,
    Metric::Spo2,
    Metric::Glucose,
];

/// Alert level of an escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertTier {
    Yellow,
    Red,
}

impl AlertTier {
    /// Group a patient with this alert should be moved to.
    #[must_use]
    pub fn suggested_group(self) -> Group {
        match self {
            AlertTier::Yellow => Group::C,
            AlertTier::Red => Group::D,
        }
    }

    fn from_tier(tier: Tier) -> Option<Self> {
        match tier {
            Tier::Severe | Tier::Extreme => Some(AlertTier::Red),
            Tier::Moderate => Some(AlertTier::Yellow),
            Tier::Normal | Tier::Mild => None,
        }
    }
}

/// A finding that requires escalation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Escalation {
    pub tier: AlertTier,
    pub metric: Metric,
    /// Short alert text, e.g. `"severe HR alteration"`.
    pub trigger: String,
    /// Band label the metric fell into.
    pub finding: String,
    pub suggested_group: Group,
}

/// Return the first escalation finding in scan order, if any.
#[must_use]
pub fn detect(obs: &ClinicalObservation) -> Option<Escalation> {
    let ctx = ClassifierContext::default();
    SCAN_ORDER.into_iter().find_map(|metric| {
        let classification = classifier::classify(metric, obs, &ctx);
        let tier = AlertTier::from_tier(classification.tier?)?;
        Some(Escalation {
            tier,
            metric,
            trigger: trigger_text(metric, &classification),
            finding: classification.label,
            suggested_group: tier.suggested_group(),
        })
    })
}

fn trigger_text(metric: Metric, classification: &Classification) -> String {
    let severity = if classification.at_least(Tier::Severe) {
        "severe"
    } else {
        "moderate"
    };
    match metric {
        Metric::HeartRate => format!("{} HR alteration", severity),
        Metric::RespiratoryRate => format!("{} RR alteration", severity),
        Metric::Spo2 => format!("{} SpO2 alteration", severity),
        _ => classification.label.clone(),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::GlucoseReading;
    use crate::Measure;

    fn whole(v: i64) -> Option<Measure> {
        Some(Measure::from_whole(v))
    }

    #[test]
    fn severe_heart_rate_is_red() {
        let obs = ClinicalObservation {
            heart_rate: whole(170),
            ..Default::default()
        };
        let found = detect(&obs).expect("escalation");
        assert_eq!(found.tier, AlertTier::Red);
        assert_eq!(found.trigger, "severe HR alteration");
        assert_eq!(found.suggested_group, Group::D);
        assert_eq!(found.metric, Metric::HeartRate);
    }

    #[test]
    fn temperature_reported_before_heart_rate() {
        let obs = ClinicalObservation {
            temperature: whole(41),
            heart_rate: whole(170),
            ..Default::default()
        };
        let found = detect(&obs).expect("escalation");
        assert_eq!(found.metric, Metric::Temperature);
        assert_eq!(found.trigger, "hyperthermia");
        assert_eq!(found.tier, AlertTier::Red);
        assert_eq!(found.suggested_group, Group::D);
    }

    #[test]
    fn moderate_finding_is_yellow() {
        let obs = ClinicalObservation {
            respiratory_rate: whole(35),
            ..Default::default()
        };
        let found = detect(&obs).expect("escalation");
        assert_eq!(found.tier, AlertTier::Yellow);
        assert_eq!(found.trigger, "moderate RR alteration");
        assert_eq!(found.suggested_group, Group::C);
    }

    #[test]
    fn first_match_wins_even_if_later_is_worse() {
        let obs = ClinicalObservation {
            systolic_bp: whole(80),
            diastolic_bp: whole(60),
            spo2: whole(80),
            ..Default::default()
        };
        let found = detect(&obs).expect("escalation");
        assert_eq!(found.trigger, "moderate hypotension");
        assert_eq!(found.tier, AlertTier::Yellow);
    }

    #[test]
    fn mild_and_normal_findings_do_not_escalate() {
        let obs = ClinicalObservation {
            temperature: whole(39),
            heart_rate: whole(110),
            spo2: whole(96),
            ..Default::default()
        };
        assert!(detect(&obs).is_none());
        assert!(detect(&ClinicalObservation::new()).is_none());
    }

    #[test]
    fn glucose_sentinel_is_red() {
        let obs = ClinicalObservation {
            glucose: Some(GlucoseReading::Low),
            ..Default::default()
        };
        let found = detect(&obs).expect("escalation");
        assert_eq!(found.trigger, "extreme hypoglycemia");
        assert_eq!(found.tier, AlertTier::Red);
    }

    #[test]
    fn labs_are_not_scanned() {
        let obs = ClinicalObservation {
            platelets: whole(4_000),
            hemoglobin: whole(4),
            ..Default::default()
        };
        assert!(detect(&obs).is_none());
    }
}
