//! # Clinical Classifiers
//!
//! One function per metric, each returning the single highest-priority band
//! that matches. Extreme bands are checked before milder ones; for blood
//! pressure every hypotension band is checked before any hypertension band.
//!
//! Bands are half-open on the fixed-point scale, so values between the whole
//! numbers of a printed range (e.g. 49.5 bpm) fall into exactly one band.
//!
//! ## Contract
//!
//! - Classification never fails: an absent input yields [`Classification::empty`]
//! - Inputs come from an explicit [`ClinicalObservation`] snapshot
//! - Derived values (MAP, Ht/Hb ratio, mL/kg/h) are reported alongside the band

use crate::observation::{parse_blood_pressure, ClinicalObservation, GlucoseReading};
use crate::patient::{ClassifierContext, Sex};
use crate::{Measure, TriageError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// RESULT TYPES
// =============================================================================

/// Severity of a classification band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Normal,
    Mild,
    Moderate,
    Severe,
    Extreme,
}

impl Tier {
    /// Display tone for this tier.
    #[must_use]
    pub fn tone(self) -> Tone {
        match self {
            Tier::Normal => Tone::Ok,
            Tier::Mild => Tone::Caution,
            Tier::Moderate => Tone::Warning,
            Tier::Severe | Tier::Extreme => Tone::Danger,
        }
    }
}

/// Visual hint for hosts rendering a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    /// Nothing to show.
    Neutral,
    Ok,
    Caution,
    Warning,
    Danger,
}

/// The band a value fell into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub label: String,
    /// `None` when the input was absent or unusable.
    pub tier: Option<Tier>,
    pub tone: Tone,
    /// Value computed from the inputs (MAP, Ht/Hb ratio, mL/kg/h).
    pub derived: Option<Measure>,
}

impl Classification {
    /// The "not measured" result.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            label: String::new(),
            tier: None,
            tone: Tone::Neutral,
            derived: None,
        }
    }

    fn band(label: &str, tier: Tier) -> Self {
        Self {
            label: label.to_string(),
            tier: Some(tier),
            tone: tier.tone(),
            derived: None,
        }
    }

    fn with_derived(mut self, value: Measure) -> Self {
        self.derived = Some(value);
        self
    }

    /// Whether nothing could be classified.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tier.is_none()
    }

    /// Whether the band is at least `tier`.
    #[must_use]
    pub fn at_least(&self, tier: Tier) -> bool {
        self.tier.is_some_and(|t| t >= tier)
    }
}

// =============================================================================
// METRICS
// =============================================================================

/// Every metric the classifier understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    Temperature,
    HeartRate,
    RespiratoryRate,
    Spo2,
    BloodPressure,
    Glucose,
    Hemoglobin,
    HtHbRatio,
    Platelets,
    Albumin,
    Ast,
    Alt,
    Diuresis,
}

impl Metric {
    /// All metrics, in display order.
    pub const ALL: [Metric; 13] = [
        Metric::Temperature,
        Metric::HeartRate,
        Metric::RespiratoryRate,
        Metric::Spo2,
        Metric::BloodPressure,
        Metric::Glucose,
        Metric::Hemoglobin,
        Metric::HtHbRatio,
        Metric::Platelets,
        Metric::Albumin,
        Metric::Ast,
        Metric::Alt,
        Metric::Diuresis,
    ];

    /// Wire name of the metric.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Metric::Temperature => "temperature",
            Metric::HeartRate => "heartRate",
            Metric::RespiratoryRate => "respiratoryRate",
            Metric::Spo2 => "spo2",
            Metric::BloodPressure => "bloodPressure",
            Metric::Glucose => "glucose",
            Metric::Hemoglobin => "hemoglobin",
            Metric::HtHbRatio => "htHbRatio",
            Metric::Platelets => "platelets",
            Metric::Albumin => "albumin",
            Metric::Ast => "ast",
            Metric::Alt => "alt",
            Metric::Diuresis => "diuresis",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = TriageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace(['-', '_'], "");
        Metric::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(&wanted))
            .or_else(|| match wanted.to_ascii_lowercase().as_str() {
                "hr" => Some(Metric::HeartRate),
                "rr" => Some(Metric::RespiratoryRate),
                "bp" => Some(Metric::BloodPressure),
                "temp" => Some(Metric::Temperature),
                "ratio" => Some(Metric::HtHbRatio),
                _ => None,
            })
            .ok_or_else(|| TriageError::InvalidInput(format!("unknown metric: {}", s)))
    }
}

/// One metric's classification, as returned by [`classify_all`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricReading {
    pub metric: Metric,
    #[serde(flatten)]
    pub classification: Classification,
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Classify one metric from an observation snapshot.
#[must_use]
pub fn classify(
    metric: Metric,
    obs: &ClinicalObservation,
    ctx: &ClassifierContext,
) -> Classification {
    let unclassified = Classification::empty;
    match metric {
        Metric::Temperature => obs.temperature.map_or_else(unclassified, temperature),
        Metric::HeartRate => obs.heart_rate.map_or_else(unclassified, heart_rate),
        Metric::RespiratoryRate => obs.respiratory_rate.map_or_else(unclassified, respiratory_rate),
        Metric::Spo2 => obs.spo2.map_or_else(unclassified, spo2),
        Metric::BloodPressure => match (obs.systolic_bp, obs.diastolic_bp) {
            (Some(sys), Some(dia)) => blood_pressure(sys, dia),
            _ => unclassified(),
        },
        Metric::Glucose => obs.glucose.map_or_else(unclassified, glucose),
        Metric::Hemoglobin => obs
            .hemoglobin
            .map_or_else(unclassified, |hb| hemoglobin(hb, ctx)),
        Metric::HtHbRatio => match (obs.hematocrit, obs.hemoglobin) {
            (Some(ht), Some(hb)) => ht_hb_ratio(ht, hb),
            _ => unclassified(),
        },
        Metric::Platelets => obs.platelets.map_or_else(unclassified, platelets),
        Metric::Albumin => obs.albumin.map_or_else(unclassified, albumin),
        Metric::Ast => obs.ast.map_or_else(unclassified, ast),
        Metric::Alt => obs.alt.map_or_else(unclassified, alt),
        Metric::Diuresis => match (obs.diuresis_ml_per_hour, ctx.weight) {
            (Some(ml), Some(kg)) => diuresis(ml, kg),
            _ => unclassified(),
        },
    }
}

/// Classify a raw form input for one metric.
///
/// Blood pressure takes `"120/80"`; the Ht/Hb ratio takes `"48/12"`
/// (hematocrit/hemoglobin); glucose accepts `"HI"`/`"LO"`. Unreadable input
/// yields the empty result.
#[must_use]
pub fn classify_input(metric: Metric, input: &str, ctx: &ClassifierContext) -> Classification {
    let mut obs = ClinicalObservation::new();
    let value = input.parse::<Measure>().ok();
    match metric {
        Metric::Temperature => obs.temperature = value,
        Metric::HeartRate => obs.heart_rate = value,
        Metric::RespiratoryRate => obs.respiratory_rate = value,
        Metric::Spo2 => obs.spo2 = value,
        Metric::BloodPressure => {
            obs.set_blood_pressure(input);
        }
        Metric::Glucose => obs.glucose = GlucoseReading::parse(input),
        Metric::Hemoglobin => obs.hemoglobin = value,
        Metric::HtHbRatio => {
            if let Some((ht, hb)) = parse_blood_pressure(input) {
                obs.hematocrit = Some(ht);
                obs.hemoglobin = Some(hb);
            }
        }
        Metric::Platelets => obs.platelets = value,
        Metric::Albumin => obs.albumin = value,
        Metric::Ast => obs.ast = value,
        Metric::Alt => obs.alt = value,
        Metric::Diuresis => obs.diuresis_ml_per_hour = value,
    }
    classify(metric, &obs, ctx)
}

/// Every metric that can be classified from the snapshot.
#[must_use]
pub fn classify_all(obs: &ClinicalObservation, ctx: &ClassifierContext) -> Vec<MetricReading> {
    Metric::ALL
        .into_iter()
        .map(|metric| MetricReading {
            metric,
            classification: classify(metric, obs, ctx),
        })
        .filter(|reading| !reading.classification.is_empty())
        .collect()
}

// =============================================================================
// VITAL SIGNS
// =============================================================================

const fn whole(value: i64) -> Measure {
    Measure::from_whole(value)
}

const fn hundredths(value: i64) -> Measure {
    Measure::from_hundredths(value)
}

/// Heart rate in bpm.
#[must_use]
pub fn heart_rate(bpm: Measure) -> Classification {
    if bpm < whole(35) {
        Classification::band("severe bradycardia", Tier::Severe)
    } else if bpm < whole(50) {
        Classification::band("moderate bradycardia", Tier::Moderate)
    } else if bpm < whole(60) {
        Classification::band("mild bradycardia", Tier::Mild)
    } else if bpm <= whole(100) {
        Classification::band("normal", Tier::Normal)
    } else if bpm <= whole(130) {
        Classification::band("mild tachycardia", Tier::Mild)
    } else if bpm < whole(160) {
        Classification::band("moderate tachycardia", Tier::Moderate)
    } else {
        Classification::band("severe tachycardia", Tier::Severe)
    }
}

/// Respiratory rate in rpm.
#[must_use]
pub fn respiratory_rate(rpm: Measure) -> Classification {
    if rpm < whole(9) {
        Classification::band("severe bradypnea", Tier::Severe)
    } else if rpm < whole(12) {
        Classification::band("moderate bradypnea", Tier::Moderate)
    } else if rpm < whole(14) {
        Classification::band("mild bradypnea", Tier::Mild)
    } else if rpm <= whole(20) {
        Classification::band("normal", Tier::Normal)
    } else if rpm <= whole(30) {
        Classification::band("mild tachypnea", Tier::Mild)
    } else if rpm < whole(40) {
        Classification::band("moderate tachypnea", Tier::Moderate)
    } else {
        Classification::band("severe tachypnea", Tier::Severe)
    }
}

/// Peripheral oxygen saturation in %. Readings above 100 are not classified.
#[must_use]
pub fn spo2(percent: Measure) -> Classification {
    if percent > whole(100) {
        Classification::empty()
    } else if percent <= whole(85) {
        Classification::band("severe hypoxemia", Tier::Severe)
    } else if percent < whole(90) {
        Classification::band("moderate hypoxemia", Tier::Moderate)
    } else if percent < whole(95) {
        Classification::band("mild hypoxemia", Tier::Mild)
    } else {
        Classification::band("normal", Tier::Normal)
    }
}

/// Axillary temperature in °C. 40.0 already counts as hyperthermia.
#[must_use]
pub fn temperature(celsius: Measure) -> Classification {
    if celsius < whole(28) {
        Classification::band("severe hypothermia", Tier::Severe)
    } else if celsius < whole(32) {
        Classification::band("moderate hypothermia", Tier::Moderate)
    } else if celsius < whole(36) {
        Classification::band("mild hypothermia", Tier::Mild)
    } else if celsius < hundredths(3730) {
        Classification::band("normal", Tier::Normal)
    } else if celsius < hundredths(3780) {
        Classification::band("sub-febrile", Tier::Mild)
    } else if celsius < whole(40) {
        Classification::band("fever", Tier::Mild)
    } else {
        Classification::band("hyperthermia", Tier::Severe)
    }
}

/// Blood pressure in mmHg, reported with its mean arterial pressure.
///
/// Hypotension is checked before hypertension: a reading that qualifies for
/// both (e.g. 185/45) is reported as hypotension.
#[must_use]
pub fn blood_pressure(systolic: Measure, diastolic: Measure) -> Classification {
    let band = if systolic < whole(70) || diastolic < whole(49) {
        Classification::band("severe hypotension", Tier::Severe)
    } else if systolic < whole(85) || diastolic < whole(55) {
        Classification::band("moderate hypotension", Tier::Moderate)
    } else if systolic < whole(100) || diastolic < whole(60) {
        Classification::band("mild hypotension", Tier::Mild)
    } else if systolic >= whole(180) || diastolic >= whole(110) {
        Classification::band("severe hypertension", Tier::Severe)
    } else if systolic >= whole(160) || diastolic >= whole(100) {
        Classification::band("moderate hypertension", Tier::Moderate)
    } else if systolic >= whole(140) || diastolic >= whole(90) {
        Classification::band("mild hypertension", Tier::Mild)
    } else if systolic >= whole(120) || diastolic >= whole(80) {
        Classification::band("elevated", Tier::Mild)
    } else {
        Classification::band("normal", Tier::Normal)
    };
    band.with_derived(mean_arterial_pressure(systolic, diastolic))
}

/// Mean arterial pressure, `round((sys + 2·dia) / 3)` in whole mmHg.
#[must_use]
pub fn mean_arterial_pressure(systolic: Measure, diastolic: Measure) -> Measure {
    let sum = systolic
        .hundredths()
        .saturating_add(diastolic.hundredths().saturating_mul(2));
    let divisor = 3 * Measure::SCALE;
    let rounded = if sum >= 0 {
        sum.saturating_add(divisor / 2) / divisor
    } else {
        sum.saturating_sub(divisor / 2) / divisor
    };
    whole(rounded)
}

// =============================================================================
// LABORATORY
// =============================================================================

/// Capillary glucose in mg/dL, or a meter sentinel.
#[must_use]
pub fn glucose(reading: GlucoseReading) -> Classification {
    let mg = match reading {
        GlucoseReading::High => return Classification::band("extreme hyperglycemia", Tier::Extreme),
        GlucoseReading::Low => return Classification::band("extreme hypoglycemia", Tier::Extreme),
        GlucoseReading::Value(mg) => mg,
    };
    if mg < whole(45) {
        Classification::band("severe hypoglycemia", Tier::Severe)
    } else if mg < whole(60) {
        Classification::band("moderate hypoglycemia", Tier::Moderate)
    } else if mg < whole(75) {
        Classification::band("mild hypoglycemia", Tier::Mild)
    } else if mg < whole(100) {
        Classification::band("normal", Tier::Normal)
    } else if mg < whole(126) {
        Classification::band("elevated", Tier::Mild)
    } else if mg <= whole(150) {
        Classification::band("mild hyperglycemia", Tier::Mild)
    } else if mg <= whole(200) {
        Classification::band("moderate hyperglycemia", Tier::Moderate)
    } else {
        Classification::band("severe hyperglycemia", Tier::Severe)
    }
}

/// Hemoglobin reference range `(min, max)` in g/dL for a patient.
///
/// Unknown age is treated as adult; an adult of unknown sex gets the union of
/// the male and female ranges.
#[must_use]
pub fn hemoglobin_range(ctx: &ClassifierContext) -> (Measure, Measure) {
    match ctx.age_months {
        Some(0) => (whole(16), whole(18)),
        Some(1..=11) => (hundredths(1060), whole(13)),
        Some(12..=215) => (hundredths(1150), hundredths(1450)),
        _ => match ctx.sex {
            Sex::Male => (hundredths(1250), hundredths(1650)),
            Sex::Female => (hundredths(1150), hundredths(1550)),
            Sex::Unknown => (hundredths(1150), hundredths(1650)),
        },
    }
}

/// Hemoglobin in g/dL against the patient's reference range.
#[must_use]
pub fn hemoglobin(hb: Measure, ctx: &ClassifierContext) -> Classification {
    let (min, max) = hemoglobin_range(ctx);
    if hb < whole(5) {
        Classification::band("extreme anemia", Tier::Extreme)
    } else if hb < whole(7) {
        Classification::band("severe anemia", Tier::Severe)
    } else if hb < whole(9) {
        Classification::band("moderate anemia", Tier::Moderate)
    } else if hb < min {
        Classification::band("mild anemia", Tier::Mild)
    } else if hb > max {
        Classification::band("above range", Tier::Mild)
    } else {
        Classification::band("normal", Tier::Normal)
    }
}

/// Hematocrit (%) over hemoglobin (g/dL), the hemoconcentration proxy.
#[must_use]
pub fn ht_hb_ratio(hematocrit: Measure, hemoglobin: Measure) -> Classification {
    let Some(ratio) = hematocrit.ratio_to(hemoglobin) else {
        return Classification::empty();
    };
    let band = if ratio > whole(5) {
        Classification::band("extreme hemoconcentration", Tier::Extreme)
    } else if ratio >= hundredths(360) {
        Classification::band("hemoconcentrated", Tier::Moderate)
    } else if ratio > hundredths(320) {
        Classification::band("elevated", Tier::Mild)
    } else if ratio >= hundredths(280) {
        Classification::band("normal", Tier::Normal)
    } else {
        Classification::band("below expected", Tier::Mild)
    };
    band.with_derived(ratio)
}

/// Platelet count per mm³. 20,000 to 99,999 is a single moderate band.
#[must_use]
pub fn platelets(count: Measure) -> Classification {
    if count > whole(450_000) {
        Classification::band("thrombocytosis", Tier::Mild)
    } else if count <= whole(5_000) {
        Classification::band("extreme thrombocytopenia", Tier::Extreme)
    } else if count <= whole(10_000) {
        Classification::band("very severe thrombocytopenia", Tier::Severe)
    } else if count < whole(20_000) {
        Classification::band("severe thrombocytopenia", Tier::Severe)
    } else if count < whole(100_000) {
        Classification::band("moderate thrombocytopenia", Tier::Moderate)
    } else if count < whole(150_000) {
        Classification::band("mild thrombocytopenia", Tier::Mild)
    } else {
        Classification::band("normal", Tier::Normal)
    }
}

/// Serum albumin in g/dL.
#[must_use]
pub fn albumin(g_dl: Measure) -> Classification {
    if g_dl > hundredths(560) {
        Classification::band("hyperalbuminemia", Tier::Mild)
    } else if g_dl >= hundredths(350) {
        Classification::band("normal", Tier::Normal)
    } else if g_dl >= whole(3) {
        Classification::band("mild hypoalbuminemia", Tier::Mild)
    } else if g_dl >= whole(2) {
        Classification::band("moderate hypoalbuminemia", Tier::Moderate)
    } else {
        Classification::band("severe hypoalbuminemia", Tier::Severe)
    }
}

/// AST (TGO) in U/L.
#[must_use]
pub fn ast(units: Measure) -> Classification {
    transaminase(units, [5, 40, 100, 200])
}

/// ALT (TGP) in U/L.
#[must_use]
pub fn alt(units: Measure) -> Classification {
    transaminase(units, [7, 56, 120, 220])
}

/// `[below-normal, normal max, mild max, moderate max]` in U/L.
fn transaminase(units: Measure, limits: [i64; 4]) -> Classification {
    let [floor, normal, mild, moderate] = limits;
    if units < whole(floor) {
        Classification::band("below normal", Tier::Mild)
    } else if units <= whole(normal) {
        Classification::band("normal", Tier::Normal)
    } else if units <= whole(mild) {
        Classification::band("mild elevation", Tier::Mild)
    } else if units <= whole(moderate) {
        Classification::band("moderate elevation", Tier::Moderate)
    } else {
        Classification::band("severe elevation", Tier::Severe)
    }
}

/// Urine output in mL/h for a body weight in kg; reports mL/kg/h.
#[must_use]
pub fn diuresis(ml_per_hour: Measure, weight_kg: Measure) -> Classification {
    let Some(per_kg) = ml_per_hour.ratio_to(weight_kg) else {
        return Classification::empty();
    };
    let band = if per_kg < hundredths(50) {
        Classification::band("oliguria suspected", Tier::Moderate)
    } else {
        Classification::band("adequate", Tier::Normal)
    };
    band.with_derived(per_kg)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn label(c: &Classification) -> &str {
        c.label.as_str()
    }

    fn m(text: &str) -> Measure {
        text.parse().expect("measure")
    }

    #[test]
    fn heart_rate_bands() {
        assert_eq!(label(&heart_rate(m("34"))), "severe bradycardia");
        assert_eq!(label(&heart_rate(m("35"))), "moderate bradycardia");
        assert_eq!(label(&heart_rate(m("49.5"))), "moderate bradycardia");
        assert_eq!(label(&heart_rate(m("59"))), "mild bradycardia");
        assert_eq!(label(&heart_rate(m("100"))), "normal");
        assert_eq!(label(&heart_rate(m("101"))), "mild tachycardia");
        assert_eq!(label(&heart_rate(m("131"))), "moderate tachycardia");
        assert_eq!(heart_rate(m("170")).tier, Some(Tier::Severe));
    }

    #[test]
    fn respiratory_rate_bands() {
        assert_eq!(respiratory_rate(m("8")).tier, Some(Tier::Severe));
        assert_eq!(respiratory_rate(m("11")).tier, Some(Tier::Moderate));
        assert_eq!(respiratory_rate(m("13")).tier, Some(Tier::Mild));
        assert_eq!(respiratory_rate(m("20")).tier, Some(Tier::Normal));
        assert_eq!(respiratory_rate(m("30")).tier, Some(Tier::Mild));
        assert_eq!(respiratory_rate(m("39")).tier, Some(Tier::Moderate));
        assert_eq!(respiratory_rate(m("40")).tier, Some(Tier::Severe));
    }

    #[test]
    fn spo2_bands() {
        assert_eq!(label(&spo2(m("85"))), "severe hypoxemia");
        assert_eq!(label(&spo2(m("89"))), "moderate hypoxemia");
        assert_eq!(label(&spo2(m("94"))), "mild hypoxemia");
        assert_eq!(label(&spo2(m("95"))), "normal");
        assert!(spo2(m("101")).is_empty());
    }

    #[test]
    fn temperature_bands() {
        assert_eq!(label(&temperature(m("27.9"))), "severe hypothermia");
        assert_eq!(label(&temperature(m("31.9"))), "moderate hypothermia");
        assert_eq!(label(&temperature(m("35.9"))), "mild hypothermia");
        assert_eq!(label(&temperature(m("37.2"))), "normal");
        assert_eq!(label(&temperature(m("37.3"))), "sub-febrile");
        assert_eq!(label(&temperature(m("37.8"))), "fever");
        assert_eq!(label(&temperature(m("39.9"))), "fever");
        assert_eq!(label(&temperature(m("40"))), "hyperthermia");
        assert_eq!(temperature(m("41")).tier, Some(Tier::Severe));
    }

    #[test]
    fn hypotension_checked_before_hypertension() {
        let c = classify_input(Metric::BloodPressure, "60/40", &ClassifierContext::default());
        assert_eq!(label(&c), "severe hypotension");
        assert_eq!(c.tier, Some(Tier::Severe));

        // Qualifies for both; hypotension wins.
        assert_eq!(label(&blood_pressure(m("185"), m("45"))), "severe hypotension");
    }

    #[test]
    fn blood_pressure_bands() {
        assert_eq!(label(&blood_pressure(m("80"), m("70"))), "moderate hypotension");
        assert_eq!(label(&blood_pressure(m("110"), m("58"))), "mild hypotension");
        assert_eq!(label(&blood_pressure(m("180"), m("90"))), "severe hypertension");
        assert_eq!(label(&blood_pressure(m("150"), m("100"))), "moderate hypertension");
        assert_eq!(label(&blood_pressure(m("140"), m("70"))), "mild hypertension");
        assert_eq!(label(&blood_pressure(m("118"), m("82"))), "elevated");
        assert_eq!(label(&blood_pressure(m("110"), m("70"))), "normal");
    }

    #[test]
    fn mean_arterial_pressure_is_reported() {
        let c = blood_pressure(m("120"), m("80"));
        // (120 + 160) / 3 = 93.33
        assert_eq!(c.derived, Some(m("93")));
        // (100 + 130) / 3 = 76.67
        assert_eq!(mean_arterial_pressure(m("100"), m("65")), m("77"));
    }

    #[test]
    fn glucose_bands() {
        assert_eq!(glucose(GlucoseReading::High).tier, Some(Tier::Extreme));
        assert_eq!(label(&glucose(GlucoseReading::Low)), "extreme hypoglycemia");
        let v = |s: &str| glucose(GlucoseReading::Value(m(s)));
        assert_eq!(label(&v("44")), "severe hypoglycemia");
        assert_eq!(label(&v("59")), "moderate hypoglycemia");
        assert_eq!(label(&v("74")), "mild hypoglycemia");
        assert_eq!(label(&v("99")), "normal");
        assert_eq!(label(&v("125")), "elevated");
        assert_eq!(label(&v("150")), "mild hyperglycemia");
        assert_eq!(label(&v("200")), "moderate hyperglycemia");
        assert_eq!(label(&v("201")), "severe hyperglycemia");
    }

    #[test]
    fn hemoglobin_uses_age_and_sex() {
        let adult_male = ClassifierContext {
            age_months: Some(480),
            sex: Sex::Male,
            weight: None,
        };
        let adult_female = ClassifierContext {
            sex: Sex::Female,
            ..adult_male
        };
        let neonate = ClassifierContext {
            age_months: Some(0),
            ..adult_male
        };

        assert_eq!(label(&hemoglobin(m("12"), &adult_male)), "mild anemia");
        assert_eq!(label(&hemoglobin(m("12"), &adult_female)), "normal");
        assert_eq!(label(&hemoglobin(m("16"), &adult_female)), "above range");
        assert_eq!(label(&hemoglobin(m("15"), &neonate)), "mild anemia");
        assert_eq!(label(&hemoglobin(m("8"), &adult_male)), "moderate anemia");
        assert_eq!(label(&hemoglobin(m("6.9"), &adult_male)), "severe anemia");
        assert_eq!(hemoglobin(m("4.9"), &adult_male).tier, Some(Tier::Extreme));
    }

    #[test]
    fn ratio_hemoconcentrated() {
        let obs = ClinicalObservation {
            hematocrit: Some(m("48")),
            hemoglobin: Some(m("12")),
            ..Default::default()
        };
        let c = classify(Metric::HtHbRatio, &obs, &ClassifierContext::default());
        assert_eq!(c.derived, Some(m("4")));
        assert_eq!(label(&c), "hemoconcentrated");
        assert!(c.at_least(Tier::Moderate));
    }

    #[test]
    fn ratio_bands_and_missing_hemoglobin() {
        assert_eq!(label(&ht_hb_ratio(m("36"), m("12"))), "normal");
        assert_eq!(label(&ht_hb_ratio(m("40"), m("12"))), "elevated");
        assert_eq!(label(&ht_hb_ratio(m("61"), m("12"))), "extreme hemoconcentration");
        assert_eq!(label(&ht_hb_ratio(m("30"), m("12"))), "below expected");
        assert!(ht_hb_ratio(m("40"), m("0")).is_empty());
    }

    #[test]
    fn platelet_partition() {
        assert_eq!(label(&platelets(m("460000"))), "thrombocytosis");
        assert_eq!(label(&platelets(m("5000"))), "extreme thrombocytopenia");
        assert_eq!(label(&platelets(m("10000"))), "very severe thrombocytopenia");
        assert_eq!(label(&platelets(m("19999"))), "severe thrombocytopenia");
        assert_eq!(label(&platelets(m("20000"))), "moderate thrombocytopenia");
        assert_eq!(label(&platelets(m("49999"))), "moderate thrombocytopenia");
        assert_eq!(label(&platelets(m("99999"))), "moderate thrombocytopenia");
        assert_eq!(label(&platelets(m("149999"))), "mild thrombocytopenia");
        assert_eq!(label(&platelets(m("150000"))), "normal");
    }

    #[test]
    fn albumin_and_transaminases() {
        assert_eq!(albumin(m("5.7")).tier, Some(Tier::Mild));
        assert_eq!(albumin(m("3.5")).tier, Some(Tier::Normal));
        assert_eq!(albumin(m("3.2")).tier, Some(Tier::Mild));
        assert_eq!(albumin(m("2")).tier, Some(Tier::Moderate));
        assert_eq!(albumin(m("1.9")).tier, Some(Tier::Severe));

        assert_eq!(label(&ast(m("4"))), "below normal");
        assert_eq!(label(&ast(m("40"))), "normal");
        assert_eq!(label(&ast(m("201"))), "severe elevation");
        assert_eq!(label(&alt(m("56"))), "normal");
        assert_eq!(label(&alt(m("57"))), "mild elevation");
        assert_eq!(label(&alt(m("221"))), "severe elevation");
    }

    #[test]
    fn diuresis_needs_weight() {
        let obs = ClinicalObservation {
            diuresis_ml_per_hour: Some(m("20")),
            ..Default::default()
        };
        let no_weight = ClassifierContext::default();
        assert!(classify(Metric::Diuresis, &obs, &no_weight).is_empty());

        let ctx = ClassifierContext {
            weight: Some(m("60")),
            ..Default::default()
        };
        let c = classify(Metric::Diuresis, &obs, &ctx);
        assert_eq!(label(&c), "oliguria suspected");
        assert_eq!(c.derived, Some(m("0.33")));
        assert_eq!(label(&diuresis(m("30"), m("60"))), "adequate");
    }

    #[test]
    fn absent_values_are_empty() {
        let obs = ClinicalObservation::new();
        let ctx = ClassifierContext::default();
        for metric in Metric::ALL {
            let c = classify(metric, &obs, &ctx);
            assert!(c.is_empty(), "{} should be empty", metric);
            assert_eq!(c.tone, Tone::Neutral);
        }
        assert!(classify_all(&obs, &ctx).is_empty());
        assert!(classify_input(Metric::HeartRate, "fast", &ctx).is_empty());
    }

    #[test]
    fn classify_all_lists_measured_metrics() {
        let obs = ClinicalObservation {
            heart_rate: Some(m("88")),
            systolic_bp: Some(m("90")),
            diastolic_bp: Some(m("60")),
            ..Default::default()
        };
        let readings = classify_all(&obs, &ClassifierContext::default());
        let metrics: Vec<Metric> = readings.iter().map(|r| r.metric).collect();
        assert_eq!(metrics, vec![Metric::HeartRate, Metric::BloodPressure]);
    }

    #[test]
    fn metric_names_parse() {
        assert_eq!("heartRate".parse::<Metric>().expect("metric"), Metric::HeartRate);
        assert_eq!("heart_rate".parse::<Metric>().expect("metric"), Metric::HeartRate);
        assert_eq!("bp".parse::<Metric>().expect("metric"), Metric::BloodPressure);
        assert_eq!("ht-hb-ratio".parse::<Metric>().expect("metric"), Metric::HtHbRatio);
        assert!("pulse".parse::<Metric>().is_err());
        for metric in Metric::ALL {
            assert_eq!(metric.name().parse::<Metric>().expect("roundtrip"), metric);
        }
    }
}
