//! # Clinical Observations
//!
//! A snapshot of vital signs and laboratory values for one patient.
//!
//! Every field is independently optional: `None` means "not measured yet".
//! When decoding from a human-readable format (JSON from a form, TOML), a
//! value that cannot be read as a number is also treated as not measured
//! instead of failing the whole snapshot.
//!
//! Classifiers and the escalation detector receive a snapshot explicitly;
//! they never look anything up on their own.

use crate::Measure;
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// =============================================================================
// GLUCOSE
// =============================================================================

/// A capillary glucose reading. Meters report `HI`/`LO` outside their range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlucoseReading {
    /// mg/dL.
    Value(Measure),
    /// Above the meter's range.
    High,
    /// Below the meter's range.
    Low,
}

impl GlucoseReading {
    /// Read a glucose entry: `"HI"`, `"LO"` or a number.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        if trimmed.eq_ignore_ascii_case("hi") || trimmed.eq_ignore_ascii_case("high") {
            Some(Self::High)
        } else if trimmed.eq_ignore_ascii_case("lo") || trimmed.eq_ignore_ascii_case("low") {
            Some(Self::Low)
        } else {
            trimmed.parse().ok().map(Self::Value)
        }
    }
}

impl std::fmt::Display for GlucoseReading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{}", v),
            Self::High => f.write_str("HI"),
            Self::Low => f.write_str("LO"),
        }
    }
}

/// Binary representation (postcard).
#[derive(Serialize, Deserialize)]
enum GlucoseRepr {
    Value(i64),
    High,
    Low,
}

impl Serialize for GlucoseReading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.collect_str(self)
        } else {
            match self {
                Self::Value(v) => GlucoseRepr::Value(v.hundredths()),
                Self::High => GlucoseRepr::High,
                Self::Low => GlucoseRepr::Low,
            }
            .serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for GlucoseReading {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let raw = RawInput::deserialize(deserializer)?;
            raw.into_glucose()
                .ok_or_else(|| serde::de::Error::custom("expected HI, LO or a number"))
        } else {
            Ok(match GlucoseRepr::deserialize(deserializer)? {
                GlucoseRepr::Value(v) => Self::Value(Measure::from_hundredths(v)),
                GlucoseRepr::High => Self::High,
                GlucoseRepr::Low => Self::Low,
            })
        }
    }
}

// =============================================================================
// OBSERVATION SNAPSHOT
// =============================================================================

/// Vital signs and lab values. Units: °C, bpm, rpm, %, mmHg, mg/dL, g/dL,
/// %, /mm³, g/dL, U/L, U/L, mL/h.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicalObservation {
    #[serde(default, deserialize_with = "lenient_measure")]
    pub temperature: Option<Measure>,
    #[serde(default, deserialize_with = "lenient_measure")]
    pub heart_rate: Option<Measure>,
    #[serde(default, deserialize_with = "lenient_measure")]
    pub respiratory_rate: Option<Measure>,
    #[serde(default, deserialize_with = "lenient_measure")]
    pub spo2: Option<Measure>,
    #[serde(default, rename = "systolicBP", deserialize_with = "lenient_measure")]
    pub systolic_bp: Option<Measure>,
    #[serde(default, rename = "diastolicBP", deserialize_with = "lenient_measure")]
    pub diastolic_bp: Option<Measure>,
    #[serde(default, deserialize_with = "lenient_glucose")]
    pub glucose: Option<GlucoseReading>,
    #[serde(default, deserialize_with = "lenient_measure")]
    pub hemoglobin: Option<Measure>,
    #[serde(default, deserialize_with = "lenient_measure")]
    pub hematocrit: Option<Measure>,
    #[serde(default, deserialize_with = "lenient_measure")]
    pub platelets: Option<Measure>,
    #[serde(default, deserialize_with = "lenient_measure")]
    pub albumin: Option<Measure>,
    #[serde(default, deserialize_with = "lenient_measure")]
    pub alt: Option<Measure>,
    #[serde(default, deserialize_with = "lenient_measure")]
    pub ast: Option<Measure>,
    #[serde(default, deserialize_with = "lenient_measure")]
    pub diuresis_ml_per_hour: Option<Measure>,
}

impl ClinicalObservation {
    /// Create an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether nothing has been measured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overlay `update` onto this snapshot: measured fields replace, absent
    /// fields keep the previous value.
    pub fn merge(&mut self, update: &ClinicalObservation) {
        fn take<T: Copy>(slot: &mut Option<T>, new: Option<T>) {
            if new.is_some() {
                *slot = new;
            }
        }
        take(&mut self.temperature, update.temperature);
        take(&mut self.heart_rate, update.heart_rate);
        take(&mut self.respiratory_rate, update.respiratory_rate);
        take(&mut self.spo2, update.spo2);
        take(&mut self.systolic_bp, update.systolic_bp);
        take(&mut self.diastolic_bp, update.diastolic_bp);
        take(&mut self.glucose, update.glucose);
        take(&mut self.hemoglobin, update.hemoglobin);
        take(&mut self.hematocrit, update.hematocrit);
        take(&mut self.platelets, update.platelets);
        take(&mut self.albumin, update.albumin);
        take(&mut self.alt, update.alt);
        take(&mut self.ast, update.ast);
        take(&mut self.diuresis_ml_per_hour, update.diuresis_ml_per_hour);
    }

    /// Set both blood pressure fields from a `"120/80"` or `"120x80"` reading.
    ///
    /// Returns `false` (and changes nothing) when the text is not a reading.
    pub fn set_blood_pressure(&mut self, text: &str) -> bool {
        match parse_blood_pressure(text) {
            Some((sys, dia)) => {
                self.systolic_bp = Some(sys);
                self.diastolic_bp = Some(dia);
                true
            }
            None => false,
        }
    }
}

/// Split a `"sys/dia"` reading (`/`, `x` or `X` separated).
#[must_use]
pub fn parse_blood_pressure(text: &str) -> Option<(Measure, Measure)> {
    let (sys, dia) = text.trim().split_once(['/', 'x', 'X'])?;
    Some((sys.parse().ok()?, dia.parse().ok()?))
}

// =============================================================================
// LENIENT DECODING
// =============================================================================

/// Anything a form might send for a numeric field.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawInput {
    Int(i64),
    Float(f64),
    Text(String),
    Other(IgnoredAny),
}

impl RawInput {
    fn into_measure(self) -> Option<Measure> {
        match self {
            RawInput::Int(v) => v.checked_mul(Measure::SCALE).map(Measure::from_hundredths),
            RawInput::Float(v) => v.to_string().parse().ok(),
            RawInput::Text(s) => s.parse().ok(),
            RawInput::Other(_) => None,
        }
    }

    fn into_glucose(self) -> Option<GlucoseReading> {
        match self {
            RawInput::Text(s) => GlucoseReading::parse(&s),
            other => other.into_measure().map(GlucoseReading::Value),
        }
    }
}

fn lenient_measure<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Measure>, D::Error> {
    if !deserializer.is_human_readable() {
        return Option::<Measure>::deserialize(deserializer);
    }
    let raw = Option::<RawInput>::deserialize(deserializer)?;
    Ok(raw.and_then(RawInput::into_measure))
}

fn lenient_glucose<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<GlucoseReading>, D::Error> {
    if !deserializer.is_human_readable() {
        return Option::<GlucoseReading>::deserialize(deserializer);
    }
    let raw = Option::<RawInput>::deserialize(deserializer)?;
    Ok(raw.and_then(RawInput::into_glucose))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_fields_are_independent_and_lenient() {
        let json = r#"{
            "temperature": 38.5,
            "heartRate": "112",
            "spo2": "",
            "systolicBP": 90,
            "diastolicBP": "sixty",
            "glucose": "HI",
            "platelets": 85000,
            "hemoglobin": null,
            "albumin": [1, 2]
        }"#;
        let obs: ClinicalObservation = serde_json::from_str(json).expect("decode");

        assert_eq!(obs.temperature, Some(Measure::from_hundredths(3850)));
        assert_eq!(obs.heart_rate, Some(Measure::from_whole(112)));
        assert_eq!(obs.spo2, None);
        assert_eq!(obs.systolic_bp, Some(Measure::from_whole(90)));
        assert_eq!(obs.diastolic_bp, None);
        assert_eq!(obs.glucose, Some(GlucoseReading::High));
        assert_eq!(obs.platelets, Some(Measure::from_whole(85_000)));
        assert_eq!(obs.hemoglobin, None);
        assert_eq!(obs.albumin, None);
        assert_eq!(obs.respiratory_rate, None);
    }

    #[test]
    fn empty_json_is_empty_observation() {
        let obs: ClinicalObservation = serde_json::from_str("{}").expect("decode");
        assert!(obs.is_empty());
    }

    #[test]
    fn merge_keeps_unmeasured_fields() {
        let mut base = ClinicalObservation {
            heart_rate: Some(Measure::from_whole(90)),
            hemoglobin: Some(Measure::from_whole(12)),
            ..Default::default()
        };
        let update = ClinicalObservation {
            heart_rate: Some(Measure::from_whole(120)),
            hematocrit: Some(Measure::from_whole(48)),
            ..Default::default()
        };
        base.merge(&update);

        assert_eq!(base.heart_rate, Some(Measure::from_whole(120)));
        assert_eq!(base.hemoglobin, Some(Measure::from_whole(12)));
        assert_eq!(base.hematocrit, Some(Measure::from_whole(48)));
    }

    #[test]
    fn blood_pressure_text_forms() {
        assert_eq!(
            parse_blood_pressure("120/80"),
            Some((Measure::from_whole(120), Measure::from_whole(80)))
        );
        assert_eq!(
            parse_blood_pressure(" 90x60 "),
            Some((Measure::from_whole(90), Measure::from_whole(60)))
        );
        assert_eq!(parse_blood_pressure("120"), None);
        assert_eq!(parse_blood_pressure("a/b"), None);

        let mut obs = ClinicalObservation::new();
        assert!(obs.set_blood_pressure("60/40"));
        assert_eq!(obs.systolic_bp, Some(Measure::from_whole(60)));
        assert!(!obs.set_blood_pressure("garbage"));
        assert_eq!(obs.diastolic_bp, Some(Measure::from_whole(40)));
    }

    #[test]
    fn glucose_sentinels() {
        assert_eq!(GlucoseReading::parse("lo"), Some(GlucoseReading::Low));
        assert_eq!(GlucoseReading::parse("HIGH"), Some(GlucoseReading::High));
        assert_eq!(
            GlucoseReading::parse("95"),
            Some(GlucoseReading::Value(Measure::from_whole(95)))
        );
        assert_eq!(GlucoseReading::parse("?"), None);
    }

    #[test]
    fn postcard_roundtrip_keeps_every_field() {
        let obs = ClinicalObservation {
            temperature: Some(Measure::from_hundredths(3720)),
            glucose: Some(GlucoseReading::Low),
            diuresis_ml_per_hour: Some(Measure::from_whole(30)),
            ..Default::default()
        };
        let bytes = postcard::to_allocvec(&obs).expect("encode");
        let back: ClinicalObservation = postcard::from_bytes(&bytes).expect("decode");
        assert_eq!(back, obs);
    }
}
