//! # Patient Records
//!
//! Read-only patient data as supplied by the host's patient repository.
//!
//! The core only uses a record to build a [`ClassifierContext`]: age in
//! months (hemoglobin reference ranges), sex, and weight (diuresis per kg).
//! Allergies are carried for the host's prescription checks.

use crate::{Measure, PatientId};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Biological sex as recorded at intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
    #[default]
    Unknown,
}

impl Sex {
    /// Lenient reading of a form value (`"M"`, `"female"`, `"F"` ...).
    #[must_use]
    pub fn parse(text: &str) -> Self {
        match text.trim().to_ascii_lowercase().as_str() {
            "m" | "male" | "masculino" => Self::Male,
            "f" | "female" | "feminino" => Self::Female,
            _ => Self::Unknown,
        }
    }
}

/// Patient data supplied at intake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientRecord {
    pub id: PatientId,
    /// Age in whole years as declared at intake.
    #[serde(default)]
    pub age: Option<u32>,
    /// Body weight in kg.
    #[serde(default)]
    pub weight: Option<Measure>,
    #[serde(default)]
    pub gender: Sex,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub allergies: Vec<String>,
}

impl PatientRecord {
    /// A record with only an id.
    #[must_use]
    pub fn new(id: PatientId) -> Self {
        Self {
            id,
            age: None,
            weight: None,
            gender: Sex::Unknown,
            birth_date: None,
            allergies: Vec::new(),
        }
    }

    /// Age in whole months on `today`.
    ///
    /// The birth date wins when present; otherwise the declared age in years
    /// is used. `None` when neither is known or the birth date is in the future.
    #[must_use]
    pub fn age_in_months(&self, today: NaiveDate) -> Option<u32> {
        match self.birth_date {
            Some(birth) => months_between(birth, today),
            None => self.age.map(|years| years.saturating_mul(12)),
        }
    }

    /// Build the classifier context for `today`.
    #[must_use]
    pub fn context(&self, today: NaiveDate) -> ClassifierContext {
        ClassifierContext {
            age_months: self.age_in_months(today),
            sex: self.gender,
            weight: self.weight,
        }
    }
}

fn months_between(birth: NaiveDate, today: NaiveDate) -> Option<u32> {
    if birth > today {
        return None;
    }
    let years = today.year() - birth.year();
    let mut months = years * 12 + today.month() as i32 - birth.month() as i32;
    if today.day() < birth.day() {
        months -= 1;
    }
    u32::try_from(months.max(0)).ok()
}

/// Patient facts some classifiers need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifierContext {
    #[serde(default)]
    pub age_months: Option<u32>,
    #[serde(default)]
    pub sex: Sex,
    /// Body weight in kg.
    #[serde(default)]
    pub weight: Option<Measure>,
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn age_from_birth_date() {
        let mut record = PatientRecord::new(PatientId::new("p1"));
        record.birth_date = Some(date(2025, 3, 20));

        assert_eq!(record.age_in_months(date(2025, 3, 20)), Some(0));
        assert_eq!(record.age_in_months(date(2025, 4, 19)), Some(0));
        assert_eq!(record.age_in_months(date(2025, 4, 20)), Some(1));
        assert_eq!(record.age_in_months(date(2026, 10, 19)), Some(18));
        assert_eq!(record.age_in_months(date(2024, 1, 1)), None);
    }

    #[test]
    fn declared_age_used_without_birth_date() {
        let mut record = PatientRecord::new(PatientId::new("p2"));
        record.age = Some(30);
        assert_eq!(record.age_in_months(date(2026, 1, 1)), Some(360));
    }

    #[test]
    fn sex_is_parsed_leniently() {
        assert_eq!(Sex::parse("F"), Sex::Female);
        assert_eq!(Sex::parse(" male "), Sex::Male);
        assert_eq!(Sex::parse("n/a"), Sex::Unknown);
    }

    #[test]
    fn record_decodes_from_intake_json() {
        let json = r#"{
            "id": "p-7",
            "age": 34,
            "weight": "70.5",
            "gender": "female",
            "birthDate": "1992-05-01",
            "allergies": ["dipyrone"]
        }"#;
        let record: PatientRecord = serde_json::from_str(json).expect("decode");
        assert_eq!(record.weight, Some(Measure::from_hundredths(7050)));
        assert_eq!(record.gender, Sex::Female);
        let ctx = record.context(date(2026, 5, 1));
        assert_eq!(ctx.age_months, Some(408));
        assert_eq!(ctx.sex, Sex::Female);
    }
}
