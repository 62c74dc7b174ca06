//! # Core Type Definitions
//!
//! This module contains the shared vocabulary of the triage engine:
//! - Identifiers (`PatientId`, `StepId`)
//! - Protocol enums (`Group`, `StepKind`)
//! - Fixed-point clinical values (`Measure`)
//! - Error types (`TriageError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Use integer arithmetic only (no floating-point)
//! - Implement `Ord` for deterministic ordering in `BTreeMap`/`BTreeSet`

mod measure;

pub use measure::{Measure, MeasureParseError};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Identifier of a patient, assigned by the external patient repository.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatientId(pub String);

impl PatientId {
    /// Create a new patient identifier.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PatientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a protocol step (e.g. `"alarm_check"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(pub String);

impl StepId {
    /// Create a new step identifier.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StepId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for StepId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl PartialEq<str> for StepId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for StepId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

// =============================================================================
// SEVERITY GROUP
// =============================================================================

/// Dengue severity group.
///
/// Ordered by severity: `A < B < C < D`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Group {
    /// Ambulatory care, oral hydration.
    A,
    /// Observation unit, blood count mandatory.
    B,
    /// Alarm signs: intravenous hydration, admission.
    C,
    /// Shock or severe dengue: resuscitation, intensive care.
    D,
}

impl Group {
    /// Single-letter code of the group.
    #[must_use]
    pub fn letter(&self) -> &'static str {
        match self {
            Group::A => "A",
            Group::B => "B",
            Group::C => "C",
            Group::D => "D",
        }
    }

    /// Parse a group from an answer value such as `"C"` or `"group_c"`.
    ///
    /// Returns `None` for anything that does not name a group.
    #[must_use]
    pub fn from_answer(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        let code = trimmed
            .strip_prefix("group_")
            .or_else(|| trimmed.strip_prefix("group:"))
            .unwrap_or(trimmed);
        match code {
            "A" | "a" => Some(Group::A),
            "B" | "b" => Some(Group::B),
            "C" | "c" => Some(Group::C),
            "D" | "d" => Some(Group::D),
            _ => None,
        }
    }
}

impl std::fmt::Display for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Group {}", self.letter())
    }
}

// =============================================================================
// STEP KIND
// =============================================================================

/// The role a step plays in the flowchart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// The clinician answers a question by choosing an option.
    Question,
    /// The clinician confirms an action was carried out.
    Action,
    /// A conclusion or the terminal step.
    Result,
    /// Entry into a severity group.
    Group,
    /// Waiting for labs/reassessment; the next step is computed, not chosen.
    WaitLabs,
}

impl StepKind {
    /// Whether steps of this kind are resolved automatically.
    #[must_use]
    pub fn is_auto(&self) -> bool {
        matches!(self, StepKind::WaitLabs)
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the triage engine.
///
/// - No silent failures
/// - Use `Result<T, TriageError>` for fallible operations
/// - The CORE never panics; every error leaves the flow state valid
#[derive(Debug, Error)]
pub enum TriageError {
    /// The step is not part of the protocol graph.
    #[error("Step not found: {0}")]
    StepNotFound(StepId),

    /// The chosen option does not exist on the current step.
    #[error("Invalid option {index} for step {step}")]
    InvalidOption { step: StepId, index: usize },

    /// An automatic resolution was requested on a step that is not automatic.
    #[error("Step {0} is not an automatic step")]
    NotAutoStep(StepId),

    /// An automatic step cannot resolve until its lab results are recorded.
    #[error("Step {0} is waiting for lab results")]
    LabsPending(StepId),

    /// The patient has no flow record.
    #[error("Patient not found: {0}")]
    PatientNotFound(PatientId),

    /// A patient with this identifier was already admitted.
    #[error("Patient already exists: {0}")]
    DuplicatePatient(PatientId),

    /// A protocol definition failed integrity validation.
    #[error("Invalid protocol: {0}")]
    InvalidProtocol(String),

    /// An input value was rejected at the boundary.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================
