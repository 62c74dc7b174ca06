//! # Persistence Format
//!
//! Binary serialization of patient flows.
//!
//! Format: Header (5 bytes) + postcard-serialized flow record.
//! - 4 bytes: Magic ("TRGE")
//! - 1 byte: Version
//!
//! Recorded answers travel as a JSON text payload inside the record. A payload
//! that does not decode is replaced by an empty answer map and logged as a
//! warning; the rest of the record still loads.
//!
//! Size and header are validated before any payload is parsed.

use crate::engine::FlowState;
use crate::observation::ClinicalObservation;
use crate::patient::{ClassifierContext, PatientRecord};
use crate::primitives::{self, MAX_HISTORY_LENGTH};
use crate::session::{PatientFlow, PendingAuto};
use crate::{Group, StepId, TriageError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum accepted size of one encoded record.
pub const MAX_RECORD_SIZE: usize = 1024 * 1024;

const HEADER_LEN: usize = 5;

// =============================================================================
// HEADER
// =============================================================================

/// The header that precedes every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistenceHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl PersistenceHeader {
    /// Header of the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    pub fn validate(&self) -> Result<(), TriageError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(TriageError::SerializationError("Invalid magic bytes".to_string()));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(TriageError::SerializationError(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let [a, b, c, d] = self.magic;
        [a, b, c, d, self.version]
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TriageError> {
        match bytes {
            [a, b, c, d, version, ..] => Ok(Self {
                magic: [*a, *b, *c, *d],
                version: *version,
            }),
            _ => Err(TriageError::SerializationError("Header too short".to_string())),
        }
    }
}

impl Default for PersistenceHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// RECORD
// =============================================================================

/// On-disk shape of a [`PatientFlow`].
#[derive(Serialize, Deserialize)]
struct FlowRecord {
    patient: PatientRecord,
    context: ClassifierContext,
    current_step: StepId,
    history: Vec<StepId>,
    answers_json: String,
    progress: u8,
    group: Option<Group>,
    observation: ClinicalObservation,
    pending: Option<PendingAuto>,
    revision: u64,
}

/// Serialize a flow to bytes (header + payload).
pub fn flow_to_bytes(flow: &PatientFlow) -> Result<Vec<u8>, TriageError> {
    let answers_json = serde_json::to_string(&flow.state.answers)
        .map_err(|e| TriageError::SerializationError(e.to_string()))?;
    let record = FlowRecord {
        patient: flow.patient.clone(),
        context: flow.context,
        current_step: flow.state.current_step.clone(),
        history: flow.state.history.clone(),
        answers_json,
        progress: flow.state.progress,
        group: flow.state.group,
        observation: flow.observation.clone(),
        pending: flow.pending.clone(),
        revision: flow.revision,
    };

    let payload =
        postcard::to_stdvec(&record).map_err(|e| TriageError::SerializationError(e.to_string()))?;
    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(&PersistenceHeader::new().to_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Deserialize a flow from bytes.
pub fn flow_from_bytes(bytes: &[u8]) -> Result<PatientFlow, TriageError> {
    if bytes.len() > MAX_RECORD_SIZE {
        return Err(TriageError::SerializationError(format!(
            "Record size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_RECORD_SIZE
        )));
    }
    let header = PersistenceHeader::from_bytes(bytes)?;
    header.validate()?;

    let payload = bytes.get(HEADER_LEN..).unwrap_or_default();
    let record: FlowRecord = postcard::from_bytes(payload).map_err(|e| {
        TriageError::SerializationError(format!("Failed to deserialize flow record: {}", e))
    })?;
    if record.history.len() > MAX_HISTORY_LENGTH {
        return Err(TriageError::SerializationError(format!(
            "History of {} steps exceeds maximum {}",
            record.history.len(),
            MAX_HISTORY_LENGTH
        )));
    }

    let answers = decode_answers(&record.answers_json, &record.patient.id.0);
    Ok(PatientFlow {
        patient: record.patient,
        context: record.context,
        state: FlowState {
            current_step: record.current_step,
            history: record.history,
            answers,
            progress: record.progress,
            group: record.group,
        },
        observation: record.observation,
        pending: record.pending,
        revision: record.revision,
    })
}

/// Decode a stored answers payload; malformed input yields an empty map.
pub fn decode_answers(payload: &str, patient: &str) -> BTreeMap<StepId, String> {
    if payload.trim().is_empty() {
        return BTreeMap::new();
    }
    match serde_json::from_str(payload) {
        Ok(answers) => answers,
        Err(e) => {
            tracing::warn!(
                event = "answers",
                patient,
                error = %e,
                "Malformed stored answers, using empty map"
            );
            BTreeMap::new()
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
