//! # triage-core
//!
//! The deterministic dengue triage engine - THE LOGIC.
//!
//! This crate walks a patient through a severity flowchart (groups A-D),
//! classifies vital signs and lab values into clinical bands, and detects
//! findings that require escalation.
//!
//! ## Layers
//!
//! - `graph` + `protocol` → immutable step data and its presentation
//! - `classifier` + `escalation` → pure functions over observation snapshots
//! - `engine` + `progress` → the state machine over [`FlowState`]
//! - `session` → per-patient flows with cancellable deferred transitions
//! - `formats` + `storage` → record encoding and repositories
//!
//! ## Architectural Constraints
//!
//! The CORE:
//! - Has NO async and NO network dependencies (pure Rust)
//! - Uses fixed-point arithmetic only; clinical values are hundredths
//! - Never reads ambient state: observations are passed in explicitly
//! - Never reads a clock: deferred transitions advance on explicit ticks

// =============================================================================
// MODULES
// =============================================================================

pub mod classifier;
pub mod engine;
pub mod escalation;
pub mod formats;
pub mod graph;
pub mod observation;
pub mod patient;
pub mod primitives;
pub mod progress;
pub mod protocol;
pub mod session;
pub mod storage;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{Group, Measure, MeasureParseError, PatientId, StepId, StepKind, TriageError};

// =============================================================================
// RE-EXPORTS: Protocol Engine
// =============================================================================

pub use classifier::{
    Classification, Metric, MetricReading, Tier, Tone, classify, classify_all, classify_input,
};
pub use engine::{AutoResolution, FlowState, Navigator};
pub use escalation::{AlertTier, Escalation, detect};
pub use graph::{AutoCheck, AutoRule, Step, StepGraph, StepOption};
pub use observation::{ClinicalObservation, GlucoseReading};
pub use patient::{ClassifierContext, PatientRecord, Sex};
pub use progress::{Milestones, calculate_progress};
pub use protocol::{Presentation, Protocol, StepText};
pub use session::{FlowUpdate, PatientFlow, PendingAuto, Session};

// =============================================================================
// RE-EXPORTS: Storage (from formats and storage modules)
// =============================================================================

pub use formats::{PersistenceHeader, flow_from_bytes, flow_to_bytes};
pub use storage::{FlowRepository, MemoryRepository, RedbRepository};
