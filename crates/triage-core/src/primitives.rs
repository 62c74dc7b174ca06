//! # Innate Primitives
//!
//! Hardcoded runtime constants for the triage CORE.
//!
//! These primitives are compiled into the binary and are immutable at runtime.
//! Protocol files may add steps but must honour the entry and terminal ids.

/// Entry step of every protocol. `restart` always returns here.
pub const START_STEP: &str = "start";

/// Terminal step of every protocol. Reaching it forces progress to 100.
pub const END_STEP: &str = "end";

/// Default delay before a scheduled automatic classification is applied.
///
/// Keeps the lab/reassessment screen visible long enough to be read.
pub const DEFAULT_AUTO_DELAY_MS: u64 = 1200;

/// Upper bound for a configurable automatic classification delay.
pub const MAX_AUTO_DELAY_MS: u64 = 10_000;

/// Progress never exceeds this value before the terminal step is reached.
pub const PROGRESS_CAP: u8 = 95;

/// Expected path length of the minimal Group A path.
pub const MIN_EXPECTED_PATH: usize = 6;

/// Magic bytes for the persisted flow record header.
pub const MAGIC_BYTES: &[u8; 4] = b"TRGE";

/// Current record format version.
///
/// Increment this when making breaking changes to the record layout.
pub const FORMAT_VERSION: u8 = 1;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length for patient identifiers.
pub const MAX_PATIENT_ID_LENGTH: usize = 128;

/// Maximum length for step identifiers in protocol files.
pub const MAX_STEP_ID_LENGTH: usize = 64;

/// Maximum length of a recorded answer value.
pub const MAX_ANSWER_LENGTH: usize = 256;

/// Maximum number of steps in a protocol definition.
pub const MAX_PROTOCOL_STEPS: usize = 512;

/// Maximum history depth kept for a single patient.
///
/// Forward paths are acyclic apart from restart, so a real flow never
/// approaches this; it bounds corrupted or hostile records.
pub const MAX_HISTORY_LENGTH: usize = 1024;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_and_terminal_differ() {
        assert_ne!(START_STEP, END_STEP);
    }

    #[test]
    fn default_delay_within_bounds() {
        assert!(DEFAULT_AUTO_DELAY_MS <= MAX_AUTO_DELAY_MS);
        assert!(PROGRESS_CAP < 100);
    }

    #[test]
    fn magic_bytes_correct() {
        assert_eq!(MAGIC_BYTES, b"TRGE");
    }
}
