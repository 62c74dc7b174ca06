//! # Flow Storage
//!
//! Where patient flows live between operations.
//!
//! Both backends store the encoded record of [`crate::formats::persistence`],
//! so a flow reads back identically whichever one holds it.

mod redb_store;

pub use redb_store::RedbRepository;

use crate::formats::{flow_from_bytes, flow_to_bytes};
use crate::session::PatientFlow;
use crate::{PatientId, TriageError};
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Storage of patient flows, keyed by patient id.
///
/// `save` is called after every transition and is the update notification
/// of the engine: implementations may forward it anywhere else they need.
pub trait FlowRepository: Send + Sync {
    /// Load a flow, `None` if the patient is unknown.
    fn load(&self, id: &PatientId) -> Result<Option<PatientFlow>, TriageError>;

    /// Insert or overwrite a flow.
    fn save(&self, flow: &PatientFlow) -> Result<(), TriageError>;

    /// Every stored patient id, in ascending order.
    fn list(&self) -> Result<Vec<PatientId>, TriageError>;
}

/// Volatile repository for tests and `--backend memory`.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    records: RwLock<BTreeMap<PatientId, Vec<u8>>>,
}

impl MemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> TriageError {
    TriageError::IoError("repository lock poisoned".to_string())
}

impl FlowRepository for MemoryRepository {
    fn load(&self, id: &PatientId) -> Result<Option<PatientFlow>, TriageError> {
        let records = self.records.read().map_err(poisoned)?;
        records.get(id).map(|bytes| flow_from_bytes(bytes)).transpose()
    }

    fn save(&self, flow: &PatientFlow) -> Result<(), TriageError> {
        let bytes = flow_to_bytes(flow)?;
        let mut records = self.records.write().map_err(poisoned)?;
        records.insert(flow.id().clone(), bytes);
        Ok(())
    }

    fn list(&self) -> Result<Vec<PatientId>, TriageError> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patient::PatientRecord;
    use chrono::NaiveDate;

    #[test]
    fn memory_repository_roundtrip() {
        let repo = MemoryRepository::new();
        let today = NaiveDate::from_ymd_opt(2026, 1, 1).expect("date");
        let b = PatientFlow::admit(PatientRecord::new(PatientId::new("b")), today);
        let a = PatientFlow::admit(PatientRecord::new(PatientId::new("a")), today);

        repo.save(&b).expect("save");
        repo.save(&a).expect("save");

        assert_eq!(repo.load(&PatientId::new("a")).expect("load"), Some(a));
        assert_eq!(repo.load(&PatientId::new("zz")).expect("load"), None);
        assert_eq!(
            repo.list().expect("list"),
            vec![PatientId::new("a"), PatientId::new("b")]
        );
    }
}
