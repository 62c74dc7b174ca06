//! # redb-backed Flow Storage
//!
//! Patient flows persisted in a redb embedded database: one table keyed by
//! patient id, each value an encoded flow record. Every save is its own
//! write transaction, so a crash never leaves a half-written flow.

use super::FlowRepository;
use crate::formats::{flow_from_bytes, flow_to_bytes};
use crate::session::PatientFlow;
use crate::{PatientId, TriageError};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::path::Path;

/// Table for flows: patient id -> encoded record.
const FLOWS: TableDefinition<&str, &[u8]> = TableDefinition::new("flows");

fn io_error(e: impl std::fmt::Display) -> TriageError {
    TriageError::IoError(e.to_string())
}

/// A disk-backed flow repository.
pub struct RedbRepository {
    db: Database,
}

impl std::fmt::Debug for RedbRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbRepository").finish_non_exhaustive()
    }
}

impl RedbRepository {
    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TriageError> {
        let db = Database::create(path.as_ref()).map_err(io_error)?;

        // Create the table so readers never see it missing.
        let write_txn = db.begin_write().map_err(io_error)?;
        {
            let _ = write_txn.open_table(FLOWS).map_err(io_error)?;
        }
        write_txn.commit().map_err(io_error)?;

        Ok(Self { db })
    }
}

impl FlowRepository for RedbRepository {
    fn load(&self, id: &PatientId) -> Result<Option<PatientFlow>, TriageError> {
        let read_txn = self.db.begin_read().map_err(io_error)?;
        let table = read_txn.open_table(FLOWS).map_err(io_error)?;
        let Some(entry) = table.get(id.as_str()).map_err(io_error)? else {
            return Ok(None);
        };
        flow_from_bytes(entry.value()).map(Some)
    }

    fn save(&self, flow: &PatientFlow) -> Result<(), TriageError> {
        let bytes = flow_to_bytes(flow)?;
        let write_txn = self.db.begin_write().map_err(io_error)?;
        {
            let mut table = write_txn.open_table(FLOWS).map_err(io_error)?;
            table
                .insert(flow.id().as_str(), bytes.as_slice())
                .map_err(io_error)?;
        }
        write_txn.commit().map_err(io_error)
    }

    fn list(&self) -> Result<Vec<PatientId>, TriageError> {
        let read_txn = self.db.begin_read().map_err(io_error)?;
        let table = read_txn.open_table(FLOWS).map_err(io_error)?;
        let mut ids = Vec::new();
        for entry in table.iter().map_err(io_error)? {
            let (key, _) = entry.map_err(io_error)?;
            ids.push(PatientId::new(key.value()));
        }
        Ok(ids)
    }
}

// =============================================================================
// TESTS
// =============================================================================
