use tracing::info;

use super::reconcile::InsertBatch;
use crate::error::{IngestError, Result};
use crate::store::{RideStore, StoreError};

/// Outcome of one committed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteSummary {
    pub rows: u64,
    pub last_rownum: i64,
}

/// Insert a non-empty batch in one transaction. On failure nothing from the
/// batch is stored and the error carries the archive and chunk.
pub fn write_batch<S: RideStore + ?Sized>(
    store: &mut S,
    batch: &InsertBatch,
) -> Result<WriteSummary> {
    let write_err = |source| IngestError::Write {
        csvnum: batch.csvnum,
        chunk: batch.chunk,
        source,
    };

    let last_rownum = batch
        .records
        .iter()
        .map(|r| r.rownum)
        .max()
        .ok_or_else(|| write_err(StoreError::EmptyBatch))?;

    info!(chunk = batch.chunk, rows = batch.records.len(), "inserting");
    let rows = store
        .insert_records(&batch.columns, &batch.records)
        .map_err(write_err)?;

    Ok(WriteSummary { rows, last_rownum })
}
