use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::debug;

use crate::chunk::Chunk;
use crate::error::{IngestError, Result};
use crate::schema::Translator;
use crate::store::{Record, RideStore};

/// The rows of one chunk that are not stored yet, coerced and ready to write.
#[derive(Debug, Clone)]
pub struct InsertBatch {
    pub csvnum: i64,
    pub chunk: usize,
    pub columns: Arc<[String]>,
    pub records: Vec<Record>,
}

/// Row numbers present in `chunk` but absent from `existing`.
pub fn missing_row_numbers(chunk: &Chunk, existing: &HashSet<i64>) -> BTreeSet<i64> {
    chunk
        .numbered_rows()
        .map(|(rownum, _)| rownum)
        .filter(|rownum| !existing.contains(rownum))
        .collect()
}

/// Check the chunk's row-number range against the store and build records
/// for the rows that are missing. `None` when the whole chunk is stored.
///
/// Coercion runs over every missing row before anything is written, so a bad
/// cell leaves the chunk entirely unwritten.
#[tracing::instrument(level = "debug", skip_all, fields(csvnum = chunk.csvnum, chunk = chunk.ordinal))]
pub fn reconcile<S: RideStore + ?Sized>(
    store: &mut S,
    translator: &Translator,
    chunk: &Chunk,
) -> Result<Option<InsertBatch>> {
    let csvnum = chunk.csvnum;
    let range = chunk.row_range();
    let existing = store
        .existing_row_numbers(csvnum, range.start, range.end)
        .map_err(|source| IngestError::Query {
            csvnum,
            what: "existence check",
            source,
        })?;

    let to_insert = missing_row_numbers(chunk, &existing);
    debug!(
        rows = chunk.len(),
        stored = existing.len(),
        missing = to_insert.len(),
        "reconciled"
    );
    if to_insert.is_empty() {
        return Ok(None);
    }

    let mut records = Vec::with_capacity(to_insert.len());
    for rownum in to_insert {
        let row = &chunk.rows[(rownum - range.start) as usize];
        let values = translator
            .coerce_row(row)
            .map_err(|failure| IngestError::Coercion {
                csvnum,
                chunk: chunk.ordinal,
                rownum,
                field: failure.field,
                value: failure.value,
                kind: failure.kind.as_str(),
            })?;
        records.push(Record {
            csvnum,
            rownum,
            values,
        });
    }

    Ok(Some(InsertBatch {
        csvnum,
        chunk: chunk.ordinal,
        columns: translator.columns(),
        records,
    }))
}
