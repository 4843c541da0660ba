// src/store/mod.rs
use std::collections::HashSet;
use thiserror::Error;

use crate::schema::{FieldValue, RecordSchema};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] duckdb::Error),

    #[error("refusing to write an empty batch")]
    EmptyBatch,

    #[error("record for row {rownum} has {got} values, expected {expected}")]
    Arity {
        rownum: i64,
        got: usize,
        expected: usize,
    },
}

/// One row ready to be stored: the archive identifier, its row number and the
/// coerced field values in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub csvnum: i64,
    pub rownum: i64,
    pub values: Vec<FieldValue>,
}

/// The persistent record table. Every mutating call is its own transaction:
/// it either commits in full or leaves the table untouched.
pub trait RideStore {
    /// Create the table if it is absent.
    fn ensure_table(&mut self, schema: &RecordSchema) -> Result<(), StoreError>;

    /// Row numbers in `[lo, hi)` already stored for `csvnum`.
    fn existing_row_numbers(
        &mut self,
        csvnum: i64,
        lo: i64,
        hi: i64,
    ) -> Result<HashSet<i64>, StoreError>;

    /// Insert all `records` atomically; `columns` names the value positions.
    fn insert_records(&mut self, columns: &[String], records: &[Record])
        -> Result<u64, StoreError>;

    /// Number of rows stored for `csvnum` with `rownum >= from`.
    fn count_from(&mut self, csvnum: i64, from: i64) -> Result<u64, StoreError>;

    /// Delete rows for `csvnum` with `rownum < bound` in one transaction.
    fn delete_below(&mut self, csvnum: i64, bound: i64) -> Result<u64, StoreError>;
}
