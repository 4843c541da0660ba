use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

use crate::chunk::checked_chunk_size;
use crate::error::{IngestError, Result};
use crate::store::RideStore;

/// What a purge removed, window by window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeSummary {
    /// Rows stored for the archive when the purge started.
    pub initial_rows: u64,
    /// Rows deleted by each committed window, in order.
    pub windows: Vec<u64>,
    pub rows_deleted: u64,
    pub cancelled: bool,
}

fn remaining<S: RideStore + ?Sized>(store: &mut S, csvnum: i64, from: i64) -> Result<u64> {
    store
        .count_from(csvnum, from)
        .map_err(|source| IngestError::Query {
            csvnum,
            what: "remaining-row count",
            source,
        })
}

/// Delete every stored row of `csvnum`, one committed window of `window` row
/// numbers at a time. Stops early (between windows) when `cancel` is set.
///
/// Assumes nobody is loading the same archive concurrently; rows written
/// behind the cursor would survive.
#[tracing::instrument(level = "info", skip(store, cancel))]
pub fn purge<S: RideStore + ?Sized>(
    store: &mut S,
    csvnum: i64,
    window: NonZeroUsize,
    cancel: &AtomicBool,
) -> Result<PurgeSummary> {
    let window = checked_chunk_size(window)?.get() as i64;
    let mut ix = 0i64;
    let mut left = remaining(store, csvnum, ix)?;
    let mut summary = PurgeSummary {
        initial_rows: left,
        ..PurgeSummary::default()
    };
    info!(rows = left, "deleting");

    while left > 0 {
        if cancel.load(Ordering::Relaxed) {
            warn!(at = ix, left, "purge cancelled");
            summary.cancelled = true;
            break;
        }
        info!(at = ix, left, "deleting window");
        let bound = ix.saturating_add(window);
        let deleted = store
            .delete_below(csvnum, bound)
            .map_err(|source| IngestError::Purge {
                csvnum,
                bound,
                source,
            })?;
        summary.windows.push(deleted);
        summary.rows_deleted += deleted;

        if bound == i64::MAX {
            break;
        }
        ix = bound;
        left = remaining(store, csvnum, ix)?;
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::MAX_CHUNK_SIZE;
    use crate::duck::DuckStore;
    use crate::schema::{ride_schema, RIDE_TABLE};
    use crate::store::Record;
    use crate::test_support::{ride_columns, ride_record};

    fn store_with(csvnum: i64, rownums: impl IntoIterator<Item = i64>) -> DuckStore {
        let mut store = DuckStore::open_in_memory(RIDE_TABLE).unwrap();
        store.ensure_table(&ride_schema()).unwrap();
        let records: Vec<Record> = rownums.into_iter().map(|r| ride_record(csvnum, r)).collect();
        if !records.is_empty() {
            store.insert_records(&ride_columns(), &records).unwrap();
        }
        store
    }

    fn window(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn deletes_in_bounded_windows() {
        let mut s = store_with(7, 0..2500);
        let summary = purge(&mut s, 7, window(1000), &AtomicBool::new(false)).unwrap();

        assert_eq!(summary.initial_rows, 2500);
        assert_eq!(summary.windows, vec![1000, 1000, 500]);
        assert_eq!(summary.rows_deleted, 2500);
        assert!(s.existing_row_numbers(7, 0, i64::MAX).unwrap().is_empty());
    }

    #[test]
    fn empty_archive_is_a_no_op() {
        let mut s = store_with(8, 0..10);
        let summary = purge(&mut s, 7, window(1000), &AtomicBool::new(false)).unwrap();
        assert_eq!(summary, PurgeSummary::default());
        assert_eq!(s.count_from(8, 0).unwrap(), 10);
    }

    #[test]
    fn sparse_rows_are_all_reached() {
        let mut s = store_with(7, [3, 4, 250, 251, 999]);
        let summary = purge(&mut s, 7, window(100), &AtomicBool::new(false)).unwrap();
        assert_eq!(summary.rows_deleted, 5);
        assert_eq!(summary.windows.len(), 10);
        assert_eq!(s.count_from(7, 0).unwrap(), 0);
    }

    #[test]
    fn largest_window_finishes_in_one_pass() {
        let mut s = store_with(7, [0, 1, 999_999]);
        let summary = purge(&mut s, 7, window(MAX_CHUNK_SIZE), &AtomicBool::new(false)).unwrap();
        assert_eq!(summary.windows, vec![3]);
        assert_eq!(s.count_from(7, 0).unwrap(), 0);
    }

    #[test]
    fn oversized_window_is_rejected_before_deleting() {
        let mut s = store_with(7, 0..3);
        let err = purge(&mut s, 7, NonZeroUsize::MAX, &AtomicBool::new(false)).unwrap_err();
        assert!(matches!(err, IngestError::ChunkSize { .. }), "{err}");
        assert_eq!(s.count_from(7, 0).unwrap(), 3);
    }

    #[test]
    fn cancelled_purge_stops_between_windows_and_can_resume() {
        let mut s = store_with(7, 0..30);
        let summary = purge(&mut s, 7, window(10), &AtomicBool::new(true)).unwrap();
        assert!(summary.cancelled);
        assert!(summary.windows.is_empty());
        assert_eq!(s.count_from(7, 0).unwrap(), 30);

        let summary = purge(&mut s, 7, window(10), &AtomicBool::new(false)).unwrap();
        assert_eq!(summary.windows, vec![10, 10, 10]);
    }
}
