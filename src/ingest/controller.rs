// src/ingest/controller.rs
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::purge::{purge, PurgeSummary};
use super::reconcile::reconcile;
use super::write::write_batch;
use crate::archive::{path_to_csvnum, SingleEntryArchive};
use crate::chunk::{checked_chunk_size, ChunkProducer, DEFAULT_CHUNK_SIZE};
use crate::error::{IngestError, Result};
use crate::schema::{RecordSchema, Translator};
use crate::store::RideStore;

const DEFAULT_CHUNK: NonZeroUsize = match NonZeroUsize::new(DEFAULT_CHUNK_SIZE) {
    Some(n) => n,
    None => panic!("chunk size must be non-zero"),
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunConfig {
    /// Rows per chunk; also the purge window.
    pub chunk_size: NonZeroUsize,
    /// Stop at the first chunk boundary where this many rows were inserted.
    pub upper_limit: Option<u64>,
    /// Purge the archive's stored rows before loading.
    pub delete_first: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK,
            upper_limit: None,
            delete_first: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Start,
    Purging,
    Loading,
    Finished,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every chunk of the archive was read.
    Exhausted,
    UpperLimit,
    Cancelled,
}

/// Progress after one written chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkProgress {
    pub chunk: usize,
    pub rows: u64,
    pub total_rows: u64,
    pub last_rownum: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub csvnum: i64,
    pub purge: Option<PurgeSummary>,
    pub chunks_read: usize,
    /// Chunks that had at least one missing row.
    pub chunks_written: usize,
    pub rows_inserted: u64,
    pub last_rownum: Option<i64>,
    pub progress: Vec<ChunkProgress>,
    pub stop: StopReason,
}

impl RunSummary {
    fn new(csvnum: i64) -> Self {
        Self {
            csvnum,
            purge: None,
            chunks_read: 0,
            chunks_written: 0,
            rows_inserted: 0,
            last_rownum: None,
            progress: Vec::new(),
            stop: StopReason::Exhausted,
        }
    }
}

/// Drives one archive through purge (optional) and load against an explicit
/// store handle. Chunks are read, reconciled and written strictly in turn.
pub struct RunController<S: RideStore> {
    store: S,
    schema: RecordSchema,
    config: RunConfig,
    cancel: Arc<AtomicBool>,
    phase: RunPhase,
}

impl<S: RideStore> RunController<S> {
    pub fn new(store: S, schema: RecordSchema, config: RunConfig) -> Self {
        Self {
            store,
            schema,
            config,
            cancel: Arc::new(AtomicBool::new(false)),
            phase: RunPhase::Start,
        }
    }

    /// Share a cancellation flag. It is checked at every chunk and purge
    /// window boundary.
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    fn transition(&mut self, next: RunPhase) {
        debug!(from = ?self.phase, to = ?next, "phase");
        self.phase = next;
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Load `archive`, skipping rows that are already stored.
    #[tracing::instrument(level = "info", skip(self, archive), fields(archive = %archive.display()))]
    pub fn run(&mut self, archive: &Path) -> Result<RunSummary> {
        self.phase = RunPhase::Start;
        match self.run_phases(archive) {
            Ok(summary) => {
                self.transition(RunPhase::Finished);
                info!(
                    chunks = summary.chunks_written,
                    rows = summary.rows_inserted,
                    stop = ?summary.stop,
                    "finished"
                );
                Ok(summary)
            }
            Err(e) => {
                self.transition(RunPhase::Failed);
                error!(error = %e, "run failed");
                Err(e)
            }
        }
    }

    fn run_phases(&mut self, archive: &Path) -> Result<RunSummary> {
        let csvnum = path_to_csvnum(archive)?;
        checked_chunk_size(self.config.chunk_size)?;
        let mut summary = RunSummary::new(csvnum);

        self.store
            .ensure_table(&self.schema)
            .map_err(|source| IngestError::Query {
                csvnum,
                what: "table creation",
                source,
            })?;

        if self.config.delete_first {
            self.transition(RunPhase::Purging);
            let purged = purge(&mut self.store, csvnum, self.config.chunk_size, &self.cancel)?;
            let cancelled = purged.cancelled;
            summary.purge = Some(purged);
            if cancelled {
                summary.stop = StopReason::Cancelled;
                return Ok(summary);
            }
        }

        self.transition(RunPhase::Loading);
        let mut zip = SingleEntryArchive::open(archive)?;
        let mut chunks = ChunkProducer::new(
            zip.entry()?,
            csvnum,
            self.config.chunk_size,
            self.schema.timestamp_columns,
        )?;
        let translator = Translator::new(&self.schema, chunks.headers())
            .map_err(|source| IngestError::ColumnMapping { csvnum, source })?;

        loop {
            if self.cancelled() {
                warn!(chunks = summary.chunks_read, "load cancelled");
                summary.stop = StopReason::Cancelled;
                break;
            }
            let Some(chunk) = chunks.next() else {
                break;
            };
            let chunk = chunk?;
            summary.chunks_read += 1;

            let Some(batch) = reconcile(&mut self.store, &translator, &chunk)? else {
                debug!(chunk = chunk.ordinal, "chunk already stored");
                continue;
            };
            let written = write_batch(&mut self.store, &batch)?;

            summary.chunks_written += 1;
            summary.rows_inserted += written.rows;
            summary.last_rownum = Some(written.last_rownum);
            let progress = ChunkProgress {
                chunk: chunk.ordinal,
                rows: written.rows,
                total_rows: summary.rows_inserted,
                last_rownum: written.last_rownum,
            };
            info!(
                chunk = progress.chunk,
                rows = progress.rows,
                total = progress.total_rows,
                last = progress.last_rownum,
                "inserted chunk"
            );
            summary.progress.push(progress);

            if let Some(limit) = self.config.upper_limit {
                if summary.rows_inserted >= limit {
                    info!(limit, "upper limit reached");
                    summary.stop = StopReason::UpperLimit;
                    break;
                }
            }
        }

        Ok(summary)
    }
}
