// src/chunk/mod.rs
use csv::{ReaderBuilder, StringRecord, Trim};
use std::io::Read;
use std::num::NonZeroUsize;
use std::ops::Range;
use tracing::{debug, trace};

use crate::error::{IngestError, Result};
use crate::schema::RawCell;

pub mod date_parser;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Largest accepted chunk size. Keeps row-number arithmetic well inside `i64`
/// and bounds a single insert transaction.
pub const MAX_CHUNK_SIZE: usize = 1_000_000;

/// Rows reserved up front for a chunk; larger chunks grow as they fill.
const PREALLOC_ROWS: usize = 8192;

/// Reject chunk sizes above [`MAX_CHUNK_SIZE`].
pub fn checked_chunk_size(size: NonZeroUsize) -> Result<NonZeroUsize> {
    if size.get() > MAX_CHUNK_SIZE {
        return Err(IngestError::ChunkSize {
            size: size.get(),
            max: MAX_CHUNK_SIZE,
        });
    }
    Ok(size)
}

/// Up to `chunk_size` consecutive rows of one archive. Row `i` of chunk `c`
/// has absolute row number `c * chunk_size + i`.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub csvnum: i64,
    pub ordinal: usize,
    pub chunk_size: usize,
    pub rows: Vec<Vec<RawCell>>,
}

impl Chunk {
    /// Half-open row-number range owned by this chunk, `[c·s, (c+1)·s)`.
    pub fn row_range(&self) -> Range<i64> {
        let size = self.chunk_size as i64;
        let lo = (self.ordinal as i64).saturating_mul(size);
        lo..lo.saturating_add(size)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows paired with their absolute row numbers.
    pub fn numbered_rows(&self) -> impl Iterator<Item = (i64, &[RawCell])> + '_ {
        let lo = self.row_range().start;
        self.rows
            .iter()
            .enumerate()
            .map(move |(i, row)| (lo + i as i64, row.as_slice()))
    }
}

/// Lazily parses a CSV stream (header row first) into fixed-size chunks.
///
/// Every chunk but the last is full, so ordinal-derived ranges stay aligned
/// with the rows actually read. Forward-only: resuming means reading the
/// archive again from the start. After the first error the producer yields
/// nothing more.
pub struct ChunkProducer<R: Read> {
    reader: csv::Reader<R>,
    headers: Vec<String>,
    csvnum: i64,
    chunk_size: usize,
    timestamp_columns: &'static [usize],
    next_ordinal: usize,
    record: StringRecord,
    done: bool,
}

impl<R: Read> ChunkProducer<R> {
    #[tracing::instrument(level = "debug", skip(source))]
    pub fn new(
        source: R,
        csvnum: i64,
        chunk_size: NonZeroUsize,
        timestamp_columns: &'static [usize],
    ) -> Result<Self> {
        let chunk_size = checked_chunk_size(chunk_size)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .from_reader(source);

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| IngestError::Parse {
                csvnum,
                chunk: 0,
                rownum: None,
                detail: format!("cannot read header: {e}"),
            })?
            .iter()
            .map(str::to_string)
            .collect();
        debug!(columns = headers.len(), "read header");

        if let Some(&pos) = timestamp_columns.iter().find(|&&p| p >= headers.len()) {
            return Err(IngestError::Parse {
                csvnum,
                chunk: 0,
                rownum: None,
                detail: format!(
                    "timestamp column {pos} is beyond the {} header columns",
                    headers.len()
                ),
            });
        }

        Ok(Self {
            reader,
            headers,
            csvnum,
            chunk_size: chunk_size.get(),
            timestamp_columns,
            next_ordinal: 0,
            record: StringRecord::new(),
            done: false,
        })
    }

    /// Trimmed header names, in file order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    fn parse_error(&self, chunk: usize, rownum: i64, detail: String) -> IngestError {
        IngestError::Parse {
            csvnum: self.csvnum,
            chunk,
            rownum: Some(rownum),
            detail,
        }
    }

    fn read_chunk(&mut self) -> Result<Option<Chunk>> {
        let ordinal = self.next_ordinal;
        let first = (ordinal as i64).saturating_mul(self.chunk_size as i64);
        let mut rows = Vec::with_capacity(self.chunk_size.min(PREALLOC_ROWS));

        while rows.len() < self.chunk_size {
            let rownum = first + rows.len() as i64;
            let more = self
                .reader
                .read_record(&mut self.record)
                .map_err(|e| self.parse_error(ordinal, rownum, e.to_string()))?;
            if !more {
                break;
            }
            rows.push(self.convert_record(ordinal, rownum)?);
        }

        if rows.is_empty() {
            return Ok(None);
        }
        trace!(chunk = ordinal, rows = rows.len(), "read chunk");
        self.next_ordinal += 1;

        Ok(Some(Chunk {
            csvnum: self.csvnum,
            ordinal,
            chunk_size: self.chunk_size,
            rows,
        }))
    }

    fn convert_record(&self, ordinal: usize, rownum: i64) -> Result<Vec<RawCell>> {
        self.record
            .iter()
            .enumerate()
            .map(|(col, value)| {
                if !self.timestamp_columns.contains(&col) {
                    return Ok(RawCell::Text(value.to_string()));
                }
                date_parser::parse_timestamp(value)
                    .map(RawCell::Timestamp)
                    .ok_or_else(|| {
                        self.parse_error(
                            ordinal,
                            rownum,
                            format!(
                                "column `{}`: {value:?} is not a `{}` timestamp",
                                self.headers[col],
                                date_parser::TIMESTAMP_FORMAT
                            ),
                        )
                    })
            })
            .collect()
    }
}

impl<R: Read> Iterator for ChunkProducer<R> {
    type Item = Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_chunk() {
            Ok(Some(chunk)) => Some(Ok(chunk)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
