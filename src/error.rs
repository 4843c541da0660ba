// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

use crate::schema::MappingError;
use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, IngestError>;

/// Everything that can abort a load run. None of these are retried; each
/// carries enough context (archive, chunk, field) to diagnose and re-run.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("archive {path:?}: {detail}")]
    ArchiveFormat { path: PathBuf, detail: String },

    #[error("parse error in archive {csvnum}, chunk {chunk}{}: {detail}", at_row(.rownum))]
    Parse {
        csvnum: i64,
        chunk: usize,
        rownum: Option<i64>,
        detail: String,
    },

    #[error("archive {csvnum}: header does not match the record schema")]
    ColumnMapping {
        csvnum: i64,
        #[source]
        source: MappingError,
    },

    #[error("chunk size {size} is larger than the maximum of {max} rows")]
    ChunkSize { size: usize, max: usize },

    #[error(
        "archive {csvnum}, chunk {chunk}, row {rownum}: cannot coerce field `{field}` value {value:?} to {kind}"
    )]
    Coercion {
        csvnum: i64,
        chunk: usize,
        rownum: i64,
        field: String,
        value: String,
        kind: &'static str,
    },

    #[error("archive {csvnum}, chunk {chunk}: batch insert failed, transaction rolled back")]
    Write {
        csvnum: i64,
        chunk: usize,
        #[source]
        source: StoreError,
    },

    #[error("archive {csvnum}: delete of rows below {bound} failed")]
    Purge {
        csvnum: i64,
        bound: i64,
        #[source]
        source: StoreError,
    },

    #[error("archive {csvnum}: {what} failed")]
    Query {
        csvnum: i64,
        what: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("store setup failed")]
    Connect(#[source] StoreError),

    #[error("invalid connection settings")]
    ConnectionUrl(#[from] url::ParseError),

    #[error("no password found for {user}@{host}:{port}/{database} in {passfile:?}")]
    CredentialNotFound {
        host: String,
        port: u16,
        database: String,
        user: String,
        passfile: Option<PathBuf>,
    },

    #[error("could not get archive identifier from file name {name:?}")]
    ArchiveIdentifier { name: String },
}

fn at_row(rownum: &Option<i64>) -> String {
    rownum.map(|r| format!(", row {r}")).unwrap_or_default()
}

impl IngestError {
    /// Process exit code for this failure: 2 and 3 are reserved for the two
    /// setup failures, everything else is 1.
    pub fn exit_code(&self) -> u8 {
        match self {
            IngestError::CredentialNotFound { .. } => 2,
            IngestError::ArchiveIdentifier { .. } => 3,
            _ => 1,
        }
    }
}
