pub mod archive;
pub mod chunk;
pub mod credentials;
pub mod duck;
pub mod error;
pub mod ingest;
pub mod schema;
pub mod store;

#[cfg(test)]
mod test_support;

pub use error::{IngestError, Result};
pub use ingest::{RunConfig, RunController, RunSummary, StopReason};
