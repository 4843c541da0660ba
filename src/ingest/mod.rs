pub mod controller;
pub mod purge;
pub mod reconcile;
pub mod write;

pub use controller::{ChunkProgress, RunConfig, RunController, RunPhase, RunSummary, StopReason};
pub use purge::{purge, PurgeSummary};
pub use reconcile::{missing_row_numbers, reconcile, InsertBatch};
pub use write::{write_batch, WriteSummary};
