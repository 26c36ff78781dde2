//! Chunked, cancellable batch generation.
//!
//! A [`BatchRunner`] validates a request and hands the eligible records to a
//! [`sequencer::Sequencer`] running on its own thread. The sequencer walks
//! the chunks one after another; each chunk is executed by a
//! [`unit::BatchUnit`] that fans out one worker thread per file.

pub mod cancel;
pub mod chunk;
pub mod error;
pub mod runner;
pub mod sequencer;
pub mod unit;
pub mod validation;

pub use cancel::CancellationToken;
pub use error::BatchError;
pub use runner::{BatchRunner, RunHandle, RunRequest};
pub use sequencer::{RunState, RunSummary};
pub use validation::{CostEstimate, RunMode};
