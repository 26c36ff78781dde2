//! Running statistics reported while batches execute.

pub mod timing;
pub mod tokens;

pub use timing::{TimingSnapshot, TimingTracker, MAX_TIMING_SAMPLES};
pub use tokens::TokenTotals;
