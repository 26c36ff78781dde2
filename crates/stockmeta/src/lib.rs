pub mod batch;
pub mod broadcast;
pub mod config;
pub mod db;
pub mod error;
pub mod generation;
pub mod logging;
pub mod scan;
pub mod secrets;
pub mod stats;

pub use batch::{
    BatchError, BatchRunner, CancellationToken, RunHandle, RunMode, RunRequest, RunState,
    RunSummary,
};
pub use broadcast::{BatchEvent, BatchEventBroadcaster, NoopSink, PresentationSink};
pub use config::{load_config, Config};
pub use db::{AssetStatus, AssetStore, Database, DatabaseError};
pub use error::{ConfigError, Result, ScanError, StockmetaError};
pub use generation::{GenerationContext, GenerationOutput, MetadataGenerator, Service};
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError};
pub use stats::{TimingSnapshot, TimingTracker, TokenTotals};
