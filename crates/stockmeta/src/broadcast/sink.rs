use crate::db::AssetStatus;
use crate::generation::Service;
use crate::stats::{TimingSnapshot, TokenTotals};

/// Receiver of fire-and-forget batch notifications.
///
/// Called from the orchestration thread; implementations must not block
/// for long.
pub trait PresentationSink: Send + Sync {
    /// Files resolved so far in the run out of the run's total.
    fn progress(&self, completed: usize, total: usize);

    /// A record moved to a new status.
    fn row_status(&self, filepath: &str, status: AssetStatus);

    /// The run ended. `errors` is empty when every file succeeded.
    ///
    /// The runner is already idle here, so a new run may be started.
    fn run_finished(&self, errors: &[String], stopped: bool);

    /// Aggregate token usage after a chunk was persisted.
    fn token_totals(&self, _totals: TokenTotals) {}

    /// Updated request timings for a service.
    fn timing(&self, _service: Service, _snapshot: TimingSnapshot) {}
}

/// No-op sink for callers that do not display progress.
pub struct NoopSink;

impl PresentationSink for NoopSink {
    fn progress(&self, _completed: usize, _total: usize) {}

    fn row_status(&self, _filepath: &str, _status: AssetStatus) {}

    fn run_finished(&self, _errors: &[String], _stopped: bool) {}
}
