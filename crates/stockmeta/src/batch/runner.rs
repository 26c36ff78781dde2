//! Entry point for starting and stopping generation runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{info, warn};
use serde::Deserialize;

use super::cancel::CancellationToken;
use super::error::BatchError;
use super::sequencer::{RunState, RunSummary, Sequencer, SequencerSettings};
use super::unit::UnitTimings;
use super::validation::{
    ensure_files_exist, needs_confirmation, select_records, CostEstimate, RunMode,
};
use crate::broadcast::PresentationSink;
use crate::config::Config;
use crate::db::AssetStore;
use crate::generation::{MetadataGenerator, Service};
use crate::stats::{TimingSnapshot, TimingTracker};

/// What the caller asked to generate.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub mode: RunMode,
    pub service: Service,
    /// Falls back to the service's default model.
    #[serde(default)]
    pub model: Option<String>,
    /// File paths for [`RunMode::Selected`]; ignored otherwise.
    #[serde(default)]
    pub selected: Vec<String>,
}

impl RunRequest {
    pub fn new(mode: RunMode, service: Service) -> Self {
        Self {
            mode,
            service,
            model: None,
            selected: Vec::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_selected(mut self, selected: Vec<String>) -> Self {
        self.selected = selected;
        self
    }
}

/// Handle to a run executing on its orchestration thread.
pub struct RunHandle {
    cancel: CancellationToken,
    thread: JoinHandle<RunSummary>,
}

impl RunHandle {
    /// Requests a stop; the run finishes on its own shortly after.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Waits for the run to end.
    pub fn join(self) -> Result<RunSummary, BatchError> {
        self.thread.join().map_err(|_| BatchError::WorkerPanicked)
    }
}

/// Starts runs against one store, allowing only one at a time.
#[derive(Clone)]
pub struct BatchRunner {
    store: Arc<dyn AssetStore>,
    generator: Arc<dyn MetadataGenerator>,
    config: Arc<Config>,
    active: Arc<AtomicBool>,
    current: Arc<Mutex<Option<CancellationToken>>>,
    timings: Arc<Mutex<TimingTracker>>,
}

/// Clears the single-flight flag when the run ends or fails to start.
struct ActiveGuard {
    active: Arc<AtomicBool>,
    current: Arc<Mutex<Option<CancellationToken>>>,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        if let Ok(mut current) = self.current.lock() {
            current.take();
        }
        self.active.store(false, Ordering::Release);
    }
}

impl BatchRunner {
    pub fn new(
        store: Arc<dyn AssetStore>,
        generator: Arc<dyn MetadataGenerator>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            store,
            generator,
            config,
            active: Arc::new(AtomicBool::new(false)),
            current: Arc::new(Mutex::new(None)),
            timings: Arc::new(Mutex::new(TimingTracker::new())),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Validates `request` and starts the run on a new thread.
    ///
    /// `confirm` is only consulted for large `all` runs; returning `false`
    /// aborts with [`BatchError::Declined`].
    pub fn start(
        &self,
        request: RunRequest,
        sink: Arc<dyn PresentationSink>,
        confirm: &dyn Fn(&CostEstimate) -> bool,
    ) -> Result<RunHandle, BatchError> {
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(BatchError::AlreadyRunning);
        }
        let guard = ActiveGuard {
            active: Arc::clone(&self.active),
            current: Arc::clone(&self.current),
        };

        let ctx = self
            .config
            .resolve_context(request.service, request.model.as_deref())?;
        let records = select_records(self.store.as_ref(), request.mode, &request.selected)?;
        ensure_files_exist(&records)?;

        let batch = &self.config.batch;
        if needs_confirmation(request.mode, records.len(), batch.large_batch_threshold) {
            let estimate = CostEstimate::new(records.len(), batch.tokens_per_file_estimate);
            if !confirm(&estimate) {
                info!(
                    "Large run over {} files declined ({} tokens estimated)",
                    estimate.files, estimate.total_tokens
                );
                return Err(BatchError::Declined { estimate });
            }
        }

        let cancel = CancellationToken::new();
        if let Ok(mut current) = self.current.lock() {
            *current = Some(cancel.clone());
        }

        let settings = SequencerSettings {
            chunk_size: batch.effective_chunk_size(),
            timings: UnitTimings {
                poll_interval: Duration::from_millis(batch.poll_interval_ms.max(1)),
                stop_grace: Duration::from_millis(batch.stop_grace_ms),
            },
            max_tags: self.config.max_tags,
        };
        let sequencer = Sequencer::new(
            Arc::clone(&self.store),
            Arc::clone(&sink),
            Arc::clone(&self.generator),
            Arc::new(ctx),
            cancel.clone(),
            settings,
            Arc::clone(&self.timings),
        );
        let filepaths: Vec<String> = records.into_iter().map(|r| r.filepath).collect();

        info!(
            "Queued {} run over {} files (chunk size {})",
            request.mode,
            filepaths.len(),
            settings.chunk_size
        );

        let thread = thread::Builder::new()
            .name("stockmeta-batch".to_string())
            .spawn(move || {
                let summary = {
                    let _guard = guard;
                    sequencer.run(filepaths)
                };
                // The runner is free again, so the sink may start the next run.
                sink.run_finished(&summary.errors, summary.state == RunState::Stopped);
                summary
            })
            .map_err(|e| BatchError::SpawnFailed(e.to_string()))?;

        Ok(RunHandle { cancel, thread })
    }

    /// Stops the active run, if any. Returns whether a run was signalled.
    pub fn cancel(&self) -> bool {
        let current = match self.current.lock() {
            Ok(current) => current.clone(),
            Err(_) => {
                warn!("Run state lock poisoned; cannot cancel");
                return false;
            }
        };
        match current {
            Some(token) => {
                info!("Stop requested for the active run");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Latest request timings for `service` across all runs of this runner.
    pub fn timing_snapshot(&self, service: Service) -> Option<TimingSnapshot> {
        self.timings.lock().ok()?.snapshot(service)
    }
}
