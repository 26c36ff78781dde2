//! Concurrent execution of one chunk.
//!
//! Every file of the chunk gets its own worker thread. Workers report
//! `(slot, outcome)` pairs over a channel and the unit, as the only
//! consumer, fills the pre-allocated slot for each file, so results come
//! back in input order whatever order the workers finish in.

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};
use log::{debug, info, warn};

use super::cancel::CancellationToken;
use crate::generation::{GenerationContext, GenerationOutput, MetadataGenerator};

/// The part of an asset record a worker needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetStub {
    /// Position of the file in the whole run.
    pub index: usize,
    pub filepath: PathBuf,
    pub filename: String,
}

impl AssetStub {
    pub fn new(index: usize, filepath: impl Into<PathBuf>) -> Self {
        let filepath = filepath.into();
        let filename = filepath
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| filepath.to_string_lossy().to_string());
        Self {
            index,
            filepath,
            filename,
        }
    }

    pub fn path_str(&self) -> String {
        self.filepath.to_string_lossy().to_string()
    }
}

/// What one worker produced.
#[derive(Debug)]
pub enum FileOutcome {
    /// The provider answered without an error.
    Generated {
        output: GenerationOutput,
        elapsed: Duration,
    },
    /// The provider answered with an error field.
    ProviderError {
        output: GenerationOutput,
        elapsed: Duration,
    },
    /// The generator panicked.
    Panicked { message: String },
    /// Cancellation was observed before or right after the call.
    Skipped,
}

/// A payload that reached the provider, in input order.
#[derive(Debug, Clone)]
pub struct FileResult {
    pub stub: AssetStub,
    pub output: GenerationOutput,
    pub elapsed: Duration,
}

/// Aggregated outcome of a chunk that ran to completion.
#[derive(Debug, Default)]
pub struct ChunkReport {
    /// One line per failed file; empty when the whole chunk succeeded.
    pub errors: Vec<String>,
    /// Provider payloads in input order. Skipped and panicked files are absent.
    pub results: Vec<FileResult>,
}

#[derive(Debug)]
pub enum ChunkOutcome {
    Completed(ChunkReport),
    /// Stop was requested while files were still running; nothing is reported.
    Cancelled,
}

/// Notifications emitted while a chunk runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitEvent {
    Progress { completed: usize, total: usize },
    /// A still-running file is being abandoned because of a stop request.
    Stopping { filepath: String },
}

/// Timing knobs of a unit.
#[derive(Debug, Clone, Copy)]
pub struct UnitTimings {
    /// Wait between cancellation checks while workers run.
    pub poll_interval: Duration,
    /// How long running workers may drain after a stop request.
    pub stop_grace: Duration,
}

impl Default for UnitTimings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            stop_grace: Duration::from_millis(500),
        }
    }
}

pub struct BatchUnit {
    ctx: Arc<GenerationContext>,
    generator: Arc<dyn MetadataGenerator>,
    cancel: CancellationToken,
    timings: UnitTimings,
}

impl BatchUnit {
    pub fn new(
        ctx: Arc<GenerationContext>,
        generator: Arc<dyn MetadataGenerator>,
        cancel: CancellationToken,
        timings: UnitTimings,
    ) -> Self {
        Self {
            ctx,
            generator,
            cancel,
            timings,
        }
    }

    /// Runs every stub concurrently and blocks until all of them reported or
    /// a stop request was observed.
    pub fn execute(
        &self,
        stubs: &[AssetStub],
        on_event: &mut dyn FnMut(UnitEvent),
    ) -> ChunkOutcome {
        let total = stubs.len();
        let (tx, rx) = unbounded::<(usize, FileOutcome)>();
        let mut slots: Vec<Option<FileOutcome>> = (0..total).map(|_| None).collect();
        let mut completed = 0;

        for (slot, stub) in stubs.iter().enumerate() {
            if let Err(e) = self.spawn_worker(slot, stub, tx.clone()) {
                warn!("Failed to spawn worker for {}: {}", stub.filename, e);
                slots[slot] = Some(FileOutcome::Panicked {
                    message: format!("failed to start worker: {}", e),
                });
                completed += 1;
                on_event(UnitEvent::Progress { completed, total });
            }
        }
        // Only workers hold senders now, so a disconnect means all are done.
        drop(tx);

        loop {
            if completed == total {
                break;
            }

            if self.cancel.is_cancelled() {
                info!(
                    "Stop requested with {} of {} files still running",
                    total - completed,
                    total
                );
                for (slot, stub) in stubs.iter().enumerate() {
                    if slots[slot].is_none() {
                        on_event(UnitEvent::Stopping {
                            filepath: stub.path_str(),
                        });
                    }
                }
                self.drain(&rx, total - completed);
                return ChunkOutcome::Cancelled;
            }

            match rx.recv_timeout(self.timings.poll_interval) {
                Ok((slot, outcome)) => {
                    if slots[slot].is_none() {
                        slots[slot] = Some(outcome);
                        completed += 1;
                        on_event(UnitEvent::Progress { completed, total });
                    }
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("Workers exited with {} results missing", total - completed);
                    break;
                }
            }
        }

        ChunkOutcome::Completed(collect_report(stubs, slots))
    }

    fn spawn_worker(
        &self,
        slot: usize,
        stub: &AssetStub,
        tx: Sender<(usize, FileOutcome)>,
    ) -> std::io::Result<()> {
        let ctx = Arc::clone(&self.ctx);
        let generator = Arc::clone(&self.generator);
        let cancel = self.cancel.clone();
        let filepath = stub.filepath.clone();

        thread::Builder::new()
            .name(format!("stockmeta-gen-{}", stub.index))
            .spawn(move || {
                let outcome = run_generation(&ctx, generator.as_ref(), &filepath, &cancel);
                // The unit may have stopped listening after a cancel.
                let _ = tx.send((slot, outcome));
            })
            .map(|_| ())
    }

    /// Gives running workers the grace period to finish; their results are
    /// discarded either way.
    fn drain(&self, rx: &crossbeam_channel::Receiver<(usize, FileOutcome)>, mut pending: usize) {
        let deadline = Instant::now() + self.timings.stop_grace;
        while pending > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match rx.recv_timeout(remaining) {
                Ok(_) => pending -= 1,
                Err(_) => break,
            }
        }
        if pending > 0 {
            debug!("Abandoning {} workers after the stop grace period", pending);
        }
    }
}

fn run_generation(
    ctx: &GenerationContext,
    generator: &dyn MetadataGenerator,
    filepath: &Path,
    cancel: &CancellationToken,
) -> FileOutcome {
    if cancel.is_cancelled() {
        return FileOutcome::Skipped;
    }

    let started = Instant::now();
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        generator.generate(ctx, filepath, cancel)
    }));
    let elapsed = started.elapsed();

    match result {
        Err(payload) => FileOutcome::Panicked {
            message: panic_message(payload.as_ref()),
        },
        Ok(_) if cancel.is_cancelled() => FileOutcome::Skipped,
        Ok(output) if output.is_error() => FileOutcome::ProviderError { output, elapsed },
        Ok(output) => FileOutcome::Generated { output, elapsed },
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn collect_report(stubs: &[AssetStub], slots: Vec<Option<FileOutcome>>) -> ChunkReport {
    let mut report = ChunkReport::default();

    for (stub, slot) in stubs.iter().zip(slots) {
        match slot {
            Some(FileOutcome::Generated { output, elapsed }) => {
                debug!("Generated metadata for {} in {:?}", stub.filename, elapsed);
                report.results.push(FileResult {
                    stub: stub.clone(),
                    output,
                    elapsed,
                });
            }
            Some(FileOutcome::ProviderError { output, elapsed }) => {
                let error = output.error.clone().unwrap_or_default();
                warn!("Generation failed for {}: {}", stub.filename, error);
                report.errors.push(format!("{}: {}", stub.filename, error));
                report.results.push(FileResult {
                    stub: stub.clone(),
                    output,
                    elapsed,
                });
            }
            Some(FileOutcome::Panicked { message }) => {
                warn!("Generation panicked for {}: {}", stub.filename, message);
                report
                    .errors
                    .push(format!("{}: generation panicked: {}", stub.filename, message));
            }
            Some(FileOutcome::Skipped) | None => {}
        }
    }

    report
}
