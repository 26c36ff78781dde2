//! Sequential walk over the chunks of a run.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::{error, info, warn};
use serde::Serialize;
use tracing::info_span;

use super::cancel::CancellationToken;
use super::chunk::plan_chunks;
use super::unit::{AssetStub, BatchUnit, ChunkOutcome, ChunkReport, UnitEvent, UnitTimings};
use crate::broadcast::PresentationSink;
use crate::db::store::TokenUsage;
use crate::db::{AssetStatus, AssetStore, DatabaseError};
use crate::generation::tags::normalize_tags;
use crate::generation::{GenerationContext, MetadataGenerator};
use crate::stats::{TimingTracker, TokenTotals};

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "chunk", rename_all = "snake_case")]
pub enum RunState {
    Idle,
    /// Zero-based index of the chunk being executed.
    Running(usize),
    Finished,
    Stopped,
}

/// Outcome of a whole run, returned by [`super::RunHandle::join`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total_files: usize,
    pub total_chunks: usize,
    pub chunks_dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub stopped: usize,
    /// Tokens spent by this run only.
    pub tokens: TokenTotals,
    pub errors: Vec<String>,
    pub state: RunState,
    #[serde(skip)]
    pub elapsed: Duration,
}

/// Settings read once when the run starts.
#[derive(Debug, Clone, Copy)]
pub struct SequencerSettings {
    pub chunk_size: usize,
    pub timings: UnitTimings,
    pub max_tags: Option<usize>,
}

pub struct Sequencer {
    store: Arc<dyn AssetStore>,
    sink: Arc<dyn PresentationSink>,
    generator: Arc<dyn MetadataGenerator>,
    ctx: Arc<GenerationContext>,
    cancel: CancellationToken,
    settings: SequencerSettings,
    timings: Arc<Mutex<TimingTracker>>,
    state: RunState,
}

impl Sequencer {
    pub fn new(
        store: Arc<dyn AssetStore>,
        sink: Arc<dyn PresentationSink>,
        generator: Arc<dyn MetadataGenerator>,
        ctx: Arc<GenerationContext>,
        cancel: CancellationToken,
        settings: SequencerSettings,
        timings: Arc<Mutex<TimingTracker>>,
    ) -> Self {
        Self {
            store,
            sink,
            generator,
            ctx,
            cancel,
            settings,
            timings,
            state: RunState::Idle,
        }
    }

    /// Runs every chunk in order and returns the outcome. The end of the run
    /// is announced by the caller once the runner is free again.
    pub fn run(mut self, filepaths: Vec<String>) -> RunSummary {
        let started = Instant::now();
        let total = filepaths.len();
        let stubs: Vec<AssetStub> = filepaths
            .iter()
            .enumerate()
            .map(|(i, path)| AssetStub::new(i, path.as_str()))
            .collect();
        let chunks = plan_chunks(&stubs, self.settings.chunk_size);

        let _span = info_span!(
            "batch.run",
            service = %self.ctx.service,
            model = %self.ctx.model,
            files = total,
            chunks = chunks.len()
        )
        .entered();
        info!(
            "Starting generation for {} files in {} chunks using {} ({})",
            total,
            chunks.len(),
            self.ctx.service,
            self.ctx.model
        );

        let mut summary = RunSummary {
            total_files: total,
            total_chunks: chunks.len(),
            chunks_dispatched: 0,
            succeeded: 0,
            failed: 0,
            stopped: 0,
            tokens: TokenTotals::default(),
            errors: Vec::new(),
            state: RunState::Idle,
            elapsed: Duration::ZERO,
        };

        for path in &filepaths {
            self.set_status(path, AssetStatus::Processing, &mut summary.errors);
        }

        let unit = BatchUnit::new(
            Arc::clone(&self.ctx),
            Arc::clone(&self.generator),
            self.cancel.clone(),
            self.settings.timings,
        );

        let mut resolved = 0;
        let mut next_chunk = 0;
        while next_chunk < chunks.len() {
            if self.cancel.is_cancelled() {
                info!("Stop requested before chunk {}", next_chunk + 1);
                break;
            }

            let chunk = &chunks[next_chunk];
            self.state = RunState::Running(next_chunk);
            summary.chunks_dispatched += 1;

            let _chunk_span =
                info_span!("batch.chunk", index = next_chunk, files = chunk.len()).entered();

            let sink = Arc::clone(&self.sink);
            let store = Arc::clone(&self.store);
            let base = resolved;
            let mut on_event = move |event: UnitEvent| match event {
                UnitEvent::Progress { completed, .. } => sink.progress(base + completed, total),
                UnitEvent::Stopping { filepath } => {
                    if let Err(e) = store.update_status(&filepath, AssetStatus::Stopping) {
                        warn!("Failed to mark {} as stopping: {}", filepath, e);
                    }
                    sink.row_status(&filepath, AssetStatus::Stopping);
                }
            };

            match unit.execute(chunk, &mut on_event) {
                ChunkOutcome::Completed(report) => {
                    self.persist_chunk(chunk, report, &mut summary);
                    resolved += chunk.len();
                    next_chunk += 1;
                }
                ChunkOutcome::Cancelled => {
                    for stub in chunk {
                        self.finish_file(&stub.path_str(), AssetStatus::Stopped, &mut summary);
                    }
                    next_chunk += 1;
                    break;
                }
            }
        }

        // Chunks never dispatched.
        for chunk in chunks.iter().skip(next_chunk) {
            for stub in chunk {
                self.finish_file(&stub.path_str(), AssetStatus::Stopped, &mut summary);
            }
        }
        // A stop requested after the last outcome arrived still ends the run as stopped.
        let stopped = self.cancel.is_cancelled() || summary.stopped > 0;

        self.state = if stopped {
            RunState::Stopped
        } else {
            RunState::Finished
        };
        summary.state = self.state;
        summary.elapsed = started.elapsed();

        info!(
            "Generation {} after {:?}: {} succeeded, {} failed, {} stopped",
            if stopped { "stopped" } else { "finished" },
            summary.elapsed,
            summary.succeeded,
            summary.failed,
            summary.stopped
        );
        summary
    }

    /// Writes one completed chunk back in input order.
    fn persist_chunk(&self, chunk: &[AssetStub], report: ChunkReport, summary: &mut RunSummary) {
        let ChunkReport {
            mut errors,
            results,
        } = report;
        let mut statuses: Vec<Option<AssetStatus>> = vec![None; chunk.len()];

        for result in &results {
            let path = result.stub.path_str();
            let output = &result.output;
            let Some(slot) = chunk.iter().position(|s| s.index == result.stub.index) else {
                continue;
            };

            let status = if output.is_error() {
                self.write_status(&path, AssetStatus::Failed, &mut errors);
                AssetStatus::Failed
            } else if output.title.trim().is_empty() {
                errors.push(format!("{}: provider returned an empty title", result.stub.filename));
                self.write_status(&path, AssetStatus::Failed, &mut errors);
                AssetStatus::Failed
            } else {
                let tags = normalize_tags(&output.tags, self.settings.max_tags);
                match self.store.update_metadata(
                    &path,
                    output.title.trim(),
                    output.description.trim(),
                    &tags,
                    AssetStatus::Success,
                ) {
                    Ok(()) => {
                        if let Err(e) = self.store.upsert_categories(&path, &output.categories) {
                            self.record_store_error(&path, e, &mut errors);
                        }
                        AssetStatus::Success
                    }
                    Err(e) => {
                        self.record_store_error(&path, e, &mut errors);
                        self.write_status(&path, AssetStatus::Failed, &mut errors);
                        AssetStatus::Failed
                    }
                }
            };
            statuses[slot] = Some(status);

            let usage = TokenUsage {
                filepath: &path,
                service: self.ctx.service.as_str(),
                model: &self.ctx.model,
                token_input: output.token_input,
                token_output: output.token_output,
                token_total: output.token_total,
            };
            if let Err(e) = self.store.append_token_usage(&usage) {
                self.record_store_error(&path, e, &mut errors);
            }
            summary.tokens += TokenTotals::new(output.token_input, output.token_output, output.token_total);

            let snapshot = match self.timings.lock() {
                Ok(mut tracker) => Some(tracker.record(self.ctx.service, result.elapsed)),
                Err(_) => {
                    warn!("Timing tracker lock poisoned; skipping sample");
                    None
                }
            };
            if let Some(snapshot) = snapshot {
                self.sink.timing(self.ctx.service, snapshot);
            }
        }

        // Files without a payload panicked or were skipped.
        let cancelled = self.cancel.is_cancelled();
        for (stub, status) in chunk.iter().zip(statuses.iter_mut()) {
            if status.is_none() {
                let fallback = if cancelled {
                    AssetStatus::Stopped
                } else {
                    AssetStatus::Failed
                };
                self.write_status(&stub.path_str(), fallback, &mut errors);
                *status = Some(fallback);
            }
        }

        match self.store.get_aggregate_token_usage() {
            Ok(totals) => self.sink.token_totals(totals),
            Err(e) => error!("Failed to aggregate token usage: {}", e),
        }

        for (stub, status) in chunk.iter().zip(statuses) {
            let status = status.unwrap_or(AssetStatus::Failed);
            match status {
                AssetStatus::Success => summary.succeeded += 1,
                AssetStatus::Stopped => summary.stopped += 1,
                _ => summary.failed += 1,
            }
            self.sink.row_status(&stub.path_str(), status);
        }

        summary.errors.extend(errors);
    }

    /// Persists and announces a terminal status for a file outside a
    /// completed chunk.
    fn finish_file(&self, path: &str, status: AssetStatus, summary: &mut RunSummary) {
        self.write_status(path, status, &mut summary.errors);
        match status {
            AssetStatus::Success => summary.succeeded += 1,
            AssetStatus::Stopped => summary.stopped += 1,
            _ => summary.failed += 1,
        }
        self.sink.row_status(path, status);
    }

    fn set_status(&self, path: &str, status: AssetStatus, errors: &mut Vec<String>) {
        self.write_status(path, status, errors);
        self.sink.row_status(path, status);
    }

    fn write_status(&self, path: &str, status: AssetStatus, errors: &mut Vec<String>) {
        if let Err(e) = self.store.update_status(path, status) {
            self.record_store_error(path, e, errors);
        }
    }

    fn record_store_error(&self, path: &str, e: DatabaseError, errors: &mut Vec<String>) {
        error!("Failed to persist result for {}: {}", path, e);
        errors.push(format!("{}: failed to save result: {}", path, e));
    }
}
