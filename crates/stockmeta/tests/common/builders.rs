//! Builders for configs, generators and sinks used by integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use stockmeta::config::{BatchConfig, ServiceConfig, ServicesConfig};
use stockmeta::generation::CategoryAssignment;
use stockmeta::{
    AssetStatus, CancellationToken, Config, GenerationContext, GenerationOutput,
    MetadataGenerator, PresentationSink, Service, TimingSnapshot, TokenTotals,
};

/// Builder for creating `Config` instances.
pub struct ConfigBuilder {
    batch: BatchConfig,
    gemini: Option<ServiceConfig>,
    openai: Option<ServiceConfig>,
    prompt: Option<String>,
    max_tags: Option<usize>,
}

impl ConfigBuilder {
    /// Gemini configured with a direct key and fast polling.
    pub fn new() -> Self {
        Self {
            batch: BatchConfig {
                poll_interval_ms: 5,
                stop_grace_ms: 50,
                ..BatchConfig::default()
            },
            gemini: Some(ServiceConfig {
                models: vec!["gemini-2.0-flash".to_string(), "gemini-1.5-pro".to_string()],
                default_model: Some("gemini-2.0-flash".to_string()),
                api_key: Some("test-gemini-key".to_string()),
                ..ServiceConfig::default()
            }),
            openai: None,
            prompt: None,
            max_tags: None,
        }
    }

    pub fn chunk_size(mut self, size: usize) -> Self {
        self.batch.chunk_size = size;
        self
    }

    pub fn large_batch_threshold(mut self, threshold: usize) -> Self {
        self.batch.large_batch_threshold = threshold;
        self
    }

    pub fn tokens_per_file(mut self, tokens: u64) -> Self {
        self.batch.tokens_per_file_estimate = tokens;
        self
    }

    pub fn stop_grace_ms(mut self, ms: u64) -> Self {
        self.batch.stop_grace_ms = ms;
        self
    }

    pub fn openai(mut self, service: ServiceConfig) -> Self {
        self.openai = Some(service);
        self
    }

    pub fn max_tags(mut self, max: usize) -> Self {
        self.max_tags = Some(max);
        self
    }

    pub fn build(self) -> Config {
        Config {
            version: "1.0".to_string(),
            database_path: None,
            batch: self.batch,
            services: ServicesConfig {
                gemini: self.gemini,
                openai: self.openai,
            },
            prompt: self.prompt,
            max_tags: self.max_tags,
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// What a scripted generator does for one file.
#[derive(Debug, Clone)]
pub enum Behavior {
    Succeed,
    /// Succeeds with the given token counts.
    SucceedWithTokens(u64, u64, u64),
    ProviderError(String),
    Panic(String),
    EmptyTitle,
    Delay(Duration),
    WithCategories(Vec<CategoryAssignment>),
}

/// Generator driven by per-filename behaviors; every other file succeeds.
pub struct ScriptedGenerator {
    behaviors: HashMap<String, Behavior>,
    title_prefix: String,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self {
            behaviors: HashMap::new(),
            title_prefix: "Generated".to_string(),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn on(mut self, filename: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(filename.to_string(), behavior);
        self
    }

    pub fn title_prefix(mut self, prefix: &str) -> Self {
        self.title_prefix = prefix.to_string();
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Filenames the generator was called for, in call order.
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    fn success(&self, filename: &str) -> GenerationOutput {
        GenerationOutput {
            title: format!("{} {}", self.title_prefix, filename),
            description: format!("Description of {}", filename),
            tags: "nature, outdoor, Nature, travel".to_string(),
            token_input: 100,
            token_output: 50,
            token_total: 150,
            ..Default::default()
        }
    }
}

impl Default for ScriptedGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataGenerator for ScriptedGenerator {
    fn generate(
        &self,
        _ctx: &GenerationContext,
        filepath: &Path,
        cancel: &CancellationToken,
    ) -> GenerationOutput {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let filename = filepath
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.seen.lock().unwrap().push(filename.clone());

        match self.behaviors.get(&filename) {
            None | Some(Behavior::Succeed) => self.success(&filename),
            Some(Behavior::SucceedWithTokens(input, output, total)) => GenerationOutput {
                token_input: *input,
                token_output: *output,
                token_total: *total,
                ..self.success(&filename)
            },
            Some(Behavior::ProviderError(message)) => GenerationOutput {
                token_input: 40,
                token_total: 40,
                ..GenerationOutput::failure(message.clone())
            },
            Some(Behavior::Panic(message)) => panic!("{}", message),
            Some(Behavior::EmptyTitle) => GenerationOutput {
                title: String::new(),
                ..self.success(&filename)
            },
            Some(Behavior::Delay(delay)) => {
                let deadline = std::time::Instant::now() + *delay;
                while std::time::Instant::now() < deadline {
                    if cancel.is_cancelled() {
                        return GenerationOutput::cancelled();
                    }
                    std::thread::sleep(Duration::from_millis(2));
                }
                self.success(&filename)
            }
            Some(Behavior::WithCategories(categories)) => GenerationOutput {
                categories: categories.clone(),
                ..self.success(&filename)
            },
        }
    }
}

/// One notification received by a [`RecordingSink`].
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Progress(usize, usize),
    RowStatus(String, AssetStatus),
    TokenTotals(TokenTotals),
    Timing(Service),
    RunFinished(Vec<String>, bool),
}

type ProgressHook = Box<dyn Fn(usize, usize) + Send + Sync>;

/// Sink that keeps every notification for later assertions.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SinkEvent>>,
    on_progress: Option<ProgressHook>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `hook` on every progress notification.
    pub fn on_progress(hook: impl Fn(usize, usize) + Send + Sync + 'static) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            on_progress: Some(Box::new(hook)),
        }
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn progress_log(&self) -> Vec<(usize, usize)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SinkEvent::Progress(c, t) => Some((c, t)),
                _ => None,
            })
            .collect()
    }

    /// Last status announced for `filepath`.
    pub fn last_status(&self, filepath: &str) -> Option<AssetStatus> {
        self.events().into_iter().rev().find_map(|e| match e {
            SinkEvent::RowStatus(path, status) if path == filepath => Some(status),
            _ => None,
        })
    }

    pub fn finished(&self) -> Option<(Vec<String>, bool)> {
        self.events().into_iter().find_map(|e| match e {
            SinkEvent::RunFinished(errors, stopped) => Some((errors, stopped)),
            _ => None,
        })
    }

    pub fn last_token_totals(&self) -> Option<TokenTotals> {
        self.events().into_iter().rev().find_map(|e| match e {
            SinkEvent::TokenTotals(totals) => Some(totals),
            _ => None,
        })
    }

    fn push(&self, event: SinkEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl PresentationSink for RecordingSink {
    fn progress(&self, completed: usize, total: usize) {
        self.push(SinkEvent::Progress(completed, total));
        if let Some(hook) = &self.on_progress {
            hook(completed, total);
        }
    }

    fn row_status(&self, filepath: &str, status: AssetStatus) {
        self.push(SinkEvent::RowStatus(filepath.to_string(), status));
    }

    fn run_finished(&self, errors: &[String], stopped: bool) {
        self.push(SinkEvent::RunFinished(errors.to_vec(), stopped));
    }

    fn token_totals(&self, totals: TokenTotals) {
        self.push(SinkEvent::TokenTotals(totals));
    }

    fn timing(&self, service: Service, _snapshot: TimingSnapshot) {
        self.push(SinkEvent::Timing(service));
    }
}
