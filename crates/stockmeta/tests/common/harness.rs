//! Test harness for isolated batch runs.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use stockmeta::db::asset_repo::{self, AssetRow};
use stockmeta::db::token_repo;
use stockmeta::{
    AssetStatus, BatchRunner, Config, Database, MetadataGenerator, PresentationSink, RunRequest,
    RunSummary, TokenTotals,
};

/// Isolated environment: media files on disk plus a fresh database.
pub struct TestHarness {
    temp_dir: TempDir,
    /// Directory the media files are written to.
    pub media_dir: PathBuf,
    pub db: Arc<Database>,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let media_dir = temp_dir.path().join("media");
        std::fs::create_dir_all(&media_dir).expect("Failed to create media dir");
        let db = Arc::new(Database::open_in_memory().expect("Failed to open database"));

        Self {
            temp_dir,
            media_dir,
            db,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes a media file and imports it; returns the stored path.
    pub fn add_media(&self, filename: &str) -> String {
        let path = self.media_dir.join(filename);
        std::fs::write(&path, b"\xFF\xD8\xFF\xE0fake-jpeg").expect("Failed to write media file");
        let path = path.to_string_lossy().to_string();
        asset_repo::import(&self.db, &path).expect("Failed to import media file");
        path
    }

    /// Adds `file1.jpg` .. `fileN.jpg` in import order.
    pub fn add_numbered_media(&self, count: usize) -> Vec<String> {
        (1..=count)
            .map(|i| self.add_media(&format!("file{}.jpg", i)))
            .collect()
    }

    pub fn record(&self, filepath: &str) -> AssetRow {
        asset_repo::find_by_filepath(&self.db, filepath)
            .expect("Failed to query asset")
            .expect("Asset not found")
    }

    pub fn status_of(&self, filepath: &str) -> AssetStatus {
        self.record(filepath).status
    }

    pub fn statuses(&self, filepaths: &[String]) -> Vec<AssetStatus> {
        filepaths.iter().map(|p| self.status_of(p)).collect()
    }

    pub fn token_totals(&self) -> TokenTotals {
        token_repo::aggregate(&self.db).expect("Failed to aggregate tokens")
    }

    pub fn token_rows(&self) -> u64 {
        token_repo::count(&self.db).expect("Failed to count token rows")
    }

    pub fn runner(&self, generator: Arc<dyn MetadataGenerator>, config: Config) -> BatchRunner {
        BatchRunner::new(self.db.clone(), generator, Arc::new(config))
    }

    /// Starts a run that needs no confirmation and waits for it.
    pub fn run(
        &self,
        runner: &BatchRunner,
        request: RunRequest,
        sink: Arc<dyn PresentationSink>,
    ) -> RunSummary {
        runner
            .start(request, sink, &|_| true)
            .expect("Failed to start run")
            .join()
            .expect("Run thread panicked")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
