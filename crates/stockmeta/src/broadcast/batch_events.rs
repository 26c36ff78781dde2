//! Batch event broadcaster for real-time run status streaming.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::sink::PresentationSink;
use crate::db::AssetStatus;
use crate::generation::Service;
use crate::stats::{TimingSnapshot, TokenTotals};

/// Payload of a batch event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BatchEventKind {
    Progress {
        completed: usize,
        total: usize,
    },
    RowStatus {
        filepath: String,
        status: AssetStatus,
    },
    TokenTotals {
        totals: TokenTotals,
    },
    Timing {
        service: Service,
        current_ms: u64,
        average_ms: u64,
        max_ms: u64,
    },
    RunFinished {
        errors: Vec<String>,
        stopped: bool,
    },
}

/// A batch event stamped with the run it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEvent {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: BatchEventKind,
}

impl BatchEvent {
    pub fn new(run_id: &str, kind: BatchEventKind) -> Self {
        Self {
            run_id: run_id.to_string(),
            timestamp: Utc::now(),
            kind,
        }
    }
}

/// Broadcasts batch events to any number of subscribers.
#[derive(Clone)]
pub struct BatchEventBroadcaster {
    run_id: String,
    sender: Arc<broadcast::Sender<BatchEvent>>,
}

impl BatchEventBroadcaster {
    /// Creates a broadcaster with the specified channel capacity and a fresh run id.
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            sender: Arc::new(sender),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Sends an event to all subscribers.
    pub fn send(&self, kind: BatchEventKind) {
        // Ignore errors - no active receivers is fine
        let _ = self.sender.send(BatchEvent::new(&self.run_id, kind));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BatchEvent> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BatchEventBroadcaster {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl PresentationSink for BatchEventBroadcaster {
    fn progress(&self, completed: usize, total: usize) {
        self.send(BatchEventKind::Progress { completed, total });
    }

    fn row_status(&self, filepath: &str, status: AssetStatus) {
        self.send(BatchEventKind::RowStatus {
            filepath: filepath.to_string(),
            status,
        });
    }

    fn run_finished(&self, errors: &[String], stopped: bool) {
        self.send(BatchEventKind::RunFinished {
            errors: errors.to_vec(),
            stopped,
        });
    }

    fn token_totals(&self, totals: TokenTotals) {
        self.send(BatchEventKind::TokenTotals { totals });
    }

    fn timing(&self, service: Service, snapshot: TimingSnapshot) {
        self.send(BatchEventKind::Timing {
            service,
            current_ms: snapshot.current.as_millis() as u64,
            average_ms: snapshot.average.as_millis() as u64,
            max_ms: snapshot.max.as_millis() as u64,
        });
    }
}
