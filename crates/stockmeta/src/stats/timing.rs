//! Rolling per-service request timings.
//!
//! Each service keeps the most recent [`MAX_TIMING_SAMPLES`] durations.
//! Nothing is persisted; the tracker starts empty on every process start.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use serde::Serialize;

use crate::generation::Service;

/// Upper bound on retained samples per service.
pub const MAX_TIMING_SAMPLES: usize = 1000;

/// Statistics computed over one service's retained samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingSnapshot {
    /// Newest sample.
    pub current: Duration,
    /// Sample recorded before `current`, if any.
    pub last: Option<Duration>,
    pub average: Duration,
    pub max: Duration,
    pub samples: usize,
}

#[derive(Debug, Default)]
struct Series {
    samples: VecDeque<Duration>,
}

impl Series {
    fn push(&mut self, sample: Duration) {
        if self.samples.len() == MAX_TIMING_SAMPLES {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    fn snapshot(&self) -> Option<TimingSnapshot> {
        let current = *self.samples.back()?;
        let n = self.samples.len();
        let last = if n >= 2 {
            self.samples.get(n - 2).copied()
        } else {
            None
        };
        let sum: Duration = self.samples.iter().sum();
        let max = self.samples.iter().max().copied().unwrap_or_default();
        Some(TimingSnapshot {
            current,
            last,
            average: sum / n as u32,
            max,
            samples: n,
        })
    }
}

/// Per-service bounded timing buffers.
#[derive(Debug, Default)]
pub struct TimingTracker {
    series: HashMap<Service, Series>,
}

impl TimingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a sample and returns the updated statistics for the service.
    pub fn record(&mut self, service: Service, sample: Duration) -> TimingSnapshot {
        let series = self.series.entry(service).or_default();
        series.push(sample);
        // A series that was just pushed to is never empty.
        series.snapshot().unwrap_or(TimingSnapshot {
            current: sample,
            last: None,
            average: sample,
            max: sample,
            samples: 1,
        })
    }

    pub fn snapshot(&self, service: Service) -> Option<TimingSnapshot> {
        self.series.get(&service).and_then(Series::snapshot)
    }

    pub fn reset(&mut self) {
        self.series.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_empty_tracker() {
        let tracker = TimingTracker::new();
        assert!(tracker.snapshot(Service::Gemini).is_none());
    }

    #[test]
    fn test_record_computes_stats() {
        let mut tracker = TimingTracker::new();
        tracker.record(Service::Gemini, ms(100));
        tracker.record(Service::Gemini, ms(300));
        let snap = tracker.record(Service::Gemini, ms(200));

        assert_eq!(snap.current, ms(200));
        assert_eq!(snap.last, Some(ms(300)));
        assert_eq!(snap.average, ms(200));
        assert_eq!(snap.max, ms(300));
        assert_eq!(snap.samples, 3);
    }

    #[test]
    fn test_services_are_separate() {
        let mut tracker = TimingTracker::new();
        tracker.record(Service::Gemini, ms(100));
        let snap = tracker.record(Service::OpenAi, ms(900));
        assert_eq!(snap.samples, 1);
        assert_eq!(snap.last, None);
        assert_eq!(tracker.snapshot(Service::Gemini).unwrap().max, ms(100));
    }

    #[test]
    fn test_buffer_is_bounded() {
        let mut tracker = TimingTracker::new();
        tracker.record(Service::OpenAi, ms(5000));
        for _ in 0..MAX_TIMING_SAMPLES {
            tracker.record(Service::OpenAi, ms(10));
        }
        let snap = tracker.snapshot(Service::OpenAi).unwrap();
        assert_eq!(snap.samples, MAX_TIMING_SAMPLES);
        // The 5s outlier has been evicted.
        assert_eq!(snap.max, ms(10));
        assert_eq!(snap.average, ms(10));
    }

    #[test]
    fn test_reset() {
        let mut tracker = TimingTracker::new();
        tracker.record(Service::Gemini, ms(1));
        tracker.reset();
        assert!(tracker.snapshot(Service::Gemini).is_none());
    }
}
