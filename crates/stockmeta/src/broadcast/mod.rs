//! Presentation sinks for batch progress.
//!
//! The batch engine reports through [`PresentationSink`]; a desktop shell
//! or CLI subscribes to a [`BatchEventBroadcaster`] to render it.

pub mod batch_events;
pub mod sink;

pub use batch_events::{BatchEvent, BatchEventBroadcaster, BatchEventKind};
pub use sink::{NoopSink, PresentationSink};
