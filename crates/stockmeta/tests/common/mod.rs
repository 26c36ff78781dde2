//! Shared test utilities for stockmeta integration tests.
//!
//! This module provides:
//! - `TestHarness` with a temp media directory and an in-memory database
//! - Builders for configs, scripted generators and recording sinks

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
