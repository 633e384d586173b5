//! Common test utilities for DeckPilot.
//!
//! - `cli`: runner for the `deckpilot` binary with fluent assertions
//! - `env`: serialized changes to the test process environment
//! - `fixtures`: panel trees, plugin directories and config files on disk
#![allow(dead_code)]

pub mod cli;
pub mod env;
pub mod fixtures;

use tracing_subscriber::EnvFilter;

pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
