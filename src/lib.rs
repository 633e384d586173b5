//! DeckPilot library - panels, buttons, plugins and an event bus for Elgato
//! Stream Decks.
//!
//! This library exposes the core of the `deckpilot` CLI for use in tests and
//! embedding applications.
//!
//! # Modules
//!
//! - `comm`: Event bus and the external command socket
//! - `config`: Configuration file handling
//! - `deck`: Assets, key rendering and the main loop
//! - `device`: Device abstraction over USB hardware and the simulator
//! - `error`: Error types with user-recoverable hints
//! - `logging`: Tracing setup and log filter rules
//! - `output`: Output mode abstraction (robot/human)
//! - `panel`: The panel tree and built-in buttons
//! - `plugins`: Plugin discovery and loading
#![forbid(unsafe_code)]

pub mod cli;
pub mod comm;
pub mod config;
pub mod deck;
pub mod device;
pub mod error;
pub mod logging;
pub mod output;
pub mod panel;
pub mod plugins;
pub mod theme;
