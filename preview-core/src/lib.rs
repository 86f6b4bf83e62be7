//! # preview-core
//!
//! Pure logic for preview-sync (no I/O, instant tests).
//!
//! This crate implements the algorithms and state machines of the preview
//! synchronization core without any network, timer, or channel I/O:
//! - [`diff`] - the incremental snapshot differ
//! - [`history`] - the navigation history state machine
//! - [`connection`] - the channel lifecycle state machine
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce
//! output without side effects. The state machines return actions as data;
//! `preview-host` interprets them and performs the actual I/O. Same input
//! always gives the same output, so every transition is unit-testable
//! without mocks or async.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod connection;
pub mod diff;
pub mod history;

pub use connection::{ConnectionAction, ConnectionEvent, ConnectionMachine, ConnectionPhase};
pub use diff::{apply_diff, snapshot_diff};
pub use history::NavigationHistory;
