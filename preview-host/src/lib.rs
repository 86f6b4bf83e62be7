//! Host-side session core for the preview protocol.
//!
//! This crate owns the I/O-facing half of a preview session: channel
//! endpoints ([`channel`]), inbound message classification ([`router`]),
//! socket lifecycle management ([`connection`]), and the orchestrating
//! [`PreviewController`]. All protocol types live in `preview-types`; all
//! pure decision logic (diffing, navigation history, the connection state
//! machine) lives in `preview-core`.
//!
//! The surrounding application provides its platform pieces through traits:
//! [`Channel`] for transport endpoints, [`TokenProvider`] for handshake
//! auth, and the collaborator traits in [`collab`] for status display,
//! notifications, and action dispatch.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod channel;
pub mod collab;
pub mod config;
pub mod connection;
pub mod controller;
pub mod router;

pub use auth::{CachedToken, StaticToken, TokenProvider};
pub use channel::{Channel, ChannelError, ChannelFactory, MockChannel};
pub use collab::{
    ActionSink, Diagnostics, NoopDiagnostics, NotificationSink, PathResolver, StatusReporter,
};
pub use config::PreviewConfig;
pub use connection::ConnectionManager;
pub use controller::{Collaborators, PreviewController};
pub use router::{MessageRouter, Routed};
