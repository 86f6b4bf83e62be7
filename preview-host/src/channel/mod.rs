//! Channel abstraction for preview-sync.
//!
//! A channel is a bidirectional message transport to an execution target:
//! the embedded-document channel reaches the in-process runtime, the socket
//! channel reaches a remote container. Both are abstracted behind the same
//! trait so the router and connection manager never depend on a concrete
//! binding.
//!
//! # Design
//!
//! The trait is async and connection-oriented:
//! - `open()` establishes the channel
//! - `send()` transmits serialized envelope bytes
//! - `close()` terminates; closing an already-closed channel is a no-op
//!
//! Inbound traffic is delivered by the surrounding shell calling into the
//! router, not pulled from the channel, to match the event-driven model.

mod mock;

pub use mock::MockChannel;

use async_trait::async_trait;
use thiserror::Error;

/// Channel errors.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Opening the channel failed.
    #[error("open failed: {0}")]
    OpenFailed(String),

    /// The channel is not open.
    #[error("channel not open")]
    NotOpen,

    /// Sending over the channel failed.
    #[error("send failed: {0}")]
    SendFailed(String),
}

/// Creates socket channel handles for remote execution targets.
///
/// A fresh handle is created per target identity; the connection manager
/// then owns that handle exclusively.
pub trait ChannelFactory: Send + Sync {
    /// Create an unopened socket channel for the given sandbox.
    fn socket_channel(&self, sandbox_id: &preview_types::SandboxId) -> std::sync::Arc<dyn Channel>;
}

/// Bidirectional message transport to an execution target.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Open the channel to the target identified by `address`.
    ///
    /// For the socket channel this is the container endpoint; for the
    /// embedded channel it is the document identity.
    async fn open(&self, address: &str) -> Result<(), ChannelError>;

    /// Send serialized envelope bytes over the channel.
    async fn send(&self, data: &[u8]) -> Result<(), ChannelError>;

    /// Whether the channel is currently open.
    fn is_open(&self) -> bool;

    /// Close the channel. Idempotent.
    async fn close(&self) -> Result<(), ChannelError>;
}
