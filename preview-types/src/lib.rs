//! # preview-types
//!
//! Wire format types for the preview-sync host/target protocol.
//!
//! This crate provides the foundational types used across all preview-sync
//! crates:
//! - [`SandboxId`], [`ProjectId`] - Identity types
//! - [`ContentSnapshot`], [`SnapshotDiff`] - Path-level content state
//! - [`Envelope`] - The `{type, ...payload}` message protocol
//! - [`ChannelStatus`], [`ContainerStatus`] - Status axes reported externally
//! - [`PreviewError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod messages;
mod project;
mod snapshot;
mod status;

pub use error::PreviewError;
pub use ids::{ProjectId, SandboxId};
pub use messages::{
    ActionNotice, Compile, Envelope, SandboxError, SandboxHandshake, SocketRelay, UrlChange,
};
pub use project::{ExecutionMode, Project};
pub use snapshot::{ContentSnapshot, ModuleSource, SnapshotDiff};
pub use status::{ChannelStatus, ContainerStatus, NavigationAction};
