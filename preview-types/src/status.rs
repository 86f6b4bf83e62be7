//! Status and action enums reported to external collaborators.
//!
//! The channel status and the remote container's lifecycle status are
//! independent axes: the socket can be connected while the container is
//! still booting, and a hibernated container keeps its last channel status
//! until the channel itself drops.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of the persistent socket channel as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelStatus {
    /// Connection attempt in progress.
    Connecting,
    /// Channel acknowledged by the target.
    Connected,
    /// Channel closed or timed out.
    Disconnected,
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        };
        write!(f, "{s}")
    }
}

/// Lifecycle status of the remote execution container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContainerStatus {
    /// Container is being provisioned.
    Initializing,
    /// Container process is up, sandbox runtime not yet started.
    ContainerStarted,
    /// Sandbox runtime is running and can process updates.
    SandboxStarted,
    /// Dormant after inactivity; requires an explicit restart.
    Hibernated,
    /// Container stopped.
    Stopped,
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Initializing => "initializing",
            Self::ContainerStarted => "container-started",
            Self::SandboxStarted => "sandbox-started",
            Self::Hibernated => "hibernated",
            Self::Stopped => "stopped",
        };
        write!(f, "{s}")
    }
}

/// Navigation action carried by a `urlchange` notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NavigationAction {
    /// New entry pushed onto the target's history (the default).
    Push,
    /// Current entry replaced in place.
    Replace,
    /// The target's history moved by a signed offset.
    Pop,
}

impl Default for NavigationAction {
    fn default() -> Self {
        Self::Push
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&ChannelStatus::Connecting).unwrap(),
            "\"connecting\""
        );
        assert_eq!(
            serde_json::to_string(&ChannelStatus::Disconnected).unwrap(),
            "\"disconnected\""
        );
    }

    #[test]
    fn container_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&ContainerStatus::SandboxStarted).unwrap(),
            "\"sandbox-started\""
        );
        assert_eq!(
            serde_json::to_string(&ContainerStatus::ContainerStarted).unwrap(),
            "\"container-started\""
        );
    }

    #[test]
    fn container_status_roundtrip() {
        for status in [
            ContainerStatus::Initializing,
            ContainerStatus::ContainerStarted,
            ContainerStatus::SandboxStarted,
            ContainerStatus::Hibernated,
            ContainerStatus::Stopped,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            let restored: ContainerStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(status, restored);
        }
    }

    #[test]
    fn navigation_action_wire_names() {
        assert_eq!(
            serde_json::to_string(&NavigationAction::Push).unwrap(),
            "\"PUSH\""
        );
        let pop: NavigationAction = serde_json::from_str("\"POP\"").unwrap();
        assert_eq!(pop, NavigationAction::Pop);
    }

    #[test]
    fn navigation_action_defaults_to_push() {
        assert_eq!(NavigationAction::default(), NavigationAction::Push);
    }

    #[test]
    fn status_display_matches_wire_names() {
        assert_eq!(ChannelStatus::Connected.to_string(), "connected");
        assert_eq!(
            ContainerStatus::SandboxStarted.to_string(),
            "sandbox-started"
        );
    }
}
