//! Identity types for preview-sync.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of the execution target (sandbox), assigned by the hosting
/// service and carried in every handshake and injected into bubbled actions.
///
/// Opaque string on the wire; treated as a value type host-side.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SandboxId(String);

impl SandboxId {
    /// Create a SandboxId from its wire representation.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the wire representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SandboxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for SandboxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SandboxId({})", self.0)
    }
}

/// Host-side identity of a loaded project.
///
/// Navigation history and connection state are scoped to one ProjectId;
/// a change of ProjectId resets both.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectId(uuid::Uuid);

impl ProjectId {
    /// Create a new random ProjectId.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for ProjectId {
    fn default() -> Self {
        Self::random()
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProjectId({})", self.0)
    }
}
