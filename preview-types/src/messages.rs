//! Protocol envelopes exchanged between host and execution target.
//!
//! Every message on either channel is a JSON object `{type, ...payload}`.
//! The `type` tag selects the variant; payload field names are fixed by the
//! wire protocol (camelCase, colon-namespaced tags for socket traffic).
//!
//! Envelopes are immutable value objects: constructed fresh per send, never
//! mutated after dispatch.

use serde::{Deserialize, Serialize};

use crate::{ContainerStatus, ContentSnapshot, NavigationAction, PreviewError, SandboxId, SnapshotDiff};

/// All protocol envelopes, tagged by their wire `type`.
///
/// Direction is noted per variant: H = host to target, T = target to host,
/// S = socket channel only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Envelope {
    /// T: target runtime is ready to receive channel registration.
    #[serde(rename = "initialized")]
    Initialized,

    /// H: full embedded-mode execution request.
    #[serde(rename = "compile")]
    Compile(Compile),

    /// H: run an arbitrary command string in the target.
    #[serde(rename = "evaluate")]
    Evaluate {
        /// The command to evaluate.
        command: String,
    },

    /// H: instruct the target to clear its console.
    #[serde(rename = "clear-console")]
    ClearConsole,

    /// T: re-run current code without recompiling.
    #[serde(rename = "render")]
    Render,

    /// T: the target navigated, popped, or replaced state.
    #[serde(rename = "urlchange")]
    UrlChange(UrlChange),

    /// T: target content height changed.
    #[serde(rename = "resize")]
    Resize {
        /// New content height in pixels.
        height: f64,
    },

    /// T: opaque action bubbled to the external collaborator.
    /// The sandbox id is injected host-side before forwarding.
    #[serde(rename = "action")]
    Action(ActionNotice),

    /// T: opaque sub-channel payload, proxied verbatim onto the socket channel.
    #[serde(rename = "socket:message")]
    SocketRelay(SocketRelay),

    /// T: initial paint/settle signal.
    #[serde(rename = "done")]
    Done,

    /// H+S: one-time handshake after the socket connects.
    #[serde(rename = "sandbox")]
    SandboxHandshake(SandboxHandshake),

    /// H+S: incremental module sync over the socket channel.
    #[serde(rename = "sandbox:update")]
    SandboxUpdate {
        /// Changed, new, and removed paths since the last acknowledged state.
        updates: SnapshotDiff,
    },

    /// S: request (H) or report (T) that the sandbox runtime starts.
    #[serde(rename = "sandbox:start")]
    SandboxStart,

    /// S inbound: the sandbox runtime stopped.
    #[serde(rename = "sandbox:stop")]
    SandboxStop,

    /// S inbound: the container went dormant after inactivity.
    #[serde(rename = "sandbox:hibernate")]
    SandboxHibernate,

    /// S inbound: error raised by the remote container.
    #[serde(rename = "sandbox:error")]
    SandboxError(SandboxError),

    /// S inbound: container lifecycle status changed.
    #[serde(rename = "sandbox:status")]
    SandboxStatus {
        /// The reported lifecycle status.
        status: ContainerStatus,
    },

    /// S inbound: log line from the container.
    #[serde(rename = "sandbox:log")]
    SandboxLog {
        /// Raw log data.
        data: String,
    },

    /// S inbound: remote shell output, re-emitted to the embedded channel.
    #[serde(rename = "shell:out")]
    ShellOut {
        /// Shell stream id.
        id: String,
        /// Output chunk.
        data: String,
    },

    /// S inbound: remote shell exited, re-emitted to the embedded channel.
    #[serde(rename = "shell:exit")]
    ShellExit {
        /// Shell stream id.
        id: String,
        /// Exit code.
        code: i32,
        /// Terminating signal, if any.
        signal: Option<String>,
    },
}

impl Envelope {
    /// Serialize to JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, PreviewError> {
        serde_json::to_vec(self).map_err(PreviewError::Serialization)
    }

    /// Deserialize from JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PreviewError> {
        serde_json::from_slice(bytes).map_err(PreviewError::Deserialization)
    }

    /// The wire `type` tag, for logging.
    pub fn wire_type(&self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::Compile(_) => "compile",
            Self::Evaluate { .. } => "evaluate",
            Self::ClearConsole => "clear-console",
            Self::Render => "render",
            Self::UrlChange(_) => "urlchange",
            Self::Resize { .. } => "resize",
            Self::Action(_) => "action",
            Self::SocketRelay(_) => "socket:message",
            Self::Done => "done",
            Self::SandboxHandshake(_) => "sandbox",
            Self::SandboxUpdate { .. } => "sandbox:update",
            Self::SandboxStart => "sandbox:start",
            Self::SandboxStop => "sandbox:stop",
            Self::SandboxHibernate => "sandbox:hibernate",
            Self::SandboxError(_) => "sandbox:error",
            Self::SandboxStatus { .. } => "sandbox:status",
            Self::SandboxLog { .. } => "sandbox:log",
            Self::ShellOut { .. } => "shell:out",
            Self::ShellExit { .. } => "shell:exit",
        }
    }
}

/// Full embedded-mode execution request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Compile {
    /// Monotonic request version within the session.
    pub version: u32,
    /// Entry path.
    pub entry: String,
    /// The full current snapshot; the target reconciles it itself.
    pub modules: ContentSnapshot,
    /// Sandbox identity.
    pub sandbox_id: SandboxId,
    /// Stylesheet/script URLs to load alongside the project.
    pub external_resources: Vec<String>,
    /// Whether a single module is previewed instead of the full app.
    pub is_module_view: bool,
    /// Template name.
    pub template: String,
    /// Whether the project declares host-visible actions.
    pub has_actions: bool,
}

/// Navigation notification from the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlChange {
    /// The target's new internal URL.
    pub url: String,
    /// How the target's history moved.
    #[serde(default)]
    pub action: NavigationAction,
    /// Signed history offset; present for POP only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<i32>,
}

/// Opaque action bubbled from the target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionNotice {
    /// Sandbox identity, injected host-side before forwarding.
    #[serde(rename = "sandboxId", default, skip_serializing_if = "Option::is_none")]
    pub sandbox_id: Option<SandboxId>,
    /// Arbitrary action fields, not interpreted by the router.
    #[serde(flatten)]
    pub payload: serde_json::Value,
}

/// Nested sub-channel payload carried by a `socket:message` envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocketRelay {
    /// Named sub-channel on the socket.
    pub channel: String,
    /// Opaque payload re-emitted verbatim onto that sub-channel.
    #[serde(flatten)]
    pub message: serde_json::Value,
}

/// One-time handshake sent after the socket connects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxHandshake {
    /// Sandbox identity.
    pub id: SandboxId,
    /// Authentication token from the token provider; absence is valid.
    pub token: Option<String>,
}

/// Error raised by the remote container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxError {
    /// Human-readable description.
    pub message: String,
    /// Whether the channel instance cannot recover.
    #[serde(default)]
    pub unrecoverable: bool,
}
