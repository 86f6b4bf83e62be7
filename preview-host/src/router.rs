//! Typed envelope routing between host and execution target.
//!
//! The router owns the two logical channel endpoints - the embedded-document
//! channel to the in-process runtime and the socket channel to a remote
//! container - and exactly one is active depending on the execution mode.
//! Outbound envelopes go through [`MessageRouter::send`]; inbound envelopes
//! are classified by [`MessageRouter::route`] into a fixed dispatch outcome
//! the controller consumes, with the two passthrough cases (socket proxy and
//! shell streams) handled inside the router itself.

use preview_types::{
    ActionNotice, ContainerStatus, Envelope, ExecutionMode, NavigationAction, PreviewError,
    SandboxError,
};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::channel::Channel;

/// Dispatch outcome for one inbound envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    /// Target runtime is ready for channel registration.
    Initialized,
    /// Re-run current code without recompiling.
    Render,
    /// Initial paint/settle signal.
    Done,
    /// The target navigated.
    Navigation {
        /// New internal URL.
        url: String,
        /// How the target's history moved.
        action: NavigationAction,
        /// Signed history offset (POP only).
        delta: Option<i32>,
    },
    /// Target content height changed.
    Resize {
        /// New height in pixels.
        height: f64,
    },
    /// Opaque action to bubble outward; sandbox id not yet injected.
    Action(ActionNotice),
    /// Container lifecycle status changed.
    ContainerStatus(ContainerStatus),
    /// The sandbox runtime started.
    SandboxStarted,
    /// The sandbox runtime stopped.
    SandboxStopped,
    /// The container went dormant.
    Hibernated,
    /// Error reported by the container.
    ContainerError(SandboxError),
    /// Log line from the container.
    Log {
        /// Raw log data.
        data: String,
    },
    /// A `socket:message` payload was re-emitted onto the socket channel.
    Proxied,
    /// A shell stream envelope was re-emitted to the embedded channel.
    ShellRelayed,
    /// Host-to-target envelope echoed back; nothing to do.
    Ignored,
}

/// Routes envelopes to and from whichever channel is active.
pub struct MessageRouter {
    mode: ExecutionMode,
    embedded: Mutex<Option<Arc<dyn Channel>>>,
    socket: Mutex<Option<Arc<dyn Channel>>>,
}

impl MessageRouter {
    /// Create a router for the given execution mode with no endpoints yet.
    pub fn new(mode: ExecutionMode) -> Self {
        Self {
            mode,
            embedded: Mutex::new(None),
            socket: Mutex::new(None),
        }
    }

    /// The execution mode this router serves.
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Register the embedded-document endpoint.
    pub fn register_embedded(&self, channel: Arc<dyn Channel>) {
        *self.embedded.lock().unwrap() = Some(channel);
    }

    /// Register the socket endpoint.
    pub fn register_socket(&self, channel: Arc<dyn Channel>) {
        *self.socket.lock().unwrap() = Some(channel);
    }

    /// Drop both endpoints; subsequent sends fail with `ChannelNotReady`.
    pub fn deregister(&self) {
        *self.embedded.lock().unwrap() = None;
        *self.socket.lock().unwrap() = None;
    }

    /// Drop the socket endpoint after an implicit session termination.
    pub fn deregister_socket(&self) {
        *self.socket.lock().unwrap() = None;
    }

    fn active_channel(&self) -> Option<Arc<dyn Channel>> {
        let slot = match self.mode {
            ExecutionMode::Embedded => &self.embedded,
            ExecutionMode::Remote => &self.socket,
        };
        slot.lock().unwrap().clone()
    }

    fn embedded_channel(&self) -> Option<Arc<dyn Channel>> {
        self.embedded.lock().unwrap().clone()
    }

    fn socket_channel(&self) -> Option<Arc<dyn Channel>> {
        self.socket.lock().unwrap().clone()
    }

    /// Whether an active endpoint is registered and open.
    pub fn is_ready(&self) -> bool {
        self.active_channel().is_some_and(|c| c.is_open())
    }

    /// Serialize and send an envelope over the active channel.
    ///
    /// Sending before a channel is ready is an error reported to the
    /// caller, never a silent drop.
    pub async fn send(&self, envelope: &Envelope) -> Result<(), PreviewError> {
        let channel = self
            .active_channel()
            .ok_or(PreviewError::ChannelNotReady)?;
        debug!(envelope = envelope.wire_type(), "sending envelope");
        channel
            .send(&envelope.to_bytes()?)
            .await
            .map_err(|e| PreviewError::Connection(e.to_string()))
    }

    /// Classify an inbound envelope, performing the passthrough sends.
    pub async fn route(&self, envelope: Envelope) -> Result<Routed, PreviewError> {
        match envelope {
            Envelope::Initialized => Ok(Routed::Initialized),
            Envelope::Render => Ok(Routed::Render),
            Envelope::Done => Ok(Routed::Done),
            Envelope::UrlChange(change) => Ok(Routed::Navigation {
                url: change.url,
                action: change.action,
                delta: change.diff,
            }),
            Envelope::Resize { height } => Ok(Routed::Resize { height }),
            Envelope::Action(notice) => Ok(Routed::Action(notice)),
            Envelope::SandboxStatus { status } => Ok(Routed::ContainerStatus(status)),
            Envelope::SandboxStart => Ok(Routed::SandboxStarted),
            Envelope::SandboxStop => Ok(Routed::SandboxStopped),
            Envelope::SandboxHibernate => Ok(Routed::Hibernated),
            Envelope::SandboxError(error) => Ok(Routed::ContainerError(error)),
            Envelope::SandboxLog { data } => Ok(Routed::Log { data }),

            Envelope::SocketRelay(relay) => {
                self.proxy_to_socket(relay.channel, relay.message).await?;
                Ok(Routed::Proxied)
            }

            envelope @ (Envelope::ShellOut { .. } | Envelope::ShellExit { .. }) => {
                self.relay_to_embedded(&envelope).await?;
                Ok(Routed::ShellRelayed)
            }

            other => {
                warn!(envelope = other.wire_type(), "ignoring host-bound envelope");
                Ok(Routed::Ignored)
            }
        }
    }

    /// Re-emit a nested sub-channel payload directly onto the socket channel.
    ///
    /// The router never interprets the sub-channel's semantics; object
    /// payloads are merged with the channel name, anything else is wrapped.
    async fn proxy_to_socket(
        &self,
        channel_name: String,
        message: serde_json::Value,
    ) -> Result<(), PreviewError> {
        let socket = self.socket_channel().ok_or(PreviewError::ChannelNotReady)?;

        let frame = match message {
            serde_json::Value::Object(mut fields) => {
                fields.insert("channel".into(), channel_name.into());
                serde_json::Value::Object(fields)
            }
            other => serde_json::json!({ "channel": channel_name, "message": other }),
        };
        let bytes = serde_json::to_vec(&frame).map_err(PreviewError::Serialization)?;
        socket
            .send(&bytes)
            .await
            .map_err(|e| PreviewError::Connection(e.to_string()))
    }

    /// Re-emit a shell stream envelope to the embedded channel.
    async fn relay_to_embedded(&self, envelope: &Envelope) -> Result<(), PreviewError> {
        let embedded = self
            .embedded_channel()
            .ok_or(PreviewError::ChannelNotReady)?;
        embedded
            .send(&envelope.to_bytes()?)
            .await
            .map_err(|e| PreviewError::Connection(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MockChannel;
    use preview_types::SnapshotDiff;

    fn remote_router(socket: &MockChannel, embedded: &MockChannel) -> MessageRouter {
        let router = MessageRouter::new(ExecutionMode::Remote);
        router.register_socket(Arc::new(socket.clone()));
        router.register_embedded(Arc::new(embedded.clone()));
        router
    }

    #[tokio::test]
    async fn send_without_channel_reports_not_ready() {
        let router = MessageRouter::new(ExecutionMode::Remote);

        let result = router
            .send(&Envelope::Evaluate {
                command: "history.back()".into(),
            })
            .await;

        assert!(matches!(result, Err(PreviewError::ChannelNotReady)));
    }

    #[tokio::test]
    async fn send_uses_the_mode_active_channel() {
        let socket = MockChannel::open_now();
        let embedded = MockChannel::open_now();
        let router = remote_router(&socket, &embedded);

        router
            .send(&Envelope::SandboxUpdate {
                updates: SnapshotDiff::new(),
            })
            .await
            .unwrap();

        assert_eq!(socket.sent_frames().len(), 1);
        assert!(embedded.sent_frames().is_empty());
    }

    #[tokio::test]
    async fn embedded_mode_sends_to_embedded_channel() {
        let embedded = MockChannel::open_now();
        let router = MessageRouter::new(ExecutionMode::Embedded);
        router.register_embedded(Arc::new(embedded.clone()));

        router.send(&Envelope::ClearConsole).await.unwrap();

        assert_eq!(embedded.last_envelope(), Some(Envelope::ClearConsole));
    }

    #[tokio::test]
    async fn deregister_makes_sends_fail() {
        let socket = MockChannel::open_now();
        let embedded = MockChannel::open_now();
        let router = remote_router(&socket, &embedded);
        assert!(router.is_ready());

        router.deregister();

        assert!(!router.is_ready());
        let result = router.send(&Envelope::Render).await;
        assert!(matches!(result, Err(PreviewError::ChannelNotReady)));
    }

    #[tokio::test]
    async fn urlchange_routes_to_navigation() {
        let router = MessageRouter::new(ExecutionMode::Embedded);
        let envelope = Envelope::from_bytes(
            br#"{"type":"urlchange","url":"/about","action":"POP","diff":-2}"#,
        )
        .unwrap();

        let routed = router.route(envelope).await.unwrap();
        assert_eq!(
            routed,
            Routed::Navigation {
                url: "/about".into(),
                action: NavigationAction::Pop,
                delta: Some(-2),
            }
        );
    }

    #[tokio::test]
    async fn socket_message_is_proxied_verbatim() {
        let socket = MockChannel::open_now();
        let embedded = MockChannel::open_now();
        let router = remote_router(&socket, &embedded);

        let envelope = Envelope::from_bytes(
            br#"{"type":"socket:message","channel":"shell:in","id":"t1","data":"ls\n"}"#,
        )
        .unwrap();
        let routed = router.route(envelope).await.unwrap();

        assert_eq!(routed, Routed::Proxied);
        let frames = socket.sent_frames();
        assert_eq!(frames.len(), 1);
        let frame: serde_json::Value = serde_json::from_slice(&frames[0]).unwrap();
        assert_eq!(frame["channel"], "shell:in");
        assert_eq!(frame["data"], "ls\n");
        assert_eq!(frame["id"], "t1");
        // The proxy frame is sub-channel payload, not an envelope.
        assert!(frame.get("type").is_none());
    }

    #[tokio::test]
    async fn shell_out_is_relayed_to_embedded_channel() {
        let socket = MockChannel::open_now();
        let embedded = MockChannel::open_now();
        let router = remote_router(&socket, &embedded);

        let routed = router
            .route(Envelope::ShellOut {
                id: "t1".into(),
                data: "hello\n".into(),
            })
            .await
            .unwrap();

        assert_eq!(routed, Routed::ShellRelayed);
        assert_eq!(
            embedded.last_envelope(),
            Some(Envelope::ShellOut {
                id: "t1".into(),
                data: "hello\n".into(),
            })
        );
        assert!(socket.sent_frames().is_empty());
    }

    #[tokio::test]
    async fn shell_exit_is_relayed_to_embedded_channel() {
        let socket = MockChannel::open_now();
        let embedded = MockChannel::open_now();
        let router = remote_router(&socket, &embedded);

        let routed = router
            .route(Envelope::ShellExit {
                id: "t1".into(),
                code: 0,
                signal: None,
            })
            .await
            .unwrap();

        assert_eq!(routed, Routed::ShellRelayed);
        assert_eq!(embedded.sent_frames().len(), 1);
    }

    #[tokio::test]
    async fn proxy_without_socket_reports_not_ready() {
        let router = MessageRouter::new(ExecutionMode::Remote);
        let envelope = Envelope::from_bytes(
            br#"{"type":"socket:message","channel":"shell:in","data":"x"}"#,
        )
        .unwrap();

        let result = router.route(envelope).await;
        assert!(matches!(result, Err(PreviewError::ChannelNotReady)));
    }

    #[tokio::test]
    async fn container_lifecycle_envelopes_classify() {
        let router = MessageRouter::new(ExecutionMode::Remote);

        assert_eq!(
            router
                .route(Envelope::SandboxStatus {
                    status: ContainerStatus::SandboxStarted
                })
                .await
                .unwrap(),
            Routed::ContainerStatus(ContainerStatus::SandboxStarted)
        );
        assert_eq!(
            router.route(Envelope::SandboxHibernate).await.unwrap(),
            Routed::Hibernated
        );
        assert_eq!(
            router.route(Envelope::SandboxStop).await.unwrap(),
            Routed::SandboxStopped
        );
    }

    #[tokio::test]
    async fn host_bound_envelope_is_ignored_not_fatal() {
        let router = MessageRouter::new(ExecutionMode::Embedded);
        let routed = router.route(Envelope::ClearConsole).await.unwrap();
        assert_eq!(routed, Routed::Ignored);
    }
}
