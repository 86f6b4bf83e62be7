//! Connection lifecycle management for the socket channel.
//!
//! [`ConnectionManager`] wraps the pure [`ConnectionMachine`] from
//! `preview-core` and interprets its actions against real I/O: the owned
//! channel handle, the connect-timeout timer, the handshake send, and
//! status reporting. The manager is the exclusive owner of the socket
//! channel; nothing else may open or close it.
//!
//! Timer cancellation uses a generation counter: arming a timer captures
//! the current generation, cancelling bumps it, and a fired timer that
//! observes a stale generation does nothing. A cancelled timeout can
//! therefore never produce a stale disconnect report.

use preview_core::{ConnectionAction, ConnectionEvent, ConnectionMachine, ConnectionPhase};
use preview_types::{Envelope, SandboxHandshake, SandboxId};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

use crate::auth::TokenProvider;
use crate::channel::Channel;
use crate::collab::StatusReporter;
use crate::router::MessageRouter;

/// Owns the socket channel lifecycle: connect, reconnect, timeout, teardown.
pub struct ConnectionManager {
    machine: Mutex<ConnectionMachine>,
    channel: Arc<dyn Channel>,
    address: String,
    sandbox_id: SandboxId,
    connect_timeout: Duration,
    timer_generation: AtomicU64,
    reporter: Arc<dyn StatusReporter>,
    tokens: Arc<dyn TokenProvider>,
    router: Arc<MessageRouter>,
}

impl ConnectionManager {
    /// Create a manager around an unopened channel handle.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        channel: Arc<dyn Channel>,
        address: impl Into<String>,
        sandbox_id: SandboxId,
        connect_timeout: Duration,
        reporter: Arc<dyn StatusReporter>,
        tokens: Arc<dyn TokenProvider>,
        router: Arc<MessageRouter>,
    ) -> Self {
        Self {
            machine: Mutex::new(ConnectionMachine::new()),
            channel,
            address: address.into(),
            sandbox_id,
            connect_timeout,
            timer_generation: AtomicU64::new(0),
            reporter,
            tokens,
            router,
        }
    }

    /// Open the channel and start waiting for the connect acknowledgment.
    pub async fn open(self: &Arc<Self>) {
        self.feed(ConnectionEvent::OpenRequested).await;
    }

    /// Close the existing channel, then reopen it on a later scheduling
    /// tick. The close is marked host-initiated so the resulting disconnect
    /// event reports nothing.
    pub async fn reconnect(self: &Arc<Self>) {
        self.feed(ConnectionEvent::ReconnectRequested).await;
    }

    /// Tear the channel down. Idempotent.
    pub async fn close(self: &Arc<Self>) {
        self.feed(ConnectionEvent::CloseRequested).await;
    }

    /// Inbound `connect` acknowledgment from the target.
    pub async fn handle_connect(self: &Arc<Self>) {
        self.feed(ConnectionEvent::ConnectAck).await;
    }

    /// Inbound `disconnect` event from the channel.
    pub async fn handle_disconnect(self: &Arc<Self>) {
        self.feed(ConnectionEvent::PeerDisconnected).await;
    }

    /// The remote target reported hibernation; this instance is done.
    pub async fn handle_hibernate(self: &Arc<Self>) {
        self.feed(ConnectionEvent::HibernateSignaled).await;
    }

    /// The target raised an unrecoverable error; close the channel and
    /// refuse any further reconnect on this instance.
    pub async fn handle_failure(self: &Arc<Self>) {
        self.feed(ConnectionEvent::FailureSignaled).await;
    }

    /// Whether the channel is acknowledged and usable.
    pub fn is_connected(&self) -> bool {
        self.machine.lock().unwrap().is_connected()
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> ConnectionPhase {
        self.machine.lock().unwrap().phase()
    }

    async fn feed(self: &Arc<Self>, event: ConnectionEvent) {
        let actions = {
            let mut machine = self.machine.lock().unwrap();
            let (next, actions) = machine.clone().on_event(event);
            *machine = next;
            actions
        };
        self.run_actions(actions).await;
    }

    /// Boxed re-entry into `feed` for spawned timer and reopen tasks.
    ///
    /// The spawned tasks feed events back into the machine, so their
    /// futures would otherwise contain `feed`'s own opaque future and the
    /// `Send` obligation could never resolve. Boxing erases the cycle.
    fn feed_detached(
        self: &Arc<Self>,
        event: ConnectionEvent,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>> {
        let manager = Arc::clone(self);
        Box::pin(async move { manager.feed(event).await })
    }

    async fn run_actions(self: &Arc<Self>, actions: Vec<ConnectionAction>) {
        for action in actions {
            match action {
                ConnectionAction::OpenChannel => {
                    if let Err(error) = self.channel.open(&self.address).await {
                        // The connect timer is already armed; it reports the
                        // failure when no acknowledgment arrives.
                        warn!(%error, address = %self.address, "channel open failed");
                    }
                }
                ConnectionAction::CloseChannel => {
                    if let Err(error) = self.channel.close().await {
                        warn!(%error, "channel close failed");
                    }
                }
                ConnectionAction::StartConnectTimer => self.arm_connect_timer(),
                ConnectionAction::CancelConnectTimer => {
                    self.timer_generation.fetch_add(1, Ordering::SeqCst);
                }
                ConnectionAction::ScheduleReopen => {
                    let reopen = self.feed_detached(ConnectionEvent::ReopenTick);
                    tokio::spawn(async move {
                        // Reopening must never share a call stack with the
                        // close that preceded it.
                        tokio::task::yield_now().await;
                        reopen.await;
                    });
                }
                ConnectionAction::ReportStatus(status) => {
                    debug!(%status, "reporting channel status");
                    self.reporter.set_manager_status(status);
                }
                ConnectionAction::BeginHandshake => self.send_handshake().await,
                ConnectionAction::RequestSandboxStart => {
                    self.send_envelope(&Envelope::SandboxStart).await;
                }
                ConnectionAction::NotifySessionEnded => {
                    self.router.deregister_socket();
                }
            }
        }
    }

    fn arm_connect_timer(self: &Arc<Self>) {
        let generation = self.timer_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let manager = Arc::clone(self);
        let fire = self.feed_detached(ConnectionEvent::TimeoutFired);
        let timeout = self.connect_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if manager.timer_generation.load(Ordering::SeqCst) == generation {
                debug!("connect acknowledgment timed out");
                fire.await;
            }
        });
    }

    async fn send_handshake(self: &Arc<Self>) {
        let token = self.tokens.token().await;
        let handshake = Envelope::SandboxHandshake(SandboxHandshake {
            id: self.sandbox_id.clone(),
            token,
        });
        self.send_envelope(&handshake).await;
    }

    async fn send_envelope(&self, envelope: &Envelope) {
        let bytes = match envelope.to_bytes() {
            Ok(bytes) => bytes,
            Err(error) => {
                warn!(%error, envelope = envelope.wire_type(), "envelope encode failed");
                return;
            }
        };
        if let Err(error) = self.channel.send(&bytes).await {
            warn!(%error, envelope = envelope.wire_type(), "envelope send failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticToken;
    use crate::channel::MockChannel;
    use crate::collab::RecordingReporter;
    use preview_types::{ChannelStatus, ExecutionMode};

    struct Harness {
        manager: Arc<ConnectionManager>,
        channel: MockChannel,
        reporter: Arc<RecordingReporter>,
        router: Arc<MessageRouter>,
    }

    fn harness() -> Harness {
        let channel = MockChannel::new();
        let reporter = Arc::new(RecordingReporter::new());
        let router = Arc::new(MessageRouter::new(ExecutionMode::Remote));
        router.register_socket(Arc::new(channel.clone()));
        let manager = Arc::new(ConnectionManager::new(
            Arc::new(channel.clone()),
            "sandbox-host/sbx1",
            SandboxId::new("sbx1"),
            Duration::from_millis(3000),
            reporter.clone(),
            Arc::new(StaticToken(Some("jwt-token".into()))),
            router.clone(),
        ));
        Harness {
            manager,
            channel,
            reporter,
            router,
        }
    }

    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn open_connects_channel_and_reports_connecting() {
        let h = harness();
        h.manager.open().await;

        assert!(h.channel.is_open());
        assert_eq!(h.channel.opened_address(), Some("sandbox-host/sbx1".into()));
        assert_eq!(h.reporter.manager_statuses(), vec![ChannelStatus::Connecting]);
        assert_eq!(h.manager.phase(), ConnectionPhase::Connecting);
    }

    #[tokio::test(start_paused = true)]
    async fn connect_ack_sends_handshake_then_start_request() {
        let h = harness();
        h.manager.open().await;
        h.manager.handle_connect().await;

        assert!(h.manager.is_connected());
        let sent = h.channel.sent_envelopes();
        assert_eq!(sent.len(), 2);
        match &sent[0] {
            Envelope::SandboxHandshake(handshake) => {
                assert_eq!(handshake.id, SandboxId::new("sbx1"));
                assert_eq!(handshake.token.as_deref(), Some("jwt-token"));
            }
            other => panic!("expected handshake first, got {other:?}"),
        }
        assert_eq!(sent[1], Envelope::SandboxStart);
        assert_eq!(
            h.reporter.manager_statuses(),
            vec![ChannelStatus::Connecting, ChannelStatus::Connected]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn missing_ack_times_out_and_reports_disconnected() {
        let h = harness();
        h.manager.open().await;

        tokio::time::sleep(Duration::from_millis(3100)).await;
        settle().await;

        assert_eq!(h.manager.phase(), ConnectionPhase::Disconnected);
        assert_eq!(
            h.reporter.manager_statuses(),
            vec![ChannelStatus::Connecting, ChannelStatus::Disconnected]
        );
        assert!(!h.channel.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn ack_cancels_the_timeout() {
        let h = harness();
        h.manager.open().await;
        h.manager.handle_connect().await;

        tokio::time::sleep(Duration::from_millis(10_000)).await;
        settle().await;

        assert!(h.manager.is_connected());
        assert!(!h
            .reporter
            .manager_statuses()
            .contains(&ChannelStatus::Disconnected));
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_while_connecting_reports_no_stale_disconnect() {
        let h = harness();
        h.manager.open().await;
        h.manager.reconnect().await;
        settle().await;

        // The reopen happened on a later tick with a fresh timer.
        assert_eq!(h.channel.open_count(), 2);
        assert_eq!(h.channel.close_count(), 1);

        h.manager.handle_connect().await;
        tokio::time::sleep(Duration::from_millis(10_000)).await;
        settle().await;

        assert_eq!(
            h.reporter.manager_statuses(),
            vec![
                ChannelStatus::Connecting,
                ChannelStatus::Connecting,
                ChannelStatus::Connected,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn host_close_suppresses_disconnect_report() {
        let h = harness();
        h.manager.open().await;
        h.manager.handle_connect().await;
        h.manager.close().await;

        // The closed channel surfaces its disconnect event afterwards.
        h.manager.handle_disconnect().await;

        assert!(!h
            .reporter
            .manager_statuses()
            .contains(&ChannelStatus::Disconnected));
        assert!(!h.channel.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn unexpected_disconnect_reports_and_ends_session() {
        let h = harness();
        h.manager.open().await;
        h.manager.handle_connect().await;
        assert!(h.router.is_ready());

        h.manager.handle_disconnect().await;

        assert_eq!(
            h.reporter.manager_statuses().last(),
            Some(&ChannelStatus::Disconnected)
        );
        // Implicit session termination deregisters the socket endpoint.
        assert!(!h.router.is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn hibernated_target_disconnects_silently() {
        let h = harness();
        h.manager.open().await;
        h.manager.handle_connect().await;
        h.manager.handle_hibernate().await;

        h.manager.handle_disconnect().await;

        assert!(!h
            .reporter
            .manager_statuses()
            .contains(&ChannelStatus::Disconnected));
        assert_eq!(h.manager.phase(), ConnectionPhase::Hibernated);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_instance_refuses_reconnect() {
        let h = harness();
        h.manager.open().await;
        h.manager.handle_connect().await;

        h.manager.handle_failure().await;
        assert!(!h.channel.is_open());
        assert_eq!(h.manager.phase(), ConnectionPhase::Failed);

        h.manager.reconnect().await;
        h.manager.open().await;
        settle().await;

        assert_eq!(h.channel.open_count(), 1);
        assert!(!h.channel.is_open());
        assert!(!h
            .reporter
            .manager_statuses()
            .contains(&ChannelStatus::Disconnected));
    }

    #[tokio::test(start_paused = true)]
    async fn close_is_idempotent() {
        let h = harness();
        h.manager.open().await;
        h.manager.handle_connect().await;

        h.manager.close().await;
        h.manager.close().await;

        assert_eq!(h.channel.close_count(), 1);
    }
}
