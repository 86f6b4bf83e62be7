//! Connection lifecycle state machine for the persistent socket channel.
//!
//! This is a pure, side-effect-free state machine: it takes events as input
//! and produces a new state plus a list of actions to execute. The actual
//! I/O (opening the channel, arming timers, sending the handshake) is
//! performed by the connection manager in `preview-host`, which interprets
//! the returned actions. This enables instant unit testing without a live
//! channel.
//!
//! The underlying channel closes synchronously, so reopening must never
//! happen in the same call stack as closing. The machine makes that
//! explicit: a reconnect emits `CloseChannel` plus `ScheduleReopen`, and the
//! actual reopen only happens when the scheduled [`ConnectionEvent::ReopenTick`]
//! arrives.

use preview_types::ChannelStatus;

/// Lifecycle phase of the current channel instance.
///
/// `Hibernated` and `Failed` are terminal: a new machine (and channel)
/// must be created to resume after hibernation or an unrecoverable error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// No channel has been opened yet.
    Idle,
    /// Channel opened, waiting for the target's connect acknowledgment.
    Connecting,
    /// Acknowledged and handshaken.
    Connected,
    /// Channel closed or timed out; reconnect may reopen it.
    Disconnected,
    /// The remote target went dormant; terminal for this instance.
    Hibernated,
    /// The target raised an unrecoverable error; terminal for this instance.
    Failed,
}

/// Connection state machine - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionMachine {
    phase: ConnectionPhase,
    /// The next inbound disconnect was caused by the host; suppress its report.
    host_close_pending: bool,
    /// A reopen tick has been scheduled and not yet consumed.
    reopen_scheduled: bool,
    /// Last status reported externally, if any.
    reported: Option<ChannelStatus>,
}

impl ConnectionMachine {
    /// Create a new machine in the idle phase.
    pub fn new() -> Self {
        Self {
            phase: ConnectionPhase::Idle,
            host_close_pending: false,
            reopen_scheduled: false,
            reported: None,
        }
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller is responsible
    /// for executing the returned actions in order. Invalid (phase, event)
    /// pairs leave the state unchanged and produce no actions.
    pub fn on_event(mut self, event: ConnectionEvent) -> (Self, Vec<ConnectionAction>) {
        use ConnectionEvent as E;
        use ConnectionPhase as P;

        match (self.phase, event) {
            (P::Idle | P::Disconnected, E::OpenRequested) => self.begin_open(),

            (P::Connecting, E::ConnectAck) => {
                self.phase = P::Connected;
                let mut actions = vec![ConnectionAction::CancelConnectTimer];
                actions.push(self.report(ChannelStatus::Connected));
                actions.push(ConnectionAction::BeginHandshake);
                actions.push(ConnectionAction::RequestSandboxStart);
                (self, actions)
            }

            (P::Connecting, E::TimeoutFired) => {
                // The half-open channel still gets torn down; the resulting
                // inbound disconnect must not report a second time.
                self.phase = P::Disconnected;
                self.host_close_pending = true;
                let report = self.report(ChannelStatus::Disconnected);
                (self, vec![ConnectionAction::CloseChannel, report])
            }

            (P::Connecting, E::ReconnectRequested) => {
                self.host_close_pending = true;
                self.reopen_scheduled = true;
                self.phase = P::Disconnected;
                (
                    self,
                    vec![
                        ConnectionAction::CancelConnectTimer,
                        ConnectionAction::CloseChannel,
                        ConnectionAction::ScheduleReopen,
                    ],
                )
            }

            (P::Connected, E::ReconnectRequested) => {
                self.host_close_pending = true;
                self.reopen_scheduled = true;
                self.phase = P::Disconnected;
                (
                    self,
                    vec![ConnectionAction::CloseChannel, ConnectionAction::ScheduleReopen],
                )
            }

            (P::Disconnected, E::ReconnectRequested) => self.begin_open(),

            (P::Connecting, E::CloseRequested) => {
                self.host_close_pending = true;
                self.phase = P::Disconnected;
                (
                    self,
                    vec![ConnectionAction::CancelConnectTimer, ConnectionAction::CloseChannel],
                )
            }

            (P::Connected, E::CloseRequested) => {
                self.host_close_pending = true;
                self.phase = P::Disconnected;
                (self, vec![ConnectionAction::CloseChannel])
            }

            (_, E::PeerDisconnected) => {
                if self.host_close_pending {
                    self.host_close_pending = false;
                    return (self, vec![]);
                }
                let was_reported_connected = self.reported == Some(ChannelStatus::Connected);
                if self.phase == P::Connected && was_reported_connected {
                    self.phase = P::Disconnected;
                    let report = self.report(ChannelStatus::Disconnected);
                    (self, vec![report, ConnectionAction::NotifySessionEnded])
                } else {
                    // Hibernated targets and never-acknowledged channels
                    // produce no spurious status flap.
                    (self, vec![])
                }
            }

            (P::Connected, E::HibernateSignaled) => {
                self.phase = P::Hibernated;
                (self, vec![])
            }

            (P::Connecting, E::FailureSignaled) => {
                self.host_close_pending = true;
                self.phase = P::Failed;
                (
                    self,
                    vec![ConnectionAction::CancelConnectTimer, ConnectionAction::CloseChannel],
                )
            }

            (P::Connected, E::FailureSignaled) => {
                self.host_close_pending = true;
                self.phase = P::Failed;
                (self, vec![ConnectionAction::CloseChannel])
            }

            // The channel is already closed; only the phase moves.
            (P::Idle | P::Disconnected, E::FailureSignaled) => {
                self.phase = P::Failed;
                (self, vec![])
            }

            (P::Disconnected, E::ReopenTick) if self.reopen_scheduled => {
                self.reopen_scheduled = false;
                self.begin_open()
            }

            // Closing an already-closed channel is a no-op, as is any other
            // event that does not apply to the current phase.
            _ => (self, vec![]),
        }
    }

    fn begin_open(mut self) -> (Self, Vec<ConnectionAction>) {
        self.phase = ConnectionPhase::Connecting;
        let report = self.report(ChannelStatus::Connecting);
        (
            self,
            vec![
                ConnectionAction::OpenChannel,
                ConnectionAction::StartConnectTimer,
                report,
            ],
        )
    }

    fn report(&mut self, status: ChannelStatus) -> ConnectionAction {
        self.reported = Some(status);
        ConnectionAction::ReportStatus(status)
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    /// Whether the channel is acknowledged and usable.
    pub fn is_connected(&self) -> bool {
        self.phase == ConnectionPhase::Connected
    }

    /// Whether this machine instance can never reconnect.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.phase,
            ConnectionPhase::Hibernated | ConnectionPhase::Failed
        )
    }
}

impl Default for ConnectionMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// Events that can occur in the channel lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Host requested the channel to open.
    OpenRequested,
    /// The target acknowledged the connection.
    ConnectAck,
    /// The connect-timeout timer fired before an acknowledgment arrived.
    TimeoutFired,
    /// The channel dropped from the remote side (or finished a host close).
    PeerDisconnected,
    /// Host requested close-then-reopen.
    ReconnectRequested,
    /// Host requested a clean teardown.
    CloseRequested,
    /// The remote target reported hibernation.
    HibernateSignaled,
    /// The target raised an unrecoverable error.
    FailureSignaled,
    /// The scheduled reopen tick arrived.
    ReopenTick,
}

/// Actions to be executed by the connection manager.
///
/// These are instructions, not side effects. The manager interprets them
/// and performs the actual I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAction {
    /// Open the socket channel.
    OpenChannel,
    /// Close the socket channel.
    CloseChannel,
    /// Arm the connect-timeout timer.
    StartConnectTimer,
    /// Cancel a pending connect-timeout timer.
    CancelConnectTimer,
    /// Schedule a reopen on a later scheduling tick, never synchronously.
    ScheduleReopen,
    /// Report channel status to the external status collaborator.
    ReportStatus(ChannelStatus),
    /// Send target identity plus the auth token.
    BeginHandshake,
    /// Ask the remote container to start its sandbox runtime.
    RequestSandboxStart,
    /// Tell the router the session terminated implicitly.
    NotifySessionEnded,
}
