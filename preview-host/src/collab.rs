//! External collaborator seams.
//!
//! The session core never renders, notifies, or resolves paths itself; it
//! talks to the surrounding shell through these traits. Diagnostics is an
//! injectable interface rather than a process-wide debug hook, so tests can
//! observe internals without ambient global state.

use preview_types::{ChannelStatus, ContainerStatus};
use std::sync::Mutex;

/// Receives the two independent status axes.
pub trait StatusReporter: Send + Sync {
    /// Channel status for the socket as a whole.
    fn set_manager_status(&self, status: ChannelStatus);
    /// Lifecycle status of the remote container.
    fn set_container_status(&self, status: ContainerStatus);
}

/// Receives non-fatal errors for user-facing notification.
pub trait NotificationSink: Send + Sync {
    /// Surface a recoverable error to the user.
    fn notify_error(&self, message: &str);
}

/// Black-box resolver from module ids to project paths.
pub trait PathResolver: Send + Sync {
    /// Resolve a module id to an absolute path, if it exists.
    fn resolve_path(&self, module_id: &str) -> Option<String>;
}

/// Receives opaque actions bubbled up from the execution target.
pub trait ActionSink: Send + Sync {
    /// Forward an action, already stamped with the sandbox identity.
    fn dispatch_action(&self, action: preview_types::ActionNotice);
}

/// Injectable diagnostics interface.
///
/// The default implementation drops everything; tests or debug shells can
/// inject a recording implementation.
pub trait Diagnostics: Send + Sync {
    /// Record an internal event with structured detail.
    fn record(&self, event: &str, detail: serde_json::Value) {
        let _ = (event, detail);
    }
}

/// Diagnostics that discards all events.
#[derive(Debug, Default)]
pub struct NoopDiagnostics;

impl Diagnostics for NoopDiagnostics {}

/// Status reporter that records every report, for tests and debug shells.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    manager: Mutex<Vec<ChannelStatus>>,
    container: Mutex<Vec<ContainerStatus>>,
}

impl RecordingReporter {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All channel statuses reported so far, in order.
    pub fn manager_statuses(&self) -> Vec<ChannelStatus> {
        self.manager.lock().unwrap().clone()
    }

    /// All container statuses reported so far, in order.
    pub fn container_statuses(&self) -> Vec<ContainerStatus> {
        self.container.lock().unwrap().clone()
    }
}

impl StatusReporter for RecordingReporter {
    fn set_manager_status(&self, status: ChannelStatus) {
        self.manager.lock().unwrap().push(status);
    }

    fn set_container_status(&self, status: ContainerStatus) {
        self.container.lock().unwrap().push(status);
    }
}

/// Notification sink that records every message, for tests and debug shells.
#[derive(Debug, Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<String>>,
}

impl RecordingSink {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All notified errors so far, in order.
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingSink {
    fn notify_error(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

/// Action sink that records every dispatched action, for tests.
#[derive(Debug, Default)]
pub struct RecordingActions {
    actions: Mutex<Vec<preview_types::ActionNotice>>,
}

impl RecordingActions {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All dispatched actions so far, in order.
    pub fn actions(&self) -> Vec<preview_types::ActionNotice> {
        self.actions.lock().unwrap().clone()
    }
}

impl ActionSink for RecordingActions {
    fn dispatch_action(&self, action: preview_types::ActionNotice) {
        self.actions.lock().unwrap().push(action);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_reporter_keeps_order() {
        let reporter = RecordingReporter::new();
        reporter.set_manager_status(ChannelStatus::Connecting);
        reporter.set_manager_status(ChannelStatus::Connected);
        reporter.set_container_status(ContainerStatus::SandboxStarted);

        assert_eq!(
            reporter.manager_statuses(),
            vec![ChannelStatus::Connecting, ChannelStatus::Connected]
        );
        assert_eq!(
            reporter.container_statuses(),
            vec![ContainerStatus::SandboxStarted]
        );
    }

    #[test]
    fn recording_sink_collects_messages() {
        let sink = RecordingSink::new();
        sink.notify_error("npm install failed");
        assert_eq!(sink.messages(), vec!["npm install failed".to_string()]);
    }

    #[test]
    fn noop_diagnostics_accepts_anything() {
        NoopDiagnostics.record("whatever", serde_json::json!({"k": 1}));
    }
}
