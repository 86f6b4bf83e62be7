//! The preview controller: single source of truth tying execution mode,
//! content synchronization, and readiness together.
//!
//! The controller owns one [`MessageRouter`], one optional
//! [`ConnectionManager`] (remote mode only), the last-sent baseline
//! snapshot, and the navigation history for the current target identity.
//! The surrounding shell forwards lifecycle events (project change, target
//! initialization, inbound envelopes, refresh) into the controller through
//! explicit method calls and renders from its derived state.

use preview_core::{snapshot_diff, NavigationHistory};
use preview_types::{
    ActionNotice, Compile, ContainerStatus, ContentSnapshot, Envelope, ExecutionMode,
    PreviewError, Project, SandboxError,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::auth::{CachedToken, TokenProvider};
use crate::channel::{Channel, ChannelFactory};
use crate::collab::{ActionSink, Diagnostics, NotificationSink, PathResolver, StatusReporter};
use crate::config::PreviewConfig;
use crate::connection::ConnectionManager;
use crate::router::{MessageRouter, Routed};

/// Path of the synthetic manifest entry injected into every snapshot.
const MANIFEST_PATH: &str = "/package.json";

/// External collaborators consumed by the session core.
pub struct Collaborators {
    /// Receives the channel and container status axes.
    pub reporter: Arc<dyn StatusReporter>,
    /// Receives recoverable errors for user-facing notification.
    pub notifications: Arc<dyn NotificationSink>,
    /// Resolves module ids to project paths.
    pub paths: Arc<dyn PathResolver>,
    /// Receives opaque actions bubbled from the target.
    pub actions: Arc<dyn ActionSink>,
    /// Injectable diagnostics.
    pub diagnostics: Arc<dyn Diagnostics>,
    /// Source of authentication tokens for the socket handshake.
    pub tokens: Arc<dyn TokenProvider>,
    /// Creates socket channels for remote targets.
    pub channels: Arc<dyn ChannelFactory>,
}

/// Per-target-identity session state.
struct Session {
    project: Project,
    mode: ExecutionMode,
    router: Arc<MessageRouter>,
    manager: Option<Arc<ConnectionManager>>,
    /// Last snapshot confirmed deliverable to the target; advanced only
    /// while the container reports `SandboxStarted`, never speculatively.
    baseline: ContentSnapshot,
    /// Most recent snapshot handed to the controller.
    latest: ContentSnapshot,
    history: NavigationHistory,
    container_status: ContainerStatus,
    ready: bool,
    settled: bool,
    content_height: Option<f64>,
    fatal_error: Option<String>,
    version: u32,
}

/// Orchestrates execution mode, content sync, navigation, and readiness.
pub struct PreviewController {
    config: PreviewConfig,
    collab: Collaborators,
    tokens: Arc<CachedToken<Arc<dyn TokenProvider>>>,
    session: Mutex<Session>,
    debounce_generation: AtomicU64,
}

impl PreviewController {
    /// Create a controller for the given project and initial snapshot.
    ///
    /// Remote-mode channels are created but not opened; call
    /// [`PreviewController::start`] to open the socket.
    pub fn new(
        project: Project,
        initial_snapshot: ContentSnapshot,
        config: PreviewConfig,
        collab: Collaborators,
    ) -> Self {
        let tokens = Arc::new(CachedToken::new(
            collab.tokens.clone(),
            config.token_validity,
        ));
        let session = Self::build_session(&collab, &tokens, &config, project, initial_snapshot);
        Self {
            config,
            collab,
            tokens,
            session: Mutex::new(session),
            debounce_generation: AtomicU64::new(0),
        }
    }

    fn build_session(
        collab: &Collaborators,
        tokens: &Arc<CachedToken<Arc<dyn TokenProvider>>>,
        config: &PreviewConfig,
        project: Project,
        mut snapshot: ContentSnapshot,
    ) -> Session {
        snapshot.ensure_manifest(MANIFEST_PATH, project.generated_manifest());
        let mode = project.execution_mode();
        let router = Arc::new(MessageRouter::new(mode));
        let manager = match mode {
            ExecutionMode::Remote => {
                let channel = collab.channels.socket_channel(&project.sandbox_id);
                router.register_socket(channel.clone());
                Some(Arc::new(ConnectionManager::new(
                    channel,
                    format!("sandbox-host/{}", project.sandbox_id),
                    project.sandbox_id.clone(),
                    config.connect_timeout,
                    collab.reporter.clone(),
                    tokens.clone() as Arc<dyn TokenProvider>,
                    router.clone(),
                )))
            }
            ExecutionMode::Embedded => None,
        };

        info!(project = %project.id, ?mode, "session created");
        Session {
            project,
            mode,
            router,
            manager,
            baseline: snapshot.clone(),
            latest: snapshot,
            history: NavigationHistory::new("/"),
            container_status: ContainerStatus::Initializing,
            ready: false,
            settled: false,
            content_height: None,
            fatal_error: None,
            version: 0,
        }
    }

    /// Open the socket channel (remote mode); a no-op in embedded mode.
    pub async fn start(&self) {
        let manager = self.session.lock().await.manager.clone();
        if let Some(manager) = manager {
            manager.open().await;
        }
    }

    /// Replace the target identity with a new project.
    ///
    /// Resets navigation history, tears down and rebuilds the connection
    /// manager in remote mode, takes the fresh snapshot as the new
    /// last-sent baseline, and triggers a full refresh.
    pub async fn set_project(&self, project: Project, snapshot: ContentSnapshot) {
        let old = {
            let mut session = self.session.lock().await;
            let fresh =
                Self::build_session(&self.collab, &self.tokens, &self.config, project, snapshot);
            std::mem::replace(&mut *session, fresh)
        };
        old.router.deregister();
        if let Some(manager) = old.manager {
            manager.close().await;
        }
        self.start().await;

        // Full refresh: the embedded target recompiles once it announces
        // itself; an already-ready channel gets its request immediately.
        if self.session.lock().await.router.is_ready() {
            if let Err(error) = self.execute_now().await {
                debug!(%error, "refresh after project change not delivered");
            }
        }
    }

    /// The target runtime announced readiness; register its channel
    /// endpoint and perform an immediate, non-debounced execution request.
    ///
    /// This is the only path forcing a synchronous-as-possible sync: the
    /// target has no prior state.
    pub async fn target_initialized(
        &self,
        endpoint: Arc<dyn Channel>,
    ) -> Result<(), PreviewError> {
        {
            let mut session = self.session.lock().await;
            session.router.register_embedded(endpoint);
            session.ready = true;
        }
        self.execute_now().await
    }

    /// Re-send the latest snapshot without waiting for new content.
    async fn execute_now(&self) -> Result<(), PreviewError> {
        let snapshot = self.session.lock().await.latest.clone();
        self.request_execution(snapshot).await
    }

    /// Execute the given snapshot on the target.
    ///
    /// Embedded mode always sends the full snapshot plus compile metadata;
    /// the target reconciles it itself. Remote mode sends the diff against
    /// the baseline, and only when it is non-empty.
    pub async fn request_execution(
        &self,
        mut snapshot: ContentSnapshot,
    ) -> Result<(), PreviewError> {
        let (router, envelope, advanced_baseline) = {
            let mut session = self.session.lock().await;
            session.fatal_error = None;
            snapshot.ensure_manifest(MANIFEST_PATH, session.project.generated_manifest());
            session.latest = snapshot.clone();

            match session.mode {
                ExecutionMode::Embedded => {
                    session.version += 1;
                    let compile = Compile {
                        version: session.version,
                        entry: session.project.entry.clone(),
                        modules: snapshot,
                        sandbox_id: session.project.sandbox_id.clone(),
                        external_resources: session.project.external_resources.clone(),
                        is_module_view: session.project.is_module_view,
                        template: session.project.template.clone(),
                        has_actions: session.project.has_actions,
                    };
                    (
                        session.router.clone(),
                        Some(Envelope::Compile(compile)),
                        None,
                    )
                }
                ExecutionMode::Remote => {
                    let updates = snapshot_diff(&session.baseline, &snapshot);
                    if updates.is_empty() {
                        (session.router.clone(), None, None)
                    } else {
                        let started =
                            session.container_status == ContainerStatus::SandboxStarted;
                        (
                            session.router.clone(),
                            Some(Envelope::SandboxUpdate { updates }),
                            started.then_some(snapshot),
                        )
                    }
                }
            }
        };

        let Some(envelope) = envelope else {
            debug!("no content change, skipping send");
            return Ok(());
        };
        router.send(&envelope).await?;

        if let Some(baseline) = advanced_baseline {
            self.session.lock().await.baseline = baseline;
        }
        Ok(())
    }

    /// Execute after the configured debounce delay, coalescing rapid
    /// successive requests; each new request postpones the pending one.
    pub async fn request_execution_debounced(
        &self,
        snapshot: ContentSnapshot,
    ) -> Result<(), PreviewError> {
        let Some(delay) = self.config.debounce else {
            return self.request_execution(snapshot).await;
        };

        let generation = self.debounce_generation.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(delay).await;
        if self.debounce_generation.load(Ordering::SeqCst) != generation {
            // A newer request superseded this one.
            return Ok(());
        }
        self.request_execution(snapshot).await
    }

    /// Route one inbound envelope and apply its effects.
    pub async fn handle_envelope(&self, envelope: Envelope) -> Result<Routed, PreviewError> {
        let router = self.session.lock().await.router.clone();
        let routed = router.route(envelope).await?;

        match &routed {
            Routed::Initialized => {
                // The shell follows up with `target_initialized` carrying
                // the announced endpoint.
            }
            Routed::Render => {
                self.execute_now().await?;
            }
            Routed::Done => {
                self.session.lock().await.settled = true;
            }
            Routed::Navigation { url, action, delta } => {
                let mut session = self.session.lock().await;
                session.history.navigate(url.clone(), *action, *delta);
            }
            Routed::Resize { height } => {
                self.session.lock().await.content_height = Some(*height);
            }
            Routed::Action(notice) => {
                self.dispatch_action(notice.clone()).await;
            }
            Routed::ContainerStatus(status) => {
                self.container_status_changed(*status).await;
            }
            Routed::SandboxStarted => {
                self.container_status_changed(ContainerStatus::SandboxStarted)
                    .await;
            }
            Routed::SandboxStopped => {
                self.container_status_changed(ContainerStatus::Stopped).await;
            }
            Routed::Hibernated => {
                self.container_status_changed(ContainerStatus::Hibernated)
                    .await;
                let manager = self.session.lock().await.manager.clone();
                if let Some(manager) = manager {
                    manager.handle_hibernate().await;
                }
            }
            Routed::ContainerError(error) => {
                self.container_error(error.clone()).await;
            }
            Routed::Log { data } => {
                self.collab
                    .diagnostics
                    .record("sandbox:log", serde_json::json!({ "data": data }));
            }
            Routed::Proxied | Routed::ShellRelayed | Routed::Ignored => {}
        }
        Ok(routed)
    }

    async fn container_status_changed(&self, status: ContainerStatus) {
        self.session.lock().await.container_status = status;
        self.collab.reporter.set_container_status(status);
    }

    async fn container_error(&self, error: SandboxError) {
        if error.unrecoverable {
            warn!(message = %error.message, "unrecoverable container error");
            let manager = {
                let mut session = self.session.lock().await;
                session.fatal_error = Some(error.message.clone());
                session.manager.clone()
            };
            // Terminal for this channel instance: only a new project load
            // creates a manager that can connect again.
            if let Some(manager) = manager {
                manager.handle_failure().await;
            }
        } else {
            self.collab.notifications.notify_error(&error.message);
        }
    }

    async fn dispatch_action(&self, mut notice: ActionNotice) {
        let sandbox_id = self.session.lock().await.project.sandbox_id.clone();
        notice.sandbox_id = Some(sandbox_id);

        // Actions referring to a module get the resolved path attached.
        let resolved = notice
            .payload
            .get("moduleId")
            .and_then(|id| id.as_str())
            .and_then(|id| self.collab.paths.resolve_path(id));
        if let (Some(path), serde_json::Value::Object(fields)) = (resolved, &mut notice.payload) {
            fields.insert("path".into(), path.into());
        }

        self.collab.actions.dispatch_action(notice);
    }

    /// Inbound `connect` acknowledgment on the socket channel.
    pub async fn socket_connected(&self) {
        let manager = self.session.lock().await.manager.clone();
        if let Some(manager) = manager {
            manager.handle_connect().await;
        }
    }

    /// Inbound `disconnect` event on the socket channel.
    pub async fn socket_disconnected(&self) {
        let manager = self.session.lock().await.manager.clone();
        if let Some(manager) = manager {
            manager.handle_disconnect().await;
        }
    }

    /// Close and reopen the socket channel.
    pub async fn reconnect(&self) {
        let manager = self.session.lock().await.manager.clone();
        if let Some(manager) = manager {
            manager.reconnect().await;
        }
    }

    /// Full reload: collapse navigation history to the current URL.
    pub async fn handle_refresh(&self, current_url: impl Into<String>) {
        self.session.lock().await.history.refresh(current_url);
    }

    /// Run an arbitrary command string in the target.
    pub async fn evaluate(&self, command: impl Into<String>) -> Result<(), PreviewError> {
        let router = self.session.lock().await.router.clone();
        router
            .send(&Envelope::Evaluate {
                command: command.into(),
            })
            .await
    }

    /// Instruct the target to clear its console.
    pub async fn clear_console(&self) -> Result<(), PreviewError> {
        let router = self.session.lock().await.router.clone();
        router.send(&Envelope::ClearConsole).await
    }

    /// Tear the session down: close the socket, drop both endpoints.
    pub async fn shutdown(&self) {
        let (router, manager) = {
            let session = self.session.lock().await;
            (session.router.clone(), session.manager.clone())
        };
        if let Some(manager) = manager {
            manager.close().await;
        }
        router.deregister();
    }

    /// The current execution mode.
    pub async fn execution_mode(&self) -> ExecutionMode {
        self.session.lock().await.mode
    }

    /// Whether a back navigation is possible.
    pub async fn can_go_back(&self) -> bool {
        self.session.lock().await.history.can_go_back()
    }

    /// Whether a forward navigation is possible.
    pub async fn can_go_forward(&self) -> bool {
        self.session.lock().await.history.can_go_forward()
    }

    /// The URL for the address display.
    pub async fn address(&self) -> String {
        self.session.lock().await.history.address().to_string()
    }

    /// The blocking overlay condition, if an unrecoverable error occurred.
    pub async fn fatal_error(&self) -> Option<String> {
        self.session.lock().await.fatal_error.clone()
    }

    /// Whether the target announced readiness.
    pub async fn is_ready(&self) -> bool {
        self.session.lock().await.ready
    }

    /// Whether the target reached its initial paint/settle signal.
    pub async fn is_settled(&self) -> bool {
        self.session.lock().await.settled
    }

    /// Last reported content height, if any.
    pub async fn content_height(&self) -> Option<f64> {
        self.session.lock().await.content_height
    }

    /// Last known container lifecycle status.
    pub async fn container_status(&self) -> ContainerStatus {
        self.session.lock().await.container_status
    }
}
