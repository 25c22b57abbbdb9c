//! Tunnel lifecycle coordination
//!
//! [`TunnelController`] owns the session for the single tunnel of this
//! process. Lifecycle operations (`initialize`, `connect`, `disconnect`,
//! `teardown`) are serialized through an operation lock so two concurrent
//! calls can never interleave their backend work; `status` bypasses the
//! lock and reads a consistent snapshot. Once an operation has been
//! dispatched to the backend it runs to completion: there is no timeout
//! and no cancellation at this layer.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use wg_tunnel::{
    BackendState, RawTunnelPayload, TunnelBackend, TunnelConfig, TunnelHandle, TunnelSession,
    TunnelState,
};

use crate::error::{Error, Result};
use crate::event::{EventHandler, LoggingEventHandler, TunnelEvent};
use crate::permission::{PermissionBroker, PermissionGate, PermissionOutcome};

/// Point-in-time view of the tunnel, safe to read concurrently with an
/// in-flight lifecycle operation.
#[derive(Debug, Clone)]
pub struct TunnelStatus {
    /// Whether the tunnel is established
    pub is_connected: bool,
    /// Current lifecycle state
    pub state: TunnelState,
    /// Whether the host has granted tunnel-creation privilege
    pub permission_granted: bool,
    /// Diagnostic carried by the `Failed` state
    pub error: Option<String>,
}

/// Coordinates the lifecycle of at most one tunnel.
pub struct TunnelController {
    backend: Arc<dyn TunnelBackend>,
    gate: PermissionGate,
    session: RwLock<TunnelSession>,
    handle: RwLock<Option<TunnelHandle>>,
    /// Serializes lifecycle operations; status reads bypass it
    op_lock: Mutex<()>,
    event_handler: Arc<dyn EventHandler>,
}

impl TunnelController {
    /// Create a controller around an explicitly owned session.
    pub fn new(
        session: TunnelSession,
        backend: Arc<dyn TunnelBackend>,
        broker: Arc<dyn PermissionBroker>,
    ) -> Self {
        Self {
            backend,
            gate: PermissionGate::new(broker),
            session: RwLock::new(session),
            handle: RwLock::new(None),
            op_lock: Mutex::new(()),
            event_handler: Arc::new(LoggingEventHandler),
        }
    }

    /// Replace the default logging event handler
    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = handler;
        self
    }

    /// Whether tunnels can be established on this host
    pub fn is_supported(&self) -> bool {
        self.backend.supported()
    }

    /// Current lifecycle state
    pub async fn state(&self) -> TunnelState {
        self.session.read().await.state
    }

    /// The configuration currently applied, if any
    pub async fn current_config(&self) -> Option<TunnelConfig> {
        self.session.read().await.current_config.clone()
    }

    /// Check permission and move the session to `Ready`; when the
    /// privilege is missing, kick off the host grant flow, park in
    /// `AwaitingPermission`, and report [`Error::PermissionRequired`] so
    /// the caller retries after granting.
    pub async fn initialize(&self) -> Result<()> {
        let _op = self.op_lock.lock().await;
        match self.gate.request().await? {
            PermissionOutcome::AlreadyGranted => {
                self.apply(|s| s.mark_initialized(true))
                    .await
                    .map_err(Error::State)?;
                self.ensure_handle().await?;
                Ok(())
            }
            PermissionOutcome::Requested => {
                self.apply(|s| s.mark_initialized(false))
                    .await
                    .map_err(Error::State)?;
                Err(Error::PermissionRequired)
            }
            PermissionOutcome::Unavailable => Err(Error::NoInteractiveContext),
        }
    }

    /// Trigger the host permission flow.
    ///
    /// `AlreadyGranted` is itself an explicit statement from the host that
    /// the privilege is held, so it is recorded in the session.
    pub async fn request_permission(&self) -> Result<PermissionOutcome> {
        let outcome = self.gate.request().await?;
        if outcome == PermissionOutcome::AlreadyGranted {
            let newly_granted = {
                let mut session = self.session.write().await;
                let was_granted = session.permission_granted;
                session.grant_permission();
                !was_granted
            };
            if newly_granted {
                self.emit(TunnelEvent::PermissionChanged { granted: true })
                    .await;
            }
        }
        Ok(outcome)
    }

    /// Validate `payload` and bring the tunnel up with it.
    pub async fn connect(&self, payload: &RawTunnelPayload) -> Result<()> {
        let config = TunnelConfig::validate(payload).map_err(Error::Validation)?;
        self.connect_validated(config).await
    }

    /// Bring the tunnel up with an already validated configuration.
    ///
    /// Connecting while `Up` replaces the running tunnel with the new
    /// configuration (last write wins; configs are never diffed).
    pub async fn connect_validated(&self, config: TunnelConfig) -> Result<()> {
        let _op = self.op_lock.lock().await;

        // Permission failures win over state errors and leave the session
        // untouched.
        if !self.session.read().await.permission_granted {
            return Err(Error::PermissionRequired);
        }

        self.apply(|s| s.begin_connect()).await.map_err(Error::State)?;

        let handle = match self.ensure_handle().await {
            Ok(handle) => handle,
            Err(e) => return self.fail_with(e).await,
        };

        match self
            .backend
            .set_state(&handle, BackendState::Up, Some(&config))
            .await
        {
            Ok(_) => {
                self.apply(|s| s.complete_connect(config))
                    .await
                    .map_err(Error::State)?;
                Ok(())
            }
            Err(e) => self.fail_with(Error::Backend(backend_detail(e))).await,
        }
    }

    /// Tear the tunnel down.
    ///
    /// Reports [`Error::NotConnected`] when nothing is up, so callers can
    /// tell "nothing to disconnect" from an actual disconnect.
    pub async fn disconnect(&self) -> Result<()> {
        let _op = self.op_lock.lock().await;

        if self.session.read().await.state != TunnelState::Up {
            return Err(Error::NotConnected);
        }
        let Some(handle) = self.handle.read().await.clone() else {
            return Err(Error::NotConnected);
        };

        match self.backend.set_state(&handle, BackendState::Down, None).await {
            Ok(_) => {
                self.apply(|s| s.complete_disconnect())
                    .await
                    .map_err(Error::State)?;
                Ok(())
            }
            Err(e) => self.fail_with(Error::Backend(backend_detail(e))).await,
        }
    }

    /// Read a consistent snapshot of the session.
    ///
    /// Never fails: faults are carried in the `error` field of the
    /// returned status instead of being raised.
    pub async fn status(&self) -> TunnelStatus {
        let session = self.session.read().await;
        TunnelStatus {
            is_connected: session.state == TunnelState::Up,
            state: session.state,
            permission_granted: session.permission_granted,
            error: session.last_error.clone(),
        }
    }

    /// Explicit teardown: best-effort backend `Down`, then reset the
    /// session to `Uninitialized`.
    pub async fn teardown(&self) {
        let _op = self.op_lock.lock().await;
        if let Some(handle) = self.handle.write().await.take() {
            if let Err(e) = self.backend.set_state(&handle, BackendState::Down, None).await {
                log::warn!("teardown: backend refused DOWN: {}", e);
            }
        }
        let _ = self
            .apply(|s| {
                s.reset();
                Ok(())
            })
            .await;
    }

    /// Discrete message: the host granted the permission request.
    pub async fn permission_granted(&self) {
        let _ = self
            .apply(|s| {
                s.grant_permission();
                Ok(())
            })
            .await;
        self.emit(TunnelEvent::PermissionChanged { granted: true })
            .await;
    }

    /// Discrete message: the host denied the permission request.
    pub async fn permission_denied(&self) {
        let _ = self
            .apply(|s| {
                s.deny_permission();
                Ok(())
            })
            .await;
        self.emit(TunnelEvent::PermissionChanged { granted: false })
            .await;
    }

    /// Discrete message: the backend observed a tunnel state change
    /// out-of-band. A `Down` while the session believes `Up` means the
    /// tunnel dropped underneath us.
    pub async fn backend_state_changed(&self, state: BackendState) {
        if state == BackendState::Down {
            let _ = self
                .apply(|s| {
                    if s.state == TunnelState::Up {
                        let _ = s.complete_disconnect();
                    }
                    Ok(())
                })
                .await;
        }
        self.emit(TunnelEvent::BackendStateChanged { state }).await;
    }

    /// Apply a session mutation and emit `StateChanged` when it moved.
    async fn apply<F, T>(&self, mutate: F) -> wg_tunnel::Result<T>
    where
        F: FnOnce(&mut TunnelSession) -> wg_tunnel::Result<T>,
    {
        let (old, new, output) = {
            let mut session = self.session.write().await;
            let old = session.state;
            let output = mutate(&mut session)?;
            (old, session.state, output)
        };
        if old != new {
            self.emit(TunnelEvent::StateChanged { old, new }).await;
        }
        Ok(output)
    }

    /// Record a failure: session to `Failed`, error event, error result.
    async fn fail_with(&self, error: Error) -> Result<()> {
        let detail = error.to_string();
        let _ = self
            .apply(|s| {
                s.fail(detail.clone());
                Ok(())
            })
            .await;
        self.emit(TunnelEvent::Error {
            message: detail,
            recoverable: error.is_recoverable(),
        })
        .await;
        Err(error)
    }

    async fn ensure_handle(&self) -> Result<TunnelHandle> {
        if let Some(handle) = self.handle.read().await.clone() {
            return Ok(handle);
        }
        let handle = self
            .backend
            .create_handle()
            .await
            .map_err(|e| Error::Backend(backend_detail(e)))?;
        *self.handle.write().await = Some(handle.clone());
        Ok(handle)
    }

    async fn emit(&self, event: TunnelEvent) {
        self.event_handler.on_event(event).await;
    }
}

/// Unwrap the backend's own detail string instead of nesting prefixes.
fn backend_detail(error: wg_tunnel::Error) -> String {
    match error {
        wg_tunnel::Error::Backend(detail) => detail,
        other => other.to_string(),
    }
}
