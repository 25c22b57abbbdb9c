//! Host permission gating
//!
//! Creating a tunnel interface requires a privilege grant from the host
//! platform. The grant flow itself is external and asynchronous: this
//! module defines the boundary ([`PermissionBroker`]) and the gate the
//! controller consults before connecting. The grant or denial outcome
//! arrives out-of-band, as a discrete message into the controller.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, Result};

/// A pending permission prompt that must be presented to the user.
#[derive(Debug, Clone)]
pub struct PermissionRequest {
    /// Human-readable description of the privilege being requested
    pub prompt: String,
}

impl PermissionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }
}

/// Outcome of a permission request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionOutcome {
    /// The privilege was already held; nothing was presented
    AlreadyGranted,
    /// The host is presenting the request; the grant or denial arrives
    /// later as a discrete message into the controller
    Requested,
    /// No interactive context exists to present the request
    Unavailable,
}

/// Host-platform permission primitive.
///
/// `prepare` returns `None` when the privilege is already held, otherwise
/// the request that must be shown to the user.
#[async_trait]
pub trait PermissionBroker: Send + Sync {
    /// Ask the host whether tunnel-creation privilege is currently held
    async fn prepare(&self) -> Result<Option<PermissionRequest>>;

    /// Present a prepared request to the user. Fails with
    /// [`Error::NoInteractiveContext`] when nothing can host the prompt.
    async fn present(&self, request: PermissionRequest) -> Result<()>;
}

/// Tracks and requests the tunnel-creation privilege.
pub struct PermissionGate {
    broker: Arc<dyn PermissionBroker>,
}

impl PermissionGate {
    pub fn new(broker: Arc<dyn PermissionBroker>) -> Self {
        Self { broker }
    }

    /// Ask the host whether the privilege is currently held
    pub async fn check_granted(&self) -> bool {
        matches!(self.broker.prepare().await, Ok(None))
    }

    /// Ensure the privilege: returns `AlreadyGranted` without side effects
    /// when it is held, otherwise presents the host's request.
    pub async fn request(&self) -> Result<PermissionOutcome> {
        match self.broker.prepare().await.map_err(into_permission_error)? {
            None => Ok(PermissionOutcome::AlreadyGranted),
            Some(request) => match self.broker.present(request).await {
                Ok(()) => Ok(PermissionOutcome::Requested),
                Err(Error::NoInteractiveContext) => Ok(PermissionOutcome::Unavailable),
                Err(e) => Err(into_permission_error(e)),
            },
        }
    }
}

fn into_permission_error(error: Error) -> Error {
    match error {
        Error::Permission(_) | Error::NoInteractiveContext => error,
        other => Error::Permission(other.to_string()),
    }
}

/// Broker for hosts where tunnel creation needs no interactive grant
/// (headless daemons, root CLIs). `prepare` always reports the privilege
/// as held.
#[derive(Debug, Default)]
pub struct AutoGrantBroker;

#[async_trait]
impl PermissionBroker for AutoGrantBroker {
    async fn prepare(&self) -> Result<Option<PermissionRequest>> {
        Ok(None)
    }

    async fn present(&self, _request: PermissionRequest) -> Result<()> {
        Ok(())
    }
}
