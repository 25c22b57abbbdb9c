//! Backend adapter boundary
//!
//! The cryptographic tunnel engine is owned externally. This module defines
//! the contract the controller drives it through, and the [`mock`] module
//! provides an in-memory implementation for exercising the lifecycle in
//! tests.

pub mod mock;

use std::fmt;

use async_trait::async_trait;

use crate::config::TunnelConfig;
use crate::error::Result;

/// Opaque reference to the tunnel managed by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelHandle {
    name: String,
}

impl TunnelHandle {
    /// Create a handle for the named interface
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Interface name chosen by the backend
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for TunnelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Observable state of a backend tunnel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendState {
    /// The tunnel is established and forwarding
    Up,
    /// The tunnel is not running
    #[default]
    Down,
}

impl fmt::Display for BackendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendState::Up => write!(f, "UP"),
            BackendState::Down => write!(f, "DOWN"),
        }
    }
}

/// Contract of the externally-owned tunnel engine.
///
/// Implementations perform the actual handshake and packet forwarding; the
/// controller only sequences calls into them. A stalled implementation
/// stalls the corresponding lifecycle operation: no timeout is imposed at
/// this boundary.
#[async_trait]
pub trait TunnelBackend: Send + Sync {
    /// Allocate a handle for the single tunnel this backend manages
    async fn create_handle(&self) -> Result<TunnelHandle>;

    /// Drive the tunnel toward `target` and return the state actually
    /// reached. `config` must be supplied when the target is
    /// [`BackendState::Up`] and is ignored for [`BackendState::Down`].
    async fn set_state(
        &self,
        handle: &TunnelHandle,
        target: BackendState,
        config: Option<&TunnelConfig>,
    ) -> Result<BackendState>;

    /// Query the tunnel state as the backend sees it
    async fn get_state(&self, handle: &TunnelHandle) -> Result<BackendState>;

    /// Whether this backend can establish tunnels on the current host
    fn supported(&self) -> bool {
        true
    }
}
