//! Tunnel session state management
//!
//! A process hosts at most one logical tunnel. [`TunnelSession`] tracks its
//! lifecycle; every mutation goes through a transition method so that an
//! operation attempted in the wrong state is reported instead of applied.

use std::fmt;

use crate::config::TunnelConfig;
use crate::error::{Error, Result};

/// Lifecycle state of the tunnel session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TunnelState {
    /// Nothing has been set up yet
    #[default]
    Uninitialized,
    /// The host permission flow has been started; waiting on the grant
    AwaitingPermission,
    /// Initialized and allowed to connect
    Ready,
    /// A connect is in flight with the backend
    Connecting,
    /// The tunnel is established
    Up,
    /// The tunnel was taken down
    Down,
    /// A backend fault occurred; only a fresh initialize recovers
    Failed,
}

impl TunnelState {
    /// Check if the tunnel is established
    pub const fn is_connected(&self) -> bool {
        matches!(self, TunnelState::Up)
    }

    /// Check if a connect may be attempted from this state.
    ///
    /// Connecting while `Up` is allowed: the running tunnel is replaced by
    /// the new configuration (last write wins).
    pub const fn can_connect(&self) -> bool {
        matches!(self, TunnelState::Ready | TunnelState::Down | TunnelState::Up)
    }
}

impl fmt::Display for TunnelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TunnelState::Uninitialized => "UNINITIALIZED",
            TunnelState::AwaitingPermission => "AWAITING_PERMISSION",
            TunnelState::Ready => "READY",
            TunnelState::Connecting => "CONNECTING",
            TunnelState::Up => "UP",
            TunnelState::Down => "DOWN",
            TunnelState::Failed => "FAILED",
        };
        write!(f, "{}", label)
    }
}

/// Mutable state of the single tunnel owned by a controller.
///
/// The session is an explicitly owned value handed to the controller, which
/// serializes every mutation; nothing else writes to it.
#[derive(Debug, Clone, Default)]
pub struct TunnelSession {
    /// Current lifecycle state
    pub state: TunnelState,
    /// The configuration last applied, if any
    pub current_config: Option<TunnelConfig>,
    /// Whether the host has granted tunnel-creation privilege
    pub permission_granted: bool,
    /// Diagnostic for the `Failed` state
    pub last_error: Option<String>,
}

impl TunnelSession {
    /// Create a fresh session in `Uninitialized`
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the result of initialization: `Ready` when the permission is
    /// held, `AwaitingPermission` otherwise. Rejected while a tunnel is
    /// active; disconnect first.
    pub fn mark_initialized(&mut self, permission_granted: bool) -> Result<()> {
        let target = if permission_granted {
            TunnelState::Ready
        } else {
            TunnelState::AwaitingPermission
        };
        match self.state {
            TunnelState::Up | TunnelState::Connecting => Err(Error::InvalidStateTransition {
                from: self.state,
                to: target,
            }),
            _ => {
                self.permission_granted = permission_granted;
                self.current_config = None;
                self.last_error = None;
                self.state = target;
                Ok(())
            }
        }
    }

    /// Transition into `Connecting`
    pub fn begin_connect(&mut self) -> Result<()> {
        if self.state.can_connect() {
            self.state = TunnelState::Connecting;
            Ok(())
        } else {
            Err(Error::InvalidStateTransition {
                from: self.state,
                to: TunnelState::Connecting,
            })
        }
    }

    /// The backend accepted the configuration; the tunnel is up
    pub fn complete_connect(&mut self, config: TunnelConfig) -> Result<()> {
        match self.state {
            TunnelState::Connecting => {
                self.current_config = Some(config);
                self.last_error = None;
                self.state = TunnelState::Up;
                Ok(())
            }
            _ => Err(Error::InvalidStateTransition {
                from: self.state,
                to: TunnelState::Up,
            }),
        }
    }

    /// The tunnel was taken down
    pub fn complete_disconnect(&mut self) -> Result<()> {
        match self.state {
            TunnelState::Up => {
                self.state = TunnelState::Down;
                Ok(())
            }
            _ => Err(Error::InvalidStateTransition {
                from: self.state,
                to: TunnelState::Down,
            }),
        }
    }

    /// Record a fault. Valid from any state; only a fresh
    /// [`mark_initialized`](Self::mark_initialized) leaves `Failed`.
    pub fn fail(&mut self, detail: impl Into<String>) {
        self.last_error = Some(detail.into());
        self.state = TunnelState::Failed;
    }

    /// Record an explicit permission grant from the host
    pub fn grant_permission(&mut self) {
        self.permission_granted = true;
        if self.state == TunnelState::AwaitingPermission {
            self.state = TunnelState::Ready;
        }
    }

    /// Record a permission denial from the host
    pub fn deny_permission(&mut self) {
        self.permission_granted = false;
    }

    /// Tear the session down to a fresh `Uninitialized` value
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
