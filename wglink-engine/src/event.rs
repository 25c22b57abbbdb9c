//! Lifecycle events emitted by the controller
//!
//! State changes, permission grants, and backend notifications are
//! delivered to an [`EventHandler`] so that a GUI, a host bridge, or plain
//! logging can observe the tunnel without polling.

use async_trait::async_trait;

use wg_tunnel::{BackendState, TunnelState};

/// Events emitted by the tunnel controller
#[derive(Debug, Clone)]
pub enum TunnelEvent {
    /// Lifecycle state changed
    StateChanged {
        old: TunnelState,
        new: TunnelState,
    },

    /// The host permission grant changed
    PermissionChanged {
        granted: bool,
    },

    /// The backend reported a state change out-of-band
    BackendStateChanged {
        state: BackendState,
    },

    /// An operation failed
    Error {
        /// Human-readable failure detail
        message: String,
        /// Whether the caller can recover without re-initializing
        recoverable: bool,
    },
}

/// Event handler trait for receiving tunnel events
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle a tunnel event
    async fn on_event(&self, event: TunnelEvent);
}

/// Event handler that forwards everything to the `log` crate
pub struct LoggingEventHandler;

#[async_trait]
impl EventHandler for LoggingEventHandler {
    async fn on_event(&self, event: TunnelEvent) {
        match event {
            TunnelEvent::StateChanged { old, new } => {
                log::info!("tunnel state: {} -> {}", old, new);
            }
            TunnelEvent::PermissionChanged { granted } => {
                if granted {
                    log::info!("VPN permission granted");
                } else {
                    log::warn!("VPN permission denied or revoked");
                }
            }
            TunnelEvent::BackendStateChanged { state } => {
                log::debug!("backend reported state {}", state);
            }
            TunnelEvent::Error {
                message,
                recoverable,
            } => {
                if recoverable {
                    log::warn!("recoverable error: {}", message);
                } else {
                    log::error!("{}", message);
                }
            }
        }
    }
}
