//! # wglink-engine
//!
//! Lifecycle coordinator for a single encrypted point-to-point tunnel.
//!
//! The engine sits between a caller-facing surface (the control socket, a
//! CLI, or a host bridge) and the externally-owned tunnel backend:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                      Caller surface                        │
//! │        (ControlServer / CLI / host bridge)                 │
//! └──────────────────────────┬─────────────────────────────────┘
//!                            ▼
//! ┌────────────────────────────────────────────────────────────┐
//! │                     wglink-engine                          │
//! │  - TunnelController (lifecycle state machine)              │
//! │  - PermissionGate (host privilege boundary)                │
//! │  - Events (state changes, errors)                          │
//! └──────────────────────────┬─────────────────────────────────┘
//!                            ▼
//! ┌────────────────────────────────────────────────────────────┐
//! │            wg-tunnel (model) + TunnelBackend               │
//! │        (validation, session, backend contract)             │
//! └────────────────────────────────────────────────────────────┘
//! ```

pub mod control;
pub mod controller;
pub mod error;
pub mod event;
pub mod permission;
pub mod wgquick;

pub use control::{dispatch, ControlRequest, ControlResponse, StatusInfo, DEFAULT_SOCKET_PATH};
#[cfg(unix)]
pub use control::{ControlClient, ControlServer};
pub use controller::{TunnelController, TunnelStatus};
pub use error::{Error, Result};
pub use event::{EventHandler, LoggingEventHandler, TunnelEvent};
pub use permission::{
    AutoGrantBroker, PermissionBroker, PermissionGate, PermissionOutcome, PermissionRequest,
};
pub use wgquick::WgQuickBackend;
