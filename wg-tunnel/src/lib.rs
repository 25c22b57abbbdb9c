//! # wg-tunnel
//!
//! Configuration model and lifecycle state machine for a single encrypted
//! point-to-point tunnel.
//!
//! The crate is deliberately free of I/O: it turns a loosely-typed
//! connection payload into a validated [`TunnelConfig`], tracks the tunnel
//! lifecycle in a [`TunnelSession`], and defines the [`TunnelBackend`]
//! boundary through which an externally-owned tunnel engine is driven.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                     Caller / bridge                  │
//! └───────────────────────────┬──────────────────────────┘
//!                             ▼
//! ┌──────────────────────────────────────────────────────┐
//! │  RawTunnelPayload ──validate──▶ TunnelConfig         │
//! │  TunnelSession (state machine, at most one tunnel)   │
//! └───────────────────────────┬──────────────────────────┘
//!                             ▼
//! ┌──────────────────────────────────────────────────────┐
//! │  TunnelBackend (externally-owned crypto engine)      │
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod key;
pub mod session;

pub use backend::{BackendState, TunnelBackend, TunnelHandle};
pub use config::{PeerConfig, RawTunnelPayload, TunnelConfig};
pub use error::{Error, Result};
pub use key::Key;
pub use session::{TunnelSession, TunnelState};

/// MTU applied when the payload does not carry one.
pub const DEFAULT_MTU: u16 = 1280;

/// Smallest MTU accepted for the tunnel interface (the IPv6 minimum link MTU).
pub const MIN_MTU: u16 = 1280;

/// Largest MTU accepted for the tunnel interface.
pub const MAX_MTU: u16 = 65535;

/// Persistent keepalive interval applied to the peer; not caller-configurable.
pub const PERSISTENT_KEEPALIVE_SECS: u16 = 25;

/// Interface address synthesized when the payload supplies no single-host
/// prefix of its own.
pub const DEFAULT_INTERFACE_ADDRESS: &str = "10.0.0.2/32";
