//! Error types for the tunnel engine

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving the tunnel lifecycle
#[derive(Debug, Error)]
pub enum Error {
    /// The connection payload failed validation
    #[error("invalid tunnel configuration: {0}")]
    Validation(#[source] wg_tunnel::Error),

    /// The tunnel-creation privilege has not been granted
    #[error("VPN permission is required but has not been granted")]
    PermissionRequired,

    /// No interactive context exists to present the permission request
    #[error("no interactive context is available to request VPN permission")]
    NoInteractiveContext,

    /// The host permission flow itself failed
    #[error("permission request failed: {0}")]
    Permission(String),

    /// The external tunnel engine rejected an operation or faulted
    #[error("tunnel backend fault: {0}")]
    Backend(String),

    /// Disconnect was requested with no tunnel up
    #[error("no tunnel is connected")]
    NotConnected,

    /// The operation is not valid in the current lifecycle state
    #[error("lifecycle error: {0}")]
    State(#[source] wg_tunnel::Error),

    /// A control request came back with an error code
    #[error("control request failed [{code}]: {message}")]
    Control { code: String, message: String },

    /// I/O error on the control socket
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Control message could not be encoded or decoded
    #[error("control protocol error: {0}")]
    Protocol(#[from] serde_json::Error),
}

impl Error {
    /// Stable code for permission failures; operation handlers supply the
    /// fallback code for everything else.
    pub fn permission_code(&self) -> Option<&'static str> {
        match self {
            Error::PermissionRequired => Some("VPN_PERMISSION_REQUIRED"),
            Error::NoInteractiveContext => Some("NO_ACTIVITY"),
            Error::Permission(_) => Some("PERMISSION_ERROR"),
            _ => None,
        }
    }

    /// Check if the caller can recover by correcting input or re-running
    /// the permission flow. Backend faults are surfaced verbatim and never
    /// retried automatically.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Error::Backend(_) | Error::Io(_))
    }
}
