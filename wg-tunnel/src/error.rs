//! Error types for the tunnel model

use thiserror::Error;

use crate::session::TunnelState;

/// Result type alias for tunnel model operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by payload validation, the session state machine, and
/// backend adapters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A required payload field was absent
    #[error("required field `{0}` is missing")]
    MissingField(&'static str),

    /// A key field did not decode to 32 bytes of base64 key material
    #[error("field `{0}` is not a valid base64-encoded 32-byte key")]
    MalformedKey(&'static str),

    /// An allowed-IP entry was not a CIDR network literal
    #[error("`{0}` is not a valid CIDR network")]
    MalformedNetwork(String),

    /// A DNS entry was not an IP address literal
    #[error("`{0}` is not a valid DNS server address")]
    MalformedDns(String),

    /// A numeric field fell outside its permitted range
    #[error("{field} {value} is out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    /// A lifecycle operation was attempted in a state that does not allow it
    #[error("invalid tunnel state transition from {from} to {to}")]
    InvalidStateTransition {
        from: TunnelState,
        to: TunnelState,
    },

    /// The external tunnel engine rejected an operation or faulted
    #[error("backend error: {0}")]
    Backend(String),
}

impl Error {
    /// Check if this error came out of payload validation. Validation
    /// errors are always recoverable by correcting the payload.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::MissingField(_)
                | Error::MalformedKey(_)
                | Error::MalformedNetwork(_)
                | Error::MalformedDns(_)
                | Error::OutOfRange { .. }
        )
    }
}
