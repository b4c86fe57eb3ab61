use std::time::Duration;

use thiserror::Error;

use crate::tunnel::SessionState;

/// Errors that can occur while managing a tunnel
#[derive(Error, Debug)]
pub enum TunnelError {
    /// Candidate remote port range is inverted
    #[error("invalid remote port range: {min}-{max}")]
    InvalidPortRange { min: u16, max: u16 },

    /// open() called on a session that already ran its one attempt
    #[error("open requires an idle session, current state: {0:?}")]
    NotIdle(SessionState),

    /// Transport reported failure, or errored, before establishment
    #[error("failed to create tunnel to {0}")]
    OpenFailed(String),

    /// Connect timeout elapsed without success or explicit failure
    #[error("tunnel to {addr} not established within {timeout:?}")]
    OpenTimeout { addr: String, timeout: Duration },

    /// All configured attempts failed
    #[error("failed to create tunnel after {attempts} attempts")]
    RetryExhausted { attempts: u32 },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Platform not supported for operation
    #[error("{operation} is only supported on Unix platforms")]
    PlatformNotSupported { operation: String },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Result type alias for tunnel operations
pub type TunnelResult<T> = Result<T, TunnelError>;

impl TunnelError {
    /// Create an open-failed error for the given proxy address
    pub fn open_failed(addr: impl Into<String>) -> Self {
        Self::OpenFailed(addr.into())
    }

    /// Create a generic error with context
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}
