//! Error types for SMTP operations.

use std::io;
use std::time::Duration;

use crate::types::Status;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Server returned an error reply.
    #[error("SMTP error {0}")]
    Smtp(#[from] Status),

    /// Protocol error (unexpected or malformed response).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The server closed the connection.
    #[error("Connection closed by server")]
    ConnectionClosed,

    /// An operation did not complete in time.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Feature not supported by server.
    #[error("Server does not support {0}")]
    NotSupported(String),

    /// A command argument cannot be sent as given.
    #[error("Invalid command argument: {0}")]
    InvalidArgument(String),

    /// Invalid state for operation.
    #[error("Invalid state for operation: {0}")]
    InvalidState(String),

    /// SASL mechanism failed to produce a response.
    #[error("Authentication mechanism error: {0}")]
    Mechanism(String),
}

impl Error {
    /// Returns the structured server status, if this error carries one.
    #[must_use]
    pub const fn status(&self) -> Option<&Status> {
        match self {
            Self::Smtp(status) => Some(status),
            _ => None,
        }
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Smtp(status) if status.code.is_permanent())
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Smtp(status) if status.code.is_transient())
    }
}
