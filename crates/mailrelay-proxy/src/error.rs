//! Error types for the proxy backend.

use std::fmt;
use std::io;

use mailrelay_smtp::Status;

/// Result type alias for proxy operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Step of connection setup that failed after the transport was open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStage {
    /// Reading the server greeting.
    Greeting,
    /// Announcing the configured local name.
    Hello,
    /// Upgrading with STARTTLS.
    StartTls,
}

impl fmt::Display for HandshakeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Greeting => "greeting",
            Self::Hello => "hello",
            Self::StartTls => "STARTTLS",
        })
    }
}

/// Proxy backend errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Incompatible configuration; detected before any network I/O.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The upstream server could not be reached.
    #[error("Failed to connect to {address}: {source}")]
    Dial {
        /// Upstream address.
        address: String,
        /// Underlying error.
        #[source]
        source: mailrelay_smtp::Error,
    },

    /// Connection setup failed after the transport was open.
    #[error("Upstream {stage} failed: {source}")]
    Handshake {
        /// Failed step.
        stage: HandshakeStage,
        /// Underlying error.
        #[source]
        source: mailrelay_smtp::Error,
    },

    /// The upstream server rejected the credentials.
    #[error("Upstream authentication failed: {0}")]
    Auth(#[source] mailrelay_smtp::Error),

    /// A forwarded command failed upstream.
    #[error(transparent)]
    Upstream(#[from] mailrelay_smtp::Error),

    /// Reading the inbound message failed during DATA.
    #[error("Failed to read message data: {0}")]
    Transfer(#[source] io::Error),
}

impl Error {
    /// Returns the upstream status carried by this error, if any.
    #[must_use]
    pub const fn status(&self) -> Option<&Status> {
        match self {
            Self::Dial { source, .. } | Self::Handshake { source, .. } => source.status(),
            Self::Auth(source) | Self::Upstream(source) => source.status(),
            Self::Config(_) | Self::Transfer(_) => None,
        }
    }
}
