//! Upstream connection management.
//!
//! - [`Transport`]: the byte stream a client runs on, able to switch to TLS
//! - [`SmtpStream`]: TCP/TLS transport with [`connect`] and [`connect_tls`]
//! - [`Client`]: SMTP/LMTP command client
//! - [`DataWriter`]: DATA body writer

mod client;
mod data;
mod stream;
mod tls;

pub use client::{Client, DEFAULT_COMMAND_TIMEOUT, DEFAULT_SUBMISSION_TIMEOUT, DataWriter};
pub use data::DotStuffer;
pub use stream::{SmtpStream, connect, connect_tls};
pub use tls::TlsParameters;

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::types::Extension;

/// Mail transfer protocol spoken with the upstream server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// SMTP (RFC 5321), greeting with EHLO.
    #[default]
    Smtp,
    /// LMTP (RFC 2033), greeting with LHLO; one DATA reply per recipient.
    Lmtp,
}

/// A byte stream that can carry an SMTP session.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send + Sized {
    /// Performs a TLS handshake over this stream (STARTTLS).
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is already TLS or the handshake fails.
    fn start_tls(self, tls: &TlsParameters) -> impl Future<Output = Result<Self>> + Send;

    /// Returns true if the stream is TLS-encrypted.
    fn is_tls(&self) -> bool;
}

/// Server capabilities from EHLO response.
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    /// Server hostname from greeting.
    pub hostname: String,
    /// Supported extensions.
    pub extensions: HashSet<Extension>,
}

impl ServerInfo {
    /// Checks if the server supports an extension.
    #[must_use]
    pub fn supports(&self, ext: &Extension) -> bool {
        self.extensions.contains(ext)
    }

    /// Checks if STARTTLS is supported.
    #[must_use]
    pub fn supports_starttls(&self) -> bool {
        self.supports(&Extension::StartTls)
    }

    /// Checks if SIZE is advertised, with or without a limit.
    #[must_use]
    pub fn supports_size(&self) -> bool {
        self.extensions
            .iter()
            .any(|ext| matches!(ext, Extension::Size(_)))
    }

    /// Checks if AUTH is advertised.
    #[must_use]
    pub fn supports_auth(&self) -> bool {
        self.extensions
            .iter()
            .any(|ext| matches!(ext, Extension::Auth(_)))
    }

    /// Returns the maximum message size, if advertised.
    #[must_use]
    pub fn max_message_size(&self) -> Option<usize> {
        for ext in &self.extensions {
            if let Extension::Size(size) = ext {
                return *size;
            }
        }
        None
    }

    /// Returns supported authentication mechanisms.
    #[must_use]
    pub fn auth_mechanisms(&self) -> Vec<crate::types::AuthMechanism> {
        for ext in &self.extensions {
            if let Extension::Auth(mechanisms) = ext {
                return mechanisms.clone();
            }
        }
        Vec::new()
    }
}

/// Runs `fut`, failing with [`Error::Timeout`] once `timeout` elapses.
pub(crate) async fn with_timeout<T>(
    timeout: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| Error::Timeout(timeout))?
}

/// Fallback when `now + limit` overflows the clock.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Fixed point in time that bounds a whole exchange, not a single read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Deadline {
    at: Instant,
    limit: Duration,
}

impl Deadline {
    /// Starts a deadline `limit` from now.
    pub(crate) fn after(limit: Duration) -> Self {
        let now = Instant::now();
        Self {
            at: now.checked_add(limit).unwrap_or(now + FAR_FUTURE),
            limit,
        }
    }

    pub(crate) const fn at(self) -> Instant {
        self.at
    }

    /// Runs `fut` until the deadline, failing with [`Error::Timeout`].
    ///
    /// An expired deadline fails before `fut` is polled at all.
    pub(crate) async fn run<T>(self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        if Instant::now() >= self.at {
            return Err(Error::Timeout(self.limit));
        }
        tokio::time::timeout_at(self.at, fut)
            .await
            .map_err(|_| Error::Timeout(self.limit))?
    }
}
