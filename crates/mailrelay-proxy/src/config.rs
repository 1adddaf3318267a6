//! Upstream connection configuration.

use std::time::Duration;

use mailrelay_smtp::{Protocol, TlsParameters};
use serde::{Deserialize, Serialize};

pub use mailrelay_smtp::connection::{DEFAULT_COMMAND_TIMEOUT, DEFAULT_SUBMISSION_TIMEOUT};

use crate::error::{Error, Result};

/// Default limit for opening the upstream transport, TLS handshake included.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(30);

/// Transport security used towards the upstream server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Security {
    /// TLS from the first byte (port 465).
    Tls,
    /// Plaintext connection upgraded with STARTTLS.
    #[default]
    StartTls,
    /// No transport security.
    None,
}

/// Configuration of the upstream server a proxy backend relays to.
///
/// Zero durations stand for the documented defaults; see [`Self::timeouts`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Upstream `host:port`.
    pub address: String,
    /// Transport security.
    #[serde(default)]
    pub security: Security,
    /// TLS parameters; synthesized from the resolved host when absent.
    #[serde(default)]
    pub tls: Option<TlsParameters>,
    /// Protocol spoken upstream.
    #[serde(default)]
    pub protocol: Protocol,
    /// Host identity used instead of the host part of `address`.
    #[serde(default)]
    pub host: Option<String>,
    /// Name announced with EHLO/LHLO right after the greeting.
    #[serde(default)]
    pub local_name: Option<String>,
    /// Limit for opening the transport.
    #[serde(default, with = "seconds")]
    pub dial_timeout: Duration,
    /// Limit for each command round trip.
    #[serde(default, with = "seconds")]
    pub command_timeout: Duration,
    /// Limit for the DATA phase.
    #[serde(default, with = "seconds")]
    pub submission_timeout: Duration,
}

/// Effective timeouts after default resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Transport setup.
    pub dial: Duration,
    /// Per command.
    pub command: Duration,
    /// DATA phase.
    pub submission: Duration,
}

/// Returns `value`, or `default` when `value` is zero.
#[must_use]
pub const fn resolve_timeout(value: Duration, default: Duration) -> Duration {
    if value.is_zero() { default } else { value }
}

impl BackendConfig {
    /// Creates an SMTP configuration secured with STARTTLS.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            security: Security::StartTls,
            tls: None,
            protocol: Protocol::Smtp,
            host: None,
            local_name: None,
            dial_timeout: Duration::ZERO,
            command_timeout: Duration::ZERO,
            submission_timeout: Duration::ZERO,
        }
    }

    /// Creates an SMTP configuration using TLS from the start.
    #[must_use]
    pub fn new_tls(address: impl Into<String>, tls: TlsParameters) -> Self {
        Self::new(address).security(Security::Tls).tls(tls)
    }

    /// Creates an LMTP configuration without transport security.
    #[must_use]
    pub fn new_lmtp(address: impl Into<String>, host: impl Into<String>) -> Self {
        let mut config = Self::new(address).security(Security::None).host(host);
        config.protocol = Protocol::Lmtp;
        config
    }

    /// Sets the TLS parameters.
    #[must_use]
    pub fn tls(mut self, tls: TlsParameters) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Sets the name announced after the greeting.
    #[must_use]
    pub fn local_name(mut self, name: impl Into<String>) -> Self {
        self.local_name = Some(name.into());
        self
    }

    /// Overrides the host identity derived from the address.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the dial timeout.
    #[must_use]
    pub const fn dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    /// Sets the per-command timeout.
    #[must_use]
    pub const fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Sets the DATA phase timeout.
    #[must_use]
    pub const fn submission_timeout(mut self, timeout: Duration) -> Self {
        self.submission_timeout = timeout;
        self
    }

    /// Sets the transport security.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Returns the effective timeouts.
    #[must_use]
    pub const fn timeouts(&self) -> Timeouts {
        Timeouts {
            dial: resolve_timeout(self.dial_timeout, DEFAULT_DIAL_TIMEOUT),
            command: resolve_timeout(self.command_timeout, DEFAULT_COMMAND_TIMEOUT),
            submission: resolve_timeout(self.submission_timeout, DEFAULT_SUBMISSION_TIMEOUT),
        }
    }

    /// Returns the host identity: the `host` override, or the host part of
    /// the address.
    #[must_use]
    pub fn resolved_host(&self) -> String {
        match self.host.as_deref() {
            Some(host) if !host.is_empty() => host.to_string(),
            _ => split_host(&self.address).to_string(),
        }
    }

    /// Returns the TLS parameters to use, with the server name defaulting to
    /// `host`.
    #[must_use]
    pub fn resolved_tls(&self, host: &str) -> TlsParameters {
        self.tls.clone().unwrap_or_default().resolve(host)
    }

    /// Checks option combinations that cannot work.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for LMTP with transport security.
    pub fn validate(&self) -> Result<()> {
        if self.protocol == Protocol::Lmtp && self.security != Security::None {
            return Err(Error::Config(
                "LMTP does not support TLS or STARTTLS".into(),
            ));
        }
        Ok(())
    }
}

/// Host part of `host:port`, `[v6]:port` or a bare host.
fn split_host(address: &str) -> &str {
    if let Some(rest) = address.strip_prefix('[') {
        if let Some((host, _)) = rest.split_once(']') {
            return host;
        }
    }
    match address.rsplit_once(':') {
        // A second colon means an unbracketed IPv6 address without a port.
        Some((host, _)) if !host.contains(':') => host,
        _ => address,
    }
}

mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
