//! Establishing ready-to-use upstream connections.

use mailrelay_smtp::{Client, Protocol, TlsParameters, Transport};
use tracing::{debug, warn};

use crate::config::{BackendConfig, Security};
use crate::dial::{Dialer, TcpDialer};
use crate::error::{Error, HandshakeStage, Result};

/// Produces one initialized upstream connection per call.
#[derive(Debug, Clone)]
pub struct ConnectionFactory<D = TcpDialer> {
    config: BackendConfig,
    dialer: D,
}

impl ConnectionFactory {
    /// Creates a factory dialing over TCP.
    #[must_use]
    pub const fn new(config: BackendConfig) -> Self {
        Self::with_dialer(config, TcpDialer)
    }
}

impl<D: Dialer> ConnectionFactory<D> {
    /// Creates a factory using a custom dialer.
    #[must_use]
    pub const fn with_dialer(config: BackendConfig, dialer: D) -> Self {
        Self { config, dialer }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Connects, reads the greeting, announces the local name and upgrades
    /// with STARTTLS as configured.
    ///
    /// If any step after dialing fails, the connection is closed before the
    /// error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] without any I/O for LMTP with transport
    /// security, [`Error::Dial`] if the server cannot be reached and
    /// [`Error::Handshake`] if setup fails.
    pub async fn establish(&self) -> Result<Client<D::Stream>> {
        let config = &self.config;
        let timeouts = config.timeouts();
        let host = config.resolved_host();
        let tls = config.resolved_tls(&host);
        config.validate()?;

        let dialed = if config.protocol == Protocol::Smtp && config.security == Security::Tls {
            self.dialer
                .dial_tls(&config.address, &tls, timeouts.dial)
                .await
        } else {
            self.dialer.dial(&config.address, timeouts.dial).await
        };
        let stream = dialed.map_err(|source| {
            warn!(address = %config.address, error = %source, "Failed to connect upstream");
            Error::Dial {
                address: config.address.clone(),
                source,
            }
        })?;

        let mut client = Client::with_protocol(stream, config.protocol, host)
            .with_timeouts(timeouts.command, timeouts.submission);

        if let Err(e) = initialize(&mut client, config, &tls).await {
            warn!(address = %config.address, error = %e, "Upstream setup failed");
            close_quietly(client).await;
            return Err(e);
        }

        debug!(
            address = %config.address,
            protocol = ?config.protocol,
            tls = client.is_tls(),
            "Upstream connection ready"
        );
        Ok(client)
    }
}

async fn initialize<S: Transport>(
    client: &mut Client<S>,
    config: &BackendConfig,
    tls: &TlsParameters,
) -> Result<()> {
    client.greet().await.map_err(|source| Error::Handshake {
        stage: HandshakeStage::Greeting,
        source,
    })?;

    if let Some(name) = config.local_name.as_deref().filter(|name| !name.is_empty()) {
        client.hello(name).await.map_err(|source| Error::Handshake {
            stage: HandshakeStage::Hello,
            source,
        })?;
    }

    if config.security == Security::StartTls {
        client.starttls(tls).await.map_err(|source| Error::Handshake {
            stage: HandshakeStage::StartTls,
            source,
        })?;
    }

    Ok(())
}

/// Closes a connection that is being abandoned; close errors are only logged.
pub(crate) async fn close_quietly<S: Transport>(client: Client<S>) {
    if let Err(e) = client.close().await {
        debug!(error = %e, "Error closing upstream connection");
    }
}
