//! Login routines producing relayed sessions.

use mailrelay_smtp::sasl::Plain;
use tracing::{info, warn};

use crate::config::BackendConfig;
use crate::dial::{Dialer, TcpDialer};
use crate::error::{Error, Result};
use crate::factory::{ConnectionFactory, close_quietly};
use crate::session::{ProxySession, Session};

/// Entry point the inbound server uses to open sessions.
pub trait Backend: Send + Sync {
    /// Session type handed out on login.
    type Session: Session;

    /// Opens a session authenticated upstream with `username` and `password`.
    fn login(
        &self,
        username: &str,
        password: &str,
    ) -> impl Future<Output = Result<Self::Session>> + Send;

    /// Opens a session without authenticating upstream.
    fn anonymous_login(&self) -> impl Future<Output = Result<Self::Session>> + Send;
}

/// Backend relaying every session to one upstream server.
#[derive(Debug, Clone)]
pub struct ProxyBackend<D = TcpDialer> {
    factory: ConnectionFactory<D>,
}

impl ProxyBackend {
    /// Creates a backend dialing the configured server over TCP.
    #[must_use]
    pub const fn new(config: BackendConfig) -> Self {
        Self {
            factory: ConnectionFactory::new(config),
        }
    }
}

impl<D: Dialer> ProxyBackend<D> {
    /// Creates a backend using a custom dialer.
    #[must_use]
    pub const fn with_dialer(config: BackendConfig, dialer: D) -> Self {
        Self {
            factory: ConnectionFactory::with_dialer(config, dialer),
        }
    }
}

impl<D: Dialer> Backend for ProxyBackend<D> {
    type Session = ProxySession<D::Stream>;

    async fn login(&self, username: &str, password: &str) -> Result<Self::Session> {
        let mut client = self.factory.establish().await?;

        // Credentials go upstream untouched; the server decides.
        let mut mechanism = Plain::new(username, password);
        if let Err(e) = client.authenticate(&mut mechanism).await {
            warn!(
                address = %self.factory.config().address,
                username,
                error = %e,
                "Upstream authentication failed"
            );
            close_quietly(client).await;
            return Err(Error::Auth(e));
        }

        info!(address = %self.factory.config().address, username, "Upstream session opened");
        Ok(ProxySession::new(client))
    }

    async fn anonymous_login(&self) -> Result<Self::Session> {
        let client = self.factory.establish().await?;
        info!(address = %self.factory.config().address, "Anonymous upstream session opened");
        Ok(ProxySession::new(client))
    }
}
