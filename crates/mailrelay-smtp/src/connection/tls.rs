//! TLS parameters for implicit TLS and STARTTLS.

use std::sync::Arc;

use rustls::pki_types::ServerName;
use serde::{Deserialize, Serialize};
use tokio_rustls::TlsConnector;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};

use crate::error::{Error, Result};

/// TLS settings used when connecting to an upstream server.
///
/// When no client configuration is given, the Mozilla root store from
/// `webpki-roots` is trusted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TlsParameters {
    /// Name sent via SNI and checked against the server certificate.
    #[serde(default)]
    pub server_name: Option<String>,
    /// Custom rustls configuration (client certificates, private roots).
    #[serde(skip)]
    pub client_config: Option<Arc<ClientConfig>>,
}

impl TlsParameters {
    /// Creates empty parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the server name.
    #[must_use]
    pub fn with_server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    /// Sets a custom rustls client configuration.
    #[must_use]
    pub fn with_client_config(mut self, config: Arc<ClientConfig>) -> Self {
        self.client_config = Some(config);
        self
    }

    /// Returns a copy whose server name falls back to `host` when unset.
    #[must_use]
    pub fn resolve(&self, host: &str) -> Self {
        let mut resolved = self.clone();
        if resolved.server_name.as_deref().is_none_or(str::is_empty) {
            resolved.server_name = Some(host.to_string());
        }
        resolved
    }

    /// Returns the server name to verify against.
    ///
    /// # Errors
    ///
    /// Returns an error if no name is set or it is not a valid DNS name or IP address.
    pub fn server_name(&self) -> Result<ServerName<'static>> {
        let name = self
            .server_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| Error::Protocol("TLS server name not set".into()))?;

        ServerName::try_from(name.to_string())
            .map_err(|_| Error::Protocol(format!("Invalid hostname: {name}")))
    }

    /// Builds a connector from these parameters.
    #[must_use]
    pub fn connector(&self) -> TlsConnector {
        match &self.client_config {
            Some(config) => TlsConnector::from(Arc::clone(config)),
            None => create_tls_connector(),
        }
    }
}

/// Creates a TLS connector with the bundled root certificates.
fn create_tls_connector() -> TlsConnector {
    let root_store = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}
