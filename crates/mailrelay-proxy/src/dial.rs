//! Opening upstream transports.

use std::time::Duration;

use mailrelay_smtp::connection::{connect, connect_tls};
use mailrelay_smtp::{SmtpStream, TlsParameters, Transport};

/// Opens transports to the upstream server.
///
/// [`TcpDialer`] is the production implementation; tests substitute scripted
/// streams.
pub trait Dialer: Send + Sync {
    /// Transport produced by this dialer.
    type Stream: Transport;

    /// Opens a plaintext connection within `timeout`.
    fn dial(
        &self,
        address: &str,
        timeout: Duration,
    ) -> impl Future<Output = mailrelay_smtp::Result<Self::Stream>> + Send;

    /// Opens a TLS connection; the handshake counts against `timeout`.
    fn dial_tls(
        &self,
        address: &str,
        tls: &TlsParameters,
        timeout: Duration,
    ) -> impl Future<Output = mailrelay_smtp::Result<Self::Stream>> + Send;
}

/// Dials upstream servers over TCP.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpDialer;

impl Dialer for TcpDialer {
    type Stream = SmtpStream;

    async fn dial(&self, address: &str, timeout: Duration) -> mailrelay_smtp::Result<SmtpStream> {
        connect(address, timeout).await
    }

    async fn dial_tls(
        &self,
        address: &str,
        tls: &TlsParameters,
        timeout: Duration,
    ) -> mailrelay_smtp::Result<SmtpStream> {
        connect_tls(address, tls, timeout).await
    }
}
