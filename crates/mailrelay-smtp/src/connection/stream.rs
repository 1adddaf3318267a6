//! Upstream transport: plain TCP or rustls TLS.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

use super::{TlsParameters, Transport, with_timeout};
use crate::error::{Error, Result};

/// SMTP stream (TCP or TLS).
#[derive(Debug)]
pub enum SmtpStream {
    /// Plain TCP connection.
    Tcp(TcpStream),
    /// TLS-encrypted connection (boxed to reduce enum size).
    Tls(Box<TlsStream<TcpStream>>),
}

impl Transport for SmtpStream {
    async fn start_tls(self, tls: &TlsParameters) -> Result<Self> {
        let tcp = match self {
            Self::Tcp(tcp) => tcp,
            Self::Tls(_) => return Err(Error::InvalidState("Already using TLS".into())),
        };

        let server_name = tls.server_name()?;
        let stream = tls.connector().connect(server_name, tcp).await?;
        Ok(Self::Tls(Box::new(stream)))
    }

    fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

impl AsyncRead for SmtpStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for SmtpStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// Connects to `addr` (`host:port`) over plain TCP.
///
/// # Errors
///
/// Returns an error if the connection fails or does not complete within `timeout`.
pub async fn connect(addr: &str, timeout: Duration) -> Result<SmtpStream> {
    let stream = with_timeout(timeout, async { Ok(TcpStream::connect(addr).await?) }).await?;
    tracing::debug!(addr, "TCP connection established");
    Ok(SmtpStream::Tcp(stream))
}

/// Connects to `addr` with TLS from the start (implicit TLS, port 465).
///
/// The TCP connect and the TLS handshake share the same `timeout`.
///
/// # Errors
///
/// Returns an error if the connection or TLS handshake fails or times out.
pub async fn connect_tls(addr: &str, tls: &TlsParameters, timeout: Duration) -> Result<SmtpStream> {
    let server_name = tls.server_name()?;
    let connector = tls.connector();

    let stream = with_timeout(timeout, async {
        let tcp = TcpStream::connect(addr).await?;
        Ok(connector.connect(server_name, tcp).await?)
    })
    .await?;

    tracing::debug!(addr, "TLS connection established");
    Ok(SmtpStream::Tls(Box::new(stream)))
}
