//! Scripted upstream transports shared by the integration tests.

#![allow(dead_code, clippy::unwrap_used)]

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use mailrelay_proxy::{BackendConfig, Dialer, ProxyBackend};
use mailrelay_smtp::{TlsParameters, Transport};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio_test::io::{Builder, Mock};

pub const GREETING: &[u8] = b"220 mx.example.org ESMTP ready\r\n";
pub const EHLO: &[u8] = b"EHLO localhost\r\n";
pub const EHLO_REPLY: &[u8] =
    b"250-mx.example.org\r\n250-STARTTLS\r\n250-AUTH PLAIN\r\n250 ENHANCEDSTATUSCODES\r\n";
pub const EHLO_TLS_REPLY: &[u8] =
    b"250-mx.example.org\r\n250-AUTH PLAIN\r\n250 ENHANCEDSTATUSCODES\r\n";
pub const AUTH_ALICE: &[u8] = b"AUTH PLAIN AGFsaWNlAHNlY3JldA==\r\n";

/// What happened to the scripted connection.
#[derive(Default)]
pub struct Wire {
    pub dials: AtomicUsize,
    pub closes: AtomicUsize,
    pub sent: Mutex<Vec<u8>>,
    pub tls_names: Mutex<Vec<Option<String>>>,
}

impl Wire {
    pub fn dials(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> String {
        String::from_utf8_lossy(&self.sent.lock().unwrap()).into_owned()
    }
}

/// Mock transport that counts how often it is released.
///
/// Shutting it down or dropping it without a shutdown both count as one
/// close.
pub struct Scripted {
    mock: Mock,
    wire: Arc<Wire>,
    tls: bool,
    fail_handshake: bool,
    closed: bool,
}

impl Scripted {
    fn release(&mut self) {
        if !self.closed {
            self.closed = true;
            self.wire.closes.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl std::fmt::Debug for Scripted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scripted")
            .field("tls", &self.tls)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl Drop for Scripted {
    fn drop(&mut self) {
        self.release();
    }
}

impl Transport for Scripted {
    async fn start_tls(mut self, _tls: &TlsParameters) -> mailrelay_smtp::Result<Self> {
        if self.fail_handshake {
            return Err(mailrelay_smtp::Error::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                "certificate verify failed",
            )));
        }
        self.tls = true;
        Ok(self)
    }

    fn is_tls(&self) -> bool {
        self.tls
    }
}

impl AsyncRead for Scripted {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.mock).poll_read(cx, buf)
    }
}

impl AsyncWrite for Scripted {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let poll = Pin::new(&mut self.mock).poll_write(cx, buf);
        if let Poll::Ready(Ok(n)) = poll {
            self.wire.sent.lock().unwrap().extend_from_slice(&buf[..n]);
        }
        poll
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.mock).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let poll = Pin::new(&mut self.mock).poll_shutdown(cx);
        if poll.is_ready() {
            self.release();
        }
        poll
    }
}

/// Dialer handing out a single scripted connection, then refusing.
pub struct ScriptedDialer {
    stream: Mutex<Option<Scripted>>,
    wire: Arc<Wire>,
}

impl ScriptedDialer {
    pub fn new(builder: &mut Builder) -> Self {
        let wire = Arc::new(Wire::default());
        let stream = Scripted {
            mock: builder.build(),
            wire: Arc::clone(&wire),
            tls: false,
            fail_handshake: false,
            closed: false,
        };
        Self {
            stream: Mutex::new(Some(stream)),
            wire,
        }
    }

    /// A dialer whose every attempt is refused.
    pub fn refusing() -> Self {
        Self {
            stream: Mutex::new(None),
            wire: Arc::new(Wire::default()),
        }
    }

    /// Makes the STARTTLS handshake fail.
    pub fn failing_handshake(self) -> Self {
        if let Some(stream) = self.stream.lock().unwrap().as_mut() {
            stream.fail_handshake = true;
        }
        self
    }

    pub fn wire(&self) -> Arc<Wire> {
        Arc::clone(&self.wire)
    }

    fn take(&self) -> mailrelay_smtp::Result<Scripted> {
        self.wire.dials.fetch_add(1, Ordering::SeqCst);
        self.stream.lock().unwrap().take().ok_or_else(|| {
            mailrelay_smtp::Error::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            ))
        })
    }
}

impl Dialer for ScriptedDialer {
    type Stream = Scripted;

    async fn dial(&self, _address: &str, _timeout: Duration) -> mailrelay_smtp::Result<Scripted> {
        self.take()
    }

    async fn dial_tls(
        &self,
        _address: &str,
        tls: &TlsParameters,
        _timeout: Duration,
    ) -> mailrelay_smtp::Result<Scripted> {
        self.wire.tls_names.lock().unwrap().push(tls.server_name.clone());
        let mut stream = self.take()?;
        stream.tls = true;
        Ok(stream)
    }
}

/// Builds a backend over `dialer` and returns its wire.
pub fn proxy(config: BackendConfig, dialer: ScriptedDialer) -> (ProxyBackend<ScriptedDialer>, Arc<Wire>) {
    let wire = dialer.wire();
    (ProxyBackend::with_dialer(config, dialer), wire)
}

/// Reader yielding `data` in one chunk, then failing.
pub struct FailingReader {
    data: Option<Vec<u8>>,
}

impl FailingReader {
    pub fn new(data: &[u8]) -> Self {
        Self {
            data: Some(data.to_vec()),
        }
    }
}

impl AsyncRead for FailingReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.data.take() {
            Some(data) => {
                buf.put_slice(&data);
                Poll::Ready(Ok(()))
            }
            None => Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "inbound connection reset",
            ))),
        }
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
