//! Per-connection session relaying inbound commands upstream.

use std::io;

use mailrelay_smtp::{Client, MailOptions, ServerInfo, Status, Transport};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use crate::error::{Error, Result};

/// Size of the chunks copied from the inbound message to the upstream writer.
const COPY_BUFFER_SIZE: usize = 32 * 1024;

/// Operations an inbound SMTP/LMTP server drives on a session.
///
/// The inbound server owns command ordering; implementations forward
/// whatever they are given.
pub trait Session: Send {
    /// Aborts the current transaction. Failures are ignored.
    fn reset(&mut self) -> impl Future<Output = ()> + Send;

    /// Forwards NOOP.
    fn noop(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Forwards MAIL FROM.
    fn mail(&mut self, from: &str, options: &MailOptions)
    -> impl Future<Output = Result<()>> + Send;

    /// Forwards RCPT TO.
    fn rcpt(&mut self, to: &str) -> impl Future<Output = Result<()>> + Send;

    /// Streams a message body from `reader` through DATA.
    fn data<R>(&mut self, reader: R) -> impl Future<Output = Result<()>> + Send
    where
        R: AsyncRead + Unpin + Send;

    /// Ends the session with QUIT. The connection is closed in any case.
    fn logout(self) -> impl Future<Output = Result<()>> + Send;

    /// Returns the final status of the last completed DATA transfer.
    fn status(&self) -> Option<&Status>;
}

/// Single-slot holder for the last DATA status.
#[derive(Debug, Clone, Default)]
pub struct StatusLatch(Option<Status>);

impl StatusLatch {
    /// Creates an empty latch.
    #[must_use]
    pub const fn new() -> Self {
        Self(None)
    }

    /// Stores `status`, replacing any previous one.
    pub fn record(&mut self, status: Status) {
        self.0 = Some(status);
    }

    /// Returns the stored status.
    #[must_use]
    pub const fn get(&self) -> Option<&Status> {
        self.0.as_ref()
    }

    /// Empties the latch.
    pub fn clear(&mut self) {
        self.0 = None;
    }
}

/// Session bound to one upstream connection.
#[derive(Debug)]
pub struct ProxySession<S> {
    client: Client<S>,
    last_status: StatusLatch,
}

impl<S: Transport> ProxySession<S> {
    /// Wraps an established upstream connection.
    #[must_use]
    pub const fn new(client: Client<S>) -> Self {
        Self {
            client,
            last_status: StatusLatch::new(),
        }
    }

    /// Returns the upstream connection.
    #[must_use]
    pub const fn upstream(&self) -> &Client<S> {
        &self.client
    }

    /// Returns what the upstream server advertised.
    #[must_use]
    pub const fn server_info(&self) -> &ServerInfo {
        self.client.server_info()
    }
}

impl<S: Transport> Session for ProxySession<S> {
    async fn reset(&mut self) {
        if let Err(e) = self.client.reset().await {
            debug!(error = %e, "Upstream RSET failed, ignoring");
        }
    }

    async fn noop(&mut self) -> Result<()> {
        Ok(self.client.noop().await?)
    }

    async fn mail(&mut self, from: &str, options: &MailOptions) -> Result<()> {
        Ok(self.client.mail(from, options).await?)
    }

    async fn rcpt(&mut self, to: &str) -> Result<()> {
        Ok(self.client.rcpt(to).await?)
    }

    async fn data<R>(&mut self, mut reader: R) -> Result<()>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.last_status.clear();
        let limit = self.client.submission_timeout();
        let mut writer = self.client.data().await?;
        // A slow inbound body counts against the same deadline as the upstream writes.
        let deadline = writer.deadline();

        let mut buf = vec![0u8; COPY_BUFFER_SIZE];
        let copied = loop {
            let Ok(read) = tokio::time::timeout_at(deadline, reader.read(&mut buf)).await else {
                break Err(Error::Upstream(mailrelay_smtp::Error::Timeout(limit)));
            };
            match read {
                Ok(0) => break Ok(()),
                Ok(n) => {
                    if let Err(e) = writer.write(&buf[..n]).await {
                        break Err(Error::Upstream(e));
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => break Err(Error::Transfer(e)),
            }
        };

        if let Err(e) = copied {
            debug!(error = %e, "Message transfer aborted");
            if let Err(close_err) = writer.close(|_, _| {}).await {
                debug!(error = %close_err, "Error terminating aborted DATA");
            }
            return Err(e);
        }

        let latch = &mut self.last_status;
        writer
            .close(|_, status| latch.record(status.clone()))
            .await?;
        Ok(())
    }

    async fn logout(self) -> Result<()> {
        Ok(self.client.quit().await?)
    }

    fn status(&self) -> Option<&Status> {
        self.last_status.get()
    }
}
