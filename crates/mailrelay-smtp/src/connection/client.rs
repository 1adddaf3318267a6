//! SMTP/LMTP client over any [`Transport`].

use std::fmt;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};

use super::data::DotStuffer;
use super::{Deadline, Protocol, ServerInfo, TlsParameters, Transport};
use crate::command::Command;
use crate::error::{Error, Result};
use crate::parser::{is_last_reply_line, parse_reply};
use crate::sasl::Mechanism;
use crate::types::{
    AuthMechanism, BodyType, Extension, MailOptions, Reply, ReplyCode, Status, encode_xtext,
};

/// Default timeout for a single command and its reply (RFC 5321 section 4.5.3.2).
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Default timeout for the DATA phase: the 10 minute RFC recommendation plus
/// 2 minutes for store-and-forward intermediaries.
pub const DEFAULT_SUBMISSION_TIMEOUT: Duration = Duration::from_secs(12 * 60);

/// Maximum accepted reply line length, including CRLF.
const MAX_LINE_LENGTH: u64 = 4096;

/// Name announced when [`Client::hello`] was never called.
const DEFAULT_LOCAL_NAME: &str = "localhost";

/// SMTP or LMTP client bound to one upstream connection.
///
/// The client does not enforce command ordering; the server is the judge of
/// what is valid. A greeting (`EHLO`/`LHLO`) is sent lazily before the first
/// command that needs one unless [`Client::hello`] was called explicitly.
pub struct Client<S> {
    stream: Option<BufReader<S>>,
    protocol: Protocol,
    server_name: String,
    local_name: String,
    server_info: ServerInfo,
    did_hello: bool,
    recipients: Vec<String>,
    command_timeout: Duration,
    submission_timeout: Duration,
}

impl<S> fmt::Debug for Client<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("protocol", &self.protocol)
            .field("server_name", &self.server_name)
            .field("local_name", &self.local_name)
            .field("server_info", &self.server_info)
            .field("did_hello", &self.did_hello)
            .field("open", &self.stream.is_some())
            .finish_non_exhaustive()
    }
}

impl<S: Transport> Client<S> {
    /// Wraps an SMTP transport. No I/O happens until [`Client::greet`].
    ///
    /// `server_name` identifies the upstream server; it is the default TLS
    /// server name for [`Client::starttls`].
    #[must_use]
    pub fn new(stream: S, server_name: impl Into<String>) -> Self {
        Self::with_protocol(stream, Protocol::Smtp, server_name)
    }

    /// Wraps an LMTP transport (RFC 2033).
    #[must_use]
    pub fn new_lmtp(stream: S, server_name: impl Into<String>) -> Self {
        Self::with_protocol(stream, Protocol::Lmtp, server_name)
    }

    /// Wraps a transport speaking the given protocol.
    #[must_use]
    pub fn with_protocol(stream: S, protocol: Protocol, server_name: impl Into<String>) -> Self {
        Self {
            stream: Some(BufReader::new(stream)),
            protocol,
            server_name: server_name.into(),
            local_name: DEFAULT_LOCAL_NAME.to_string(),
            server_info: ServerInfo::default(),
            did_hello: false,
            recipients: Vec::new(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            submission_timeout: DEFAULT_SUBMISSION_TIMEOUT,
        }
    }

    /// Sets the command and submission timeouts.
    #[must_use]
    pub const fn with_timeouts(mut self, command: Duration, submission: Duration) -> Self {
        self.command_timeout = command;
        self.submission_timeout = submission;
        self
    }

    /// Returns the protocol spoken on this connection.
    #[must_use]
    pub const fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Returns the server information gathered so far.
    #[must_use]
    pub const fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Returns the command timeout.
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        self.command_timeout
    }

    /// Returns the submission (DATA) timeout.
    #[must_use]
    pub const fn submission_timeout(&self) -> Duration {
        self.submission_timeout
    }

    /// Returns true if the transport is TLS-encrypted.
    #[must_use]
    pub fn is_tls(&self) -> bool {
        self.stream
            .as_ref()
            .is_some_and(|reader| reader.get_ref().is_tls())
    }

    /// Reads the server greeting (220).
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails or the server refuses the session.
    pub async fn greet(&mut self) -> Result<()> {
        let greeting = self
            .read_reply(Deadline::after(self.command_timeout))
            .await?
            .expect_code(ReplyCode::SERVICE_READY)?;

        // Extract hostname from greeting (first word after code)
        self.server_info.hostname = greeting
            .message
            .first()
            .and_then(|msg| msg.split_whitespace().next())
            .unwrap_or("unknown")
            .to_string();

        tracing::debug!(server = %self.server_info.hostname, "Received greeting");
        Ok(())
    }

    /// Announces `local_name` with EHLO (falling back to HELO) or LHLO and
    /// records the advertised extensions. The name is reused when greeting
    /// again after STARTTLS.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `local_name` contains CR or LF,
    /// or an error if the server rejects the greeting.
    pub async fn hello(&mut self, local_name: &str) -> Result<()> {
        let cmd = match self.protocol {
            Protocol::Smtp => Command::Ehlo {
                hostname: local_name.to_string(),
            },
            Protocol::Lmtp => Command::Lhlo {
                hostname: local_name.to_string(),
            },
        };
        cmd.validate()?;
        local_name.clone_into(&mut self.local_name);

        let reply = self.command(cmd).await?;
        if reply.is_success() {
            // Parse extensions from EHLO response (skip first line which is greeting)
            self.server_info.extensions = reply
                .message
                .iter()
                .skip(1)
                .map(|line| Extension::parse(line))
                .collect();
        } else if self.protocol == Protocol::Smtp && reply.is_permanent_error() {
            tracing::debug!(code = %reply.code, "EHLO rejected, falling back to HELO");
            self.command(Command::Helo {
                hostname: local_name.to_string(),
            })
            .await?
            .into_result()?;
            self.server_info.extensions.clear();
        } else {
            return Err(Error::Smtp(reply.to_status()));
        }

        self.did_hello = true;
        Ok(())
    }

    async fn ensure_hello(&mut self) -> Result<()> {
        if self.did_hello {
            return Ok(());
        }
        let local_name = self.local_name.clone();
        self.hello(&local_name).await
    }

    /// Upgrades the connection to TLS using STARTTLS, then greets again.
    ///
    /// Parameters without a server name verify against the name given at
    /// construction.
    ///
    /// # Errors
    ///
    /// Returns an error if STARTTLS is not advertised, the server refuses it,
    /// or the handshake fails. After a failed handshake the transport is gone
    /// and every further operation fails.
    pub async fn starttls(&mut self, tls: &TlsParameters) -> Result<()> {
        self.ensure_hello().await?;
        if !self.server_info.supports_starttls() {
            return Err(Error::NotSupported("STARTTLS".into()));
        }

        self.command(Command::StartTls)
            .await?
            .expect_code(ReplyCode::SERVICE_READY)?;

        let reader = self
            .stream
            .take()
            .ok_or_else(|| Error::InvalidState("connection closed".into()))?;
        // Anything buffered now was sent in plaintext after the 220 and must not
        // be treated as coming from the TLS session.
        if !reader.buffer().is_empty() {
            return Err(Error::Protocol(
                "unexpected data received before TLS handshake".into(),
            ));
        }

        let params = tls.resolve(&self.server_name);
        let stream = reader.into_inner().start_tls(&params).await?;
        self.stream = Some(BufReader::new(stream));
        tracing::debug!(server_name = ?params.server_name, "STARTTLS handshake complete");

        self.did_hello = false;
        self.server_info.extensions.clear();
        self.ensure_hello().await
    }

    /// Runs an AUTH exchange with the given SASL mechanism.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSupported`] without sending anything if the server
    /// does not offer AUTH or the mechanism. Returns the server status if
    /// authentication is rejected, or the mechanism error if it cannot answer
    /// a challenge (the exchange is cancelled with `*` first).
    pub async fn authenticate<M: Mechanism + Send>(&mut self, mechanism: &mut M) -> Result<()> {
        self.ensure_hello().await?;
        if !self.server_info.supports_auth() {
            return Err(Error::NotSupported("AUTH".into()));
        }
        let offered = AuthMechanism::parse(mechanism.name());
        if !self.server_info.auth_mechanisms().contains(&offered) {
            return Err(Error::NotSupported(format!("AUTH {}", offered.name())));
        }

        let initial_response = mechanism.initial_response()?.map(|resp| {
            if resp.is_empty() {
                "=".to_string()
            } else {
                STANDARD.encode(resp)
            }
        });

        let mut reply = self
            .command(Command::Auth {
                mechanism: mechanism.name().to_string(),
                initial_response,
            })
            .await?;

        loop {
            if reply.code == ReplyCode::AUTH_SUCCEEDED {
                tracing::debug!(mechanism = mechanism.name(), "Authenticated");
                return Ok(());
            }
            if reply.code != ReplyCode::AUTH_CONTINUE {
                return Err(Error::Smtp(reply.to_status()));
            }

            let answer = STANDARD
                .decode(reply.message_text().trim())
                .map_err(|e| Error::Protocol(format!("malformed AUTH challenge: {e}")))
                .and_then(|challenge| mechanism.respond(&challenge));

            match answer {
                Ok(resp) => {
                    reply = self
                        .command(Command::AuthResponse(STANDARD.encode(resp)))
                        .await?;
                }
                Err(e) => {
                    // The server answers the cancellation with 501; only the
                    // mechanism error is interesting.
                    let _ = self.command(Command::AuthCancel).await;
                    return Err(e);
                }
            }
        }
    }

    /// Sends MAIL FROM with the reverse path forwarded verbatim.
    ///
    /// BODY, SIZE and AUTH parameters are only sent when the server advertises
    /// the matching extension; REQUIRETLS and SMTPUTF8 fail instead.
    ///
    /// # Errors
    ///
    /// Returns an error if a required extension is missing or the server
    /// rejects the sender.
    pub async fn mail(&mut self, from: &str, options: &MailOptions) -> Result<()> {
        self.ensure_hello().await?;
        let params = self.mail_params(options)?;

        self.command(Command::Mail {
            from: from.to_string(),
            params,
        })
        .await?
        .into_result()?;

        self.recipients.clear();
        Ok(())
    }

    fn mail_params(&self, options: &MailOptions) -> Result<Vec<String>> {
        let info = &self.server_info;
        let mut params = Vec::new();

        if let Some(body) = options.body {
            let advertised = match body {
                BodyType::SevenBit | BodyType::EightBitMime => {
                    info.supports(&Extension::EightBitMime)
                }
                BodyType::BinaryMime => info.supports(&Extension::BinaryMime),
            };
            if advertised {
                params.push(format!("BODY={}", body.as_str()));
            }
        }
        if let Some(size) = options.size {
            if info.supports_size() {
                params.push(format!("SIZE={size}"));
            }
        }
        if options.require_tls {
            if !info.supports(&Extension::RequireTls) {
                return Err(Error::NotSupported("REQUIRETLS".into()));
            }
            params.push("REQUIRETLS".to_string());
        }
        if options.utf8 {
            if !info.supports(&Extension::SmtpUtf8) {
                return Err(Error::NotSupported("SMTPUTF8".into()));
            }
            params.push("SMTPUTF8".to_string());
        }
        if let Some(auth) = &options.auth {
            if info.supports_auth() {
                params.push(format!("AUTH={}", encode_xtext(auth)));
            }
        }

        Ok(params)
    }

    /// Sends RCPT TO with the forward path forwarded verbatim.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the recipient.
    pub async fn rcpt(&mut self, to: &str) -> Result<()> {
        self.ensure_hello().await?;
        self.command(Command::Rcpt { to: to.to_string() })
            .await?
            .into_result()?;

        self.recipients.push(to.to_string());
        Ok(())
    }

    /// Sends DATA and returns a writer for the message body.
    ///
    /// The submission timeout starts once the server answers 354 and bounds
    /// the whole body transfer, up to and including the final reply.
    ///
    /// The writer must be closed with [`DataWriter::close`]; dropping it
    /// leaves the connection in the middle of the DATA phase.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not answer 354.
    pub async fn data(&mut self) -> Result<DataWriter<'_, S>> {
        self.ensure_hello().await?;
        self.command(Command::Data)
            .await?
            .expect_code(ReplyCode::START_DATA)?;

        let deadline = Deadline::after(self.submission_timeout);
        Ok(DataWriter {
            client: self,
            stuffer: DotStuffer::new(),
            buf: Vec::new(),
            deadline,
        })
    }

    /// Sends RSET and forgets the accepted recipients.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the reset.
    pub async fn reset(&mut self) -> Result<()> {
        self.ensure_hello().await?;
        self.recipients.clear();
        self.command(Command::Rset).await?.into_result()?;
        Ok(())
    }

    /// Sends NOOP.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not answer 250.
    pub async fn noop(&mut self) -> Result<()> {
        self.ensure_hello().await?;
        self.command(Command::Noop).await?.into_result()?;
        Ok(())
    }

    /// Sends QUIT and closes the connection.
    ///
    /// The transport is shut down even if QUIT fails.
    ///
    /// # Errors
    ///
    /// Returns the QUIT error first, then any shutdown error.
    pub async fn quit(mut self) -> Result<()> {
        let quit = match self.command(Command::Quit).await {
            Ok(reply) => reply.expect_code(ReplyCode::CLOSING).map(|_| ()),
            Err(e) => Err(e),
        };
        let closed = self.shutdown().await;
        quit?;
        closed
    }

    /// Closes the connection without QUIT.
    ///
    /// # Errors
    ///
    /// Returns an error if shutting down the transport fails.
    pub async fn close(mut self) -> Result<()> {
        self.shutdown().await
    }

    async fn shutdown(&mut self) -> Result<()> {
        if let Some(mut reader) = self.stream.take() {
            reader.get_mut().shutdown().await?;
        }
        Ok(())
    }

    fn stream(&mut self) -> Result<&mut BufReader<S>> {
        self.stream
            .as_mut()
            .ok_or_else(|| Error::InvalidState("connection closed".into()))
    }

    async fn command(&mut self, cmd: Command) -> Result<Reply> {
        cmd.validate()?;
        tracing::trace!(verb = cmd.verb(), "Sending command");
        let data = cmd.serialize();
        let deadline = Deadline::after(self.command_timeout);
        self.write_all(&data, deadline).await?;
        let reply = self.read_reply(deadline).await?;
        tracing::trace!(verb = cmd.verb(), code = %reply.code, "Received reply");
        Ok(reply)
    }

    async fn write_all(&mut self, data: &[u8], deadline: Deadline) -> Result<()> {
        let stream = self.stream()?;
        deadline
            .run(async {
                let writer = stream.get_mut();
                writer.write_all(data).await?;
                writer.flush().await?;
                Ok(())
            })
            .await
    }

    async fn read_reply(&mut self, deadline: Deadline) -> Result<Reply> {
        let stream = self.stream()?;
        let lines = deadline.run(async {
            let mut lines = Vec::new();
            let mut raw = Vec::new();
            loop {
                raw.clear();
                let n = (&mut *stream)
                    .take(MAX_LINE_LENGTH)
                    .read_until(b'\n', &mut raw)
                    .await?;
                if n == 0 {
                    return Err(Error::ConnectionClosed);
                }
                if raw.last() != Some(&b'\n') && n as u64 >= MAX_LINE_LENGTH {
                    return Err(Error::Protocol("reply line too long".into()));
                }

                // Reply text may use any 8-bit charset.
                let line = String::from_utf8_lossy(&raw).trim_end().to_string();
                if line.is_empty() {
                    continue;
                }

                let is_last = is_last_reply_line(&line);
                lines.push(line);

                if is_last {
                    return Ok(lines);
                }
            }
        })
        .await?;

        parse_reply(&lines)
    }
}

/// Writer for the message body of a DATA command.
///
/// Bytes are dot-stuffed and line endings normalized on the way out. The
/// writes and the final reply share one deadline, set when DATA was accepted.
pub struct DataWriter<'a, S> {
    client: &'a mut Client<S>,
    stuffer: DotStuffer,
    buf: Vec<u8>,
    deadline: Deadline,
}

impl<S> fmt::Debug for DataWriter<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataWriter")
            .field("stuffer", &self.stuffer)
            .finish_non_exhaustive()
    }
}

impl<S: Transport> DataWriter<'_, S> {
    /// Returns the instant at which the DATA phase times out.
    ///
    /// Callers producing the body can bound their own reads with it.
    #[must_use]
    pub const fn deadline(&self) -> tokio::time::Instant {
        self.deadline.at()
    }

    /// Writes a chunk of the message.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails or the DATA deadline has passed.
    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.buf.clear();
        self.stuffer.encode(data, &mut self.buf);
        self.client.write_all(&self.buf, self.deadline).await
    }

    /// Terminates the message and reads the final status.
    ///
    /// `on_status` is called with each final status: once for SMTP (recipient
    /// `None`), and once per accepted recipient for LMTP. For SMTP a non-2xx
    /// status is also returned as the error; for LMTP per-recipient failures
    /// are only reported through `on_status`.
    ///
    /// # Errors
    ///
    /// Returns an error if writing the terminator or reading a reply fails, or
    /// if an SMTP server rejects the message.
    pub async fn close<F>(mut self, mut on_status: F) -> Result<()>
    where
        F: FnMut(Option<&str>, &Status) + Send,
    {
        self.buf.clear();
        self.stuffer.finish(&mut self.buf);
        let deadline = self.deadline;
        self.client.write_all(&self.buf, deadline).await?;

        let recipients = std::mem::take(&mut self.client.recipients);
        if self.client.protocol == Protocol::Lmtp && !recipients.is_empty() {
            for rcpt in &recipients {
                let status = self.client.read_reply(deadline).await?.to_status();
                tracing::debug!(rcpt = rcpt.as_str(), code = %status.code, "LMTP delivery status");
                on_status(Some(rcpt.as_str()), &status);
            }
            return Ok(());
        }

        let status = self.client.read_reply(deadline).await?.to_status();
        tracing::debug!(code = %status.code, "DATA status");
        on_status(None, &status);
        if status.is_success() {
            Ok(())
        } else {
            Err(Error::Smtp(status))
        }
    }
}
