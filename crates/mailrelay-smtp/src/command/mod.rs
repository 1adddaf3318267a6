//! Outgoing SMTP/LMTP command lines.

use std::fmt;

use crate::error::{Error, Result};

/// A command sent to the upstream server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `HELO <name>`, fallback for servers without ESMTP
    Helo {
        /// Announced client name
        hostname: String,
    },
    /// `EHLO <name>`
    Ehlo {
        /// Announced client name
        hostname: String,
    },
    /// `LHLO <name>` (RFC 2033)
    Lhlo {
        /// Announced client name
        hostname: String,
    },
    /// `STARTTLS`
    StartTls,
    /// `AUTH <mechanism> [initial-response]`
    Auth {
        /// SASL mechanism name
        mechanism: String,
        /// Base64 initial response (SASL-IR); `=` stands for an empty one.
        initial_response: Option<String>,
    },
    /// Base64 answer to a 334 challenge
    AuthResponse(String),
    /// `*`, aborting an AUTH exchange
    AuthCancel,
    /// `MAIL FROM:<path> [params]`
    Mail {
        /// Reverse path, forwarded verbatim
        from: String,
        /// ESMTP parameters such as `BODY=8BITMIME`
        params: Vec<String>,
    },
    /// `RCPT TO:<path>`
    Rcpt {
        /// Forward path, forwarded verbatim
        to: String,
    },
    /// `DATA`
    Data,
    /// `RSET`
    Rset,
    /// `NOOP`
    Noop,
    /// `QUIT`
    Quit,
}

impl Command {
    /// Returns the full command line, CRLF included.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        format!("{self}\r\n").into_bytes()
    }

    /// Rejects commands whose arguments would break out of the command line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the line contains CR or LF.
    pub fn validate(&self) -> Result<()> {
        if self.to_string().contains(['\r', '\n']) {
            return Err(Error::InvalidArgument(format!(
                "{} line contains CR or LF",
                self.verb()
            )));
        }
        Ok(())
    }

    /// Returns the command verb, safe to log (no credentials).
    #[must_use]
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::Helo { .. } => "HELO",
            Self::Ehlo { .. } => "EHLO",
            Self::Lhlo { .. } => "LHLO",
            Self::StartTls => "STARTTLS",
            Self::Auth { .. } | Self::AuthResponse(_) | Self::AuthCancel => "AUTH",
            Self::Mail { .. } => "MAIL",
            Self::Rcpt { .. } => "RCPT",
            Self::Data => "DATA",
            Self::Rset => "RSET",
            Self::Noop => "NOOP",
            Self::Quit => "QUIT",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Helo { hostname } | Self::Ehlo { hostname } | Self::Lhlo { hostname } => {
                write!(f, "{} {hostname}", self.verb())
            }
            Self::Auth {
                mechanism,
                initial_response,
            } => {
                write!(f, "AUTH {mechanism}")?;
                match initial_response {
                    Some(response) => write!(f, " {response}"),
                    None => Ok(()),
                }
            }
            Self::AuthResponse(response) => f.write_str(response),
            Self::AuthCancel => f.write_str("*"),
            Self::Mail { from, params } => {
                write!(f, "MAIL FROM:<{from}>")?;
                params.iter().try_for_each(|param| write!(f, " {param}"))
            }
            Self::Rcpt { to } => write!(f, "RCPT TO:<{to}>"),
            Self::StartTls | Self::Data | Self::Rset | Self::Noop | Self::Quit => {
                f.write_str(self.verb())
            }
        }
    }
}
