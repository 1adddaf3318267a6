//! SMTP reply types.

use crate::error::{Error, Result};

/// SMTP reply from server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Reply code (e.g., 250).
    pub code: ReplyCode,
    /// Reply message lines.
    pub message: Vec<String>,
}

impl Reply {
    /// Creates a new reply.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Vec is not const-compatible
    pub fn new(code: ReplyCode, message: Vec<String>) -> Self {
        Self { code, message }
    }

    /// Returns true if this is a success reply (2xx).
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code.is_success()
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient_error(&self) -> bool {
        self.code.is_transient()
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent_error(&self) -> bool {
        self.code.is_permanent()
    }

    /// Returns the full message as a single string.
    #[must_use]
    pub fn message_text(&self) -> String {
        self.message.join("\n")
    }

    /// Converts the reply into a structured status.
    ///
    /// The enhanced status code is taken from the first line when its class
    /// matches the reply code, and stripped from every line that repeats it.
    #[must_use]
    pub fn to_status(&self) -> Status {
        let enhanced = self
            .message
            .first()
            .and_then(|line| EnhancedCode::split(line))
            .map(|(code, _)| code)
            .filter(|code| u16::from(code.class) == self.code.as_u16() / 100);

        let message = match enhanced {
            Some(code) => self
                .message
                .iter()
                .map(|line| match EnhancedCode::split(line) {
                    Some((c, rest)) if c == code => rest,
                    _ => line.as_str(),
                })
                .collect::<Vec<_>>()
                .join("\n"),
            None => self.message_text(),
        };

        Status {
            code: self.code,
            enhanced,
            message,
        }
    }

    /// Returns `Ok(self)` for a success reply, or the status as an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Smtp`] if the reply code is not 2xx.
    pub fn into_result(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Error::Smtp(self.to_status()))
        }
    }

    /// Returns `Ok(self)` if the reply carries the expected code.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Smtp`] for any other code.
    pub fn expect_code(self, expected: ReplyCode) -> Result<Self> {
        if self.code == expected {
            Ok(self)
        } else {
            Err(Error::Smtp(self.to_status()))
        }
    }
}

/// Enhanced mail system status code (RFC 3463), e.g. `5.1.1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnhancedCode {
    /// Class: 2 (success), 4 (persistent transient) or 5 (permanent).
    pub class: u8,
    /// Subject.
    pub subject: u16,
    /// Detail.
    pub detail: u16,
}

impl EnhancedCode {
    /// Creates a new enhanced status code.
    #[must_use]
    pub const fn new(class: u8, subject: u16, detail: u16) -> Self {
        Self {
            class,
            subject,
            detail,
        }
    }

    /// Parses a standalone enhanced status code.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.split('.');
        let class = parts.next()?;
        let subject = parts.next()?;
        let detail = parts.next()?;
        if parts.next().is_some() {
            return None;
        }

        let class: u8 = parse_digits(class, 1)?;
        if !matches!(class, 2 | 4 | 5) {
            return None;
        }

        Some(Self {
            class,
            subject: parse_digits(subject, 3)?,
            detail: parse_digits(detail, 3)?,
        })
    }

    /// Splits a leading enhanced status code off a reply line.
    #[must_use]
    pub fn split(line: &str) -> Option<(Self, &str)> {
        let (head, rest) = line.split_once(' ').unwrap_or((line, ""));
        Self::parse(head).map(|code| (code, rest))
    }
}

fn parse_digits<T: std::str::FromStr>(s: &str, max_len: usize) -> Option<T> {
    if s.is_empty() || s.len() > max_len || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

impl std::fmt::Display for EnhancedCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.class, self.subject, self.detail)
    }
}

/// Structured status: reply code, optional enhanced code and text.
///
/// This is the error payload of every rejected command and the value
/// reported for a completed DATA transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    /// Reply code.
    pub code: ReplyCode,
    /// Enhanced status code, if the server sent one.
    pub enhanced: Option<EnhancedCode>,
    /// Human-readable text.
    pub message: String,
}

impl Status {
    /// Creates a new status.
    #[must_use]
    pub fn new(code: ReplyCode, enhanced: Option<EnhancedCode>, message: impl Into<String>) -> Self {
        Self {
            code,
            enhanced,
            message: message.into(),
        }
    }

    /// Returns true if the status reports success (2xx).
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code.is_success()
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.enhanced {
            Some(enhanced) => write!(f, "{} {enhanced} {}", self.code, self.message),
            None => write!(f, "{} {}", self.code, self.message),
        }
    }
}

impl std::error::Error for Status {}

/// Three-digit reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// 220 Service ready
    pub const SERVICE_READY: Self = Self(220);
    /// 221 Closing connection
    pub const CLOSING: Self = Self(221);
    /// 235 Authentication succeeded
    pub const AUTH_SUCCEEDED: Self = Self(235);
    /// 250 Ok
    pub const OK: Self = Self(250);
    /// 334 Authentication challenge
    pub const AUTH_CONTINUE: Self = Self(334);
    /// 354 Start message input
    pub const START_DATA: Self = Self(354);
    /// 421 Service shutting down
    pub const SERVICE_UNAVAILABLE: Self = Self(421);
    /// 450 Mailbox busy
    pub const MAILBOX_BUSY: Self = Self(450);
    /// 451 Local processing error
    pub const LOCAL_ERROR: Self = Self(451);
    /// 452 Insufficient storage
    pub const INSUFFICIENT_STORAGE: Self = Self(452);
    /// 500 Command not recognized
    pub const SYNTAX_ERROR: Self = Self(500);
    /// 501 Bad arguments
    pub const PARAMETER_ERROR: Self = Self(501);
    /// 503 Bad command sequence
    pub const BAD_SEQUENCE: Self = Self(503);
    /// 535 Credentials rejected
    pub const AUTH_FAILED: Self = Self(535);
    /// 550 Mailbox unavailable
    pub const MAILBOX_UNAVAILABLE: Self = Self(550);
    /// 554 Transaction failed
    pub const TRANSACTION_FAILED: Self = Self(554);

    /// Wraps a raw code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the raw code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// First digit of the code.
    #[must_use]
    pub const fn class(self) -> u16 {
        self.0 / 100
    }

    /// 2xx
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.class() == 2
    }

    /// 3xx
    #[must_use]
    pub const fn is_intermediate(self) -> bool {
        self.class() == 3
    }

    /// 4xx
    #[must_use]
    pub const fn is_transient(self) -> bool {
        self.class() == 4
    }

    /// 5xx
    #[must_use]
    pub const fn is_permanent(self) -> bool {
        self.class() == 5
    }
}

impl std::fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
