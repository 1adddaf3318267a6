//! MAIL FROM parameters.

use std::fmt::Write;

/// Value of the `BODY=` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyType {
    /// `7BIT`
    SevenBit,
    /// `8BITMIME` (RFC 6152)
    EightBitMime,
    /// `BINARYMIME` (RFC 3030)
    BinaryMime,
}

impl BodyType {
    /// Returns the parameter value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SevenBit => "7BIT",
            Self::EightBitMime => "8BITMIME",
            Self::BinaryMime => "BINARYMIME",
        }
    }
}

/// Options forwarded with a MAIL FROM command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailOptions {
    /// Body type of the message.
    pub body: Option<BodyType>,
    /// Declared message size in bytes.
    pub size: Option<usize>,
    /// Require TLS along the whole delivery path (RFC 8689).
    pub require_tls: bool,
    /// The envelope or message uses UTF-8 (RFC 6531).
    pub utf8: bool,
    /// Authenticated submitter identity, `AUTH=` (RFC 4954). `<>` means unknown.
    pub auth: Option<String>,
}

impl MailOptions {
    /// Sets the body type.
    #[must_use]
    pub const fn body(mut self, body: BodyType) -> Self {
        self.body = Some(body);
        self
    }

    /// Sets the declared size.
    #[must_use]
    pub const fn size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    /// Requests REQUIRETLS.
    #[must_use]
    pub const fn require_tls(mut self) -> Self {
        self.require_tls = true;
        self
    }

    /// Requests SMTPUTF8.
    #[must_use]
    pub const fn utf8(mut self) -> Self {
        self.utf8 = true;
        self
    }

    /// Sets the `AUTH=` submitter identity.
    #[must_use]
    pub fn auth(mut self, identity: impl Into<String>) -> Self {
        self.auth = Some(identity.into());
        self
    }
}

/// Encodes a value as xtext (RFC 3461 section 4).
#[must_use]
pub fn encode_xtext(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for b in raw.bytes() {
        if (b'!'..=b'~').contains(&b) && b != b'+' && b != b'=' {
            out.push(char::from(b));
        } else {
            let _ = write!(out, "+{b:02X}");
        }
    }
    out
}
