//! EHLO/LHLO extension keywords.

/// Extension advertised in an EHLO or LHLO reply.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Extension {
    /// STARTTLS (RFC 3207)
    StartTls,
    /// AUTH with the offered SASL mechanisms (RFC 4954)
    Auth(Vec<AuthMechanism>),
    /// SIZE with the optional message size limit (RFC 1870)
    Size(Option<usize>),
    /// 8BITMIME (RFC 6152)
    EightBitMime,
    /// BINARYMIME (RFC 3030)
    BinaryMime,
    /// SMTPUTF8 (RFC 6531)
    SmtpUtf8,
    /// PIPELINING (RFC 2920)
    Pipelining,
    /// CHUNKING (RFC 3030)
    Chunking,
    /// DSN (RFC 3461)
    Dsn,
    /// ENHANCEDSTATUSCODES (RFC 2034)
    EnhancedStatusCodes,
    /// REQUIRETLS (RFC 8689)
    RequireTls,
    /// Any other keyword, with its parameters untouched.
    Other {
        /// Upper-cased keyword.
        keyword: String,
        /// Text after the keyword.
        params: String,
    },
}

impl Extension {
    /// Parses one line of an EHLO reply, without the reply code.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let (keyword, params) = line.split_once(' ').unwrap_or((line, ""));
        let params = params.trim();

        match keyword.to_ascii_uppercase().as_str() {
            "STARTTLS" => Self::StartTls,
            "AUTH" => Self::Auth(params.split_whitespace().map(AuthMechanism::parse).collect()),
            "SIZE" => Self::Size(params.parse().ok()),
            "8BITMIME" => Self::EightBitMime,
            "BINARYMIME" => Self::BinaryMime,
            "SMTPUTF8" => Self::SmtpUtf8,
            "PIPELINING" => Self::Pipelining,
            "CHUNKING" => Self::Chunking,
            "DSN" => Self::Dsn,
            "ENHANCEDSTATUSCODES" => Self::EnhancedStatusCodes,
            "REQUIRETLS" => Self::RequireTls,
            other => Self::Other {
                keyword: other.to_string(),
                params: params.to_string(),
            },
        }
    }
}

/// SASL mechanism offered in the AUTH extension.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AuthMechanism {
    /// PLAIN (RFC 4616)
    Plain,
    /// LOGIN
    Login,
    /// CRAM-MD5
    CramMd5,
    /// `XOAUTH2`
    XOAuth2,
    /// `OAUTHBEARER` (RFC 7628)
    OAuthBearer,
    /// Unrecognized mechanism, upper-cased.
    Other(String),
}

impl AuthMechanism {
    /// Parses a mechanism name, case-insensitively.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        let name = name.to_ascii_uppercase();
        match name.as_str() {
            "PLAIN" => Self::Plain,
            "LOGIN" => Self::Login,
            "CRAM-MD5" => Self::CramMd5,
            "XOAUTH2" => Self::XOAuth2,
            "OAUTHBEARER" => Self::OAuthBearer,
            _ => Self::Other(name),
        }
    }

    /// Returns the mechanism name as sent in AUTH.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
            Self::CramMd5 => "CRAM-MD5",
            Self::XOAuth2 => "XOAUTH2",
            Self::OAuthBearer => "OAUTHBEARER",
            Self::Other(name) => name,
        }
    }
}
