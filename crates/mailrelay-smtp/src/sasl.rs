//! SASL client mechanisms for `AUTH`.
//!
//! Implements:
//! - PLAIN (RFC 4616) - Basic username/password authentication

use crate::error::{Error, Result};

/// A client-side SASL mechanism.
///
/// The client drives the exchange: [`Mechanism::initial_response`] is sent
/// with the AUTH command, then every 334 challenge is passed to
/// [`Mechanism::respond`] until the server answers 235 or fails.
pub trait Mechanism {
    /// Mechanism name as registered with IANA (e.g. `PLAIN`).
    fn name(&self) -> &str;

    /// Initial response sent with the AUTH command, if the mechanism has one.
    ///
    /// # Errors
    ///
    /// Returns an error if the response cannot be produced.
    fn initial_response(&mut self) -> Result<Option<Vec<u8>>>;

    /// Answers a server challenge (already base64 decoded).
    ///
    /// # Errors
    ///
    /// Returns an error if the challenge is unexpected or malformed.
    fn respond(&mut self, challenge: &[u8]) -> Result<Vec<u8>>;
}

/// PLAIN mechanism (RFC 4616).
///
/// Format: `\0<username>\0<password>` (empty authorization identity), sent
/// as initial response.
pub struct Plain {
    username: String,
    password: String,
    sent: bool,
}

impl Plain {
    /// Creates a PLAIN mechanism for `username`.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            sent: false,
        }
    }

    fn message(&self) -> Vec<u8> {
        format!("\0{}\0{}", self.username, self.password).into_bytes()
    }
}

impl std::fmt::Debug for Plain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plain")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl Mechanism for Plain {
    fn name(&self) -> &str {
        "PLAIN"
    }

    fn initial_response(&mut self) -> Result<Option<Vec<u8>>> {
        self.sent = true;
        Ok(Some(self.message()))
    }

    fn respond(&mut self, challenge: &[u8]) -> Result<Vec<u8>> {
        // An empty challenge asks for the credentials when no initial response went out.
        if !self.sent && challenge.is_empty() {
            self.sent = true;
            return Ok(self.message());
        }
        Err(Error::Mechanism("unexpected server challenge".into()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_initial_response_format() {
        let mut plain = Plain::new("test", "pass");
        let response = plain.initial_response().unwrap().unwrap();
        assert_eq!(response, b"\0test\0pass");
    }

    #[test]
    fn test_plain_special_chars() {
        let mut plain = Plain::new("user", "pass@word!");
        let response = plain.initial_response().unwrap().unwrap();
        assert_eq!(response, b"\0user\0pass@word!");
    }

    #[test]
    fn test_plain_rejects_challenge_after_initial_response() {
        let mut plain = Plain::new("user", "pass");
        plain.initial_response().unwrap();
        assert!(plain.respond(b"").is_err());
    }

    #[test]
    fn test_plain_answers_empty_challenge() {
        let mut plain = Plain::new("user", "pass");
        assert_eq!(plain.respond(b"").unwrap(), b"\0user\0pass");
    }

    #[test]
    fn test_debug_hides_password() {
        let plain = Plain::new("user", "hunter2");
        assert!(!format!("{plain:?}").contains("hunter2"));
    }
}
