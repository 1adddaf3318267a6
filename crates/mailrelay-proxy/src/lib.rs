//! # mailrelay-proxy
//!
//! Backend of an SMTP/LMTP proxy: every inbound session is relayed to one
//! upstream mail server over its own connection.
//!
//! ## Features
//!
//! - **Connection setup**: implicit TLS, STARTTLS or plaintext, SMTP or LMTP,
//!   with dial, command and DATA timeouts
//! - **Cleanup**: a connection that fails during setup or login is closed
//!   before the error is returned
//! - **Streaming DATA**: message bodies are copied upstream chunk by chunk and
//!   the final status is kept for [`Session::status`]
//! - **Pluggable transports**: [`Dialer`] decides how upstream streams are opened
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailrelay_proxy::{Backend, BackendConfig, ProxyBackend, Session};
//! use mailrelay_smtp::MailOptions;
//!
//! #[tokio::main]
//! async fn main() -> mailrelay_proxy::Result<()> {
//!     let backend = ProxyBackend::new(BackendConfig::new("mx.example.org:587"));
//!     let mut session = backend.login("alice", "secret").await?;
//!
//!     session.mail("alice@example.org", &MailOptions::default()).await?;
//!     session.rcpt("bob@example.org").await?;
//!     session.data(&b"Subject: Hi\r\n\r\nHello Bob\r\n"[..]).await?;
//!     if let Some(status) = session.status() {
//!         println!("{status}");
//!     }
//!
//!     session.logout().await
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Upstream configuration and default resolution
//! - [`dial`]: Transport dialers
//! - [`factory`]: Connection establishment
//! - [`session`]: Relayed sessions
//! - [`backend`]: Login routines

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod backend;
pub mod config;
pub mod dial;
mod error;
pub mod factory;
pub mod session;

pub use backend::{Backend, ProxyBackend};
pub use config::{BackendConfig, DEFAULT_DIAL_TIMEOUT, Security, Timeouts, resolve_timeout};
pub use dial::{Dialer, TcpDialer};
pub use error::{Error, HandshakeStage, Result};
pub use factory::ConnectionFactory;
pub use session::{ProxySession, Session, StatusLatch};
