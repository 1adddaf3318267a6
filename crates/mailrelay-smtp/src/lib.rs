//! # mailrelay-smtp
//!
//! Async SMTP and LMTP client for relaying sessions to an upstream server.
//!
//! ## Features
//!
//! - **Any transport**: the [`Client`] runs over anything implementing
//!   [`connection::Transport`]; [`SmtpStream`] covers TCP and TLS
//! - **TLS support**: both implicit TLS (port 465) and STARTTLS, via rustls
//! - **LMTP**: LHLO greeting and per-recipient DATA status
//! - **Structured errors**: every rejection carries the reply code, the
//!   enhanced status code and the server text as a [`Status`]
//! - **Timeouts**: separate limits for commands and the DATA phase
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::time::Duration;
//! use mailrelay_smtp::connection::{Client, connect};
//! use mailrelay_smtp::{MailOptions, TlsParameters, sasl::Plain};
//!
//! #[tokio::main]
//! async fn main() -> mailrelay_smtp::Result<()> {
//!     let stream = connect("mx.example.org:587", Duration::from_secs(30)).await?;
//!     let mut client = Client::new(stream, "mx.example.org");
//!     client.greet().await?;
//!     client.starttls(&TlsParameters::new()).await?;
//!     client.authenticate(&mut Plain::new("user", "password")).await?;
//!
//!     client.mail("sender@example.org", &MailOptions::default()).await?;
//!     client.rcpt("recipient@example.org").await?;
//!     let mut body = client.data().await?;
//!     body.write(b"Subject: Test\r\n\r\nHello, World!\r\n").await?;
//!     body.close(|_, status| println!("{status}")).await?;
//!
//!     client.quit().await
//! }
//! ```
//!
//! ## Modules
//!
//! - [`command`]: SMTP command builders
//! - [`connection`]: Transports and the client
//! - [`parser`]: Reply parser
//! - [`sasl`]: SASL mechanisms for AUTH
//! - [`types`]: Core SMTP types (replies, status codes, extensions, MAIL options)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod sasl;
pub mod types;

pub use connection::{Client, DataWriter, Protocol, ServerInfo, SmtpStream, TlsParameters, Transport};
pub use error::{Error, Result};
pub use types::{
    AuthMechanism, BodyType, EnhancedCode, Extension, MailOptions, Reply, ReplyCode, Status,
};
