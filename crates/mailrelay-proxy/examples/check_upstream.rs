#![allow(clippy::doc_markdown)]
//! Example: Check that an upstream server accepts proxied sessions
//!
//! Loads a backend configuration from JSON, opens a session (authenticated
//! when credentials are given), sends NOOP and logs out.
//!
//! ## Configuration
//!
//! ```json
//! {
//!     "address": "mx.example.org:587",
//!     "security": "starttls",
//!     "local_name": "proxy.example.net",
//!     "command_timeout": 60
//! }
//! ```
//!
//! ## Running
//!
//! ```bash
//! RUST_LOG=debug cargo run --package mailrelay-proxy --example check_upstream -- upstream.json [username password]
//! ```

use anyhow::{Context, bail};
use mailrelay_proxy::{Backend, BackendConfig, ProxyBackend, Session};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (path, credentials) = match args.as_slice() {
        [path] => (path, None),
        [path, username, password] => (path, Some((username, password))),
        _ => bail!("usage: check_upstream <config.json> [username password]"),
    };

    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    let config: BackendConfig =
        serde_json::from_str(&raw).with_context(|| format!("parsing {path}"))?;
    config.validate()?;

    println!("Connecting to {}...", config.address);
    let backend = ProxyBackend::new(config);
    let mut session = match credentials {
        Some((username, password)) => backend.login(username, password).await?,
        None => backend.anonymous_login().await?,
    };
    println!(
        "✓ Session open ({}, TLS: {})",
        session.server_info().hostname,
        session.upstream().is_tls()
    );

    session.noop().await?;
    println!("✓ NOOP accepted");

    session.logout().await?;
    println!("✓ Disconnected");

    Ok(())
}
