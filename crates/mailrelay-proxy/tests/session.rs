//! Commands relayed through an established session.

#![allow(clippy::unwrap_used)]

mod common;

use std::time::Duration;

use common::{EHLO, EHLO_TLS_REPLY, FailingReader, GREETING, ScriptedDialer, proxy};
use mailrelay_proxy::{Backend, BackendConfig, Error, ProxySession, Security, Session};
use mailrelay_smtp::{MailOptions, ReplyCode};
use tokio::time::Instant;
use tokio_test::io::Builder;

use common::Scripted;

const QUIT: &[u8] = b"QUIT\r\n";
const BYE: &[u8] = b"221 2.0.0 Bye\r\n";

/// Script up to an accepted recipient, with the lazy EHLO in front.
fn transaction(builder: &mut Builder) -> &mut Builder {
    builder
        .read(GREETING)
        .write(EHLO)
        .read(EHLO_TLS_REPLY)
        .write(b"MAIL FROM:<alice@example.org>\r\n")
        .read(b"250 2.1.0 Ok\r\n")
        .write(b"RCPT TO:<bob@example.org>\r\n")
        .read(b"250 2.1.5 Ok\r\n")
}

async fn open(builder: &mut Builder) -> (ProxySession<Scripted>, std::sync::Arc<common::Wire>) {
    let config = BackendConfig::new("mx.example.org:25").security(Security::None);
    let (backend, wire) = proxy(config, ScriptedDialer::new(builder));
    (backend.anonymous_login().await.unwrap(), wire)
}

async fn start(session: &mut ProxySession<Scripted>) {
    session
        .mail("alice@example.org", &MailOptions::default())
        .await
        .unwrap();
    session.rcpt("bob@example.org").await.unwrap();
}

#[tokio::test]
async fn test_data_forwards_message() {
    let mut builder = Builder::new();
    transaction(&mut builder)
        .write(b"DATA\r\n")
        .read(b"354 End data with <CR><LF>.<CR><LF>\r\n")
        .write(b"Subject: Hi\r\n\r\n..hidden dot\r\nbare\r\n")
        .write(b".\r\n")
        .read(b"250 2.0.0 Ok: queued as 4F2A1\r\n")
        .write(QUIT)
        .read(BYE);

    let (mut session, wire) = open(&mut builder).await;
    start(&mut session).await;
    assert!(session.status().is_none());

    session
        .data(&b"Subject: Hi\r\n\r\n.hidden dot\r\nbare\n"[..])
        .await
        .unwrap();

    let status = session.status().unwrap();
    assert_eq!(status.code, ReplyCode::OK);
    assert_eq!(status.enhanced.unwrap().to_string(), "2.0.0");
    assert_eq!(status.message, "Ok: queued as 4F2A1");
    assert_eq!(wire.sent().matches("\r\n.\r\n").count(), 1);

    session.logout().await.unwrap();
    assert_eq!(wire.closes(), 1);
}

#[tokio::test]
async fn test_data_read_error_leaves_status_unset() {
    let mut builder = Builder::new();
    transaction(&mut builder)
        .write(b"DATA\r\n")
        .read(b"354 Go ahead\r\n")
        .write(b"Sub")
        .write(b"\r\n.\r\n")
        .read(b"250 2.0.0 Ok: queued as 4F2A2\r\n")
        .write(QUIT)
        .read(BYE);

    let (mut session, wire) = open(&mut builder).await;
    start(&mut session).await;

    let err = session.data(FailingReader::new(b"Sub")).await.unwrap_err();
    match err {
        Error::Transfer(e) => {
            assert_eq!(e.kind(), std::io::ErrorKind::BrokenPipe);
            assert_eq!(e.to_string(), "inbound connection reset");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(session.status().is_none());
    assert_eq!(wire.sent().matches("\r\n.\r\n").count(), 1);

    session.logout().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_slow_body_is_cut_off_at_submission_timeout() {
    let mut builder = Builder::new();
    transaction(&mut builder)
        .write(b"DATA\r\n")
        .read(b"354 Go ahead\r\n")
        .write(b"a")
        .write(b"b");

    let config = BackendConfig::new("mx.example.org:25")
        .security(Security::None)
        .submission_timeout(Duration::from_secs(60));
    let (backend, wire) = proxy(config, ScriptedDialer::new(&mut builder));
    let mut session = backend.anonymous_login().await.unwrap();
    start(&mut session).await;

    // Every chunk arrives well within the limit; the body as a whole does not.
    let body = Builder::new()
        .read(b"a")
        .wait(Duration::from_secs(59))
        .read(b"b")
        .wait(Duration::from_secs(59))
        .build();

    let started = Instant::now();
    let err = session.data(body).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Upstream(mailrelay_smtp::Error::Timeout(d)) if d == Duration::from_secs(60)
    ));
    assert!(started.elapsed() < Duration::from_secs(61));
    assert!(session.status().is_none());
    assert_eq!(wire.sent().matches("\r\n.\r\n").count(), 0);
}

#[tokio::test]
async fn test_data_rejection_is_latched_and_returned() {
    let mut builder = Builder::new();
    transaction(&mut builder)
        .write(b"DATA\r\n")
        .read(b"354 Go ahead\r\n")
        .write(b"spam\r\n")
        .write(b".\r\n")
        .read(b"554 5.7.1 Message rejected as spam\r\n")
        .write(QUIT)
        .read(BYE);

    let (mut session, _wire) = open(&mut builder).await;
    start(&mut session).await;

    let err = session.data(&b"spam\r\n"[..]).await.unwrap_err();
    let returned = err.status().cloned().unwrap();
    assert!(matches!(err, Error::Upstream(mailrelay_smtp::Error::Smtp(_))));
    assert_eq!(session.status(), Some(&returned));
    assert_eq!(returned.code, ReplyCode::TRANSACTION_FAILED);
    assert_eq!(returned.message, "Message rejected as spam");

    session.logout().await.unwrap();
}

#[tokio::test]
async fn test_data_refused_before_body() {
    let mut builder = Builder::new();
    transaction(&mut builder)
        .write(b"DATA\r\n")
        .read(b"503 5.5.1 No valid recipients\r\n")
        .write(QUIT)
        .read(BYE);

    let (mut session, _wire) = open(&mut builder).await;
    start(&mut session).await;

    let err = session.data(&b"body\r\n"[..]).await.unwrap_err();
    assert_eq!(err.status().unwrap().code, ReplyCode::BAD_SEQUENCE);
    assert!(session.status().is_none());

    session.logout().await.unwrap();
}

#[tokio::test]
async fn test_status_follows_latest_transfer() {
    let mut builder = Builder::new();
    transaction(&mut builder)
        .write(b"DATA\r\n")
        .read(b"354 Go ahead\r\n")
        .write(b"one\r\n")
        .write(b".\r\n")
        .read(b"250 2.0.0 first\r\n")
        .write(b"MAIL FROM:<alice@example.org>\r\n")
        .read(b"250 2.1.0 Ok\r\n")
        .write(b"RCPT TO:<bob@example.org>\r\n")
        .read(b"250 2.1.5 Ok\r\n")
        .write(b"DATA\r\n")
        .read(b"354 Go ahead\r\n")
        .write(b"two")
        .write(b"\r\n.\r\n")
        .read(b"250 2.0.0 second\r\n");

    let (mut session, _wire) = open(&mut builder).await;
    start(&mut session).await;
    session.data(&b"one\r\n"[..]).await.unwrap();
    assert_eq!(session.status().unwrap().message, "first");

    start(&mut session).await;
    session.data(FailingReader::new(b"two")).await.unwrap_err();
    assert!(session.status().is_none());
}

#[tokio::test]
async fn test_lmtp_data_latches_last_recipient() {
    let mut builder = Builder::new();
    builder
        .read(b"220 mailstore.local LMTP ready\r\n")
        .write(b"LHLO localhost\r\n")
        .read(b"250-mailstore.local\r\n250 ENHANCEDSTATUSCODES\r\n")
        .write(b"MAIL FROM:<alice@example.org>\r\n")
        .read(b"250 2.1.0 Ok\r\n")
        .write(b"RCPT TO:<bob@example.org>\r\n")
        .read(b"250 2.1.5 Ok\r\n")
        .write(b"RCPT TO:<carol@example.org>\r\n")
        .read(b"250 2.1.5 Ok\r\n")
        .write(b"DATA\r\n")
        .read(b"354 Go ahead\r\n")
        .write(b"hello\r\n")
        .write(b".\r\n")
        .read(b"250 2.0.0 bob delivered\r\n")
        .read(b"452 4.2.2 carol over quota\r\n");

    let config = BackendConfig::new_lmtp("127.0.0.1:24", "mailstore.local");
    let (backend, _wire) = proxy(config, ScriptedDialer::new(&mut builder));
    let mut session = backend.anonymous_login().await.unwrap();

    session.mail("alice@example.org", &MailOptions::default()).await.unwrap();
    session.rcpt("bob@example.org").await.unwrap();
    session.rcpt("carol@example.org").await.unwrap();
    session.data(&b"hello\r\n"[..]).await.unwrap();

    let status = session.status().unwrap();
    assert_eq!(status.code, ReplyCode::INSUFFICIENT_STORAGE);
    assert_eq!(status.message, "carol over quota");
}

#[tokio::test]
async fn test_mail_error_is_returned_verbatim() {
    let mut builder = Builder::new();
    builder
        .read(GREETING)
        .write(EHLO)
        .read(EHLO_TLS_REPLY)
        .write(b"MAIL FROM:<spoof@example.org>\r\n")
        .read(b"553 5.7.1 Sender address rejected: not owned by user\r\n")
        .write(b"NOOP\r\n")
        .read(b"250 2.0.0 Ok\r\n");

    let (mut session, wire) = open(&mut builder).await;
    let err = session
        .mail("spoof@example.org", &MailOptions::default())
        .await
        .unwrap_err();

    let status = err.status().unwrap();
    assert_eq!(status.code.as_u16(), 553);
    assert_eq!(status.enhanced.unwrap().to_string(), "5.7.1");
    assert_eq!(status.message, "Sender address rejected: not owned by user");

    session.noop().await.unwrap();
    assert_eq!(wire.closes(), 0);
}

#[tokio::test]
async fn test_paths_with_line_breaks_never_reach_upstream() {
    let mut builder = Builder::new();
    builder
        .read(GREETING)
        .write(EHLO)
        .read(EHLO_TLS_REPLY)
        .write(b"NOOP\r\n")
        .read(b"250 2.0.0 Ok\r\n");

    let (mut session, wire) = open(&mut builder).await;
    let err = session
        .mail("a@x>\r\nRSET\r\n", &MailOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Upstream(mailrelay_smtp::Error::InvalidArgument(_))
    ));
    let err = session.rcpt("b@x>\nDATA").await.unwrap_err();
    assert!(matches!(
        err,
        Error::Upstream(mailrelay_smtp::Error::InvalidArgument(_))
    ));

    session.noop().await.unwrap();
    assert_eq!(wire.sent(), "EHLO localhost\r\nNOOP\r\n");
}

#[tokio::test]
async fn test_rcpt_error_is_returned_verbatim() {
    let mut builder = Builder::new();
    builder
        .read(GREETING)
        .write(EHLO)
        .read(EHLO_TLS_REPLY)
        .write(b"MAIL FROM:<alice@example.org>\r\n")
        .read(b"250 2.1.0 Ok\r\n")
        .write(b"RCPT TO:<nobody@example.org>\r\n")
        .read(b"550 5.1.1 User unknown\r\n");

    let (mut session, _wire) = open(&mut builder).await;
    session.mail("alice@example.org", &MailOptions::default()).await.unwrap();
    let err = session.rcpt("nobody@example.org").await.unwrap_err();
    assert_eq!(err.status().unwrap().code, ReplyCode::MAILBOX_UNAVAILABLE);
}

#[tokio::test]
async fn test_reset_ignores_upstream_error() {
    let mut builder = Builder::new();
    builder
        .read(GREETING)
        .write(EHLO)
        .read(EHLO_TLS_REPLY)
        .write(b"RSET\r\n")
        .read(b"451 4.3.0 Try again\r\n")
        .write(b"RSET\r\n")
        .read(b"250 2.0.0 Ok\r\n");

    let (mut session, _wire) = open(&mut builder).await;
    session.reset().await;
    session.reset().await;
}

#[tokio::test]
async fn test_noop_error_is_returned() {
    let mut builder = Builder::new();
    builder
        .read(GREETING)
        .write(EHLO)
        .read(EHLO_TLS_REPLY)
        .write(b"NOOP\r\n")
        .read(b"421 4.3.2 Shutting down\r\n");

    let (mut session, _wire) = open(&mut builder).await;
    let err = session.noop().await.unwrap_err();
    assert_eq!(err.status().unwrap().code, ReplyCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_logout_error_still_closes() {
    let mut builder = Builder::new();
    builder
        .read(GREETING)
        .write(QUIT)
        .read(b"500 5.5.2 What?\r\n");

    let (session, wire) = open(&mut builder).await;
    let err = session.logout().await.unwrap_err();
    assert_eq!(err.status().unwrap().code, ReplyCode::SYNTAX_ERROR);
    assert_eq!(wire.closes(), 1);
}
