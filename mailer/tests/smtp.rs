use base64::{engine::general_purpose::STANDARD, Engine};
use mailer::{
    smtp::{Error, SmtpConfig, SmtpEncryption, SmtpSession, SmtpState},
    stream::Stream,
    tls::{self, TlsUpgrade},
    ErrorKind,
};
use mailer_testing_server::{closed_port, SmtpTestingServer};

/// Upgrade leaving the stream as it is, since the testing server does
/// not speak TLS.
struct Passthrough;

impl TlsUpgrade for Passthrough {
    fn upgrade(&self, _host: &str, stream: Stream) -> tls::Result<Stream> {
        Ok(stream)
    }
}

fn session(config: SmtpConfig) -> SmtpSession {
    SmtpSession::new(config, "client.example.com").with_tls_upgrade(Passthrough)
}

fn rcpts(addrs: &[&str]) -> Vec<String> {
    addrs.iter().map(ToString::to_string).collect()
}

#[test_log::test]
fn send_message() {
    let server = SmtpTestingServer::new().spawn();
    let config = SmtpConfig::default()
        .with_port(server.port())
        .with_credentials("alice", "secret");

    let mut session = session(config);
    session
        .send(
            "127.0.0.1",
            "alice@example.com",
            &rcpts(&["bob@example.com", "carol@example.com"]),
            b"Subject: hi\r\n\r\nHello\n.dot\r\n",
        )
        .unwrap();

    assert_eq!(session.state(), SmtpState::Closed);
    assert!(session.is_authenticated());
    assert!(session
        .transcript()
        .iter()
        .all(|exchange| !exchange.command.contains(&STANDARD.encode("secret"))));

    let transcript = server.join();

    assert_eq!(
        transcript.commands,
        vec![
            String::from("EHLO client.example.com"),
            String::from("STARTTLS"),
            String::from("EHLO client.example.com"),
            String::from("AUTH LOGIN"),
            STANDARD.encode("alice"),
            STANDARD.encode("secret"),
            String::from("MAIL FROM:<alice@example.com>"),
            String::from("RCPT TO:<bob@example.com>"),
            String::from("RCPT TO:<carol@example.com>"),
            String::from("DATA"),
            String::from("QUIT"),
        ]
    );

    assert_eq!(
        transcript.messages,
        vec![b"Subject: hi\r\n\r\nHello\r\n..dot\r\n".to_vec()]
    );
}

#[test_log::test]
fn send_with_verp() {
    let server = SmtpTestingServer::new().spawn();
    let config = SmtpConfig::default()
        .with_port(server.port())
        .with_verp(true);

    let mut session = session(config);
    session
        .send("127.0.0.1", "alice@example.com", &rcpts(&["bob@example.com"]), b"x")
        .unwrap();

    let transcript = server.join();
    assert!(transcript
        .commands
        .contains(&String::from("MAIL FROM:<alice@example.com> XVERP")));
}

#[test_log::test]
fn rejected_sender_fails_fast() {
    let server = SmtpTestingServer::new()
        .with_reply("MAIL", "550 sender rejected")
        .spawn();
    let config = SmtpConfig::default().with_port(server.port());

    let mut session = session(config);
    let err = session
        .send("127.0.0.1", "alice@example.com", &rcpts(&["bob@example.com"]), b"x")
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Protocol);
    match err {
        Error::UnexpectedReplyError(unexpected) => {
            assert_eq!(unexpected.command, "MAIL FROM:<alice@example.com>");
            assert_eq!(unexpected.expected, vec![250]);
            assert_eq!(unexpected.reply.code, 550);
        }
        err => panic!("unexpected error {err:?}"),
    }

    assert_eq!(session.state(), SmtpState::Closed);

    let transcript = server.join();
    assert_eq!(
        transcript.verbs(),
        vec!["EHLO", "STARTTLS", "EHLO", "MAIL", "QUIT"]
    );
    assert!(transcript.messages.is_empty());
}

/// Asserts the error is an unexpected reply with the given code.
fn assert_unexpected(err: Error, command: &str, code: u16) {
    assert_eq!(err.kind(), ErrorKind::Protocol);
    match err {
        Error::UnexpectedReplyError(unexpected) => {
            assert_eq!(unexpected.command, command);
            assert_eq!(unexpected.reply.code, code);
        }
        err => panic!("unexpected error {err:?}"),
    }
}

#[test_log::test]
fn rejected_starttls_fails_fast() {
    let server = SmtpTestingServer::new()
        .with_reply("STARTTLS", "454 tls not available")
        .spawn();
    let config = SmtpConfig::default()
        .with_port(server.port())
        .with_credentials("alice", "secret");

    let mut session = session(config);
    let err = session
        .send("127.0.0.1", "alice@example.com", &rcpts(&["bob@example.com"]), b"x")
        .unwrap_err();

    assert_unexpected(err, "STARTTLS", 454);
    assert_eq!(session.state(), SmtpState::Closed);

    let transcript = server.join();
    assert_eq!(transcript.verbs(), vec!["EHLO", "STARTTLS", "QUIT"]);
}

#[test_log::test]
fn rejected_credentials_fail_fast() {
    let server = SmtpTestingServer::new()
        .with_reply("AUTH PASS", "535 authentication failed")
        .spawn();
    let config = SmtpConfig::default()
        .with_port(server.port())
        .with_credentials("alice", "wrong");

    let mut session = session(config);
    let err = session
        .send("127.0.0.1", "alice@example.com", &rcpts(&["bob@example.com"]), b"x")
        .unwrap_err();

    assert_unexpected(err, "<redacted>", 535);
    assert!(!session.is_authenticated());
    assert_eq!(session.state(), SmtpState::Closed);

    let transcript = server.join();
    assert_eq!(
        transcript.commands,
        vec![
            String::from("EHLO client.example.com"),
            String::from("STARTTLS"),
            String::from("EHLO client.example.com"),
            String::from("AUTH LOGIN"),
            STANDARD.encode("alice"),
            STANDARD.encode("wrong"),
            String::from("QUIT"),
        ]
    );
}

#[test_log::test]
fn rejected_data_fails_fast() {
    let server = SmtpTestingServer::new()
        .with_reply(".", "554 message rejected")
        .spawn();
    let config = SmtpConfig::default()
        .with_port(server.port())
        .with_keep_alive(true);

    let mut session = session(config);
    let err = session
        .send("127.0.0.1", "alice@example.com", &rcpts(&["bob@example.com"]), b"x")
        .unwrap_err();

    assert_unexpected(err, "<data>", 554);
    assert_eq!(session.state(), SmtpState::Closed);

    // no RSET despite keep-alive
    let transcript = server.join();
    assert_eq!(
        transcript.verbs(),
        vec!["EHLO", "STARTTLS", "EHLO", "MAIL", "RCPT", "DATA", "QUIT"]
    );
    assert_eq!(transcript.messages, vec![b"x\r\n".to_vec()]);
}

#[test_log::test]
fn lenient_session_goes_on() {
    let server = SmtpTestingServer::new()
        .with_reply("RCPT", "550 no such user")
        .spawn();
    let config = SmtpConfig::default()
        .with_port(server.port())
        .with_lenient(true);

    let mut session = session(config);
    let err = session
        .send("127.0.0.1", "alice@example.com", &rcpts(&["nobody@example.com"]), b"x")
        .unwrap_err();

    match err {
        Error::UnexpectedRepliesError(replies) => {
            assert_eq!(replies.len(), 1);
            assert_eq!(replies[0].reply.code, 550);
        }
        err => panic!("unexpected error {err:?}"),
    }

    let transcript = server.join();
    assert_eq!(transcript.messages.len(), 1);
    assert_eq!(transcript.verbs().last().map(String::as_str), Some("QUIT"));
}

#[test_log::test]
fn keep_alive_reuses_connection() {
    let server = SmtpTestingServer::new().spawn();
    let config = SmtpConfig::default()
        .with_port(server.port())
        .with_keep_alive(true);

    let mut session = session(config);

    for body in [b"first".as_slice(), b"second".as_slice()] {
        session
            .send("127.0.0.1", "alice@example.com", &rcpts(&["bob@example.com"]), body)
            .unwrap();
        assert_eq!(session.state(), SmtpState::Reset);
    }

    drop(session);

    let transcript = server.join();
    assert_eq!(
        transcript.verbs(),
        vec![
            "EHLO", "STARTTLS", "EHLO", "MAIL", "RCPT", "DATA", "RSET", "MAIL", "RCPT", "DATA",
            "RSET", "QUIT"
        ]
    );
    assert_eq!(
        transcript.messages,
        vec![b"first\r\n".to_vec(), b"second\r\n".to_vec()]
    );
}

#[test_log::test]
fn connect_falls_back_to_next_port() {
    let server = SmtpTestingServer::new().spawn();
    let closed = closed_port();

    let mut session = session(SmtpConfig::default());
    session
        .connect_to("127.0.0.1", &[closed, server.port()])
        .unwrap();

    assert_eq!(session.state(), SmtpState::Connected);
    assert_eq!(session.port(), Some(server.port()));

    session.quit().unwrap();
    assert_eq!(server.join().verbs(), vec!["QUIT"]);
}

#[test_log::test]
fn connect_refused() {
    let mut session = session(SmtpConfig::default());
    let err = session
        .connect_to("127.0.0.1", &[closed_port()])
        .unwrap_err();

    assert!(matches!(err, Error::ConnectError(..)));
    assert_eq!(err.kind(), ErrorKind::Protocol);
}

#[test_log::test]
fn greeting_rejected() {
    let server = SmtpTestingServer::new()
        .with_greeting("554 no service")
        .spawn();

    let mut session = session(SmtpConfig::default());
    let err = session
        .connect_to("127.0.0.1", &[server.port()])
        .unwrap_err();

    assert!(matches!(err, Error::GreetingError(..)));
    server.join();
}

#[test_log::test]
fn refuse_auth_over_plain_text() {
    let server = SmtpTestingServer::new().spawn();
    let config = SmtpConfig::default()
        .with_port(server.port())
        .with_encryption(SmtpEncryption::None)
        .with_credentials("alice", "secret");

    let mut session = session(config);
    let err = session
        .send("127.0.0.1", "alice@example.com", &rcpts(&["bob@example.com"]), b"x")
        .unwrap_err();

    assert!(matches!(err, Error::AuthOverPlainTextError));
    assert_eq!(err.kind(), ErrorKind::Configuration);

    let transcript = server.join();
    assert_eq!(transcript.verbs(), vec!["EHLO", "QUIT"]);
}

#[test_log::test]
fn missing_recipient() {
    let mut session = session(SmtpConfig::default());
    let err = session
        .send("127.0.0.1", "alice@example.com", &[], b"x")
        .unwrap_err();

    assert!(matches!(err, Error::MissingRecipientError));
    assert_eq!(session.state(), SmtpState::Disconnected);
}
