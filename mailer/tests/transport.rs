use std::{fs, path::Path};

use mailer::{
    imap::{ImapConfig, ImapEncryption},
    sendmail::SendmailConfig,
    smtp::{SmtpConfig, SmtpEncryption},
    transport, Attachment, Error, ErrorKind, Mailer, MailerConfig, Message, RequestContext,
    TransportKind,
};
use mailer_testing_server::{closed_port, ImapTestingServer, SmtpTestingServer};
use process::Command;

fn smtp(port: u16) -> SmtpConfig {
    SmtpConfig::default()
        .with_host("127.0.0.1")
        .with_port(port)
        .with_encryption(SmtpEncryption::None)
}

fn imap(port: u16) -> ImapConfig {
    ImapConfig::default()
        .with_host("127.0.0.1")
        .with_port(port)
        .with_encryption(ImapEncryption::None)
        .with_credentials("alice", "secret")
}

/// Sendmail command dumping its input into the given file. The
/// sender flag appended to the command ends up in a shell comment.
fn dump_to(path: &Path) -> SendmailConfig {
    SendmailConfig::default().with_cmd(Command::new(format!("cat > {} #", path.display())))
}

fn config() -> MailerConfig {
    MailerConfig::default().with_context(RequestContext::new("client.example.com"))
}

fn message() -> Message {
    let mut msg = Message::new();
    msg.set_from("Alice <alice@example.com>").unwrap();
    msg.add_to("Bob <bob@example.com>").unwrap();
    msg.add_bcc("carol@example.com").unwrap();
    msg.set_subject("Hello");
    msg.set_text("Hello, world!");
    msg
}

#[test_log::test]
fn send_via_smtp() {
    let server = SmtpTestingServer::new().spawn();
    let mailer = Mailer::new(config().with_smtp(smtp(server.port())));

    let report = mailer.send(&message(), TransportKind::Smtp).unwrap();

    assert_eq!(report.transport, TransportKind::Smtp);
    assert_eq!(report.attempts, 1);
    assert!(report.message_id.ends_with("@client.example.com>"));

    let transcript = server.join();
    assert!(transcript
        .commands
        .contains(&String::from("RCPT TO:<bob@example.com>")));
    assert!(transcript
        .commands
        .contains(&String::from("RCPT TO:<carol@example.com>")));

    let eml = String::from_utf8_lossy(&transcript.messages[0]).to_string();
    assert!(eml.contains("To: Bob <bob@example.com>\r\n"));
    assert!(eml.contains(&format!("Message-Id: {}\r\n", report.message_id)));
    assert!(!eml.contains("Bcc:"));
}

#[test_log::test]
fn fall_back_to_sendmail() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.eml");

    let config = config()
        .with_smtp(smtp(closed_port()))
        .with_sendmail(dump_to(&out));

    let report = Mailer::new(config)
        .send(&message(), TransportKind::Smtp)
        .unwrap();

    assert_eq!(report.transport, TransportKind::Sendmail);
    assert_eq!(report.attempts, 2);

    let eml = fs::read_to_string(out).unwrap();
    assert!(eml.contains("Bcc: <carol@example.com>\r\n"));
    assert!(eml.contains(" sendmail (https://pimalaya.org/)\r\n"));
}

#[test_log::test]
fn start_from_requested_transport() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.eml");

    // smtp would fail, but it comes before sendmail
    let config = config()
        .with_smtp(smtp(closed_port()))
        .with_sendmail(dump_to(&out));

    let report = Mailer::new(config)
        .send(&message(), TransportKind::Sendmail)
        .unwrap();

    assert_eq!(report.transport, TransportKind::Sendmail);
    assert_eq!(report.attempts, 1);
}

#[test_log::test]
fn exhaust_transports() {
    let config = config()
        .with_smtp(smtp(closed_port()))
        .with_sendmail(SendmailConfig::default().with_cmd(Command::new("exit 1 #")));

    let err = Mailer::new(config)
        .send(&message(), TransportKind::Smtp)
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TransportExhausted);

    match err {
        Error::TransportError(transport::Error::TransportsExhaustedError(errors)) => {
            let kinds: Vec<_> = errors.iter().map(|(kind, _)| *kind).collect();
            assert_eq!(kinds, [TransportKind::Smtp, TransportKind::Sendmail]);
            assert_eq!(errors[0].1.kind(), ErrorKind::Protocol);
            assert_eq!(errors[1].1.kind(), ErrorKind::Protocol);
        }
        err => panic!("unexpected error {err:?}"),
    }
}

#[test_log::test]
fn inject_via_imap() {
    let server = ImapTestingServer::new().spawn();
    let mailer = Mailer::new(config().with_imap(imap(server.port())));

    let report = mailer.send(&message(), TransportKind::Imap).unwrap();
    assert_eq!(report.transport, TransportKind::Imap);

    let transcript = server.join();
    assert_eq!(transcript.commands[0], r#"A1 LOGIN "alice" "secret""#);
    assert_eq!(transcript.appended.len(), 1);

    let (folder, eml) = &transcript.appended[0];
    assert_eq!(folder, "INBOX");
    assert!(eml.starts_with(b"To: Bob <bob@example.com>\r\nSubject: Hello\r\n"));
}

#[test_log::test]
fn append_to_sent_folder() {
    let smtp_server = SmtpTestingServer::new().spawn();
    let imap_server = ImapTestingServer::new().spawn();

    let config = config()
        .with_smtp(smtp(smtp_server.port()))
        .with_imap(imap(imap_server.port()).with_append_to_sent(true));

    Mailer::new(config)
        .send(&message(), TransportKind::Smtp)
        .unwrap();

    smtp_server.join();
    let transcript = imap_server.join();

    assert_eq!(transcript.appended.len(), 1);
    assert_eq!(transcript.appended[0].0, "INBOX.Sent");
}

#[test_log::test]
fn sent_folder_failure_is_not_fatal() {
    let smtp_server = SmtpTestingServer::new().spawn();
    let imap_server = ImapTestingServer::new().with_rejected_append().spawn();

    let config = config()
        .with_smtp(smtp(smtp_server.port()))
        .with_imap(imap(imap_server.port()).with_append_to_sent(true));

    let report = Mailer::new(config)
        .send(&message(), TransportKind::Smtp)
        .unwrap();

    assert_eq!(report.transport, TransportKind::Smtp);
    assert!(imap_server.join().appended.is_empty());
}

#[test_log::test]
fn missing_recipients() {
    let mut msg = Message::new();
    msg.set_from("alice@example.com").unwrap();

    let err = Mailer::new(config())
        .send(&msg, TransportKind::Smtp)
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test_log::test]
fn unsupported_transport() {
    let err = Mailer::new(config())
        .send_via(&message(), "carrier-pigeon")
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test_log::test]
fn composition_failure_aborts_before_delivery() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.eml");

    let mut msg = message();
    msg.add_attachment(Attachment::from_path(dir.path().join("missing.pdf")));

    let err = Mailer::new(config().with_sendmail(dump_to(&out)))
        .send(&msg, TransportKind::Sendmail)
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ResourceUnavailable);
    assert!(!out.exists());
}

#[test_log::test]
fn refuse_unsafe_sendmail_sender() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.eml");

    let mut msg = message();
    msg.set_from(("Eve", "a`touch${IFS}pwned`@example.com"))
        .unwrap();

    let err = Mailer::new(config().with_sendmail(dump_to(&out)))
        .send(&msg, TransportKind::Sendmail)
        .unwrap_err();

    match err {
        Error::TransportError(transport::Error::TransportsExhaustedError(errors)) => {
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].0, TransportKind::Sendmail);
            assert_eq!(errors[0].1.kind(), ErrorKind::Validation);
        }
        err => panic!("unexpected error {err:?}"),
    }

    // the command never ran
    assert!(!out.exists());
}
