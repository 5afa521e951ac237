use std::fs;

use process::{Command, Error};
use tempfile::tempdir;

#[test_log::test]
fn run_without_input() {
    let cmd = Command::new("echo hello, world!");
    let out = cmd.run().unwrap().to_string_lossy();
    assert_eq!(out, "hello, world!\n");
}

#[test_log::test]
fn run_with_input() {
    let out = Command::new("cat").run_with(b"piped\r\nbytes").unwrap();
    assert_eq!(String::try_from(out).unwrap(), "piped\r\nbytes");
}

#[test_log::test]
fn run_with_appended_argument() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("out.eml");

    Command::new("cat >")
        .with_arg(path.to_string_lossy())
        .run_with("Subject: test\r\n\r\nbody\r\n")
        .unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "Subject: test\r\n\r\nbody\r\n");
}

#[test_log::test]
fn run_non_zero_exit_code() {
    match Command::new("echo oops >&2; exit 3").run().unwrap_err() {
        Error::GetExitStatusCodeNonZeroError(cmd, status, err) => {
            assert_eq!(cmd, "echo oops >&2; exit 3");
            assert_eq!(status, 3);
            assert_eq!(err, "oops\n");
        }
        err => panic!("unexpected error: {err:?}"),
    }
}
