// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end runs of tpm2_testparms against a fake TPM simulator

use std::io::{ErrorKind, Read, Write};
use std::net::TcpListener;
use std::process::{Command, Output};
use std::thread::{self, JoinHandle};

const BIN: &str = env!("CARGO_BIN_EXE_tpm2_testparms");

/// Serve one mssim session that answers the first command with `code`.
/// The join handle yields the command the tool sent.
fn fake_tpm(code: u32) -> (String, JoinHandle<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let tcti = format!("mssim:host=127.0.0.1,port={}", listener.local_addr().unwrap().port());

    let server = thread::spawn(move || {
        let (mut conn, _) = listener.accept().unwrap();

        // TPM_SEND_COMMAND, locality, length
        let mut head = [0u8; 9];
        conn.read_exact(&mut head).unwrap();
        assert_eq!(u32::from_be_bytes([head[0], head[1], head[2], head[3]]), 8);
        let len = u32::from_be_bytes([head[5], head[6], head[7], head[8]]) as usize;
        let mut command = vec![0u8; len];
        conn.read_exact(&mut command).unwrap();

        let mut response = vec![0x80, 0x01, 0x00, 0x00, 0x00, 0x0A];
        response.extend_from_slice(&code.to_be_bytes());
        conn.write_all(&(response.len() as u32).to_be_bytes()).unwrap();
        conn.write_all(&response).unwrap();
        conn.write_all(&0u32.to_be_bytes()).unwrap();

        // TPM_SESSION_END
        let mut end = [0u8; 4];
        let _ = conn.read_exact(&mut end);
        command
    });

    (tcti, server)
}

fn testparms(args: &[&str]) -> Output {
    Command::new(BIN)
        .args(args)
        .env_remove("TPM2TOOLS_TCTI")
        .output()
        .unwrap()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// A listener that must never see a connection
fn untouched_listener() -> (String, TcpListener) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let tcti = format!("mssim:host=127.0.0.1,port={}", listener.local_addr().unwrap().port());
    (tcti, listener)
}

fn assert_untouched(listener: &TcpListener) {
    match listener.accept() {
        Err(e) => assert_eq!(e.kind(), ErrorKind::WouldBlock),
        Ok(_) => panic!("the TPM was contacted"),
    }
}

#[test]
fn supported_parameters_exit_zero() {
    let (tcti, server) = fake_tpm(0);
    let output = testparms(&["-T", &tcti, "ecc256"]);
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));

    let command = server.join().unwrap();
    // TPM_ST_NO_SESSIONS, TPM_CC_TestParms, TPM_ALG_ECC
    assert_eq!(&command[0..2], &[0x80, 0x01]);
    assert_eq!(&command[6..10], &[0x00, 0x00, 0x01, 0x8A]);
    assert_eq!(&command[10..12], &[0x00, 0x23]);
}

#[test]
fn key_size_rejection_exits_two() {
    let (tcti, server) = fake_tpm(0x1C7);
    let output = testparms(&["--tcti", &tcti, "rsa2048"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("Specified key size is unsupported"));

    let command = server.join().unwrap();
    assert_eq!(&command[10..12], &[0x00, 0x01]);
}

#[test]
fn value_rejection_gets_the_generic_message() {
    let (tcti, server) = fake_tpm(0x1C4);
    let output = testparms(&["--tcti", &tcti, "rsa2048:rsassa:aes128cfb"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("Unsupported algorithm specification"));
    server.join().unwrap();
}

#[test]
fn non_parameter_failure_exits_one_with_the_raw_code() {
    let (tcti, server) = fake_tpm(0x101);
    let output = testparms(&["--tcti", &tcti, "hmac-sha256"]);
    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.contains("0x101"));
    assert!(err.contains("TPM_RC_FAILURE"));
    server.join().unwrap();
}

#[test]
fn tcti_from_environment() {
    let (tcti, server) = fake_tpm(0);
    let output = Command::new(BIN)
        .arg("aes128cfb")
        .env("TPM2TOOLS_TCTI", &tcti)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));

    let command = server.join().unwrap();
    assert_eq!(&command[10..12], &[0x00, 0x25]);
}

#[test]
fn unknown_curve_never_reaches_the_tpm() {
    let (tcti, listener) = untouched_listener();
    let output = testparms(&["--tcti", &tcti, "ecc999"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("999"));
    assert_untouched(&listener);
}

#[test]
fn invalid_symmetric_key_length_never_reaches_the_tpm() {
    let (tcti, listener) = untouched_listener();
    let output = testparms(&["--tcti", &tcti, "aes999cfb"]);
    assert_eq!(output.status.code(), Some(1));
    assert_untouched(&listener);
}

#[test]
fn missing_specification() {
    let (tcti, listener) = untouched_listener();
    let output = testparms(&["--tcti", &tcti]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Expected one algorithm specification, got: 0"));
    assert_untouched(&listener);
}

#[test]
fn extra_specifications_are_refused() {
    let (tcti, listener) = untouched_listener();
    let output = testparms(&["--tcti", &tcti, "rsa", "ecc"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Expected one algorithm specification, got: 2"));
    assert_untouched(&listener);
}

#[test]
fn unreachable_tpm_exits_one() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let tcti = format!("mssim:host=127.0.0.1,port={}", port);
    let output = testparms(&["--tcti", &tcti, "rsa2048"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Failed to connect to TPM simulator"));
}

#[test]
fn bad_tcti_exits_one() {
    let output = testparms(&["--tcti", "tabrmd", "rsa2048"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn help_exits_zero() {
    let output = testparms(&["--help"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).contains("ALG_SPEC"));
}
