mod support;

use std::process::Command;

use tempfile::tempdir;
use wiremock::matchers::{method, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use support::{CONTENT_TYPE_CA_RA_CERT, certificate_der, certs_only, path_arg, write_enroll_files};

fn run(args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_scep-client"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("scep-client binary runs in tests");
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);
    (stdout, stderr, code)
}

#[test]
fn test_help_lists_operations() {
    let (stdout, _, code) = run(&["--help"]);

    assert_eq!(code, 0);
    assert!(stdout.contains("getca"));
    assert!(stdout.contains("--max-poll-count"));
}

#[test]
fn test_missing_operation() {
    let (_, stderr, code) = run(&[]);

    assert_eq!(code, 1);
    assert!(stderr.contains("Missing operation"));
    assert!(stderr.contains("Usage:"));
}

#[test]
fn test_unknown_operation() {
    let (_, stderr, code) = run(&["renew", "-u", "http://ca.example/scep"]);

    assert_eq!(code, 1);
    assert!(stderr.contains("unknown operation 'renew'"));
    assert!(stderr.contains("Usage:"));
}

#[test]
fn test_unknown_flag_is_usage_error() {
    let (_, stderr, code) = run(&["getca", "--frobnicate"]);

    assert_eq!(code, 1);
    assert!(stderr.contains("--frobnicate"));
}

#[test]
fn test_url_is_required() {
    let (_, stderr, code) = run(&["getca", "-c", "ca-"]);

    assert_eq!(code, 1);
    assert!(stderr.contains("validation error: SCEP server URL required"));
}

#[test]
fn test_enroll_requires_request_key() {
    let dir = tempdir().unwrap();
    let files = write_enroll_files(dir.path());
    let ca = path_arg(&files.ca_cert);

    let (_, stderr, code) = run(&["enroll", "-u", "http://ca.example/scep", "-c", &ca]);

    assert_eq!(code, 1);
    assert!(stderr.contains("Key of CSR missing"));
}

#[test]
fn test_missing_credential_file_names_flag() {
    let dir = tempdir().unwrap();
    let missing = path_arg(&dir.path().join("absent.pem"));

    let (_, stderr, code) = run(&["getcrl", "-u", "http://ca.example/scep", "-c", &missing]);

    assert_eq!(code, 1);
    assert!(stderr.contains("credential error"));
    assert!(stderr.contains("-c"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_getca_end_to_end() {
    let server = MockServer::start().await;
    let certs = vec![
        certificate_der("root.example"),
        certificate_der("issuing.example"),
        certificate_der("ra.example"),
    ];
    Mock::given(method("GET"))
        .and(query_param("operation", "GetCACert"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", CONTENT_TYPE_CA_RA_CERT)
                .set_body_bytes(certs_only(&certs)),
        )
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let prefix = path_arg(&dir.path().join("ca-"));
    let url = format!("{}/scep", server.uri());

    let (stdout, stderr, code) = run(&[
        "getca", "-u", &url, "-c", &prefix, "-F", "sha1", "-s", "7", "extra",
    ]);

    assert_eq!(code, 0, "stderr: {stderr}");
    assert_eq!(stdout.matches("certificate written as").count(), 3);
    assert!(stdout.contains("SHA1 Fingerprint="));
    for index in 0..3 {
        assert!(dir.path().join(format!("ca-{index}")).exists());
    }
    assert!(stderr.contains("Option -s has no effect on GetCACert"));
    assert!(stderr.contains("Extra argument 'extra' ignored"));
}

#[test]
fn test_enroll_with_bundled_engine_reports_crypto_error() {
    let dir = tempdir().unwrap();
    let files = write_enroll_files(dir.path());
    let ca = path_arg(&files.ca_cert);
    let key = path_arg(&files.key);
    let request = path_arg(&files.request);
    let target = path_arg(&dir.path().join("issued.pem"));
    let self_signed = path_arg(&dir.path().join("selfsigned.pem"));

    let (_, stderr, code) = run(&[
        "enroll",
        "-u",
        "http://127.0.0.1:9/scep",
        "-c",
        &ca,
        "-k",
        &key,
        "-r",
        &request,
        "-l",
        &target,
        "-L",
        &self_signed,
        "-v",
    ]);

    assert_eq!(code, 1);
    assert!(stderr.contains("crypto error"));
    assert!(stderr.contains("Signing request with a self-signed certificate"));
    assert!(dir.path().join("selfsigned.pem").exists());
    assert!(!dir.path().join("issued.pem").exists());
}

#[test]
fn test_getcrl_is_not_implemented() {
    let dir = tempdir().unwrap();
    let files = write_enroll_files(dir.path());
    let ca = path_arg(&files.ca_cert);
    let key = path_arg(&files.signer_key);
    let local = path_arg(&files.signer_cert);
    let out = path_arg(&dir.path().join("crl.der"));

    let (_, stderr, code) = run(&[
        "getcrl",
        "-u",
        "http://127.0.0.1:9/scep",
        "-c",
        &ca,
        "-k",
        &key,
        "-l",
        &local,
        "-w",
        &out,
    ]);

    assert_eq!(code, 1);
    assert!(stderr.contains("not implemented"));
    assert!(stderr.contains("GetCRL"));
}
