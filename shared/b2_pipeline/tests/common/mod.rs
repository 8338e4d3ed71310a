// Not every helper is used in every test binary
#![allow(dead_code)]

use b2_pipeline::test_utils::MockB2Server;

/// Initializes tracing once for the test binary
pub fn setup_test_env() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init()
        .ok();
}

/// Starts a mock B2 server with the default account
pub async fn start_mock() -> MockB2Server {
    setup_test_env();
    MockB2Server::start().await
}

/// A 10-byte payload starting with the JPEG SOI marker
pub fn jpeg_bytes() -> Vec<u8> {
    vec![0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10, 0x4a, 0x46, 0x49, 0x46]
}

/// Asserts `name` looks like `file_<13-digit millis>.<extension>`
pub fn assert_stored_name(name: &str, extension: &str) {
    let millis = name
        .strip_prefix("file_")
        .and_then(|rest| rest.strip_suffix(&format!(".{extension}")))
        .unwrap_or_else(|| panic!("unexpected stored name: {name}"));
    assert_eq!(millis.len(), 13, "unexpected stored name: {name}");
    assert!(millis.chars().all(|c| c.is_ascii_digit()), "unexpected stored name: {name}");
}

/// Base URL of a local port nothing listens on
pub fn unreachable_base_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{addr}")
}
