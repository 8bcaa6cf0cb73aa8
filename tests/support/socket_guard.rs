//! Skips socket-bound integration tests where binding localhost is forbidden.
//!
//! Mirrors `src/test_support/socket_guard.rs`, which is compiled only into
//! the library's own unit tests and is unreachable from here.

use std::net::TcpListener;
use std::panic::Location;

use wiremock::MockServer;

/// Set `DOWNLOAD_UNPACK_REQUIRE_SOCKET_TESTS=1` to fail instead of skipping
/// when localhost sockets are unavailable.
#[must_use]
pub fn socket_tests_required() -> bool {
    std::env::var("DOWNLOAD_UNPACK_REQUIRE_SOCKET_TESTS")
        .ok()
        .is_some_and(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

#[track_caller]
#[must_use]
pub fn should_skip_socket_bound_test() -> bool {
    if TcpListener::bind("127.0.0.1:0").is_ok() {
        return false;
    }

    let location = Location::caller();
    let message = format!(
        "[socket-bound-test] cannot bind localhost socket at {}:{}",
        location.file(),
        location.line()
    );
    assert!(
        !socket_tests_required(),
        "{message}; DOWNLOAD_UNPACK_REQUIRE_SOCKET_TESTS is set"
    );

    eprintln!("{message}. Skipping test.");
    true
}

/// Starts a wiremock server, or returns `None` when the sandbox forbids
/// binding a local socket.
pub async fn start_mock_server_or_skip() -> Option<MockServer> {
    if should_skip_socket_bound_test() {
        None
    } else {
        Some(MockServer::start().await)
    }
}
