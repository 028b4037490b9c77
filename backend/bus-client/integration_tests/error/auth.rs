use bus_client::error::AuthError;

use std::io::Error as IoError;
use std::io::ErrorKind;

/// **VALUE**: Verifies that `?` on an I/O error records where it happened.
///
/// **WHY THIS MATTERS**: The handshake has several read and write points.
/// The location tells which one broke.
///
/// **BUG THIS CATCHES**: Would catch removal of `#[track_caller]` from the
/// `From<io::Error>` impl, which would point every error at error/auth.rs.
#[test]
fn given_io_error_when_converted_then_location_is_conversion_site() {
    // GIVEN
    let io_err = IoError::new(ErrorKind::UnexpectedEof, "peer hung up");

    // WHEN
    let err = AuthError::from(io_err);

    // THEN
    let error_string = err.to_string();
    assert!(error_string.contains("Auth IO Error"));
    assert!(error_string.contains("peer hung up"));
    assert!(error_string.contains("integration_tests/error/auth.rs"));
}
