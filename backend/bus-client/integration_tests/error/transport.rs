use bus_client::error::{CoreError, TransportError};
use common::ErrorLocation;

use std::error::Error;
use std::io::Error as IoError;
use std::io::ErrorKind;
use std::panic::Location;

/// **VALUE**: Verifies that `TransportError::Socket` keeps both its location
/// and the underlying I/O error.
///
/// **WHY THIS MATTERS**: A failed connect is logged per candidate. Without
/// the OS error ("No such file", "Permission denied") the log is useless.
///
/// **BUG THIS CATCHES**: Would catch if someone drops `#[source]` from the
/// variant or stops rendering the location.
#[test]
#[track_caller]
fn given_socket_error_when_formatted_then_includes_location_and_source() {
    // GIVEN: A socket error wrapping an I/O error
    let io_err = IoError::new(ErrorKind::NotFound, "no such socket");
    let err = TransportError::Socket {
        message: "Unable to connect".to_string(),
        location: ErrorLocation::from(Location::caller()),
        source: io_err,
    };

    // WHEN
    let error_string = err.to_string();

    // THEN
    assert!(error_string.contains("Socket Error"));
    assert!(error_string.contains("Unable to connect"));
    assert!(error_string.contains("transport.rs"));
    assert_eq!(err.source().unwrap().to_string(), "no such socket");
}

#[test]
#[track_caller]
fn given_transport_error_when_wrapped_in_core_error_then_display_is_transparent() {
    // GIVEN
    let err = TransportError::MissingOption {
        message: "no path".to_string(),
        location: ErrorLocation::from(Location::caller()),
    };
    let expected = err.to_string();

    // WHEN
    let core: CoreError = err.into();

    // THEN
    assert_eq!(core.to_string(), expected);
    assert!(matches!(core, CoreError::Transport(_)));
}
