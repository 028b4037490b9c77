use crate::address::parse_address;
use crate::error::transport::TransportError;
use crate::transport::{TransportKind, UnixTarget, checked_channel, open_transport};

use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;

#[test]
fn given_path_and_abstract_when_target_resolved_then_path_wins() {
    let specs = parse_address("unix:abstract=/tmp/abs,path=/tmp/real");

    let target = UnixTarget::from_spec(&specs[0]).unwrap();

    assert_eq!(target, UnixTarget::Path("/tmp/real".to_string()));
}

#[test]
fn given_only_abstract_when_target_resolved_then_abstract_used() {
    let specs = parse_address("unix:abstract=/tmp/dbus-XYZ,guid=1");

    let target = UnixTarget::from_spec(&specs[0]).unwrap();

    assert_eq!(target, UnixTarget::Abstract("/tmp/dbus-XYZ".to_string()));
}

#[test]
fn given_empty_path_when_target_resolved_then_missing_option() {
    let specs = parse_address("unix:path=,guid=1");

    let result = UnixTarget::from_spec(&specs[0]);

    assert!(matches!(result, Err(TransportError::MissingOption { .. })));
}

#[test]
fn given_transport_names_when_looked_up_then_only_unix_known() {
    assert_eq!(TransportKind::from_name("unix"), Some(TransportKind::Unix));
    assert_eq!(TransportKind::from_name("tcp"), None);
}

#[tokio::test]
async fn given_unknown_transport_when_opened_then_unsupported() {
    let specs = parse_address("tcp:host=localhost,port=1234");

    let result = open_transport(&specs[0]).await;

    assert!(matches!(result, Err(TransportError::Unsupported { .. })));
}

#[tokio::test]
async fn given_path_without_listener_when_opened_then_socket_error() {
    let dir = tempfile::tempdir().unwrap();
    let address = format!("unix:path={}", dir.path().join("absent").display());
    let specs = parse_address(&address);

    let result = open_transport(&specs[0]).await;

    assert!(matches!(result, Err(TransportError::Socket { .. })));
}

#[tokio::test]
async fn given_connected_peer_when_channel_checked_then_channel_returned() {
    let (stream, _peer) = UnixStream::pair().unwrap();
    let target = UnixTarget::Path("/tmp/live".to_string());

    let result = checked_channel(stream, &target);

    assert!(result.is_ok());
}

/// **BUG THIS CATCHES**: Handing the SASL driver a socket whose peer already
/// reset the connection, which would surface later as a confusing auth error.
#[cfg(target_os = "linux")]
#[tokio::test]
async fn given_peer_reset_before_use_when_channel_checked_then_invalid() {
    // GIVEN: A peer that closes while our bytes sit unread in its queue,
    // leaving ECONNRESET pending on our end
    let (mut stream, peer) = UnixStream::pair().unwrap();
    stream.write_all(b"unread").await.unwrap();
    drop(peer);
    let target = UnixTarget::Path("/tmp/gone".to_string());

    // WHEN
    let result = checked_channel(stream, &target);

    // THEN
    assert!(matches!(result, Err(TransportError::Invalid { .. })));
}
