use crate::channel::{Channel, ChannelMode};
use crate::error::channel::ChannelError;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

/// **VALUE**: Binary traffic is refused until the handshake has finished.
///
/// **BUG THIS CATCHES**: Application bytes interleaved with SASL lines,
/// which the peer would reject as a malformed command.
#[tokio::test]
async fn given_handshake_mode_when_binary_io_attempted_then_not_binary() {
    // GIVEN: A fresh channel
    let (stream, _peer) = UnixStream::pair().unwrap();
    let mut channel = Channel::new(stream, true);
    assert_eq!(channel.mode(), ChannelMode::Handshake);

    // WHEN
    let write = channel.write_all(b"payload").await;
    let mut buf = [0u8; 4];
    let read = channel.read(&mut buf).await;

    // THEN
    assert!(matches!(write, Err(ChannelError::NotBinary { .. })));
    assert!(matches!(read, Err(ChannelError::NotBinary { .. })));
}

#[tokio::test]
async fn given_binary_mode_when_bytes_exchanged_then_they_flow_both_ways() {
    // GIVEN: A channel switched to binary mode
    let (stream, mut peer) = UnixStream::pair().unwrap();
    let mut channel = Channel::new(stream, true);
    channel.enter_binary_mode(b"guid".to_vec(), true);

    // WHEN
    channel.write_all(b"ping").await.unwrap();
    let mut received = [0u8; 4];
    peer.read_exact(&mut received).await.unwrap();
    peer.write_all(b"pong").await.unwrap();
    let mut reply = [0u8; 4];
    let n = channel.read(&mut reply).await.unwrap();

    // THEN
    assert_eq!(&received, b"ping");
    assert_eq!(&reply[..n], &b"pong"[..n]);
    assert_eq!(channel.server_id(), b"guid");
    assert!(channel.is_fd_passing_agreed());
}

#[tokio::test]
async fn given_fd_incapable_channel_when_peer_agrees_then_fd_passing_stays_off() {
    let (stream, _peer) = UnixStream::pair().unwrap();
    let mut channel = Channel::new(stream, false);

    channel.enter_binary_mode(Vec::new(), true);

    assert!(!channel.is_fd_passing_agreed());
}

#[tokio::test]
async fn given_open_channel_when_closed_then_peer_sees_eof() {
    let (stream, mut peer) = UnixStream::pair().unwrap();
    let channel = Channel::new(stream, true);
    assert!(channel.is_valid());

    channel.close().await.unwrap();

    let mut buf = [0u8; 1];
    assert_eq!(peer.read(&mut buf).await.unwrap(), 0);
}
