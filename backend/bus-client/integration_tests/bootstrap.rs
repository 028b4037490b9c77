use crate::fake_bus::FakeBus;

use bus_client::bootstrap::{ConnectionOptions, open_bus, open_connection, open_connection_with};
use bus_client::channel::ChannelMode;
use bus_client::config::{BusConfig, BusType};
use bus_client::error::{ConnectionError, CoreError};
use bus_client::sasl::{HandshakeOptions, MechanismKind};

use std::time::Duration;

fn options(mechanisms: &[MechanismKind], negotiate_unix_fd: bool) -> ConnectionOptions {
    ConnectionOptions {
        handshake: HandshakeOptions {
            mechanisms: mechanisms.to_vec(),
            negotiate_unix_fd,
            round_trip_timeout: Duration::from_secs(5),
            keyring_dir: None,
        },
    }
}

/// **VALUE**: End-to-end bootstrap against a live socket.
///
/// **WHY THIS MATTERS**: Parsing, opening, authenticating and the switch
/// to binary mode must compose; each is tested alone elsewhere.
#[tokio::test]
async fn given_accepting_bus_when_connecting_then_channel_is_binary_and_authenticated() {
    // GIVEN: A bus that accepts the first AUTH and agrees to fd passing
    let bus = FakeBus::start(&["OK 0123456789abcdef0123456789abcdef", "AGREE_UNIX_FD"]);

    // WHEN
    let mut channel = open_connection(&bus.address()).await.unwrap();

    // THEN: The channel is ready for binary traffic
    assert_eq!(channel.mode(), ChannelMode::Binary);
    assert_eq!(channel.server_id(), b"0123456789abcdef0123456789abcdef");
    assert!(channel.is_fd_passing_agreed());

    channel.write_all(b"binary\n").await.unwrap();
    drop(channel);

    let received = bus.received().await;
    assert!(received[0].starts_with("AUTH EXTERNAL "));
    assert_eq!(received[1..], ["NEGOTIATE_UNIX_FD", "BEGIN", "binary"]);
}

#[tokio::test]
async fn given_bus_rejecting_first_mechanism_when_connecting_then_next_mechanism_succeeds() {
    // GIVEN: A bus that only takes ANONYMOUS
    let bus = FakeBus::start(&["REJECTED ANONYMOUS", "OK feedface"]);
    let options = options(&[MechanismKind::External, MechanismKind::Anonymous], false);

    // WHEN
    let channel = open_connection_with(&bus.address(), &options)
        .await
        .unwrap();
    drop(channel);

    // THEN
    let received = bus.received().await;
    assert_eq!(received.len(), 3);
    assert!(received[0].starts_with("AUTH EXTERNAL "));
    assert_eq!(received[1], format!("AUTH ANONYMOUS {}", hex::encode("bus-client")));
    assert_eq!(received[2], "BEGIN");
}

/// **VALUE**: An authentication failure moves on to the next candidate.
///
/// **BUG THIS CATCHES**: Returning "no connection" as soon as one bus
/// refuses us, even though a later candidate would accept.
#[tokio::test]
async fn given_first_bus_rejects_everything_when_connecting_then_second_candidate_is_used() {
    // GIVEN: Two candidates, the first refusing all mechanisms
    let refusing = FakeBus::start(&["REJECTED"]);
    let accepting = FakeBus::start(&["OK cafe"]);
    let address = format!("{};{}", refusing.address(), accepting.address());
    let options = options(&[MechanismKind::External], false);

    // WHEN
    let channel = open_connection_with(&address, &options).await.unwrap();

    // THEN: Connected to the second bus; the first saw one AUTH and a hang-up
    assert_eq!(channel.server_id(), b"cafe");
    drop(channel);
    assert_eq!(refusing.received().await.len(), 1);
    assert_eq!(accepting.received().await.len(), 2);
}

#[tokio::test]
async fn given_unreachable_and_pathless_candidates_when_connecting_then_live_one_is_used() {
    // GIVEN: A missing socket, an empty path, then a live bus
    let bus = FakeBus::start(&["OK 42"]);
    let address = format!(
        "unix:path=/nonexistent/bus-client-test;unix:path=;{}",
        bus.address()
    );

    // WHEN
    let channel = open_connection_with(&address, &options(&[MechanismKind::External], false))
        .await
        .unwrap();

    // THEN
    assert_eq!(channel.server_id(), b"42");
}

#[tokio::test]
async fn given_address_without_candidates_when_connecting_then_address_syntax_empty() {
    let result = open_connection("not-an-address").await;

    assert!(matches!(
        result,
        Err(ConnectionError::AddressSyntaxEmpty { .. })
    ));
}

#[tokio::test]
async fn given_only_failing_candidates_when_connecting_then_every_failure_reported() {
    // GIVEN: Two candidates, neither reachable
    let address = "unix:path=/nonexistent/a;tcp:host=localhost";

    // WHEN
    let result = open_connection(address).await;

    // THEN: Both failures are listed, in order
    match result {
        Err(ConnectionError::NoTransportAvailable { failures, .. }) => {
            assert_eq!(failures.len(), 2);
            assert!(failures[0].starts_with("unix:path=/nonexistent/a"));
            assert!(failures[1].contains("not supported"));
        }
        other => panic!("Expected NoTransportAvailable, got {other:?}"),
    }
}

#[tokio::test]
async fn given_configured_session_address_when_opening_bus_then_it_is_used() {
    let bus = FakeBus::start(&["OK 1", "ERROR no fds"]);
    let mut config = BusConfig::default();
    config.bus.session_address = Some(bus.address());

    let channel = open_bus(BusType::Session, &config).await.unwrap();

    assert!(!channel.is_fd_passing_agreed());
}

#[tokio::test]
async fn given_silent_bus_when_connecting_then_handshake_times_out() {
    // GIVEN: A bus that never answers, and a short round-trip bound
    let bus = FakeBus::start(&[]);
    let mut options = options(&[MechanismKind::External], false);
    options.handshake.round_trip_timeout = Duration::from_millis(100);

    // WHEN
    let result = open_connection_with(&bus.address(), &options).await;

    // THEN
    match result {
        Err(ConnectionError::NoTransportAvailable { failures, .. }) => {
            assert!(failures[0].contains("Timeout"));
        }
        other => panic!("Expected NoTransportAvailable, got {other:?}"),
    }
}

#[tokio::test]
async fn given_config_without_session_address_when_opening_bus_then_config_error() {
    let mut config = BusConfig::default();
    config.bus.session_address = None;

    // Only meaningful when the environment has no session bus either
    if std::env::var("DBUS_SESSION_BUS_ADDRESS").is_ok() {
        return;
    }

    let result = open_bus(BusType::Session, &config).await;

    assert!(matches!(result, Err(CoreError::Config(_))));
}
