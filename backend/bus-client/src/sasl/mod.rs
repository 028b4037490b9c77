//! SASL authentication handshake.
//!
//! Before any binary message may flow, the client proves its identity with a
//! line-oriented text exchange:
//!
//! ```text
//! C: \0
//! C: AUTH EXTERNAL 31303030
//! S: OK 1234deadbeef...
//! C: NEGOTIATE_UNIX_FD
//! S: AGREE_UNIX_FD
//! C: BEGIN
//! ```
//!
//! [`SaslMachine`] holds the protocol logic without I/O. [`SaslClient`] drives
//! it over any async byte stream, bounding every round trip by a timeout.
//! [`authenticate`] runs the exchange on a [`Channel`] and flips it into
//! binary mode on success.

pub mod machine;
pub mod mechanism;

pub use machine::{ClientCommand, HandshakeResult, SaslMachine, SaslState, ServerReply, Step};
pub use mechanism::{
    Anonymous, AuthMechanism, CookieSha1, External, MechanismKind, default_mechanisms,
};

use crate::channel::{Channel, ChannelMode};
use crate::error::auth::AuthError;

use common::ErrorLocation;

use std::panic::Location;
use std::path::PathBuf;
use std::time::Duration;

use log::{debug, trace};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout as TokioTimeout;

/// Sent before the first command; lets the server read credentials.
const NUL_BYTE: u8 = 0;
const MAX_LINE_LENGTH: usize = 16 * 1024;
/// Guards against a peer that keeps sending challenges forever.
const MAX_ROUND_TRIPS: usize = 32;

pub const DEFAULT_ROUND_TRIP_TIMEOUT: Duration = Duration::from_secs(5);

/// Handshake parameters.
#[derive(Debug, Clone)]
pub struct HandshakeOptions {
    pub mechanisms: Vec<MechanismKind>,
    pub negotiate_unix_fd: bool,
    pub round_trip_timeout: Duration,
    /// Overrides `~/.dbus-keyrings` for `DBUS_COOKIE_SHA1`.
    pub keyring_dir: Option<PathBuf>,
}

impl Default for HandshakeOptions {
    fn default() -> Self {
        Self {
            mechanisms: default_mechanisms(),
            negotiate_unix_fd: true,
            round_trip_timeout: DEFAULT_ROUND_TRIP_TIMEOUT,
            keyring_dir: None,
        }
    }
}

impl HandshakeOptions {
    fn build_mechanisms(&self) -> Vec<Box<dyn AuthMechanism>> {
        self.mechanisms
            .iter()
            .map(|kind| kind.build(self.keyring_dir.as_deref()))
            .collect()
    }
}

/// Async driver for [`SaslMachine`].
pub struct SaslClient {
    machine: SaslMachine,
    round_trip_timeout: Duration,
}

impl SaslClient {
    pub fn new(
        mechanisms: Vec<Box<dyn AuthMechanism>>,
        negotiate_unix_fd: bool,
        round_trip_timeout: Duration,
    ) -> Self {
        Self {
            machine: SaslMachine::new(mechanisms, negotiate_unix_fd),
            round_trip_timeout,
        }
    }

    pub fn from_options(options: &HandshakeOptions, negotiate_unix_fd: bool) -> Self {
        Self::new(
            options.build_mechanisms(),
            negotiate_unix_fd,
            options.round_trip_timeout,
        )
    }

    /// Run the whole exchange over `stream`.
    ///
    /// Returns only once `BEGIN` has been written or the handshake failed.
    /// No byte past the server's final reply line is consumed.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Io`] - the stream failed or closed mid-exchange
    /// - [`AuthError::Timeout`] - a round trip exceeded the timeout
    /// - [`AuthError::Protocol`] - an overlong or non-UTF-8 line, or a reply the
    ///   current state does not allow
    /// - [`AuthError::Rejected`] - every mechanism was refused
    pub async fn run<S>(&mut self, stream: &mut S) -> Result<HandshakeResult, AuthError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        stream.write_all(&[NUL_BYTE]).await?;

        let mut step = self.machine.start();
        let mut round_trips = 0;

        while let Step::Send(command) = step {
            send_command(stream, &command).await?;

            if self.machine.is_finished() {
                break;
            }

            round_trips += 1;
            if round_trips > MAX_ROUND_TRIPS {
                return Err(AuthError::Protocol {
                    message: format!("Handshake exceeded {MAX_ROUND_TRIPS} round trips"),
                    location: ErrorLocation::from(Location::caller()),
                });
            }

            let line = TokioTimeout(self.round_trip_timeout, read_line(stream))
                .await
                .map_err(|_| AuthError::Timeout {
                    message: format!(
                        "No reply to {command} within {:?}",
                        self.round_trip_timeout
                    ),
                    location: ErrorLocation::from(Location::caller()),
                })??;
            trace!("SASL <- {line}");

            step = self.machine.on_reply(ServerReply::parse(&line));
        }

        let result = self.machine.result();
        if result.authenticated {
            return Ok(result);
        }

        match self.machine.protocol_violation() {
            Some(reason) => Err(AuthError::Protocol {
                message: reason.to_string(),
                location: ErrorLocation::from(Location::caller()),
            }),
            None => Err(AuthError::Rejected {
                message: "Server rejected every offered mechanism".to_string(),
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }
}

async fn send_command<S>(stream: &mut S, command: &ClientCommand) -> Result<(), AuthError>
where
    S: AsyncWrite + Unpin,
{
    trace!("SASL -> {command}");
    stream.write_all(command.to_line().as_bytes()).await?;
    stream.flush().await?;
    Ok(())
}

/// Read one `\r\n`-terminated line a byte at a time, so nothing beyond it is buffered.
async fn read_line<S>(stream: &mut S) -> Result<String, AuthError>
where
    S: AsyncRead + Unpin,
{
    let mut line = Vec::new();

    loop {
        let byte = stream.read_u8().await?;
        line.push(byte);

        if line.ends_with(b"\r\n") {
            line.truncate(line.len() - 2);
            break;
        }
        if line.len() > MAX_LINE_LENGTH {
            return Err(AuthError::Protocol {
                message: format!("Reply line exceeds {MAX_LINE_LENGTH} bytes"),
                location: ErrorLocation::from(Location::caller()),
            });
        }
    }

    String::from_utf8(line).map_err(|e| AuthError::Protocol {
        message: format!("Reply line is not UTF-8: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })
}

/// Authenticate `channel`, switching it to binary mode on success.
///
/// # Errors
///
/// - [`AuthError::Protocol`] - the channel already finished its handshake;
///   nothing is written to it
/// - any other [`AuthError`] from [`SaslClient::run`]. The caller must close
///   the channel: a failed handshake is terminal for this candidate.
pub async fn authenticate_with(
    channel: &mut Channel,
    options: &HandshakeOptions,
) -> Result<HandshakeResult, AuthError> {
    if channel.mode() != ChannelMode::Handshake {
        return Err(AuthError::Protocol {
            message: "Channel is already in binary mode".to_string(),
            location: ErrorLocation::from(Location::caller()),
        });
    }

    let wants_fd = options.negotiate_unix_fd && channel.is_fd_passing_capable();
    let mut client = SaslClient::from_options(options, wants_fd);

    let result = client.run(channel.handshake_stream()).await?;
    channel.enter_binary_mode(result.server_id.clone(), result.fd_passing_agreed);
    Ok(result)
}

/// Authenticate with the default mechanism list.
///
/// Never fails outright: any error is reported as `authenticated == false`.
pub async fn authenticate(channel: &mut Channel, wants_fd_passing: bool) -> HandshakeResult {
    let options = HandshakeOptions {
        negotiate_unix_fd: wants_fd_passing,
        ..HandshakeOptions::default()
    };

    match authenticate_with(channel, &options).await {
        Ok(result) => result,
        Err(e) => {
            debug!("Did not authenticate with server: {e}");
            HandshakeResult::default()
        }
    }
}
