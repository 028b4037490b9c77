//! Transport opening: turn one [`TransportSpec`] into a live [`Channel`].
//!
//! Every failure here is local to the candidate. The bootstrap logs it and
//! moves on to the next one.

use crate::address::TransportSpec;
use crate::channel::Channel;
use crate::error::transport::TransportError;

use common::ErrorLocation;

use std::io::Error as IoError;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::panic::Location;

use log::debug;
use tokio::net::UnixStream;
use tokio::task::spawn_blocking;

pub const UNIX_TRANSPORT: &str = "unix";
pub const PATH_OPTION: &str = "path";
pub const ABSTRACT_OPTION: &str = "abstract";

/// Transports this client knows how to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Unix,
}

impl TransportKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            UNIX_TRANSPORT => Some(TransportKind::Unix),
            _ => None,
        }
    }
}

/// Where a unix-domain socket lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnixTarget {
    Path(String),
    Abstract(String),
}

impl UnixTarget {
    /// `path` wins over `abstract` when both are present.
    #[track_caller]
    pub fn from_spec(spec: &TransportSpec) -> Result<Self, TransportError> {
        if let Some(path) = spec.option(PATH_OPTION) {
            return Ok(UnixTarget::Path(path.to_string()));
        }
        if let Some(name) = spec.option(ABSTRACT_OPTION) {
            return Ok(UnixTarget::Abstract(name.to_string()));
        }
        Err(TransportError::MissingOption {
            message: format!("'{spec}' has neither '{PATH_OPTION}' nor '{ABSTRACT_OPTION}'"),
            location: ErrorLocation::from(Location::caller()),
        })
    }
}

/// Attempt to open a channel for one candidate.
///
/// # Errors
///
/// - [`TransportError::Unsupported`] - transport name is not known
/// - [`TransportError::MissingOption`] - required option absent or empty
/// - [`TransportError::Socket`] - connect, credential passing or non-blocking setup failed
/// - [`TransportError::Invalid`] - the socket connected but is not usable
pub async fn open_transport(spec: &TransportSpec) -> Result<Channel, TransportError> {
    match TransportKind::from_name(spec.name()) {
        Some(TransportKind::Unix) => open_unix(spec).await,
        None => Err(TransportError::Unsupported {
            message: format!("Transport '{}' is not supported", spec.name()),
            location: ErrorLocation::from(Location::caller()),
        }),
    }
}

async fn open_unix(spec: &TransportSpec) -> Result<Channel, TransportError> {
    let target = UnixTarget::from_spec(spec)?;

    // connect(2) blocks while the listen backlog is full.
    let connect_target = target.clone();
    let stream = spawn_blocking(move || connect_unix(&connect_target))
        .await
        .map_err(|e| TransportError::Socket {
            message: format!("Connect task for {target:?} did not complete: {e}"),
            location: ErrorLocation::from(Location::caller()),
            source: IoError::other(e),
        })??;
    debug!("Opened unix socket to {target:?}");

    enable_pass_credentials(&stream)?;

    stream.set_nonblocking(true).map_err(|e| TransportError::Socket {
        message: format!("Unable to make socket non-blocking: {e}"),
        location: ErrorLocation::from(Location::caller()),
        source: e,
    })?;

    let stream = UnixStream::from_std(stream).map_err(|e| TransportError::Socket {
        message: format!("Unable to register socket with the runtime: {e}"),
        location: ErrorLocation::from(Location::caller()),
        source: e,
    })?;

    checked_channel(stream, &target)
}

/// Wrap a connected stream, discarding it if the socket is already unusable.
pub(crate) fn checked_channel(
    stream: UnixStream,
    target: &UnixTarget,
) -> Result<Channel, TransportError> {
    let channel = Channel::new(stream, true);
    if !channel.is_valid() {
        debug!("Discarding unusable socket to {target:?}");
        return Err(TransportError::Invalid {
            message: format!("Socket to {target:?} connected but is not usable"),
            location: ErrorLocation::from(Location::caller()),
        });
    }

    Ok(channel)
}

fn connect_unix(target: &UnixTarget) -> Result<StdUnixStream, TransportError> {
    let connected = match target {
        UnixTarget::Path(path) => StdUnixStream::connect(path),
        UnixTarget::Abstract(name) => connect_abstract(name),
    };

    connected.map_err(|e| TransportError::Socket {
        message: format!("Unable to connect to {target:?}: {e}"),
        location: ErrorLocation::from(Location::caller()),
        source: e,
    })
}

#[cfg(target_os = "linux")]
fn connect_abstract(name: &str) -> Result<StdUnixStream, IoError> {
    use std::os::linux::net::SocketAddrExt;
    use std::os::unix::net::SocketAddr;

    let address = SocketAddr::from_abstract_name(name.as_bytes())?;
    StdUnixStream::connect_addr(&address)
}

#[cfg(not(target_os = "linux"))]
fn connect_abstract(_name: &str) -> Result<StdUnixStream, IoError> {
    Err(IoError::new(
        std::io::ErrorKind::Unsupported,
        "abstract sockets are only available on Linux",
    ))
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn enable_pass_credentials(stream: &StdUnixStream) -> Result<(), TransportError> {
    use nix::sys::socket::{setsockopt, sockopt::PassCred};

    setsockopt(stream, PassCred, &true).map_err(|errno| {
        let source = IoError::from(errno);
        TransportError::Socket {
            message: format!("Unable to set passcred: {source}"),
            location: ErrorLocation::from(Location::caller()),
            source,
        }
    })
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn enable_pass_credentials(_stream: &StdUnixStream) -> Result<(), TransportError> {
    // Credentials travel implicitly with SCM_CREDS elsewhere.
    Ok(())
}
