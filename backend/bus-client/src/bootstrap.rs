//! Connection bootstrap: address → candidates → first channel that opens and
//! authenticates.
//!
//! Candidates are tried strictly in order, one at a time. A candidate that
//! fails to open or to authenticate is logged and skipped; only when every
//! candidate is exhausted does the caller see an error.

use crate::address::{TransportSpec, parse_address};
use crate::channel::Channel;
use crate::config::{BusConfig, BusType};
use crate::error::CoreError;
use crate::error::connection::ConnectionError;
use crate::sasl::{HandshakeOptions, authenticate_with};
use crate::transport::open_transport;

use common::ErrorLocation;

use std::panic::Location;

use log::{debug, info, warn};

/// Options for [`open_connection_with`].
#[derive(Debug, Clone, Default)]
pub struct ConnectionOptions {
    pub handshake: HandshakeOptions,
}

impl From<&BusConfig> for ConnectionOptions {
    fn from(config: &BusConfig) -> Self {
        Self {
            handshake: config.handshake.to_options(),
        }
    }
}

/// Open and authenticate a channel to `address` with default options.
///
/// # Examples
///
/// ```no_run
/// use bus_client::bootstrap::open_connection;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let channel = open_connection("unix:path=/run/user/1000/bus").await?;
///     println!("connected to {}", String::from_utf8_lossy(channel.server_id()));
///     Ok(())
/// }
/// ```
pub async fn open_connection(address: &str) -> Result<Channel, ConnectionError> {
    open_connection_with(address, &ConnectionOptions::default()).await
}

/// Open and authenticate a channel to `address`.
///
/// # Errors
///
/// - [`ConnectionError::AddressSyntaxEmpty`] - the address held no candidates
/// - [`ConnectionError::NoTransportAvailable`] - every candidate failed
pub async fn open_connection_with(
    address: &str,
    options: &ConnectionOptions,
) -> Result<Channel, ConnectionError> {
    let candidates = parse_address(address);
    if candidates.is_empty() {
        return Err(ConnectionError::AddressSyntaxEmpty {
            message: format!("Address {address:?} contains no transport candidates"),
            location: ErrorLocation::from(Location::caller()),
        });
    }

    let mut failures = Vec::with_capacity(candidates.len());

    for candidate in &candidates {
        match try_candidate(candidate, options).await {
            Ok(channel) => {
                info!("Connected via {candidate}");
                return Ok(channel);
            }
            Err(reason) => {
                debug!("Candidate {candidate} failed: {reason}");
                failures.push(format!("{candidate}: {reason}"));
            }
        }
    }

    warn!(
        "No transport available among {} candidate(s)",
        candidates.len()
    );
    Err(ConnectionError::NoTransportAvailable {
        message: format!("All {} candidate(s) of {address:?} failed", candidates.len()),
        location: ErrorLocation::from(Location::caller()),
        failures,
    })
}

/// Open, then authenticate. Authentication never starts before the socket is live.
async fn try_candidate(
    candidate: &TransportSpec,
    options: &ConnectionOptions,
) -> Result<Channel, String> {
    let mut channel = open_transport(candidate)
        .await
        .map_err(|e| e.to_string())?;

    match authenticate_with(&mut channel, &options.handshake).await {
        Ok(result) => {
            debug!(
                "Authenticated with server {} (fd passing: {})",
                String::from_utf8_lossy(&result.server_id),
                result.fd_passing_agreed
            );
            Ok(channel)
        }
        Err(e) => {
            if let Err(close_error) = channel.close().await {
                debug!("Error closing unauthenticated channel: {close_error}");
            }
            Err(e.to_string())
        }
    }
}

/// Resolve the address for `bus_type` and connect with options from `config`.
///
/// # Errors
///
/// - [`CoreError::Config`] - no address configured or in the environment
/// - [`CoreError::Connection`] - see [`open_connection_with`]
pub async fn open_bus(bus_type: BusType, config: &BusConfig) -> Result<Channel, CoreError> {
    let address = config.resolve_address(bus_type)?;
    let options = ConnectionOptions::from(config);
    Ok(open_connection_with(&address, &options).await?)
}
