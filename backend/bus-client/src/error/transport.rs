use common::ErrorLocation;

use std::io::Error as IoError;

use thiserror::Error as ThisError;

/// A single transport candidate could not produce a channel.
///
/// These are absorbed by the bootstrap, which moves on to the next candidate.
#[derive(Debug, ThisError)]
pub enum TransportError {
    #[error("Missing Option Error: {message} {location}")]
    MissingOption {
        message: String,
        location: ErrorLocation,
    },

    #[error("Unsupported Transport Error: {message} {location}")]
    Unsupported {
        message: String,
        location: ErrorLocation,
    },

    #[error("Socket Error: {message} {location}")]
    Socket {
        message: String,
        location: ErrorLocation,
        #[source]
        source: IoError,
    },

    #[error("Invalid Channel Error: {message} {location}")]
    Invalid {
        message: String,
        location: ErrorLocation,
    },
}
