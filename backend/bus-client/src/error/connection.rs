use common::ErrorLocation;

use thiserror::Error as ThisError;

/// Overall bootstrap failure, surfaced only once every candidate is exhausted.
#[derive(Debug, ThisError)]
pub enum ConnectionError {
    /// The address produced zero transport candidates.
    #[error("Address Syntax Error: {message} {location}")]
    AddressSyntaxEmpty {
        message: String,
        location: ErrorLocation,
    },

    /// Every candidate either failed to open or failed to authenticate.
    #[error("No Transport Available Error: {message} {location}")]
    NoTransportAvailable {
        message: String,
        location: ErrorLocation,
        failures: Vec<String>,
    },
}
