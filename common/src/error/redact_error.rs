use crate::ErrorLocation;

use thiserror::Error as ThisError;

/// Raised when something tries to serialize a [`RedactedSecret`](crate::RedactedSecret).
#[derive(Debug, ThisError)]
pub enum RedactError {
    #[error("Secret Serialization Error: {message} {location}")]
    Serialization {
        message: String,
        location: ErrorLocation,
    },
}
