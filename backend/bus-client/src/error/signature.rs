use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum SignatureError {
    #[error("Malformed Signature Error: {signature:?}: {message} {location}")]
    Malformed {
        signature: String,
        message: String,
        location: ErrorLocation,
    },
}
