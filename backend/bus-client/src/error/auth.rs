use common::ErrorLocation;

use std::io::Error as IoError;
use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum AuthError {
    #[error("Auth IO Error: {message} {location}")]
    Io {
        message: String,
        location: ErrorLocation,
    },

    #[error("Auth Timeout Error: {message} {location}")]
    Timeout {
        message: String,
        location: ErrorLocation,
    },

    #[error("Auth Protocol Error: {message} {location}")]
    Protocol {
        message: String,
        location: ErrorLocation,
    },

    #[error("Auth Rejected Error: {message} {location}")]
    Rejected {
        message: String,
        location: ErrorLocation,
    },

    #[error("Auth Mechanism Error: {message} {location}")]
    Mechanism {
        message: String,
        location: ErrorLocation,
    },
}

impl From<IoError> for AuthError {
    #[track_caller]
    fn from(error: IoError) -> Self {
        AuthError::Io {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
