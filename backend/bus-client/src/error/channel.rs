use common::ErrorLocation;

use std::io::Error as IoError;
use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum ChannelError {
    #[error("Channel Mode Error: {message} {location}")]
    NotBinary {
        message: String,
        location: ErrorLocation,
    },

    #[error("Channel IO Error: {message} {location}")]
    Io {
        message: String,
        location: ErrorLocation,
    },
}

impl From<IoError> for ChannelError {
    #[track_caller]
    fn from(error: IoError) -> Self {
        ChannelError::Io {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
