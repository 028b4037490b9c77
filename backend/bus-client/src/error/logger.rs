use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum LoggerError {
    #[error("Logger Init Error: {message} {location}")]
    Init {
        message: String,
        location: ErrorLocation,
    },
}
