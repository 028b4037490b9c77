use crate::error::signature::SignatureError;

use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum DecodeError {
    #[error("Invalid Typecast Error: expected {expected}, found {found} {location}")]
    InvalidTypecast {
        expected: String,
        found: String,
        location: ErrorLocation,
    },

    #[error("Buffer Underrun Error: need {needed} bytes at offset {offset}, have {available} {location}")]
    BufferUnderrun {
        offset: usize,
        needed: usize,
        available: usize,
        location: ErrorLocation,
    },

    #[error("Invalidated Cursor Error: {message} {location}")]
    Invalidated {
        message: String,
        location: ErrorLocation,
    },

    #[error("Invalid Data Error: {message} {location}")]
    InvalidData {
        message: String,
        location: ErrorLocation,
    },

    #[error("Nesting Too Deep Error: {message} {location}")]
    NestingTooDeep {
        message: String,
        location: ErrorLocation,
    },

    #[error(transparent)]
    Signature(#[from] SignatureError),
}
