use crate::decoder::{ByteOrder, ValueDecoder};
use crate::error::decode::DecodeError;
use crate::signature::Signature;

use common::ErrorLocation;

use std::panic::Location;

/// A self-describing value: one complete type plus its encoded bytes.
///
/// The payload is a private copy, so a `Variant` outlives the buffer it was
/// read from. `origin` records where the payload sat relative to an 8-byte
/// boundary in that buffer; decoding honors it so padding lines up exactly
/// as it did in the message.
#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    signature: Signature,
    payload: Vec<u8>,
    byte_order: ByteOrder,
    origin: usize,
}

impl Variant {
    /// Wrap an encoded value that starts on an 8-byte boundary.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::InvalidData`] if `signature` is not exactly one
    /// complete type.
    #[track_caller]
    pub fn new(
        signature: Signature,
        payload: Vec<u8>,
        byte_order: ByteOrder,
    ) -> Result<Self, DecodeError> {
        if !signature.is_single_complete_type() {
            return Err(DecodeError::InvalidData {
                message: format!(
                    "Variant signature {:?} is not a single complete type",
                    signature.as_str()
                ),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        Ok(Self::with_origin(signature, payload, byte_order, 0))
    }

    pub(crate) fn with_origin(
        signature: Signature,
        payload: Vec<u8>,
        byte_order: ByteOrder,
        origin: usize,
    ) -> Self {
        Self {
            signature,
            payload,
            byte_order,
            origin: origin % 8,
        }
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub fn origin(&self) -> usize {
        self.origin
    }

    /// A cursor over the single contained value.
    pub fn decoder(&self) -> ValueDecoder<'_> {
        ValueDecoder::with_origin(&self.payload, self.origin, &self.signature, self.byte_order)
    }
}
