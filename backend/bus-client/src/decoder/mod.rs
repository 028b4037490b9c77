//! Signature-driven decoding of wire-format values.
//!
//! A [`ValueDecoder`] is a cursor over a borrowed byte buffer. It reads the
//! element under the cursor on demand, steps to the next sibling with
//! [`ValueDecoder::next`], and descends into containers with
//! [`ValueDecoder::recurse`]. Sub-cursors borrow the same buffer and never
//! move their parent.
//!
//! ```
//! use bus_client::decoder::{ByteOrder, decode};
//! use bus_client::signature::Signature;
//!
//! let signature = Signature::parse("ai").unwrap();
//! let buffer = [8, 0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0];
//! let decoder = decode(&buffer, &signature, ByteOrder::Little);
//!
//! let values: Vec<i32> = decoder.get_vec().unwrap();
//! assert_eq!(values, vec![1, 2]);
//! ```

pub mod byte_order;
pub mod extract;
pub(crate) mod reader;
pub mod value_decoder;

pub use byte_order::ByteOrder;
pub use extract::FromDecoder;
pub use reader::{MAX_ARRAY_LENGTH, MAX_DEPTH};
pub use value_decoder::ValueDecoder;

use crate::signature::Signature;

/// A cursor positioned at the first element of `buffer`, read as `signature`.
///
/// `buffer` must start on an 8-byte boundary of the original message.
pub fn decode<'a>(
    buffer: &'a [u8],
    signature: &'a Signature,
    byte_order: ByteOrder,
) -> ValueDecoder<'a> {
    ValueDecoder::with_origin(buffer, 0, signature, byte_order)
}
