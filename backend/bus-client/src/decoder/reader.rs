//! Bounds-checked, alignment-aware primitive reads.
//!
//! Every position is relative to the start of the buffer; alignment is
//! computed against `origin + position` so a payload cut out of a larger
//! message keeps the padding it was encoded with.

use crate::decoder::byte_order::ByteOrder;
use crate::error::decode::DecodeError;
use crate::signature::{Signature, TypeCode};

use common::ErrorLocation;

use std::panic::Location;

/// Upper bound on an array's byte length.
pub const MAX_ARRAY_LENGTH: usize = 64 * 1024 * 1024;
/// Upper bound on total container nesting, variants included.
pub const MAX_DEPTH: usize = 64;

/// Advance `position` to the next multiple of `alignment`, measured from `origin`.
pub(crate) fn align_offset(origin: usize, position: usize, alignment: usize) -> usize {
    let absolute = origin + position;
    position + (alignment - absolute % alignment) % alignment
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Reader<'b> {
    pub(crate) buffer: &'b [u8],
    pub(crate) origin: usize,
    pub(crate) limit: usize,
    pub(crate) byte_order: ByteOrder,
}

impl<'b> Reader<'b> {
    pub(crate) fn align(&self, position: usize, alignment: usize) -> usize {
        align_offset(self.origin, position, alignment)
    }

    #[track_caller]
    pub(crate) fn take(&self, position: usize, length: usize) -> Result<&'b [u8], DecodeError> {
        let end = position.checked_add(length);
        match end {
            Some(end) if end <= self.limit && end <= self.buffer.len() => {
                Ok(&self.buffer[position..end])
            }
            _ => Err(DecodeError::BufferUnderrun {
                offset: position,
                needed: length,
                available: self.limit.min(self.buffer.len()).saturating_sub(position),
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }

    /// Read `N` bytes after aligning to `N`, in this reader's byte order.
    fn fixed<const N: usize>(&self, position: usize) -> Result<([u8; N], usize), DecodeError> {
        let start = self.align(position, N);
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(self.take(start, N)?);
        if self.byte_order != ByteOrder::native() {
            bytes.reverse();
        }
        Ok((bytes, start + N))
    }

    pub(crate) fn read_u8(&self, position: usize) -> Result<(u8, usize), DecodeError> {
        Ok((self.take(position, 1)?[0], position + 1))
    }

    pub(crate) fn read_u16(&self, position: usize) -> Result<(u16, usize), DecodeError> {
        let (bytes, next) = self.fixed::<2>(position)?;
        Ok((u16::from_ne_bytes(bytes), next))
    }

    pub(crate) fn read_u32(&self, position: usize) -> Result<(u32, usize), DecodeError> {
        let (bytes, next) = self.fixed::<4>(position)?;
        Ok((u32::from_ne_bytes(bytes), next))
    }

    pub(crate) fn read_u64(&self, position: usize) -> Result<(u64, usize), DecodeError> {
        let (bytes, next) = self.fixed::<8>(position)?;
        Ok((u64::from_ne_bytes(bytes), next))
    }

    /// Text of `length` bytes at `start`, followed by a NUL.
    fn text(&self, start: usize, length: usize) -> Result<(&'b str, usize), DecodeError> {
        let bytes = self.take(start, length + 1)?;
        let (text, terminator) = bytes.split_at(length);
        if terminator != [0] {
            return Err(DecodeError::InvalidData {
                message: format!("String at offset {start} is not NUL-terminated"),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        let text = std::str::from_utf8(text).map_err(|e| DecodeError::InvalidData {
            message: format!("String at offset {start} is not UTF-8: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;
        Ok((text, start + length + 1))
    }

    /// `s` / `o`: 32-bit length, bytes, NUL.
    pub(crate) fn read_string(&self, position: usize) -> Result<(&'b str, usize), DecodeError> {
        let (length, start) = self.read_u32(position)?;
        self.text(start, length as usize)
    }

    /// `g`: 8-bit length, bytes, NUL.
    pub(crate) fn read_signature(&self, position: usize) -> Result<(&'b str, usize), DecodeError> {
        let (length, start) = self.read_u8(position)?;
        self.text(start, length as usize)
    }

    /// Parse a variant's embedded signature; it must be one complete type.
    pub(crate) fn read_variant_signature(
        &self,
        position: usize,
    ) -> Result<(Signature, usize), DecodeError> {
        let (text, value_start) = self.read_signature(position)?;
        let signature = Signature::parse(text)?;
        if !signature.is_single_complete_type() {
            return Err(DecodeError::InvalidData {
                message: format!("Variant signature {text:?} is not a single complete type"),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        Ok((signature, value_start))
    }

    /// Array header: returns (content start, content end).
    pub(crate) fn read_array_bounds(
        &self,
        position: usize,
        element: &TypeCode,
    ) -> Result<(usize, usize), DecodeError> {
        let (length, after_length) = self.read_u32(position)?;
        let length = length as usize;
        if length > MAX_ARRAY_LENGTH {
            return Err(DecodeError::InvalidData {
                message: format!("Array length {length} exceeds {MAX_ARRAY_LENGTH}"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        // Padding to the element alignment is present even for empty arrays.
        let content_start = self.align(after_length, element.alignment());
        self.take(after_length, content_start - after_length)?;
        self.take(content_start, length)?;
        Ok((content_start, content_start + length))
    }

    /// End offset of the value of type `code` starting (unaligned) at `position`.
    ///
    /// Arrays are skipped using their length prefix without visiting elements.
    pub(crate) fn skip(
        &self,
        code: &TypeCode,
        position: usize,
        depth: usize,
    ) -> Result<usize, DecodeError> {
        if depth > MAX_DEPTH {
            return Err(DecodeError::NestingTooDeep {
                message: format!("Containers nested deeper than {MAX_DEPTH}"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        match code {
            // Fixed-width types are exactly as wide as their alignment.
            TypeCode::Byte
            | TypeCode::Boolean
            | TypeCode::Int16
            | TypeCode::UInt16
            | TypeCode::Int32
            | TypeCode::UInt32
            | TypeCode::Int64
            | TypeCode::UInt64
            | TypeCode::Double
            | TypeCode::UnixFd => {
                let size = code.alignment();
                let start = self.align(position, size);
                self.take(start, size)?;
                Ok(start + size)
            }
            TypeCode::String | TypeCode::ObjectPath => Ok(self.read_string(position)?.1),
            TypeCode::Signature => Ok(self.read_signature(position)?.1),
            TypeCode::Variant => {
                let (signature, value_start) = self.read_variant_signature(position)?;
                self.skip(&signature.types()[0], value_start, depth + 1)
            }
            TypeCode::Array(element) => Ok(self.read_array_bounds(position, element)?.1),
            TypeCode::Struct(fields) => self.skip_fields(fields, position, depth),
            TypeCode::DictEntry(pair) => self.skip_fields(&pair[..], position, depth),
        }
    }

    /// Structs and dict entries: pad to 8, then each field in turn.
    fn skip_fields(
        &self,
        fields: &[TypeCode],
        position: usize,
        depth: usize,
    ) -> Result<usize, DecodeError> {
        let mut cursor = self.align(position, 8);
        self.take(position, cursor - position)?;
        for field in fields {
            cursor = self.skip(field, cursor, depth + 1)?;
        }
        Ok(cursor)
    }
}
