use crate::decoder::byte_order::ByteOrder;
use crate::decoder::extract::FromDecoder;
use crate::decoder::reader::{MAX_DEPTH, Reader};
use crate::error::decode::DecodeError;
use crate::signature::{Signature, SignatureCursor, TypeCode};
use crate::value::{ObjectPath, Value};
use crate::variant::Variant;

use common::ErrorLocation;

use std::panic::Location;

/// What the cursor is stepping over.
#[derive(Debug, Clone, Default)]
enum Walk<'a> {
    /// A fixed run of sibling types: the top level, struct fields, or a dict
    /// entry's key and value.
    Fields(SignatureCursor<'a>),
    /// Array elements, all of one type, up to byte offset `end`.
    Elements { element: &'a TypeCode, end: usize },
    /// The single value inside a variant. The signature came off the wire,
    /// so the cursor owns it.
    Single(Signature),
    #[default]
    Empty,
}

/// Cursor over encoded values.
///
/// Valid until stepped past its last element; after that every read fails
/// with [`DecodeError::Invalidated`]. A default cursor is already invalid.
#[derive(Debug, Clone)]
pub struct ValueDecoder<'a> {
    reader: Reader<'a>,
    /// Start of the current element, before alignment padding.
    position: usize,
    walk: Walk<'a>,
    valid: bool,
    depth: usize,
}

impl Default for ValueDecoder<'_> {
    fn default() -> Self {
        Self {
            reader: Reader {
                buffer: &[],
                origin: 0,
                limit: 0,
                byte_order: ByteOrder::native(),
            },
            position: 0,
            walk: Walk::Empty,
            valid: false,
            depth: 0,
        }
    }
}

impl<'a> ValueDecoder<'a> {
    /// `origin` is the buffer's offset from the last 8-byte boundary of the
    /// message it was cut from.
    pub fn with_origin(
        buffer: &'a [u8],
        origin: usize,
        signature: &'a Signature,
        byte_order: ByteOrder,
    ) -> Self {
        let cursor = signature.cursor();
        Self {
            reader: Reader {
                buffer,
                origin: origin % 8,
                limit: buffer.len(),
                byte_order,
            },
            position: 0,
            valid: cursor.is_valid(),
            walk: Walk::Fields(cursor),
            depth: 0,
        }
    }

    // ============================================
    // INTROSPECTION
    // ============================================

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Byte offset of the current element within the buffer.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.reader.byte_order
    }

    /// Type of the current element, or `None` once invalidated.
    pub fn arg_type(&self) -> Option<&TypeCode> {
        if !self.valid {
            return None;
        }
        match &self.walk {
            Walk::Fields(cursor) => cursor.current(),
            Walk::Elements { element, .. } => Some(*element),
            Walk::Single(signature) => signature.types().first(),
            Walk::Empty => None,
        }
    }

    /// Element type when the current element is an array.
    pub fn element_type(&self) -> Option<&TypeCode> {
        self.arg_type().and_then(TypeCode::element)
    }

    pub fn is_array(&self) -> bool {
        self.arg_type().is_some_and(TypeCode::is_array)
    }

    pub fn is_dict(&self) -> bool {
        self.arg_type().is_some_and(TypeCode::is_dict)
    }

    pub fn is_container(&self) -> bool {
        self.arg_type().is_some_and(TypeCode::is_container)
    }

    pub fn is_fixed(&self) -> bool {
        self.arg_type().is_some_and(TypeCode::is_fixed)
    }

    /// True if another sibling follows the current element.
    pub fn has_next(&self) -> bool {
        if !self.valid {
            return false;
        }
        match &self.walk {
            Walk::Fields(cursor) => cursor.has_next(),
            Walk::Elements { element, end } => self
                .reader
                .skip(element, self.position, self.depth)
                .is_ok_and(|next| next < *end),
            Walk::Single(_) | Walk::Empty => false,
        }
    }

    // ============================================
    // NAVIGATION
    // ============================================

    /// Step past the current element.
    ///
    /// Returns whether a next element exists. Once this returns `false` the
    /// cursor is invalidated for good.
    ///
    /// # Errors
    ///
    /// Fails if the current element cannot be measured: its bytes run past
    /// the buffer, or an embedded length or signature is corrupt.
    pub fn next(&mut self) -> Result<bool, DecodeError> {
        let Some(code) = self.arg_type() else {
            self.valid = false;
            return Ok(false);
        };
        let next = self.reader.skip(code, self.position, self.depth)?;

        let has_next = match &mut self.walk {
            Walk::Fields(cursor) => cursor.advance(),
            Walk::Elements { end, .. } => {
                if next > *end {
                    return Err(DecodeError::InvalidData {
                        message: format!("Array element ends at {next}, past array end {end}"),
                        location: ErrorLocation::from(Location::caller()),
                    });
                }
                next < *end
            }
            Walk::Single(_) | Walk::Empty => false,
        };

        self.position = next;
        self.valid = has_next;
        Ok(has_next)
    }

    /// A cursor over the contents of the current container.
    ///
    /// Arrays yield their elements (none for an empty array, so the returned
    /// cursor starts invalid), structs their fields, dict entries a key then a
    /// value, variants their single value. This cursor does not move.
    ///
    /// # Errors
    ///
    /// - [`DecodeError::Invalidated`] - the cursor is exhausted
    /// - [`DecodeError::InvalidTypecast`] - the current element is basic
    /// - [`DecodeError::NestingTooDeep`] - more than 64 nested containers
    pub fn recurse(&self) -> Result<ValueDecoder<'_>, DecodeError> {
        let code = self.current()?;

        let depth = self.depth + 1;
        if depth > MAX_DEPTH {
            return Err(DecodeError::NestingTooDeep {
                message: format!("Containers nested deeper than {MAX_DEPTH}"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let (start, end, walk) = match code {
            TypeCode::Array(element) => {
                let (start, end) = self.reader.read_array_bounds(self.position, element)?;
                (
                    start,
                    end,
                    Walk::Elements {
                        element: &**element,
                        end,
                    },
                )
            }
            TypeCode::Struct(fields) => {
                let end = self.reader.skip(code, self.position, self.depth)?;
                let start = self.reader.align(self.position, 8);
                (start, end, Walk::Fields(SignatureCursor::new(fields)))
            }
            TypeCode::DictEntry(pair) => {
                let end = self.reader.skip(code, self.position, self.depth)?;
                let start = self.reader.align(self.position, 8);
                (start, end, Walk::Fields(SignatureCursor::new(&pair[..])))
            }
            TypeCode::Variant => {
                let end = self.reader.skip(code, self.position, self.depth)?;
                let (signature, start) = self.reader.read_variant_signature(self.position)?;
                (start, end, Walk::Single(signature))
            }
            other => return Err(typecast("container", other)),
        };

        Ok(ValueDecoder {
            reader: Reader {
                limit: end,
                ..self.reader
            },
            position: start,
            valid: start < end,
            walk,
            depth,
        })
    }

    /// Read the current element, then step past it.
    pub fn read<T: FromDecoder>(&mut self) -> Result<T, DecodeError> {
        let value = T::from_decoder(self)?;
        self.next()?;
        Ok(value)
    }

    /// Read the current element as `T` without moving.
    pub fn get<T: FromDecoder>(&self) -> Result<T, DecodeError> {
        T::from_decoder(self)
    }

    // ============================================
    // TYPED GETTERS
    // ============================================

    pub fn get_bool(&self) -> Result<bool, DecodeError> {
        let raw = self.reader.read_u32(self.expect(&TypeCode::Boolean)?)?.0;
        match raw {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(DecodeError::InvalidData {
                message: format!("Boolean must be 0 or 1, got {other}"),
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }

    pub fn get_uint8(&self) -> Result<u8, DecodeError> {
        Ok(self.reader.read_u8(self.expect(&TypeCode::Byte)?)?.0)
    }

    pub fn get_int16(&self) -> Result<i16, DecodeError> {
        Ok(self.reader.read_u16(self.expect(&TypeCode::Int16)?)?.0 as i16)
    }

    pub fn get_uint16(&self) -> Result<u16, DecodeError> {
        Ok(self.reader.read_u16(self.expect(&TypeCode::UInt16)?)?.0)
    }

    pub fn get_int32(&self) -> Result<i32, DecodeError> {
        Ok(self.reader.read_u32(self.expect(&TypeCode::Int32)?)?.0 as i32)
    }

    pub fn get_uint32(&self) -> Result<u32, DecodeError> {
        Ok(self.reader.read_u32(self.expect(&TypeCode::UInt32)?)?.0)
    }

    pub fn get_int64(&self) -> Result<i64, DecodeError> {
        Ok(self.reader.read_u64(self.expect(&TypeCode::Int64)?)?.0 as i64)
    }

    pub fn get_uint64(&self) -> Result<u64, DecodeError> {
        Ok(self.reader.read_u64(self.expect(&TypeCode::UInt64)?)?.0)
    }

    pub fn get_double(&self) -> Result<f64, DecodeError> {
        let bits = self.reader.read_u64(self.expect(&TypeCode::Double)?)?.0;
        Ok(f64::from_bits(bits))
    }

    /// Index into the message's out-of-band file descriptor list.
    pub fn get_unix_fd(&self) -> Result<u32, DecodeError> {
        Ok(self.reader.read_u32(self.expect(&TypeCode::UnixFd)?)?.0)
    }

    /// Borrowed straight from the buffer. Only `s` elements qualify.
    pub fn get_string(&self) -> Result<&'a str, DecodeError> {
        Ok(self.reader.read_string(self.expect(&TypeCode::String)?)?.0)
    }

    pub fn get_object_path(&self) -> Result<ObjectPath, DecodeError> {
        let text = self.reader.read_string(self.expect(&TypeCode::ObjectPath)?)?.0;
        ObjectPath::new(text)
    }

    pub fn get_signature(&self) -> Result<Signature, DecodeError> {
        let text = self.reader.read_signature(self.expect(&TypeCode::Signature)?)?.0;
        Ok(Signature::parse(text)?)
    }

    /// Copy the current variant out of the buffer.
    pub fn get_variant(&self) -> Result<Variant, DecodeError> {
        let position = self.expect(&TypeCode::Variant)?;
        let (signature, value_start) = self.reader.read_variant_signature(position)?;
        let value_end = self.reader.skip(&signature.types()[0], value_start, self.depth + 1)?;
        let payload = self.reader.take(value_start, value_end - value_start)?.to_vec();

        Ok(Variant::with_origin(
            signature,
            payload,
            self.reader.byte_order,
            self.reader.origin + value_start,
        ))
    }

    /// Decode the current element, containers included, into a [`Value`].
    pub fn get_value(&self) -> Result<Value, DecodeError> {
        let code = self.current()?;
        Ok(match code {
            TypeCode::Byte => Value::Byte(self.get_uint8()?),
            TypeCode::Boolean => Value::Boolean(self.get_bool()?),
            TypeCode::Int16 => Value::Int16(self.get_int16()?),
            TypeCode::UInt16 => Value::UInt16(self.get_uint16()?),
            TypeCode::Int32 => Value::Int32(self.get_int32()?),
            TypeCode::UInt32 => Value::UInt32(self.get_uint32()?),
            TypeCode::Int64 => Value::Int64(self.get_int64()?),
            TypeCode::UInt64 => Value::UInt64(self.get_uint64()?),
            TypeCode::Double => Value::Double(self.get_double()?),
            TypeCode::UnixFd => Value::UnixFd(self.get_unix_fd()?),
            TypeCode::String => Value::String(self.get_string()?.to_string()),
            TypeCode::ObjectPath => Value::ObjectPath(self.get_object_path()?),
            TypeCode::Signature => Value::Signature(self.get_signature()?),
            TypeCode::Variant => Value::Variant(self.get_variant()?),
            TypeCode::Array(_) => Value::Array(self.collect_values()?),
            TypeCode::Struct(_) => Value::Struct(self.collect_values()?),
            TypeCode::DictEntry(_) => {
                let mut pair = self.recurse()?;
                let key = pair.read::<Value>()?;
                let value = pair.get_value()?;
                Value::DictEntry(Box::new(key), Box::new(value))
            }
        })
    }

    fn collect_values(&self) -> Result<Vec<Value>, DecodeError> {
        let mut items = Vec::new();
        let mut contents = self.recurse()?;
        while contents.is_valid() {
            items.push(contents.read::<Value>()?);
        }
        Ok(items)
    }

    // ============================================
    // HELPERS
    // ============================================

    #[track_caller]
    pub(crate) fn current(&self) -> Result<&TypeCode, DecodeError> {
        self.arg_type().ok_or_else(|| DecodeError::Invalidated {
            message: "Cursor is past its last element".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    /// Position to read from if the current element is `expected`.
    #[track_caller]
    fn expect(&self, expected: &TypeCode) -> Result<usize, DecodeError> {
        let found = self.current()?;
        if found != expected {
            return Err(typecast(&expected.to_string(), found));
        }
        Ok(self.position)
    }
}

#[track_caller]
pub(crate) fn typecast(expected: &str, found: &TypeCode) -> DecodeError {
    DecodeError::InvalidTypecast {
        expected: expected.to_string(),
        found: found.to_string(),
        location: ErrorLocation::from(Location::caller()),
    }
}
