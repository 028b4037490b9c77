//! Type signatures.
//!
//! A signature such as `a{sv}(ii)` is parsed once, up front, into a tree of
//! [`TypeCode`]s. Malformed input (unmatched delimiters, a dict entry outside
//! an array or keyed by a container) is rejected here, never mid-decode.
//! [`SignatureCursor`] then walks that tree without re-parsing.

use crate::error::signature::SignatureError;

use common::ErrorLocation;

use std::fmt::{Display, Formatter, Result as FormatResult, Write as _};
use std::panic::Location;
use std::str::FromStr;

pub const MAX_SIGNATURE_LENGTH: usize = 255;
pub const MAX_ARRAY_NESTING: usize = 32;
pub const MAX_STRUCT_NESTING: usize = 32;

/// One complete type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeCode {
    Byte,
    Boolean,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Double,
    UnixFd,
    String,
    ObjectPath,
    Signature,
    Variant,
    Array(Box<TypeCode>),
    Struct(Vec<TypeCode>),
    /// Key then value. Only valid as an array element.
    DictEntry(Box<[TypeCode; 2]>),
}

impl TypeCode {
    /// Basic types may key a dict entry.
    pub fn is_basic(&self) -> bool {
        !self.is_container()
    }

    pub fn is_container(&self) -> bool {
        matches!(
            self,
            TypeCode::Array(_) | TypeCode::Struct(_) | TypeCode::DictEntry(_) | TypeCode::Variant
        )
    }

    /// Fixed-width basic types.
    pub fn is_fixed(&self) -> bool {
        self.fixed_size().is_some()
    }

    pub fn is_array(&self) -> bool {
        matches!(self, TypeCode::Array(_))
    }

    /// An array whose elements are dict entries.
    pub fn is_dict(&self) -> bool {
        matches!(self, TypeCode::Array(element) if matches!(**element, TypeCode::DictEntry(_)))
    }

    /// Wire size of fixed-width types.
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            TypeCode::Byte => Some(1),
            TypeCode::Int16 | TypeCode::UInt16 => Some(2),
            TypeCode::Boolean | TypeCode::Int32 | TypeCode::UInt32 | TypeCode::UnixFd => Some(4),
            TypeCode::Int64 | TypeCode::UInt64 | TypeCode::Double => Some(8),
            _ => None,
        }
    }

    /// Natural alignment on the wire.
    pub fn alignment(&self) -> usize {
        match self {
            TypeCode::Byte | TypeCode::Signature | TypeCode::Variant => 1,
            TypeCode::Int16 | TypeCode::UInt16 => 2,
            TypeCode::Boolean
            | TypeCode::Int32
            | TypeCode::UInt32
            | TypeCode::UnixFd
            | TypeCode::String
            | TypeCode::ObjectPath
            | TypeCode::Array(_) => 4,
            TypeCode::Int64
            | TypeCode::UInt64
            | TypeCode::Double
            | TypeCode::Struct(_)
            | TypeCode::DictEntry(_) => 8,
        }
    }

    /// Element type of an array.
    pub fn element(&self) -> Option<&TypeCode> {
        match self {
            TypeCode::Array(element) => Some(element),
            _ => None,
        }
    }

    fn basic_from_code(code: u8) -> Option<TypeCode> {
        Some(match code {
            b'y' => TypeCode::Byte,
            b'b' => TypeCode::Boolean,
            b'n' => TypeCode::Int16,
            b'q' => TypeCode::UInt16,
            b'i' => TypeCode::Int32,
            b'u' => TypeCode::UInt32,
            b'x' => TypeCode::Int64,
            b't' => TypeCode::UInt64,
            b'd' => TypeCode::Double,
            b'h' => TypeCode::UnixFd,
            b's' => TypeCode::String,
            b'o' => TypeCode::ObjectPath,
            b'g' => TypeCode::Signature,
            b'v' => TypeCode::Variant,
            _ => return None,
        })
    }
}

impl Display for TypeCode {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        let code = match self {
            TypeCode::Byte => 'y',
            TypeCode::Boolean => 'b',
            TypeCode::Int16 => 'n',
            TypeCode::UInt16 => 'q',
            TypeCode::Int32 => 'i',
            TypeCode::UInt32 => 'u',
            TypeCode::Int64 => 'x',
            TypeCode::UInt64 => 't',
            TypeCode::Double => 'd',
            TypeCode::UnixFd => 'h',
            TypeCode::String => 's',
            TypeCode::ObjectPath => 'o',
            TypeCode::Signature => 'g',
            TypeCode::Variant => 'v',
            TypeCode::Array(element) => return write!(formatter, "a{element}"),
            TypeCode::Struct(fields) => {
                formatter.write_char('(')?;
                for field in fields {
                    write!(formatter, "{field}")?;
                }
                return formatter.write_char(')');
            }
            TypeCode::DictEntry(pair) => return write!(formatter, "{{{}{}}}", pair[0], pair[1]),
        };
        formatter.write_char(code)
    }
}

/// A parsed, well-formed signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Signature {
    text: String,
    types: Vec<TypeCode>,
}

impl Signature {
    /// Parse and validate a signature string.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::Malformed`] for unknown codes, unmatched
    /// container delimiters, empty structs, dict entries outside an array or
    /// with a container key, nesting beyond the protocol limits, or text longer
    /// than 255 bytes.
    #[track_caller]
    pub fn parse(text: &str) -> Result<Self, SignatureError> {
        let location = ErrorLocation::from(Location::caller());

        if text.len() > MAX_SIGNATURE_LENGTH {
            return Err(malformed(
                text,
                format!("longer than {MAX_SIGNATURE_LENGTH} bytes"),
                location,
            ));
        }

        let mut parser = Parser {
            text,
            bytes: text.as_bytes(),
            position: 0,
            array_depth: 0,
            struct_depth: 0,
            location,
        };

        let mut types = Vec::new();
        while parser.position < parser.bytes.len() {
            types.push(parser.parse_complete(false)?);
        }

        Ok(Self {
            text: text.to_string(),
            types,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn types(&self) -> &[TypeCode] {
        &self.types
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// True if the signature is exactly one complete type, as a variant requires.
    pub fn is_single_complete_type(&self) -> bool {
        self.types.len() == 1
    }

    /// A cursor positioned at the first type.
    pub fn cursor(&self) -> SignatureCursor<'_> {
        SignatureCursor::new(&self.types)
    }
}

impl FromStr for Signature {
    type Err = SignatureError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Signature::parse(text)
    }
}

impl Display for Signature {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter.write_str(&self.text)
    }
}

fn malformed(text: &str, message: String, location: ErrorLocation) -> SignatureError {
    SignatureError::Malformed {
        signature: text.to_string(),
        message,
        location,
    }
}

struct Parser<'t> {
    text: &'t str,
    bytes: &'t [u8],
    position: usize,
    array_depth: usize,
    struct_depth: usize,
    location: ErrorLocation,
}

impl Parser<'_> {
    fn error(&self, message: impl Into<String>) -> SignatureError {
        malformed(
            self.text,
            format!("{} at offset {}", message.into(), self.position),
            self.location,
        )
    }

    fn parse_complete(&mut self, dict_entry_allowed: bool) -> Result<TypeCode, SignatureError> {
        let Some(&code) = self.bytes.get(self.position) else {
            return Err(self.error("unexpected end of signature"));
        };

        if let Some(basic) = TypeCode::basic_from_code(code) {
            self.position += 1;
            return Ok(basic);
        }

        match code {
            b'a' => {
                self.position += 1;
                self.array_depth += 1;
                if self.array_depth > MAX_ARRAY_NESTING {
                    return Err(self.error("array nesting too deep"));
                }
                let element = self.parse_complete(true)?;
                self.array_depth -= 1;
                Ok(TypeCode::Array(Box::new(element)))
            }
            b'(' => {
                self.position += 1;
                self.struct_depth += 1;
                if self.struct_depth > MAX_STRUCT_NESTING {
                    return Err(self.error("struct nesting too deep"));
                }

                let mut fields = Vec::new();
                loop {
                    match self.bytes.get(self.position) {
                        None => return Err(self.error("unterminated struct")),
                        Some(b')') => break,
                        Some(_) => fields.push(self.parse_complete(false)?),
                    }
                }
                if fields.is_empty() {
                    return Err(self.error("empty struct"));
                }

                self.position += 1;
                self.struct_depth -= 1;
                Ok(TypeCode::Struct(fields))
            }
            b'{' => {
                if !dict_entry_allowed {
                    return Err(self.error("dict entry outside of an array"));
                }
                self.position += 1;
                self.struct_depth += 1;
                if self.struct_depth > MAX_STRUCT_NESTING {
                    return Err(self.error("struct nesting too deep"));
                }

                let key = self.parse_complete(false)?;
                if !key.is_basic() {
                    return Err(self.error(format!("dict key '{key}' is not a basic type")));
                }
                if self.bytes.get(self.position) == Some(&b'}') {
                    return Err(self.error("dict entry without a value"));
                }
                let value = self.parse_complete(false)?;
                if self.bytes.get(self.position) != Some(&b'}') {
                    return Err(self.error("dict entry must hold exactly one key and one value"));
                }

                self.position += 1;
                self.struct_depth -= 1;
                Ok(TypeCode::DictEntry(Box::new([key, value])))
            }
            b')' | b'}' => Err(self.error(format!("unmatched '{}'", code as char))),
            _ => Err(self.error(format!("unknown type code '{}'", code.escape_ascii()))),
        }
    }
}

/// A walk over a sequence of sibling types.
///
/// Array elements are exposed as a one-type sequence; repetition is the
/// decoder's business.
#[derive(Debug, Clone, Copy)]
pub struct SignatureCursor<'s> {
    types: &'s [TypeCode],
    index: usize,
}

impl<'s> SignatureCursor<'s> {
    pub fn new(types: &'s [TypeCode]) -> Self {
        Self { types, index: 0 }
    }

    /// Rewind to the first type.
    pub fn begin(&mut self) {
        self.index = 0;
    }

    pub fn current(&self) -> Option<&'s TypeCode> {
        self.types.get(self.index)
    }

    pub fn is_valid(&self) -> bool {
        self.index < self.types.len()
    }

    pub fn has_next(&self) -> bool {
        self.index + 1 < self.types.len()
    }

    /// Step to the next sibling. Returns false once past the last one.
    pub fn advance(&mut self) -> bool {
        if self.index < self.types.len() {
            self.index += 1;
        }
        self.is_valid()
    }

    /// A cursor over exactly the current container's contained types.
    pub fn enter_container(&self) -> Option<SignatureCursor<'s>> {
        match self.current()? {
            TypeCode::Array(element) => Some(SignatureCursor::new(std::slice::from_ref(&**element))),
            TypeCode::Struct(fields) => Some(SignatureCursor::new(fields)),
            TypeCode::DictEntry(pair) => Some(SignatureCursor::new(&pair[..])),
            _ => None,
        }
    }
}
