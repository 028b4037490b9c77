//! Owned, tagged representation of a decoded value.

use crate::error::decode::DecodeError;
use crate::signature::Signature;
use crate::variant::Variant;

use common::ErrorLocation;

use std::fmt::{Display, Formatter, Result as FormatResult};
use std::panic::Location;
use std::sync::OnceLock;

use regex::Regex;

const OBJECT_PATH_PATTERN: &str = r"^/$|^(/[A-Za-z0-9_]+)+$";

static OBJECT_PATH_REGEX: OnceLock<Regex> = OnceLock::new();

pub(crate) fn get_object_path_regex() -> &'static Regex {
    OBJECT_PATH_REGEX.get_or_init(|| Regex::new(OBJECT_PATH_PATTERN).expect("valid regex pattern"))
}

/// A syntactically valid object path such as `/org/freedesktop/DBus`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectPath(String);

impl ObjectPath {
    /// # Errors
    ///
    /// Returns [`DecodeError::InvalidData`] unless `path` is `/` or a sequence
    /// of `/element` parts made of `[A-Za-z0-9_]`.
    #[track_caller]
    pub fn new(path: impl Into<String>) -> Result<Self, DecodeError> {
        let path = path.into();
        if !get_object_path_regex().is_match(&path) {
            return Err(DecodeError::InvalidData {
                message: format!("{path:?} is not a valid object path"),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        Ok(Self(path))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for ObjectPath {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter.write_str(&self.0)
    }
}

/// One decoded element of any type.
///
/// Dictionaries decode as an `Array` of `DictEntry` values.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Byte(u8),
    Boolean(bool),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Double(f64),
    /// Index into the file descriptors sent alongside the message.
    UnixFd(u32),
    String(String),
    ObjectPath(ObjectPath),
    Signature(Signature),
    Variant(Variant),
    Array(Vec<Value>),
    Struct(Vec<Value>),
    DictEntry(Box<Value>, Box<Value>),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Byte(_) => "byte",
            Value::Boolean(_) => "boolean",
            Value::Int16(_) => "int16",
            Value::UInt16(_) => "uint16",
            Value::Int32(_) => "int32",
            Value::UInt32(_) => "uint32",
            Value::Int64(_) => "int64",
            Value::UInt64(_) => "uint64",
            Value::Double(_) => "double",
            Value::UnixFd(_) => "unix_fd",
            Value::String(_) => "string",
            Value::ObjectPath(_) => "object_path",
            Value::Signature(_) => "signature",
            Value::Variant(_) => "variant",
            Value::Array(_) => "array",
            Value::Struct(_) => "struct",
            Value::DictEntry(_, _) => "dict_entry",
        }
    }
}

macro_rules! impl_try_from_value {
    ($($target:ty => $variant:ident, $expected:literal;)+) => {
        $(
            impl TryFrom<Value> for $target {
                type Error = DecodeError;

                #[track_caller]
                fn try_from(value: Value) -> Result<Self, Self::Error> {
                    match value {
                        Value::$variant(inner) => Ok(inner),
                        other => Err(DecodeError::InvalidTypecast {
                            expected: $expected.to_string(),
                            found: other.kind().to_string(),
                            location: ErrorLocation::from(Location::caller()),
                        }),
                    }
                }
            }
        )+
    };
}

impl_try_from_value! {
    u8 => Byte, "byte";
    bool => Boolean, "boolean";
    i16 => Int16, "int16";
    u16 => UInt16, "uint16";
    i32 => Int32, "int32";
    u32 => UInt32, "uint32";
    i64 => Int64, "int64";
    u64 => UInt64, "uint64";
    f64 => Double, "double";
    String => String, "string";
    ObjectPath => ObjectPath, "object_path";
    Signature => Signature, "signature";
    Variant => Variant, "variant";
}
