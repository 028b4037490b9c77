//! Conversion of the current element into owned Rust values, including bulk
//! extraction of arrays and dictionaries.

use crate::decoder::value_decoder::{ValueDecoder, typecast};
use crate::error::decode::DecodeError;
use crate::signature::Signature;
use crate::value::{ObjectPath, Value};
use crate::variant::Variant;

use std::collections::HashMap;
use std::hash::Hash;

/// Types that can be read from the element under a cursor.
pub trait FromDecoder: Sized {
    fn from_decoder(decoder: &ValueDecoder<'_>) -> Result<Self, DecodeError>;
}

macro_rules! impl_from_decoder {
    ($($target:ty => $getter:ident;)+) => {
        $(
            impl FromDecoder for $target {
                fn from_decoder(decoder: &ValueDecoder<'_>) -> Result<Self, DecodeError> {
                    decoder.$getter()
                }
            }
        )+
    };
}

impl_from_decoder! {
    bool => get_bool;
    u8 => get_uint8;
    i16 => get_int16;
    u16 => get_uint16;
    i32 => get_int32;
    u32 => get_uint32;
    i64 => get_int64;
    u64 => get_uint64;
    f64 => get_double;
    ObjectPath => get_object_path;
    Signature => get_signature;
    Variant => get_variant;
    Value => get_value;
}

impl FromDecoder for String {
    fn from_decoder(decoder: &ValueDecoder<'_>) -> Result<Self, DecodeError> {
        decoder.get_string().map(str::to_string)
    }
}

impl<T: FromDecoder> FromDecoder for Vec<T> {
    fn from_decoder(decoder: &ValueDecoder<'_>) -> Result<Self, DecodeError> {
        decoder.get_vec()
    }
}

impl<K, V> FromDecoder for HashMap<K, V>
where
    K: FromDecoder + Eq + Hash,
    V: FromDecoder,
{
    fn from_decoder(decoder: &ValueDecoder<'_>) -> Result<Self, DecodeError> {
        decoder.get_map()
    }
}

impl ValueDecoder<'_> {
    /// Every element of the current array, in order.
    ///
    /// # Errors
    ///
    /// [`DecodeError::InvalidTypecast`] if the current element is not an
    /// array, or if an element does not convert to `T`.
    pub fn get_vec<T: FromDecoder>(&self) -> Result<Vec<T>, DecodeError> {
        let code = self.current()?;
        if !code.is_array() {
            return Err(typecast("array", code));
        }

        let mut items = Vec::new();
        let mut elements = self.recurse()?;
        while elements.is_valid() {
            items.push(elements.read::<T>()?);
        }
        Ok(items)
    }

    /// The current dictionary as a map. A repeated key keeps its last value.
    ///
    /// # Errors
    ///
    /// [`DecodeError::InvalidTypecast`] if the current element is not an
    /// array of dict entries, or if a key or value does not convert.
    pub fn get_map<K, V>(&self) -> Result<HashMap<K, V>, DecodeError>
    where
        K: FromDecoder + Eq + Hash,
        V: FromDecoder,
    {
        let code = self.current()?;
        if !code.is_dict() {
            return Err(typecast("dict", code));
        }

        let mut map = HashMap::new();
        let mut entries = self.recurse()?;
        while entries.is_valid() {
            let mut entry = entries.recurse()?;
            let key = entry.read::<K>()?;
            let value = entry.get::<V>()?;
            map.insert(key, value);
            entries.next()?;
        }
        Ok(map)
    }
}
