// Unit tests for ValueDecoder. Payloads are built by hand with `Wire`, which
// pads exactly as the bus does so offsets in the tests can be checked by eye.

use crate::decoder::{ByteOrder, MAX_ARRAY_LENGTH, ValueDecoder, decode};
use crate::error::decode::DecodeError;
use crate::signature::{Signature, TypeCode};
use crate::value::Value;
use crate::variant::Variant;

use std::collections::HashMap;

/// Little-endian payload builder, aligned from offset 0.
#[derive(Default)]
struct Wire {
    bytes: Vec<u8>,
}

impl Wire {
    fn pad(mut self, alignment: usize) -> Self {
        while self.bytes.len() % alignment != 0 {
            self.bytes.push(0);
        }
        self
    }

    fn byte(mut self, value: u8) -> Self {
        self.bytes.push(value);
        self
    }

    fn u32(self, value: u32) -> Self {
        let mut wire = self.pad(4);
        wire.bytes.extend_from_slice(&value.to_le_bytes());
        wire
    }

    fn u64(self, value: u64) -> Self {
        let mut wire = self.pad(8);
        wire.bytes.extend_from_slice(&value.to_le_bytes());
        wire
    }

    fn string(self, text: &str) -> Self {
        let mut wire = self.u32(text.len() as u32);
        wire.bytes.extend_from_slice(text.as_bytes());
        wire.bytes.push(0);
        wire
    }

    fn signature(mut self, text: &str) -> Self {
        self.bytes.push(text.len() as u8);
        self.bytes.extend_from_slice(text.as_bytes());
        self.bytes.push(0);
        self
    }

    fn len(&self) -> usize {
        self.bytes.len()
    }

    fn patch_u32(mut self, at: usize, value: u32) -> Self {
        self.bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
        self
    }
}

fn signature(text: &str) -> Signature {
    Signature::parse(text).unwrap()
}

// ============================================
// CURSOR LIFECYCLE
// ============================================

/// **VALUE**: A single element is read once, then the cursor is spent.
///
/// **BUG THIS CATCHES**: A cursor that keeps answering after `next()`
/// returned false would read garbage past the last element.
#[test]
fn given_single_int32_when_next_called_then_cursor_invalidates() {
    // GIVEN: Signature "i" over exactly four bytes
    let sig = signature("i");
    let buffer = 42i32.to_le_bytes();
    let mut decoder = decode(&buffer, &sig, ByteOrder::Little);

    // WHEN: Reading, then stepping past the element
    assert_eq!(decoder.get_int32().unwrap(), 42);
    let has_next = decoder.next().unwrap();

    // THEN: No next element, and every further read fails
    assert!(!has_next);
    assert!(!decoder.is_valid());
    assert!(matches!(
        decoder.get_int32(),
        Err(DecodeError::Invalidated { .. })
    ));
    assert!(matches!(
        decoder.recurse(),
        Err(DecodeError::Invalidated { .. })
    ));
    assert!(!decoder.next().unwrap());
}

#[test]
fn given_default_decoder_when_queried_then_reports_no_elements() {
    let mut decoder = ValueDecoder::default();

    assert!(!decoder.is_valid());
    assert!(!decoder.has_next());
    assert!(decoder.arg_type().is_none());
    assert!(!decoder.next().unwrap());
    assert!(matches!(
        decoder.get_uint8(),
        Err(DecodeError::Invalidated { .. })
    ));
}

#[test]
fn given_two_siblings_when_stepping_then_has_next_tracks_position() {
    let sig = signature("iu");
    let buffer = Wire::default().u32(-3i32 as u32).u32(7).bytes;
    let mut decoder = decode(&buffer, &sig, ByteOrder::Little);

    assert!(decoder.has_next());
    assert_eq!(decoder.read::<i32>().unwrap(), -3);
    assert!(!decoder.has_next());
    assert_eq!(decoder.read::<u32>().unwrap(), 7);
    assert!(!decoder.is_valid());
}

// ============================================
// TYPED GETTERS
// ============================================

/// **VALUE**: A mismatched getter fails without moving the cursor.
///
/// **WHY THIS MATTERS**: Callers probe with the wrong getter and recover;
/// the element must still be readable with the right one afterwards.
#[test]
fn given_int32_element_when_get_string_called_then_invalid_typecast_and_no_advance() {
    // GIVEN: An int32 followed by a string
    let sig = signature("is");
    let buffer = Wire::default().u32(5).string("x").bytes;
    let decoder = decode(&buffer, &sig, ByteOrder::Little);

    // WHEN: Asking for a string at the int32
    let err = decoder.get_string().unwrap_err();

    // THEN: InvalidTypecast naming both types, position unchanged
    match err {
        DecodeError::InvalidTypecast {
            expected, found, ..
        } => {
            assert_eq!(expected, "s");
            assert_eq!(found, "i");
        }
        other => panic!("Expected InvalidTypecast, got {other:?}"),
    }
    assert_eq!(decoder.position(), 0);
    assert_eq!(decoder.get_int32().unwrap(), 5);
}

/// **VALUE**: Padding before each read is computed from the element's own
/// alignment.
///
/// **BUG THIS CATCHES**: Reading a uint64 right after a byte, without
/// skipping seven padding bytes.
#[test]
fn given_mixed_alignments_when_read_in_order_then_padding_is_skipped() {
    // GIVEN: y (1), n (2), u (4), t (8), each forcing padding
    let sig = signature("ynut");
    let buffer = Wire::default()
        .byte(0xAB)
        .pad(2)
        .byte(0xFE)
        .byte(0xFF) // int16 -2
        .u32(70_000)
        .u64(u64::MAX - 1)
        .bytes;
    assert_eq!(buffer.len(), 16);
    let mut decoder = decode(&buffer, &sig, ByteOrder::Little);

    // WHEN / THEN
    assert_eq!(decoder.read::<u8>().unwrap(), 0xAB);
    assert_eq!(decoder.read::<i16>().unwrap(), -2);
    assert_eq!(decoder.read::<u32>().unwrap(), 70_000);
    assert_eq!(decoder.get_uint64().unwrap(), u64::MAX - 1);
}

#[test]
fn given_big_endian_buffer_when_read_then_byte_order_is_honored() {
    let sig = signature("ux");
    let mut buffer = vec![0, 0, 1, 0, 0, 0, 0, 0];
    buffer.extend_from_slice(&(-2i64).to_be_bytes());
    let mut decoder = decode(&buffer, &sig, ByteOrder::Big);

    assert_eq!(decoder.read::<u32>().unwrap(), 256);
    assert_eq!(decoder.get_int64().unwrap(), -2);
}

#[test]
fn given_wire_markers_when_parsed_then_byte_order_matches() {
    assert_eq!(ByteOrder::from_marker(b'l'), Some(ByteOrder::Little));
    assert_eq!(ByteOrder::from_marker(b'B'), Some(ByteOrder::Big));
    assert_eq!(ByteOrder::from_marker(b'x'), None);
    assert_eq!(ByteOrder::Big.marker(), b'B');
}

#[test]
fn given_scalar_types_when_read_then_values_decode() {
    // GIVEN: boolean, double, unix fd index, object path, signature
    let sig = signature("bdhog");
    let buffer = Wire::default()
        .u32(1)
        .u64(1.5f64.to_bits())
        .u32(3)
        .string("/org/example/Object")
        .signature("a{sv}")
        .bytes;
    let mut decoder = decode(&buffer, &sig, ByteOrder::Little);

    // THEN
    assert!(decoder.read::<bool>().unwrap());
    assert_eq!(decoder.read::<f64>().unwrap(), 1.5);
    assert_eq!(decoder.get_unix_fd().unwrap(), 3);
    decoder.next().unwrap();
    assert_eq!(
        decoder.get_object_path().unwrap().as_str(),
        "/org/example/Object"
    );
    decoder.next().unwrap();
    assert_eq!(decoder.get_signature().unwrap(), signature("a{sv}"));
}

#[test]
fn given_boolean_other_than_zero_or_one_when_read_then_invalid_data() {
    let sig = signature("b");
    let buffer = 2u32.to_le_bytes();
    let decoder = decode(&buffer, &sig, ByteOrder::Little);

    assert!(matches!(
        decoder.get_bool(),
        Err(DecodeError::InvalidData { .. })
    ));
}

#[test]
fn given_malformed_object_path_when_read_then_invalid_data() {
    let sig = signature("o");
    for path in ["org/example", "/trailing/", "//double", "/bad-char"] {
        let buffer = Wire::default().string(path).bytes;
        let decoder = decode(&buffer, &sig, ByteOrder::Little);

        assert!(
            matches!(
                decoder.get_object_path(),
                Err(DecodeError::InvalidData { .. })
            ),
            "{path:?} should be rejected"
        );
    }
}

#[test]
fn given_string_without_nul_when_read_then_invalid_data() {
    let sig = signature("s");
    let buffer = vec![2, 0, 0, 0, b'h', b'i', b'!'];
    let decoder = decode(&buffer, &sig, ByteOrder::Little);

    assert!(matches!(
        decoder.get_string(),
        Err(DecodeError::InvalidData { .. })
    ));
}

/// **BUG THIS CATCHES**: Indexing past the buffer instead of reporting an
/// underrun.
#[test]
fn given_truncated_buffer_when_read_then_buffer_underrun() {
    // GIVEN: A uint32 with only two bytes present
    let sig = signature("u");
    let buffer = [1u8, 0];
    let mut decoder = decode(&buffer, &sig, ByteOrder::Little);

    // THEN: Both reading and skipping report the shortfall
    match decoder.get_uint32().unwrap_err() {
        DecodeError::BufferUnderrun {
            offset,
            needed,
            available,
            ..
        } => {
            assert_eq!((offset, needed, available), (0, 4, 2));
        }
        other => panic!("Expected BufferUnderrun, got {other:?}"),
    }
    assert!(matches!(
        decoder.next(),
        Err(DecodeError::BufferUnderrun { .. })
    ));
}

// ============================================
// CONTAINERS
// ============================================

#[test]
fn given_int32_array_when_extracted_then_yields_elements_in_order() {
    // GIVEN: "ai" with length 8 and two elements
    let sig = signature("ai");
    let buffer = Wire::default().u32(8).u32(1).u32(2).bytes;
    let mut decoder = decode(&buffer, &sig, ByteOrder::Little);

    // WHEN: Bulk extracting
    let values: Vec<i32> = decoder.get_vec().unwrap();

    // THEN: Both values, in order, and the exhausted cursor cannot recurse
    assert_eq!(values, vec![1, 2]);
    assert!(!decoder.next().unwrap());
    assert!(decoder.recurse().is_err());
}

/// **VALUE**: The parent skips a container using its length prefix.
///
/// **WHY THIS MATTERS**: Callers often ignore a container. The parent must
/// land on the following element without anyone walking the contents.
#[test]
fn given_sub_cursor_when_advanced_then_parent_does_not_move() {
    // GIVEN: An array of two int32 followed by a byte
    let sig = signature("aiy");
    let buffer = Wire::default().u32(8).u32(10).u32(20).byte(9).bytes;
    let mut decoder = decode(&buffer, &sig, ByteOrder::Little);

    // WHEN: Walking the array through a sub-cursor
    {
        let mut elements = decoder.recurse().unwrap();
        assert_eq!(elements.read::<i32>().unwrap(), 10);
        assert_eq!(elements.get_int32().unwrap(), 20);
        assert!(!elements.next().unwrap());
    }

    // THEN: The parent is still at the array, and next() skips all of it
    assert_eq!(decoder.position(), 0);
    assert!(decoder.is_array());
    assert!(decoder.next().unwrap());
    assert_eq!(decoder.get_uint8().unwrap(), 9);
}

#[test]
fn given_empty_array_when_recursed_then_sub_cursor_is_invalid() {
    // GIVEN: An empty array of uint64; padding to 8 follows the length
    let sig = signature("at");
    let buffer = Wire::default().u32(0).pad(8).bytes;
    let decoder = decode(&buffer, &sig, ByteOrder::Little);

    // THEN
    let elements = decoder.recurse().unwrap();
    assert!(!elements.is_valid());
    assert_eq!(decoder.get_vec::<u64>().unwrap(), Vec::<u64>::new());
    assert_eq!(decoder.element_type(), Some(&TypeCode::UInt64));
}

#[test]
fn given_struct_when_recursed_then_fields_decode_in_order() {
    // GIVEN: (ys) followed by a trailing uint32
    let sig = signature("(ys)u");
    let buffer = Wire::default().byte(7).string("hi").u32(99).bytes;
    let mut decoder = decode(&buffer, &sig, ByteOrder::Little);
    assert!(decoder.is_container());
    assert!(!decoder.is_fixed());

    // WHEN: Reading through the struct
    let mut fields = decoder.recurse().unwrap();
    assert_eq!(fields.read::<u8>().unwrap(), 7);
    assert_eq!(fields.get_string().unwrap(), "hi");
    assert!(!fields.next().unwrap());

    // THEN: The parent steps over the struct to the uint32
    assert!(decoder.next().unwrap());
    assert_eq!(decoder.get_uint32().unwrap(), 99);
}

fn string_to_uint_dict(entries: &[(&str, u32)]) -> Vec<u8> {
    let mut wire = Wire::default().u32(0).pad(8);
    let start = wire.len();
    for (key, value) in entries {
        wire = wire.pad(8).string(key).u32(*value);
    }
    let length = (wire.len() - start) as u32;
    wire.patch_u32(0, length).bytes
}

#[test]
fn given_dict_when_extracted_then_yields_map() {
    // GIVEN: a{su} with two entries
    let sig = signature("a{su}");
    let buffer = string_to_uint_dict(&[("a", 1), ("b", 2)]);
    let decoder = decode(&buffer, &sig, ByteOrder::Little);
    assert!(decoder.is_dict());

    // WHEN
    let map: HashMap<String, u32> = decoder.get_map().unwrap();

    // THEN
    assert_eq!(map.len(), 2);
    assert_eq!(map["a"], 1);
    assert_eq!(map["b"], 2);
}

#[test]
fn given_dict_with_duplicate_key_when_extracted_then_last_value_wins() {
    let sig = signature("a{su}");
    let buffer = string_to_uint_dict(&[("k", 1), ("k", 2)]);
    let decoder = decode(&buffer, &sig, ByteOrder::Little);

    let map: HashMap<String, u32> = decoder.get().unwrap();

    assert_eq!(map.len(), 1);
    assert_eq!(map["k"], 2);
}

#[test]
fn given_dict_entry_when_recursed_twice_then_yields_key_then_value() {
    let sig = signature("a{su}");
    let buffer = string_to_uint_dict(&[("only", 5)]);
    let decoder = decode(&buffer, &sig, ByteOrder::Little);

    let entries = decoder.recurse().unwrap();
    let mut entry = entries.recurse().unwrap();

    assert_eq!(entry.read::<String>().unwrap(), "only");
    assert_eq!(entry.get_uint32().unwrap(), 5);
    assert!(!entry.next().unwrap());
}

#[test]
fn given_wrong_container_kind_when_bulk_extracting_then_invalid_typecast() {
    let sig = signature("ai");
    let buffer = Wire::default().u32(0).bytes;
    let decoder = decode(&buffer, &sig, ByteOrder::Little);

    assert!(matches!(
        decoder.get_map::<i32, i32>(),
        Err(DecodeError::InvalidTypecast { .. })
    ));

    let sig = signature("i");
    let decoder = decode(&buffer, &sig, ByteOrder::Little);
    assert!(matches!(
        decoder.get_vec::<i32>(),
        Err(DecodeError::InvalidTypecast { .. })
    ));
    assert!(matches!(
        decoder.recurse(),
        Err(DecodeError::InvalidTypecast { .. })
    ));
}

#[test]
fn given_oversized_array_length_when_recursed_then_invalid_data() {
    let sig = signature("ay");
    let buffer = Wire::default().u32(MAX_ARRAY_LENGTH as u32 + 1).bytes;
    let decoder = decode(&buffer, &sig, ByteOrder::Little);

    assert!(matches!(
        decoder.recurse(),
        Err(DecodeError::InvalidData { .. })
    ));
}

#[test]
fn given_nested_arrays_when_extracted_then_inner_vectors_decode() {
    // GIVEN: aai holding [[1], [2, 3]]
    let sig = signature("aai");
    let inner = Wire::default()
        .u32(4)
        .u32(1)
        .u32(8)
        .u32(2)
        .u32(3)
        .bytes;
    let mut buffer = (inner.len() as u32).to_le_bytes().to_vec();
    buffer.extend_from_slice(&inner);
    let decoder = decode(&buffer, &sig, ByteOrder::Little);

    // THEN
    let values: Vec<Vec<i32>> = decoder.get_vec().unwrap();
    assert_eq!(values, vec![vec![1], vec![2, 3]]);
}

// ============================================
// VARIANTS AND VALUES
// ============================================

/// **VALUE**: A copied variant keeps its padding origin.
///
/// **BUG THIS CATCHES**: Decoding a variant payload as if it started on an
/// 8-byte boundary. Here the payload starts at offset 4, so the uint64
/// element needs no padding after the array length; assuming origin 0
/// would skip four bytes and underrun.
#[test]
fn given_variant_at_unaligned_offset_when_copied_then_decodes_with_original_padding() {
    // GIVEN: v holding "at" = [9]
    let sig = signature("v");

    // WHEN: Copying the variant out of a buffer that is then dropped
    let variant = {
        let buffer = Wire::default().signature("at").u32(8).u64(9).bytes;
        assert_eq!(buffer.len(), 16);
        decode(&buffer, &sig, ByteOrder::Little).get_variant().unwrap()
    };

    // THEN: It owns its bytes and decodes the same value
    assert_eq!(variant.signature().as_str(), "at");
    assert_eq!(variant.origin(), 4);
    assert_eq!(variant.payload().len(), 12);
    assert_eq!(variant.decoder().get_vec::<u64>().unwrap(), vec![9]);

    let copy = variant.clone();
    assert_eq!(copy, variant);
}

#[test]
fn given_variant_when_recursed_then_yields_single_inner_value() {
    let sig = signature("vy");
    let buffer = Wire::default().signature("s").string("inner").byte(1).bytes;
    let mut decoder = decode(&buffer, &sig, ByteOrder::Little);

    let mut inner = decoder.recurse().unwrap();
    assert_eq!(inner.arg_type(), Some(&TypeCode::String));
    assert_eq!(inner.get_string().unwrap(), "inner");
    assert!(!inner.next().unwrap());

    assert!(decoder.next().unwrap());
    assert_eq!(decoder.get_uint8().unwrap(), 1);
}

#[test]
fn given_struct_when_get_value_called_then_returns_tagged_tree() {
    let sig = signature("(is)");
    let buffer = Wire::default().u32(-5i32 as u32).string("ok").bytes;
    let decoder = decode(&buffer, &sig, ByteOrder::Little);

    let value = decoder.get_value().unwrap();

    assert_eq!(
        value,
        Value::Struct(vec![Value::Int32(-5), Value::String("ok".to_string())])
    );
}

#[test]
fn given_dict_when_get_value_called_then_returns_array_of_entries() {
    let sig = signature("a{su}");
    let buffer = string_to_uint_dict(&[("a", 1)]);
    let decoder = decode(&buffer, &sig, ByteOrder::Little);

    let value = decoder.get_value().unwrap();

    assert_eq!(
        value,
        Value::Array(vec![Value::DictEntry(
            Box::new(Value::String("a".to_string())),
            Box::new(Value::UInt32(1))
        )])
    );
}

/// **BUG THIS CATCHES**: Unbounded recursion on hostile input built from
/// variants nested inside variants, which no signature limit can catch.
#[test]
fn given_deeply_nested_variants_when_decoded_then_nesting_too_deep() {
    // GIVEN: 70 variants each wrapping the next, around one byte
    let mut buffer = Vec::new();
    for _ in 0..70 {
        buffer.extend_from_slice(&[1, b'v', 0]);
    }
    buffer.extend_from_slice(&[1, b'y', 0, 7]);
    let sig = signature("v");
    let mut decoder = decode(&buffer, &sig, ByteOrder::Little);

    // THEN
    assert!(matches!(
        decoder.get_variant(),
        Err(DecodeError::NestingTooDeep { .. })
    ));
    assert!(matches!(
        decoder.next(),
        Err(DecodeError::NestingTooDeep { .. })
    ));
}

#[test]
fn given_multi_type_signature_when_variant_created_then_rejected() {
    let result = Variant::new(signature("ii"), vec![0; 8], ByteOrder::Little);

    assert!(matches!(result, Err(DecodeError::InvalidData { .. })));
}
