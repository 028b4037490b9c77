// Decoding through the public API only, on payloads shaped like real message
// bodies.

use bus_client::decoder::{ByteOrder, decode};
use bus_client::error::DecodeError;
use bus_client::signature::Signature;
use bus_client::value::{ObjectPath, Value};

use std::collections::HashMap;

/// Body of a `PropertiesChanged` signal, signature `sa{sv}as`:
/// interface name, changed properties, invalidated names.
fn properties_changed_body() -> Vec<u8> {
    let mut body = Vec::new();
    let pad = |body: &mut Vec<u8>, alignment: usize| {
        while body.len() % alignment != 0 {
            body.push(0);
        }
    };
    let string = |body: &mut Vec<u8>, text: &str| {
        while body.len() % 4 != 0 {
            body.push(0);
        }
        body.extend_from_slice(&(text.len() as u32).to_le_bytes());
        body.extend_from_slice(text.as_bytes());
        body.push(0);
    };

    // s: interface
    string(&mut body, "org.example.Player");

    // a{sv}: length placeholder, entries aligned to 8
    pad(&mut body, 4);
    let dict_length_at = body.len();
    body.extend_from_slice(&[0; 4]);
    pad(&mut body, 8);
    let dict_start = body.len();

    // "Volume" => v(u 80)
    string(&mut body, "Volume");
    body.extend_from_slice(&[1, b'u', 0]);
    pad(&mut body, 4);
    body.extend_from_slice(&80u32.to_le_bytes());

    // "Track" => v(o /org/example/track/7)
    pad(&mut body, 8);
    string(&mut body, "Track");
    body.extend_from_slice(&[1, b'o', 0]);
    string(&mut body, "/org/example/track/7");

    let dict_length = (body.len() - dict_start) as u32;
    body[dict_length_at..dict_length_at + 4].copy_from_slice(&dict_length.to_le_bytes());

    // as: one invalidated name
    pad(&mut body, 4);
    let names_length_at = body.len();
    body.extend_from_slice(&[0; 4]);
    let names_start = body.len();
    string(&mut body, "Position");
    let names_length = (body.len() - names_start) as u32;
    body[names_length_at..names_length_at + 4].copy_from_slice(&names_length.to_le_bytes());

    body
}

#[test]
fn given_properties_changed_body_when_decoded_then_every_argument_is_read() {
    // GIVEN
    let signature = Signature::parse("sa{sv}as").unwrap();
    let body = properties_changed_body();
    let mut decoder = decode(&body, &signature, ByteOrder::Little);

    // WHEN: Reading the three arguments in order
    let interface: String = decoder.read().unwrap();
    let changed: HashMap<String, Value> = decoder.read().unwrap();
    let invalidated: Vec<String> = decoder.read().unwrap();

    // THEN
    assert_eq!(interface, "org.example.Player");
    assert_eq!(invalidated, vec!["Position".to_string()]);
    assert!(!decoder.is_valid());

    let Value::Variant(volume) = &changed["Volume"] else {
        panic!("Volume should be a variant");
    };
    assert_eq!(volume.decoder().get_uint32().unwrap(), 80);

    let Value::Variant(track) = &changed["Track"] else {
        panic!("Track should be a variant");
    };
    assert_eq!(
        track.decoder().get_object_path().unwrap(),
        ObjectPath::new("/org/example/track/7").unwrap()
    );
}

#[test]
fn given_properties_changed_body_when_dict_skipped_then_trailing_array_is_reached() {
    // GIVEN
    let signature = Signature::parse("sa{sv}as").unwrap();
    let body = properties_changed_body();
    let mut decoder = decode(&body, &signature, ByteOrder::Little);

    // WHEN: Stepping over the dict without looking inside
    decoder.next().unwrap();
    assert!(decoder.is_dict());
    decoder.next().unwrap();

    // THEN
    assert_eq!(decoder.get_vec::<String>().unwrap(), vec!["Position"]);
}

#[test]
fn given_properties_changed_body_when_wrong_getter_used_then_typecast_error() {
    let signature = Signature::parse("sa{sv}as").unwrap();
    let body = properties_changed_body();
    let decoder = decode(&body, &signature, ByteOrder::Little);

    let result = decoder.get_map::<String, Value>();

    assert!(matches!(result, Err(DecodeError::InvalidTypecast { .. })));
    assert_eq!(decoder.get_string().unwrap(), "org.example.Player");
}
