use bus_client::error::{DecodeError, SignatureError};
use bus_client::signature::Signature;

#[test]
fn given_malformed_signature_when_parsed_then_error_names_signature_and_location() {
    // GIVEN / WHEN
    let err = Signature::parse("a{vs}").unwrap_err();

    // THEN
    let error_string = err.to_string();
    assert!(error_string.contains("Malformed Signature Error"));
    assert!(error_string.contains("a{vs}"));
    assert!(error_string.contains("decode.rs"));
}

#[test]
fn given_signature_error_when_converted_then_decode_error_is_transparent() {
    let err: SignatureError = Signature::parse("(").unwrap_err();
    let expected = err.to_string();

    let decode_err = DecodeError::from(err);

    assert_eq!(decode_err.to_string(), expected);
}
