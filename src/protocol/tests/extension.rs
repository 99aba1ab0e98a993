use bytes::Bytes;

use crate::protocol::extension::{
    ExtensionError, ExtensionHeader, ExtensionHeaders, ExtensionValue,
};

#[test]
fn test_parity_rules() {
    assert!(ExtensionHeader::is_length_prefixed(0x31));
    assert!(!ExtensionHeader::is_length_prefixed(0x3C));

    assert!(ExtensionHeader::varint(0x3C, 2).is_ok());
    assert!(matches!(
        ExtensionHeader::varint(0x31, 2),
        Err(ExtensionError::WrongParity { kind: 0x31, .. })
    ));
    assert!(ExtensionHeader::bytes(0x0B, vec![1, 2, 3]).is_ok());
    assert!(matches!(
        ExtensionHeader::bytes(0x3E, vec![1]),
        Err(ExtensionError::WrongParity { kind: 0x3E, .. })
    ));
}

#[test]
fn test_push_keeps_types_ascending() {
    let mut headers = ExtensionHeaders::new();
    headers.push(ExtensionHeader::varint(0x3E, 1).unwrap());
    headers.push(ExtensionHeader::bytes(0x0B, vec![0xAA]).unwrap());
    headers.push(ExtensionHeader::varint(0x3C, 2).unwrap());

    let kinds: Vec<u64> = headers.iter().map(|h| h.kind).collect();
    assert_eq!(kinds, vec![0x0B, 0x3C, 0x3E]);
}

#[test]
fn test_types_are_delta_encoded() {
    let mut headers = ExtensionHeaders::new();
    headers.push(ExtensionHeader::varint(0x3C, 5).unwrap());
    headers.push(ExtensionHeader::varint(0x3E, 7).unwrap());

    let encoded = headers.encode().unwrap();
    // 0x3C, value 5, then delta 2 (0x3E - 0x3C), value 7
    assert_eq!(&encoded[..], &[0x3C, 0x05, 0x02, 0x07]);
}

#[test]
fn test_odd_type_is_length_prefixed() {
    let mut headers = ExtensionHeaders::new();
    headers.push(ExtensionHeader::bytes(0x0B, vec![0xDE, 0xAD]).unwrap());

    let encoded = headers.encode().unwrap();
    assert_eq!(&encoded[..], &[0x0B, 0x02, 0xDE, 0xAD]);
}

#[test]
fn test_decode_mixed_headers() {
    let mut headers = ExtensionHeaders::new();
    headers.push(ExtensionHeader::bytes(0x0B, vec![1, 2, 3]).unwrap());
    headers.push(ExtensionHeader::varint(0x3C, 300).unwrap());
    headers.push(ExtensionHeader::bytes(0x41, Bytes::new()).unwrap());

    let encoded = headers.encode().unwrap();
    let decoded = ExtensionHeaders::decode(&encoded).unwrap();
    assert_eq!(decoded, headers);
}

#[test]
fn test_duplicate_types_use_zero_delta() {
    let mut headers = ExtensionHeaders::new();
    headers.push(ExtensionHeader::varint(0x3C, 1).unwrap());
    headers.push(ExtensionHeader::varint(0x3C, 2).unwrap());

    let encoded = headers.encode().unwrap();
    assert_eq!(&encoded[..], &[0x3C, 0x01, 0x00, 0x02]);

    let decoded = ExtensionHeaders::decode(&encoded).unwrap();
    let values: Vec<&ExtensionValue> = decoded.get_all(0x3C).map(|h| &h.value).collect();
    assert_eq!(
        values,
        vec![&ExtensionValue::Varint(1), &ExtensionValue::Varint(2)]
    );
}

#[test]
fn test_decode_length_past_end() {
    // Odd type announcing 8 bytes with only 2 present
    let result = ExtensionHeaders::decode(&[0x31, 0x08, 0x00, 0x01]);
    assert!(matches!(result, Err(ExtensionError::Malformed { .. })));
}

#[test]
fn test_decode_truncated_varint_value() {
    let result = ExtensionHeaders::decode(&[0x3C, 0x80]);
    assert!(matches!(result, Err(ExtensionError::Varint(_))));
}

#[test]
fn test_empty_block() {
    let headers = ExtensionHeaders::decode(&[]).unwrap();
    assert!(headers.is_empty());

    let block = ExtensionHeaders::new().encode_block().unwrap();
    assert_eq!(&block[..], &[0x00]);
}

#[test]
fn test_block_roundtrip_leaves_trailing_payload() {
    let mut headers = ExtensionHeaders::new();
    headers.push(ExtensionHeader::varint(0x3C, 9).unwrap());

    let mut wire = headers.encode_block().unwrap().to_vec();
    wire.extend_from_slice(b"payload");

    let mut buf: &[u8] = &wire;
    let decoded = ExtensionHeaders::decode_block(&mut buf).unwrap();
    assert_eq!(decoded, headers);
    assert_eq!(buf, b"payload");
}

#[test]
fn test_block_length_exceeds_input() {
    let mut buf: &[u8] = &[0x05, 0x3C, 0x01];
    assert!(matches!(
        ExtensionHeaders::decode_block(&mut buf),
        Err(ExtensionError::Malformed { .. })
    ));
}

#[test]
fn test_remove_all() {
    let mut headers = ExtensionHeaders::new();
    headers.push(ExtensionHeader::varint(0x3C, 1).unwrap());
    headers.push(ExtensionHeader::varint(0x3C, 2).unwrap());
    headers.push(ExtensionHeader::varint(0x3E, 3).unwrap());

    assert_eq!(headers.remove_all(0x3C), 2);
    assert_eq!(headers.len(), 1);
    assert_eq!(headers.remove_all(0x3C), 0);
}
