use bytes::BytesMut;

use crate::protocol::varint::{self, MAX_VALUE, VarintError};

fn encode_to_vec(value: u64) -> Vec<u8> {
    let mut buf = BytesMut::new();
    varint::encode(value, &mut buf).unwrap();
    buf.to_vec()
}

#[test]
fn test_encoded_lengths() {
    assert_eq!(varint::encoded_len(0).unwrap(), 1);
    assert_eq!(varint::encoded_len(63).unwrap(), 1);
    assert_eq!(varint::encoded_len(64).unwrap(), 2);
    assert_eq!(varint::encoded_len(16_383).unwrap(), 2);
    assert_eq!(varint::encoded_len(16_384).unwrap(), 4);
    assert_eq!(varint::encoded_len(MAX_VALUE).unwrap(), 8);
}

#[test]
fn test_rfc9000_examples() {
    // RFC 9000 Appendix A.1 sample encodings
    assert_eq!(encode_to_vec(37), vec![0x25]);
    assert_eq!(encode_to_vec(15_293), vec![0x7B, 0xBD]);
    assert_eq!(encode_to_vec(494_878_333), vec![0x9D, 0x7F, 0x3E, 0x7D]);
    assert_eq!(
        encode_to_vec(151_288_809_941_952_652),
        vec![0xC2, 0x19, 0x7C, 0x5E, 0xFF, 0x14, 0xE8, 0x8C]
    );
}

#[test]
fn test_decode_non_minimal_encoding() {
    // 37 encoded on two bytes is still 37
    let mut buf: &[u8] = &[0x40, 0x25];
    assert_eq!(varint::decode(&mut buf).unwrap(), 37);
    assert!(buf.is_empty());
}

#[test]
fn test_out_of_range() {
    let mut buf = BytesMut::new();
    assert_eq!(
        varint::encode(MAX_VALUE + 1, &mut buf),
        Err(VarintError::OutOfRange(MAX_VALUE + 1))
    );
    assert!(buf.is_empty());
}

#[test]
fn test_truncated_input() {
    let mut empty: &[u8] = &[];
    assert_eq!(
        varint::decode(&mut empty),
        Err(VarintError::UnexpectedEnd { needed: 1, have: 0 })
    );

    let mut short: &[u8] = &[0x9D, 0x7F];
    assert_eq!(
        varint::decode(&mut short),
        Err(VarintError::UnexpectedEnd { needed: 4, have: 2 })
    );
}

#[test]
fn test_decode_advances_buffer() {
    let mut buf: &[u8] = &[0x25, 0x7B, 0xBD, 0x01];
    assert_eq!(varint::decode(&mut buf).unwrap(), 37);
    assert_eq!(varint::decode(&mut buf).unwrap(), 15_293);
    assert_eq!(varint::decode(&mut buf).unwrap(), 1);
    assert!(buf.is_empty());
}
