//! Property tests for the LEB128 readers

use proptest::prelude::*;
use wlm_format::binary::{read_leb128_i32, read_leb128_i64, read_leb128_u32};

fn encode_unsigned(mut value: u64) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return out;
        }
        out.push(byte | 0x80);
    }
}

fn encode_signed(mut value: i64) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        let done = (value == 0 && byte & 0x40 == 0) || (value == -1 && byte & 0x40 != 0);
        if done {
            out.push(byte);
            return out;
        }
        out.push(byte | 0x80);
    }
}

proptest! {
    #[test]
    fn u32_decodes_what_was_encoded(value in any::<u32>(), prefix in 0usize..4) {
        let mut bytes = vec![0xAA; prefix];
        let encoded = encode_unsigned(u64::from(value));
        bytes.extend_from_slice(&encoded);
        prop_assert_eq!(read_leb128_u32(&bytes, prefix).unwrap(), (value, encoded.len()));
    }

    #[test]
    fn i32_decodes_what_was_encoded(value in any::<i32>()) {
        let encoded = encode_signed(i64::from(value));
        prop_assert_eq!(read_leb128_i32(&encoded, 0).unwrap(), (value, encoded.len()));
    }

    #[test]
    fn i64_decodes_what_was_encoded(value in any::<i64>()) {
        let encoded = encode_signed(value);
        prop_assert_eq!(read_leb128_i64(&encoded, 0).unwrap(), (value, encoded.len()));
    }

    #[test]
    fn truncation_is_an_error_not_a_panic(value in any::<u32>()) {
        let encoded = encode_unsigned(u64::from(value));
        if encoded.len() > 1 {
            prop_assert!(read_leb128_u32(&encoded[..encoded.len() - 1], 0).is_err());
        }
    }

    #[test]
    fn arbitrary_bytes_never_panic(bytes in proptest::collection::vec(any::<u8>(), 0..12)) {
        let _ = read_leb128_u32(&bytes, 0);
        let _ = read_leb128_i32(&bytes, 0);
        let _ = read_leb128_i64(&bytes, 0);
    }
}
