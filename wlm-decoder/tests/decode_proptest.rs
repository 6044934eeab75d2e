//! Property tests: the decoder rejects malformed input with an error, never
//! a panic

use proptest::prelude::*;
use wlm_decoder::decode_module;
use wlm_error::ErrorKind;

const HEADER: [u8; 8] = [0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00];

fn sample_module() -> Vec<u8> {
    wat::parse_str(
        r#"(module
            (import "env" "log" (func $log (param i32)))
            (memory (export "memory") 1 2)
            (table 2 funcref)
            (global $g (mut i32) (i32.const 7))
            (func $main (export "main") (param i32 i32) (result i32)
                (local i64)
                local.get 0
                call $log
                block (result i32)
                    local.get 0
                    local.get 1
                    i32.add
                    global.get $g
                    i32.mul
                end)
            (elem (i32.const 0) $main)
            (data (i32.const 16) "hello"))"#,
    )
    .unwrap()
}

fn assert_rejected_cleanly(bytes: &[u8]) -> Result<(), TestCaseError> {
    if let Err(err) = decode_module(bytes) {
        prop_assert_eq!(err.kind(), ErrorKind::InvalidModule, "{}", err);
    }
    Ok(())
}

proptest! {
    #[test]
    fn arbitrary_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        assert_rejected_cleanly(&bytes)?;
    }

    #[test]
    fn arbitrary_sections_after_a_valid_header_never_panic(body in prop::collection::vec(any::<u8>(), 0..256)) {
        let mut bytes = HEADER.to_vec();
        bytes.extend_from_slice(&body);
        assert_rejected_cleanly(&bytes)?;
    }

    #[test]
    fn single_byte_corruption_is_decoded_or_rejected(index in any::<prop::sample::Index>(), value in any::<u8>()) {
        let mut bytes = sample_module();
        let at = index.index(bytes.len());
        bytes[at] = value;
        assert_rejected_cleanly(&bytes)?;
    }
}
