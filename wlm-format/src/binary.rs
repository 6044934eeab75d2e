// WLM - wlm-format
// Module: WebAssembly Binary Format
//
// Copyright (c) 2024 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! Constants and primitive readers for the WebAssembly binary format.
//!
//! Readers take the whole byte slice and a position and return the decoded
//! value together with the number of bytes consumed.

use wlm_error::{Error, ErrorCategory, Result, codes};

/// Magic bytes for WebAssembly modules: \0asm
pub const WASM_MAGIC: [u8; 4] = [0x00, 0x61, 0x73, 0x6D];

/// WebAssembly binary format version
pub const WASM_VERSION: [u8; 4] = [0x01, 0x00, 0x00, 0x00];

/// WebAssembly section IDs
pub const CUSTOM_SECTION_ID: u8 = 0x00;
pub const TYPE_SECTION_ID: u8 = 0x01;
pub const IMPORT_SECTION_ID: u8 = 0x02;
pub const FUNCTION_SECTION_ID: u8 = 0x03;
pub const TABLE_SECTION_ID: u8 = 0x04;
pub const MEMORY_SECTION_ID: u8 = 0x05;
pub const GLOBAL_SECTION_ID: u8 = 0x06;
pub const EXPORT_SECTION_ID: u8 = 0x07;
pub const START_SECTION_ID: u8 = 0x08;
pub const ELEMENT_SECTION_ID: u8 = 0x09;
pub const CODE_SECTION_ID: u8 = 0x0A;
pub const DATA_SECTION_ID: u8 = 0x0B;
pub const DATA_COUNT_SECTION_ID: u8 = 0x0C;

/// WebAssembly value types
pub const I32_TYPE: u8 = 0x7F;
pub const I64_TYPE: u8 = 0x7E;
pub const F32_TYPE: u8 = 0x7D;
pub const F64_TYPE: u8 = 0x7C;
pub const V128_TYPE: u8 = 0x7B;
pub const FUNCREF_TYPE: u8 = 0x70;
pub const EXTERNREF_TYPE: u8 = 0x6F;

/// Function type marker in the type section
pub const FUNC_TYPE_FORM: u8 = 0x60;
/// Empty block type
pub const BLOCK_TYPE_EMPTY: u8 = 0x40;

/// External kinds used by imports and exports
pub const EXTERNAL_KIND_FUNCTION: u8 = 0x00;
pub const EXTERNAL_KIND_TABLE: u8 = 0x01;
pub const EXTERNAL_KIND_MEMORY: u8 = 0x02;
pub const EXTERNAL_KIND_GLOBAL: u8 = 0x03;

/// Size of a WebAssembly page in bytes
pub const PAGE_SIZE: usize = 65536;
/// Largest page count addressable with 32-bit memory
pub const MAX_PAGES: u32 = 65536;

fn truncated(what: &str, pos: usize) -> Error {
    Error::unexpected_end(format!("truncated {what} at offset {pos}"))
}

fn leb_too_long(pos: usize) -> Error {
    Error::with_message(
        ErrorCategory::Parse,
        codes::INVALID_LEB128,
        format!("LEB128 integer too large at offset {pos}"),
    )
}

fn read_unsigned(bytes: &[u8], pos: usize, bits: u32) -> Result<(u64, usize)> {
    let max_len = bits.div_ceil(7) as usize;
    let mut result = 0u64;
    let mut shift = 0u32;
    let mut offset = 0;

    loop {
        let byte = *bytes.get(pos + offset).ok_or_else(|| truncated("LEB128 integer", pos))?;
        offset += 1;
        result |= u64::from(byte & 0x7F) << shift;

        if byte & 0x80 == 0 {
            // Unused high bits of the final byte must be zero.
            if offset == max_len && bits % 7 != 0 && u32::from(byte & 0x7F) >> (bits % 7) != 0 {
                return Err(leb_too_long(pos));
            }
            break;
        }
        shift += 7;
        if offset >= max_len {
            return Err(leb_too_long(pos));
        }
    }

    Ok((result, offset))
}

fn read_signed(bytes: &[u8], pos: usize, bits: u32) -> Result<(i64, usize)> {
    let max_len = bits.div_ceil(7) as usize;
    let mut result = 0i64;
    let mut shift = 0u32;
    let mut offset = 0;

    loop {
        let byte = *bytes.get(pos + offset).ok_or_else(|| truncated("LEB128 integer", pos))?;
        offset += 1;
        result |= i64::from(byte & 0x7F) << shift;
        shift += 7;

        if byte & 0x80 == 0 {
            if offset == max_len && bits % 7 != 0 {
                // The unused bits must all equal the sign bit.
                let used = bits - 7 * (max_len as u32 - 1);
                let rest = (byte & 0x7F) >> (used - 1);
                let all_ones = 0x7F >> (used - 1);
                if rest != 0 && rest != all_ones {
                    return Err(leb_too_long(pos));
                }
            }
            if shift < 64 && byte & 0x40 != 0 {
                result |= -1i64 << shift;
            }
            break;
        }
        if offset >= max_len {
            return Err(leb_too_long(pos));
        }
    }

    Ok((result, offset))
}

/// Read a LEB128 unsigned 32-bit integer
pub fn read_leb128_u32(bytes: &[u8], pos: usize) -> Result<(u32, usize)> {
    read_unsigned(bytes, pos, 32).map(|(value, len)| (value as u32, len))
}

/// Read a LEB128 signed 32-bit integer
pub fn read_leb128_i32(bytes: &[u8], pos: usize) -> Result<(i32, usize)> {
    read_signed(bytes, pos, 32).map(|(value, len)| (value as i32, len))
}

/// Read a LEB128 signed 33-bit integer, as used by block types
pub fn read_leb128_s33(bytes: &[u8], pos: usize) -> Result<(i64, usize)> {
    read_signed(bytes, pos, 33)
}

/// Read a LEB128 signed 64-bit integer
pub fn read_leb128_i64(bytes: &[u8], pos: usize) -> Result<(i64, usize)> {
    read_signed(bytes, pos, 64)
}

/// Read a single byte
pub fn read_u8(bytes: &[u8], pos: usize) -> Result<(u8, usize)> {
    bytes.get(pos).map(|b| (*b, 1)).ok_or_else(|| truncated("byte", pos))
}

/// Read a 32-bit IEEE 754 float from a byte array
pub fn read_f32(bytes: &[u8], pos: usize) -> Result<(f32, usize)> {
    let raw = bytes.get(pos..pos + 4).ok_or_else(|| truncated("f32", pos))?;
    let mut buf = [0u8; 4];
    buf.copy_from_slice(raw);
    Ok((f32::from_le_bytes(buf), 4))
}

/// Read a 64-bit IEEE 754 float from a byte array
pub fn read_f64(bytes: &[u8], pos: usize) -> Result<(f64, usize)> {
    let raw = bytes.get(pos..pos + 8).ok_or_else(|| truncated("f64", pos))?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(raw);
    Ok((f64::from_le_bytes(buf), 8))
}

/// Read a length-prefixed UTF-8 name
pub fn read_name(bytes: &[u8], pos: usize) -> Result<(String, usize)> {
    let (len, len_size) = read_leb128_u32(bytes, pos)?;
    let start = pos + len_size;
    let raw = bytes
        .get(start..start + len as usize)
        .ok_or_else(|| truncated("name", pos))?;
    let name = core::str::from_utf8(raw)
        .map_err(|_| Error::invalid_module(format!("malformed UTF-8 name at offset {pos}")))?;
    Ok((name.to_string(), len_size + len as usize))
}

#[cfg(test)]
mod tests {
    use wlm_error::ErrorKind;

    use super::*;

    #[test]
    fn test_read_leb128_u32() {
        assert_eq!(read_leb128_u32(&[0x00], 0).unwrap(), (0, 1));
        assert_eq!(read_leb128_u32(&[0xE5, 0x8E, 0x26], 0).unwrap(), (624_485, 3));
        assert_eq!(
            read_leb128_u32(&[0xFF, 0xFF, 0xFF, 0xFF, 0x0F], 0).unwrap(),
            (u32::MAX, 5)
        );
    }

    #[test]
    fn test_read_leb128_u32_rejects_overlong() {
        assert!(read_leb128_u32(&[0xFF, 0xFF, 0xFF, 0xFF, 0x1F], 0).is_err());
        assert!(read_leb128_u32(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x00], 0).is_err());
    }

    #[test]
    fn test_read_leb128_truncated() {
        let err = read_leb128_u32(&[0x80, 0x80], 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidModule);
        assert_eq!(err.code, codes::UNEXPECTED_END);
    }

    #[test]
    fn test_read_leb128_signed() {
        assert_eq!(read_leb128_i32(&[0x7F], 0).unwrap(), (-1, 1));
        assert_eq!(read_leb128_i32(&[0x80, 0x7F], 0).unwrap(), (-128, 2));
        assert_eq!(
            read_leb128_i32(&[0x80, 0x80, 0x80, 0x80, 0x78], 0).unwrap(),
            (i32::MIN, 5)
        );
        assert_eq!(read_leb128_i64(&[0x7F], 0).unwrap(), (-1, 1));
        assert_eq!(read_leb128_s33(&[0x40], 0).unwrap(), (-64, 1));
    }

    #[test]
    fn test_read_name() {
        let bytes = [0x04, b'm', b'a', b'i', b'n'];
        assert_eq!(read_name(&bytes, 0).unwrap(), ("main".to_string(), 5));
        assert!(read_name(&[0x02, 0xFF, 0xFE], 0).is_err());
    }
}
