//! Section reader for WebAssembly modules
//!
//! Verifies the module header and splits the binary into sections without
//! decoding their contents.

use wlm_error::Result;
use wlm_format::binary;

use crate::section_error::{SectionError, unexpected_end};

/// A raw section: its id, the offset of its content and the content bytes
#[derive(Debug, Clone, Copy)]
pub struct RawSection<'a> {
    /// Section id
    pub id:     u8,
    /// Offset of the first content byte within the module
    pub offset: usize,
    /// Section content
    pub data:   &'a [u8],
}

/// Reader for accessing WebAssembly module sections
#[derive(Debug)]
pub struct SectionReader<'a> {
    /// The WebAssembly binary data
    binary:         &'a [u8],
    /// Current offset in the binary
    current_offset: usize,
    /// Canonical rank of the last non-custom section
    last_rank:      u8,
    last_id:        u8,
}

/// Position of a section id in the canonical section order.
fn section_rank(id: u8) -> Option<u8> {
    match id {
        binary::TYPE_SECTION_ID => Some(1),
        binary::IMPORT_SECTION_ID => Some(2),
        binary::FUNCTION_SECTION_ID => Some(3),
        binary::TABLE_SECTION_ID => Some(4),
        binary::MEMORY_SECTION_ID => Some(5),
        binary::GLOBAL_SECTION_ID => Some(6),
        binary::EXPORT_SECTION_ID => Some(7),
        binary::START_SECTION_ID => Some(8),
        binary::ELEMENT_SECTION_ID => Some(9),
        binary::DATA_COUNT_SECTION_ID => Some(10),
        binary::CODE_SECTION_ID => Some(11),
        binary::DATA_SECTION_ID => Some(12),
        _ => None,
    }
}

impl<'a> SectionReader<'a> {
    /// Create a new section reader for a WebAssembly binary
    ///
    /// Verifies the WebAssembly header, then positions at the first section.
    pub fn new(binary: &'a [u8]) -> Result<Self> {
        if binary.len() < 8 {
            return Err(unexpected_end(0, 8, binary.len()));
        }

        let mut actual_magic = [0u8; 4];
        actual_magic.copy_from_slice(&binary[0..4]);
        if actual_magic != binary::WASM_MAGIC {
            return Err(SectionError::InvalidMagic {
                offset:   0,
                expected: binary::WASM_MAGIC,
                actual:   actual_magic,
            }
            .into());
        }

        let mut actual_version = [0u8; 4];
        actual_version.copy_from_slice(&binary[4..8]);
        if actual_version != binary::WASM_VERSION {
            return Err(SectionError::UnsupportedVersion {
                offset:   4,
                expected: binary::WASM_VERSION,
                actual:   actual_version,
            }
            .into());
        }

        Ok(Self {
            binary,
            current_offset: 8,
            last_rank: 0,
            last_id: 0,
        })
    }

    /// Read the next section, or `None` at the end of the module.
    pub fn next_section(&mut self) -> Result<Option<RawSection<'a>>> {
        if self.current_offset >= self.binary.len() {
            return Ok(None);
        }

        let header_offset = self.current_offset;
        let id = self.binary[self.current_offset];
        self.current_offset += 1;

        let (section_size, bytes_read) = binary::read_leb128_u32(self.binary, self.current_offset)?;
        self.current_offset += bytes_read;

        let remaining = self.binary.len() - self.current_offset;
        if section_size as usize > remaining {
            return Err(SectionError::SectionSizeExceedsModule {
                section_id: id,
                section_size,
                module_size: remaining,
                offset: header_offset,
            }
            .into());
        }

        if id != binary::CUSTOM_SECTION_ID {
            let Some(rank) = section_rank(id) else {
                return Err(SectionError::InvalidSection {
                    id,
                    offset: header_offset,
                    msg: "unknown section id".to_string(),
                }
                .into());
            };
            if rank <= self.last_rank {
                return Err(SectionError::OutOfOrder {
                    id,
                    offset: header_offset,
                    previous: self.last_id,
                }
                .into());
            }
            self.last_rank = rank;
            self.last_id = id;
        }

        let offset = self.current_offset;
        let data = &self.binary[offset..offset + section_size as usize];
        self.current_offset += section_size as usize;

        Ok(Some(RawSection { id, offset, data }))
    }
}

#[cfg(test)]
mod tests {
    use wlm_error::{ErrorKind, codes};

    use super::*;

    const HEADER: [u8; 8] = [0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00];

    fn module(sections: &[u8]) -> Vec<u8> {
        let mut bytes = HEADER.to_vec();
        bytes.extend_from_slice(sections);
        bytes
    }

    #[test]
    fn empty_module_has_no_sections() {
        let bytes = module(&[]);
        let mut reader = SectionReader::new(&bytes).unwrap();
        assert!(reader.next_section().unwrap().is_none());
    }

    #[test]
    fn rejects_bad_magic_and_version() {
        let err = SectionReader::new(&[0x00, 0x61, 0x73, 0x6e, 1, 0, 0, 0]).unwrap_err();
        assert_eq!(err.code, codes::INVALID_HEADER);
        let err = SectionReader::new(&[0x00, 0x61, 0x73, 0x6d, 2, 0, 0, 0]).unwrap_err();
        assert_eq!(err.code, codes::INVALID_HEADER);
        let err = SectionReader::new(&[0x00, 0x61]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidModule);
    }

    #[test]
    fn reads_sections_with_offsets() {
        // type section with zero entries, then a custom section "x"
        let bytes = module(&[0x01, 0x01, 0x00, 0x00, 0x02, 0x01, b'x']);
        let mut reader = SectionReader::new(&bytes).unwrap();
        let first = reader.next_section().unwrap().unwrap();
        assert_eq!((first.id, first.offset, first.data), (1, 10, &[0x00][..]));
        let second = reader.next_section().unwrap().unwrap();
        assert_eq!(second.id, 0);
        assert!(reader.next_section().unwrap().is_none());
    }

    #[test]
    fn rejects_out_of_order_and_duplicate_sections() {
        // export section followed by type section
        let bytes = module(&[0x07, 0x01, 0x00, 0x01, 0x01, 0x00]);
        let mut reader = SectionReader::new(&bytes).unwrap();
        reader.next_section().unwrap();
        assert!(reader.next_section().is_err());

        let bytes = module(&[0x01, 0x01, 0x00, 0x01, 0x01, 0x00]);
        let mut reader = SectionReader::new(&bytes).unwrap();
        reader.next_section().unwrap();
        assert!(reader.next_section().is_err());
    }

    #[test]
    fn rejects_oversized_and_unknown_sections() {
        let bytes = module(&[0x01, 0x05, 0x00]);
        let mut reader = SectionReader::new(&bytes).unwrap();
        assert_eq!(reader.next_section().unwrap_err().code, codes::UNEXPECTED_END);

        let bytes = module(&[0x0d, 0x00]);
        let mut reader = SectionReader::new(&bytes).unwrap();
        assert_eq!(reader.next_section().unwrap_err().kind(), ErrorKind::InvalidModule);
    }
}
