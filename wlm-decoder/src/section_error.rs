// Enhanced error handling for WebAssembly section parsing
//
// Section-level failures carry the byte offset they were detected at and
// are converted into `InvalidModule` errors at the crate boundary.

use wlm_error::{Error, ErrorCategory, codes};

/// Specialized error enum for section parsing failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionError {
    /// Error when a section is invalid
    InvalidSection {
        id:     u8,
        offset: usize,
        msg:    String,
    },

    /// Error when unexpected end of data is encountered
    UnexpectedEnd {
        offset:   usize,
        expected: usize,
        actual:   usize,
    },

    /// Error when section content is malformed
    MalformedContent {
        offset:     usize,
        section_id: u8,
        msg:        String,
    },

    /// Error when a section size exceeds the module size
    SectionSizeExceedsModule {
        section_id:   u8,
        section_size: u32,
        module_size:  usize,
        offset:       usize,
    },

    /// Error when an incorrect magic header is encountered
    InvalidMagic {
        offset:   usize,
        expected: [u8; 4],
        actual:   [u8; 4],
    },

    /// Error when an unsupported version is encountered
    UnsupportedVersion {
        offset:   usize,
        expected: [u8; 4],
        actual:   [u8; 4],
    },

    /// Error when sections appear out of canonical order or twice
    OutOfOrder {
        id:       u8,
        offset:   usize,
        previous: u8,
    },
}

/// Extension trait to convert section errors to `wlm_error::Error`
pub trait SectionErrorExt {
    /// Convert a `SectionError` to an Error with appropriate context
    fn to_error(self) -> Error;
}

impl SectionErrorExt for SectionError {
    fn to_error(self) -> Error {
        match self {
            SectionError::InvalidSection { id, offset, msg } => Error::invalid_module(format!(
                "Invalid section (ID: 0x{id:02x}) at offset 0x{offset:x}: {msg}"
            )),
            SectionError::UnexpectedEnd {
                offset,
                expected,
                actual,
            } => Error::unexpected_end(format!(
                "Unexpected end of data at offset 0x{offset:x}: expected {expected} bytes, but only {actual} available"
            )),
            SectionError::MalformedContent {
                offset,
                section_id,
                msg,
            } => Error::invalid_module(format!(
                "Malformed content in section (ID: 0x{section_id:02x}) at offset 0x{offset:x}: {msg}"
            )),
            SectionError::SectionSizeExceedsModule {
                section_id,
                section_size,
                module_size,
                offset,
            } => Error::unexpected_end(format!(
                "Section size exceeds module size: section (ID: 0x{section_id:02x}) at offset 0x{offset:x} has size {section_size}, but module only has {module_size} bytes remaining"
            )),
            SectionError::InvalidMagic {
                offset,
                expected,
                actual,
            } => Error::with_message(
                ErrorCategory::Parse,
                codes::INVALID_HEADER,
                format!("Invalid WebAssembly magic bytes at offset 0x{offset:x}: expected {expected:?}, found {actual:?}"),
            ),
            SectionError::UnsupportedVersion {
                offset,
                expected,
                actual,
            } => Error::with_message(
                ErrorCategory::Parse,
                codes::INVALID_HEADER,
                format!("Unsupported WebAssembly version at offset 0x{offset:x}: expected {expected:?}, found {actual:?}"),
            ),
            SectionError::OutOfOrder { id, offset, previous } => Error::invalid_module(format!(
                "Section (ID: 0x{id:02x}) at offset 0x{offset:x} out of order or duplicated after section 0x{previous:02x}"
            )),
        }
    }
}

impl From<SectionError> for Error {
    fn from(error: SectionError) -> Self {
        error.to_error()
    }
}

/// Helper function to create an invalid section error
pub fn invalid_section(id: u8, offset: usize, msg: &str) -> Error {
    SectionError::InvalidSection {
        id,
        offset,
        msg: msg.to_string(),
    }
    .to_error()
}

/// Helper function to create an unexpected end error
pub fn unexpected_end(offset: usize, expected: usize, actual: usize) -> Error {
    SectionError::UnexpectedEnd {
        offset,
        expected,
        actual,
    }
    .to_error()
}

/// Helper function to create a malformed content error
pub fn malformed_content(offset: usize, section_id: u8, msg: &str) -> Error {
    SectionError::MalformedContent {
        offset,
        section_id,
        msg: msg.to_string(),
    }
    .to_error()
}
