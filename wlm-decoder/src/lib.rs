// WLM - wlm-decoder
// Module: WebAssembly Binary Decoder
//
// Copyright (c) 2024 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

#![forbid(unsafe_code)] // Rule 2

//! WebAssembly module decoder for the WLM runtime
//!
//! Turns a binary module into an immutable, validated [`Module`]. Decoding
//! fails with an `InvalidModule` error on malformed input and reports
//! features outside the supported subset as `UNSUPPORTED_FEATURE`.
//!
//! ```
//! let bytes = [0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00];
//! let module = wlm_decoder::decode_module(&bytes).unwrap();
//! assert!(module.exports.is_empty());
//! ```

#![warn(clippy::missing_panics_doc)]

pub mod instructions;
pub mod module;
pub mod parser;
pub mod section_error;
pub mod section_reader;
pub mod validation;

pub use instructions::{BlockType, BodyContext, FunctionBody, Instruction, MemArg};
pub use module::{
    ConstExpr, CustomSection, DataMode, DataSegment, ElementMode, ElementSegment, Export, Global, Import, Module,
};
pub use parser::{decode_module, decode_module_with_config};
pub use validation::{ValidationConfig, validate_module};
