// WLM - wlm-error
// Module: WLM Error Codes
//
// Copyright (c) 2024 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! Error codes for WLM
//!
//! Codes are grouped in ranges of one thousand per lifecycle area.
//! [`crate::ErrorKind::from_code`] relies on these ranges.

// Module store error codes (1000-1999)
/// Module bytes failed structural validation
pub const INVALID_MODULE: u16 = 1000;
/// Module bytes use a feature this runtime does not support
pub const UNSUPPORTED_FEATURE: u16 = 1001;
/// Binary ended before a complete item could be read
pub const UNEXPECTED_END: u16 = 1002;
/// Magic number or version header is wrong
pub const INVALID_HEADER: u16 = 1003;
/// A LEB128 integer is malformed or too long
pub const INVALID_LEB128: u16 = 1004;
/// Module limits from the validation configuration were exceeded
pub const VALIDATION_LIMIT_EXCEEDED: u16 = 1005;

// Linking error codes (2000-2999)
/// No provider was found for a declared import
pub const UNRESOLVED_IMPORT: u16 = 2000;
/// A provided value or argument disagrees with the declared type
pub const TYPE_MISMATCH: u16 = 2001;
/// Module and resolved imports are structurally incompatible
pub const LINK_ERROR: u16 = 2002;
/// Element segment does not fit into its table
pub const ELEMENT_SEGMENT_OUT_OF_BOUNDS: u16 = 2003;
/// Data segment does not fit into its memory
pub const DATA_SEGMENT_OUT_OF_BOUNDS: u16 = 2004;

// Execution error codes (3000-3999)
/// Start function trapped during instantiation
pub const INSTANTIATION_TRAP: u16 = 3000;
/// No function export exists with the requested name
pub const EXPORT_NOT_FOUND: u16 = 3001;
/// Argument count disagrees with the function signature
pub const ARITY_MISMATCH: u16 = 3002;
/// Invocation terminated abnormally
pub const TRAP: u16 = 3003;
/// The execution engine reported an internal fault
pub const ENGINE_FAULT: u16 = 3004;

// Lifecycle error codes (4000-4999)
/// Operation is not valid in the current lifecycle state
pub const ILLEGAL_STATE: u16 = 4000;
/// Resource still has live dependents
pub const IN_USE: u16 = 4001;
/// Handle refers to a released resource
pub const USE_AFTER_FREE: u16 = 4002;
/// Resource is busy executing and a non-blocking operation was requested
pub const BUSY: u16 = 4003;

// Resource error codes (5000-5999)
/// A configured resource limit was exceeded
pub const RESOURCE_LIMIT_EXCEEDED: u16 = 5000;
/// A memory could not be allocated or grown
pub const MEMORY_ALLOCATION_FAILED: u16 = 5001;
