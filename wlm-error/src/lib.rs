// WLM - wlm-error
// Module: WLM Error Handling
//
// Copyright (c) 2024 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! WLM Error handling library
//!
//! Every fallible operation in the lifecycle manager returns [`Result`].
//! Errors carry a category, a numeric code and a message; the code
//! determines the [`ErrorKind`] a caller branches on.
//!
//! # Error Ranges
//!
//! ## Module Store (1000-1999)
//! - Malformed binaries, unsupported features, validation limits
//!
//! ## Linking (2000-2999)
//! - Unresolved imports, type mismatches, segment placement
//!
//! ## Execution (3000-3999)
//! - Start traps, missing exports, arity, traps, engine faults
//!
//! ## Lifecycle (4000-4999)
//! - Illegal transitions, in-use, use-after-free, busy
//!
//! ## Resources (5000-5999)
//! - Configured limits
//!
//! # Usage
//!
//! ```
//! use wlm_error::{Error, ErrorKind};
//!
//! let error = Error::unresolved_import("env", "print");
//! assert_eq!(error.kind(), ErrorKind::UnresolvedImport);
//! assert!(!error.is_recoverable());
//! ```

#![forbid(unsafe_code)] // Rule 2
#![warn(clippy::pedantic)]
#![deny(missing_docs)]
#![allow(clippy::module_name_repetitions)]

/// Error codes for wlm
pub mod codes;
/// Error and error handling types
pub mod errors;
/// Error kind classification
pub mod kinds;

pub use errors::{Error, ErrorCategory};
pub use kinds::ErrorKind;

/// A specialized `Result` type for WLM operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Conversion of crate-local error types into [`Error`]
///
/// Implemented by the decoder's section errors and the runtime's traps so
/// every crate hands a uniform error to the lifecycle coordinator.
pub trait FromError<E> {
    /// Convert from the source error type to the target error type
    fn from_error(error: E) -> Self;
}

impl<E: Into<Error>> FromError<E> for Error {
    fn from_error(error: E) -> Self {
        error.into()
    }
}
