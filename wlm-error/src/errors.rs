// WLM - wlm-error
// Module: WLM Error Types
//
// Copyright (c) 2024 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! The `Error` type shared by every WLM crate.

use std::borrow::Cow;
use std::fmt;

use crate::{ErrorKind, codes};

/// `Error` categories for WLM operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorCategory {
    /// Resource errors (memory, tables, limits)
    Resource       = 3,
    /// Validation errors
    Validation     = 5,
    /// Type errors
    Type           = 6,
    /// Runtime errors (general)
    Runtime        = 7,
    /// Parse errors
    Parse          = 10,
    /// Concurrency errors
    Concurrency    = 11,
    /// WebAssembly trap errors
    RuntimeTrap    = 13,
    /// Initialization errors
    Initialization = 14,
    /// Not supported operation errors
    NotSupported   = 15,
    /// Linking errors
    Link           = 21,
    /// Invalid state errors
    InvalidState   = 29,
}

/// WLM `Error` type
///
/// Carries a category, a numeric code from [`codes`] and a message. The
/// message is borrowed for the fixed constructors and owned when it names
/// a concrete import, export or state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    /// `Error` category
    pub category: ErrorCategory,
    /// `Error` code
    pub code:     u16,
    /// `Error` message
    pub message:  Cow<'static, str>,
}

impl Error {
    /// Export not found with no further detail
    pub const EXPORT_NOT_FOUND: Self = Self::new(
        ErrorCategory::Validation,
        codes::EXPORT_NOT_FOUND,
        "Export not found",
    );
    /// Handle used after its resource was released
    pub const USE_AFTER_FREE: Self = Self::new(
        ErrorCategory::InvalidState,
        codes::USE_AFTER_FREE,
        "Handle used after release",
    );
    /// Instance busy executing
    pub const BUSY: Self = Self::new(
        ErrorCategory::Concurrency,
        codes::BUSY,
        "Instance is executing a call",
    );

    /// Create a new error with a static message.
    #[must_use]
    pub const fn new(category: ErrorCategory, code: u16, message: &'static str) -> Self {
        Self {
            category,
            code,
            message: Cow::Borrowed(message),
        }
    }

    /// Create a new error with an owned message.
    #[must_use]
    pub fn with_message(category: ErrorCategory, code: u16, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            category,
            code,
            message: message.into(),
        }
    }

    /// Prefix the message with the operation that failed.
    #[must_use]
    pub fn context(mut self, context: impl fmt::Display) -> Self {
        self.message = Cow::Owned(format!("{context}: {}", self.message));
        self
    }

    /// The lifecycle kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        ErrorKind::from_code(self.code)
    }

    /// Whether this error may clear on retry.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        self.kind().is_recoverable()
    }

    /// Whether this error reports a trap, during instantiation or invocation.
    #[must_use]
    pub const fn is_trap(&self) -> bool {
        matches!(self.kind(), ErrorKind::Trap | ErrorKind::InstantiationTrap)
    }

    /// Create an invalid module error
    pub fn invalid_module(message: impl Into<Cow<'static, str>>) -> Self {
        Self::with_message(ErrorCategory::Validation, codes::INVALID_MODULE, message)
    }

    /// Create an unsupported feature error
    pub fn unsupported_feature(message: impl Into<Cow<'static, str>>) -> Self {
        Self::with_message(ErrorCategory::NotSupported, codes::UNSUPPORTED_FEATURE, message)
    }

    /// Create a parse error for a truncated binary
    pub fn unexpected_end(message: impl Into<Cow<'static, str>>) -> Self {
        Self::with_message(ErrorCategory::Parse, codes::UNEXPECTED_END, message)
    }

    /// Create an unresolved import error naming `module.name`
    #[must_use]
    pub fn unresolved_import(module: &str, name: &str) -> Self {
        Self::with_message(
            ErrorCategory::Link,
            codes::UNRESOLVED_IMPORT,
            format!("unresolved import {module}.{name}"),
        )
    }

    /// Create a type mismatch error naming expected and actual types
    #[must_use]
    pub fn type_mismatch(what: impl fmt::Display, expected: impl fmt::Display, actual: impl fmt::Display) -> Self {
        Self::with_message(
            ErrorCategory::Type,
            codes::TYPE_MISMATCH,
            format!("type mismatch for {what}: expected {expected}, found {actual}"),
        )
    }

    /// Create a link error
    pub fn link_error(message: impl Into<Cow<'static, str>>) -> Self {
        Self::with_message(ErrorCategory::Link, codes::LINK_ERROR, message)
    }

    /// Create an instantiation trap error carrying the trap reason
    #[must_use]
    pub fn instantiation_trap(reason: impl fmt::Display) -> Self {
        Self::with_message(
            ErrorCategory::Initialization,
            codes::INSTANTIATION_TRAP,
            format!("start function trapped: {reason}"),
        )
    }

    /// Create an export not found error
    #[must_use]
    pub fn export_not_found(name: &str) -> Self {
        Self::with_message(
            ErrorCategory::Validation,
            codes::EXPORT_NOT_FOUND,
            format!("no function export named \"{name}\""),
        )
    }

    /// Create an arity mismatch error
    #[must_use]
    pub fn arity_mismatch(expected: usize, passed: usize) -> Self {
        Self::with_message(
            ErrorCategory::Validation,
            codes::ARITY_MISMATCH,
            format!("argument count not match, {expected} expected, {passed} passed"),
        )
    }

    /// Create a trap error
    #[must_use]
    pub fn trap(reason: impl fmt::Display) -> Self {
        Self::with_message(ErrorCategory::RuntimeTrap, codes::TRAP, format!("trap: {reason}"))
    }

    /// Create an engine fault error
    pub fn engine_fault(message: impl Into<Cow<'static, str>>) -> Self {
        Self::with_message(ErrorCategory::Runtime, codes::ENGINE_FAULT, message)
    }

    /// Create an illegal state error naming the transition and current state
    #[must_use]
    pub fn illegal_state(transition: impl fmt::Display, state: impl fmt::Display) -> Self {
        Self::with_message(
            ErrorCategory::InvalidState,
            codes::ILLEGAL_STATE,
            format!("cannot {transition} while {state}"),
        )
    }

    /// Create an in-use error
    pub fn in_use(message: impl Into<Cow<'static, str>>) -> Self {
        Self::with_message(ErrorCategory::InvalidState, codes::IN_USE, message)
    }

    /// Create a use-after-free error
    pub fn use_after_free(message: impl Into<Cow<'static, str>>) -> Self {
        Self::with_message(ErrorCategory::InvalidState, codes::USE_AFTER_FREE, message)
    }

    /// Create a resource limit error
    pub fn resource_limit(message: impl Into<Cow<'static, str>>) -> Self {
        Self::with_message(ErrorCategory::Resource, codes::RESOURCE_LIMIT_EXCEEDED, message)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}][E{:04X}] {}", self.category, self.code, self.message)
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_category_and_code() {
        let err = Error::arity_mismatch(2, 1);
        assert_eq!(
            err.to_string(),
            "[Validation][E0BBA] argument count not match, 2 expected, 1 passed"
        );
    }

    #[test]
    fn context_prefixes_message() {
        let err = Error::link_error("data segment 0 out of bounds").context("instantiate");
        assert_eq!(err.message, "instantiate: data segment 0 out of bounds");
        assert_eq!(err.kind(), ErrorKind::LinkError);
    }

    #[test]
    fn trap_predicates() {
        assert!(Error::trap("unreachable").is_trap());
        assert!(Error::instantiation_trap("unreachable").is_trap());
        assert!(!Error::BUSY.is_trap());
        assert!(Error::BUSY.is_recoverable());
    }

    #[test]
    fn unresolved_import_names_both_parts() {
        let err = Error::unresolved_import("env", "log");
        assert!(err.message.contains("env.log"));
        assert_eq!(err.kind(), ErrorKind::UnresolvedImport);
    }
}
