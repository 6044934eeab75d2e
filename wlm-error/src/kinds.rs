// WLM - wlm-error
// Module: WLM Error Kinds
//
// Copyright (c) 2024 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! Classification of errors by lifecycle meaning.

use core::fmt;

use crate::codes;

/// The failure kinds surfaced by the lifecycle manager.
///
/// Several error codes may share one kind; for example both
/// [`codes::INVALID_MODULE`] and [`codes::UNSUPPORTED_FEATURE`] are
/// [`ErrorKind::InvalidModule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Module bytes were malformed or used an unsupported feature
    InvalidModule,
    /// A declared import had no provider
    UnresolvedImport,
    /// A provider or argument disagreed with the declared type
    TypeMismatch,
    /// Module and imports are structurally incompatible
    LinkError,
    /// The start function trapped
    InstantiationTrap,
    /// No function export with the requested name
    ExportNotFound,
    /// Wrong number of arguments
    ArityMismatch,
    /// Invocation terminated abnormally
    Trap,
    /// Engine-internal fault; the instance is tainted
    EngineFault,
    /// Operation outside its valid lifecycle state
    IllegalState,
    /// Resource still has live dependents
    InUse,
    /// Handle refers to a released resource
    UseAfterFree,
    /// Resource busy and a non-blocking operation was requested
    Busy,
    /// A configured limit was exceeded
    ResourceExhausted,
}

impl ErrorKind {
    /// Classify an error code.
    #[must_use]
    pub const fn from_code(code: u16) -> Self {
        match code {
            codes::UNRESOLVED_IMPORT => Self::UnresolvedImport,
            codes::TYPE_MISMATCH => Self::TypeMismatch,
            codes::LINK_ERROR
            | codes::ELEMENT_SEGMENT_OUT_OF_BOUNDS
            | codes::DATA_SEGMENT_OUT_OF_BOUNDS => Self::LinkError,
            codes::INSTANTIATION_TRAP => Self::InstantiationTrap,
            codes::EXPORT_NOT_FOUND => Self::ExportNotFound,
            codes::ARITY_MISMATCH => Self::ArityMismatch,
            codes::TRAP => Self::Trap,
            codes::ENGINE_FAULT => Self::EngineFault,
            codes::ILLEGAL_STATE => Self::IllegalState,
            codes::IN_USE => Self::InUse,
            codes::USE_AFTER_FREE => Self::UseAfterFree,
            codes::BUSY => Self::Busy,
            1000..=1999 => Self::InvalidModule,
            _ => Self::ResourceExhausted,
        }
    }

    /// Whether a caller may retry after the condition clears.
    #[must_use]
    pub const fn is_recoverable(self) -> bool {
        matches!(self, Self::InUse | Self::Busy | Self::ResourceExhausted)
    }

    /// Whether the kind is detected before any engine call.
    #[must_use]
    pub const fn is_validation(self) -> bool {
        matches!(
            self,
            Self::InvalidModule
                | Self::UnresolvedImport
                | Self::TypeMismatch
                | Self::ArityMismatch
                | Self::ExportNotFound
                | Self::IllegalState
        )
    }

    /// Whether the kind originates inside the execution engine.
    #[must_use]
    pub const fn is_engine_failure(self) -> bool {
        matches!(self, Self::InstantiationTrap | Self::Trap | Self::EngineFault)
    }

    /// Human readable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidModule => "InvalidModule",
            Self::UnresolvedImport => "UnresolvedImport",
            Self::TypeMismatch => "TypeMismatch",
            Self::LinkError => "LinkError",
            Self::InstantiationTrap => "InstantiationTrap",
            Self::ExportNotFound => "ExportNotFound",
            Self::ArityMismatch => "ArityMismatch",
            Self::Trap => "Trap",
            Self::EngineFault => "EngineFault",
            Self::IllegalState => "IllegalState",
            Self::InUse => "InUse",
            Self::UseAfterFree => "UseAfterFree",
            Self::Busy => "Busy",
            Self::ResourceExhausted => "ResourceExhausted",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
