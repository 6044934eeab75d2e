// WLM - wlm-format
// Module: WebAssembly Format Handling
//
// Copyright (c) 2024 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! WebAssembly format handling for WLM.
//!
//! Binary constants, LEB128 and scalar readers, the type vocabulary shared by
//! all crates, and the runtime [`Value`].

#![forbid(unsafe_code)] // Rule 2
#![warn(missing_docs)]

#[allow(missing_docs)]
pub mod binary;
pub mod types;
pub mod values;

pub use types::{ExternKind, ExternType, FuncType, GlobalType, Limits, MemoryType, RefType, TableType, ValueType};
pub use values::Value;
