// Copyright (c) 2024 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

#![forbid(unsafe_code)] // Rule 2

//! Host function infrastructure for the WebAssembly Lifecycle Manager (WLM).
//!
//! Host functions are native closures that modules import. They are
//! collected into a [`HostRegistry`], usually through a [`HostBuilder`], and
//! offered to the import resolver when a module is instantiated.
//!
//! ## Features
//!
//! - Host function registration keyed by module and field name
//! - Cloneable, thread-safe handlers
//! - Result shape checking against the declared signature

#![warn(missing_docs)]
#![warn(clippy::missing_panics_doc)]

pub mod builder;
pub mod callback;
pub mod function;

pub use builder::HostBuilder;
pub use callback::{HostRegistry, function_key};
pub use function::{CloneableFn, FnWithValues, HostFunc, HostFunctionHandler};
