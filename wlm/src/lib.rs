// WLM - wlm
// Module: Lifecycle Coordinator
//
// Copyright (c) 2024 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

#![forbid(unsafe_code)] // Rule 2

//! WebAssembly Lifecycle Manager (WLM)
//!
//! Load WebAssembly modules, instantiate them, call their exported
//! functions and tear them down again, from any number of threads.
//!
//! A [`Runtime`] hands out [`ModuleHandle`]s and [`InstanceHandle`]s.
//! Handles stay valid as values after their target is released; using one
//! then yields an error of kind [`ErrorKind::UseAfterFree`] rather than
//! touching freed state.
//!
//! Calls into one instance are serialized by its execution lock, calls
//! into different instances run in parallel. A trap ends one call and
//! leaves the instance usable. An engine fault taints the instance, after
//! which it can only be torn down.
//!
//! # Example
//!
//! ```
//! use wlm::{Runtime, RuntimeConfig, Value};
//!
//! let bytes = wat::parse_str(r#"(module
//!     (func (export "main") (param i32 i32) (result i32)
//!         local.get 0 local.get 1 i32.add))"#).unwrap();
//!
//! let runtime = Runtime::new(RuntimeConfig::default());
//! let module = runtime.load(&bytes).unwrap();
//! let instance = runtime.instantiate(module).unwrap();
//! let main = runtime.lookup_function(instance, "main").unwrap();
//! assert_eq!(runtime.call(&main, &[Value::I32(0), Value::I32(0)]).unwrap(), vec![Value::I32(0)]);
//!
//! runtime.deinstantiate(instance).unwrap();
//! runtime.unload(module).unwrap();
//! ```

#![warn(clippy::missing_panics_doc)]

pub mod config;
pub mod description;
pub mod handles;
pub mod lifecycle;
pub mod marshal;
pub mod runtime;

pub use config::{ResourceLimits, RuntimeConfig};
pub use description::{ExportDescription, ImportDescription, ModuleDescription, ModuleKind};
pub use handles::{ExportedFunction, InstanceHandle, ModuleHandle};
pub use lifecycle::{InstanceState, ModuleState};
pub use runtime::Runtime;
pub use wlm_decoder::ValidationConfig;
pub use wlm_error::{Error, ErrorCategory, ErrorKind, Result};
pub use wlm_format::{ExternKind, ExternType, FuncType, Value, ValueType};
pub use wlm_host::{HostBuilder, HostFunc, HostRegistry};
pub use wlm_runtime::{
    EngineError, EngineResult, ExecutionContext, ExecutionEngine, ExecutionStats, Extern, Imports, Interpreter,
    Invocation, Trap, TrapKind,
};
