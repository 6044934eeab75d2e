// WLM - wlm-runtime
// Module: Instances and Execution
//
// Copyright (c) 2024 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

#![forbid(unsafe_code)] // Rule 2

//! Import resolution, instances and execution for the WebAssembly
//! Lifecycle Manager (WLM).
//!
//! This crate sits between the decoder and the lifecycle coordinator:
//!
//! - [`linker`] binds a module's imports to host functions and to the
//!   exports of other instances.
//! - [`instance`] allocates memories, tables and globals, applies segments
//!   and runs the start function.
//! - [`invocation`] performs checked calls under an instance's execution
//!   lock.
//! - [`engine`] is the seam to the code executor; [`Interpreter`] is the
//!   bundled implementation.
//!
//! ```
//! use std::sync::Arc;
//!
//! use wlm_format::Value;
//! use wlm_runtime::{Imports, InstanceConfig, InstanceCore, Interpreter, Invocation, execute};
//!
//! let bytes = wat::parse_str(r#"(module (func (export "add") (param i32 i32) (result i32)
//!     local.get 0 local.get 1 i32.add))"#).unwrap();
//! let module = Arc::new(wlm_decoder::decode_module(&bytes).unwrap());
//! let engine = Interpreter::new();
//! let instance = InstanceCore::instantiate(module, &Imports::new(), &InstanceConfig::default(), &engine).unwrap();
//! let index = instance.exported_function("add").unwrap();
//! let out = execute(&engine, &instance, index, &[Value::I32(2), Value::I32(3)]).unwrap();
//! assert_eq!(out, Invocation::Returned(vec![Value::I32(5)]));
//! ```

#![warn(clippy::missing_panics_doc)]

pub mod engine;
pub mod externals;
pub mod func;
pub mod global;
pub mod instance;
pub mod interpreter;
pub mod invocation;
pub mod linker;
pub mod memory;
pub mod stats;
pub mod table;
pub mod trap;

pub use engine::{EngineError, EngineResult, ExecutionContext, ExecutionEngine};
pub use externals::{Extern, SharedGlobal, SharedMemory, SharedTable};
pub use func::{FuncRef, Function, WasmFunc};
pub use global::Global;
pub use instance::{InstanceConfig, InstanceCore};
pub use interpreter::Interpreter;
pub use invocation::{Invocation, execute};
pub use linker::{Imports, ResolvedImports, resolve_imports};
pub use memory::Memory;
pub use stats::ExecutionStats;
pub use table::Table;
pub use trap::{Trap, TrapKind};
