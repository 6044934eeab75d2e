// WLM - wlm-sync
// Module: Synchronization primitives
//
// Copyright (c) 2024 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

#![doc = "Synchronization primitives (Mutex, RwLock, ExecutionLock) for the WLM project."]
#![forbid(unsafe_code)]
#![warn(clippy::missing_panics_doc)]

pub mod execution_lock;
pub mod mutex;

pub use execution_lock::{ExclusiveGuard, ExecutionGuard, ExecutionLock};
pub use mutex::*;
