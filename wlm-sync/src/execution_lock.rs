// WLM - wlm-sync
// Module: Per-instance execution lock
//
// Copyright (c) 2024 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! Serializes calls into one instance.
//!
//! The lock is reentrant so that a call may re-enter its own instance
//! through an imported function or a table. A depth counter records how many
//! calls the owning thread has in flight; teardown requires depth zero.

use core::fmt;
use core::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use wlm_error::{Error, Result};

/// Exclusive, reentrant execution lock owned by an instance.
#[derive(Default)]
pub struct ExecutionLock {
    lock:  ReentrantMutex<()>,
    depth: AtomicUsize,
}

/// Held for the duration of one call into the instance.
#[derive(Debug)]
pub struct ExecutionGuard<'a> {
    owner:  &'a ExecutionLock,
    _guard: ReentrantMutexGuard<'a, ()>,
}

/// Held by teardown; no call can be in flight while it exists.
#[derive(Debug)]
pub struct ExclusiveGuard<'a> {
    _guard: ReentrantMutexGuard<'a, ()>,
}

impl ExecutionLock {
    /// Creates an unlocked execution lock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until the calling thread owns the instance, then enters a call.
    pub fn enter(&self) -> ExecutionGuard<'_> {
        let guard = self.lock.lock();
        self.depth.fetch_add(1, Ordering::AcqRel);
        ExecutionGuard { owner: self, _guard: guard }
    }

    /// Enters a call if no other thread is executing in the instance.
    pub fn try_enter(&self) -> Result<ExecutionGuard<'_>> {
        let guard = self.lock.try_lock().ok_or(Error::BUSY)?;
        self.depth.fetch_add(1, Ordering::AcqRel);
        Ok(ExecutionGuard { owner: self, _guard: guard })
    }

    /// Blocks until no call is in flight and takes exclusive ownership.
    ///
    /// Fails with `Busy` when the calling thread itself is inside a call on
    /// this instance, since waiting would never finish.
    pub fn acquire_exclusive(&self) -> Result<ExclusiveGuard<'_>> {
        let guard = self.lock.lock();
        self.exclusive_from(guard)
    }

    /// Non-blocking [`ExecutionLock::acquire_exclusive`].
    pub fn try_acquire_exclusive(&self) -> Result<ExclusiveGuard<'_>> {
        let guard = self.lock.try_lock().ok_or(Error::BUSY)?;
        self.exclusive_from(guard)
    }

    fn exclusive_from<'a>(&'a self, guard: ReentrantMutexGuard<'a, ()>) -> Result<ExclusiveGuard<'a>> {
        // The depth is only written by the owning thread, which is us now.
        if self.depth.load(Ordering::Acquire) != 0 {
            return Err(Error::BUSY);
        }
        Ok(ExclusiveGuard { _guard: guard })
    }

    /// Whether some thread currently owns the lock.
    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }

    /// Calls in flight on the owning thread.
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }
}

impl Drop for ExecutionGuard<'_> {
    fn drop(&mut self) {
        self.owner.depth.fetch_sub(1, Ordering::AcqRel);
    }
}

impl fmt::Debug for ExecutionLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionLock")
            .field("locked", &self.is_locked())
            .field("depth", &self.depth())
            .finish()
    }
}
