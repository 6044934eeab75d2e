// WLM - wlm-sync
// Module: Mutex and RwLock wrappers
//
// Copyright (c) 2024 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

use core::fmt;

use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A non-poisoning mutex backed by `parking_lot`.
///
/// Guards linear memories, tables and globals. Locks are held per access,
/// never across a call into another function.
pub struct WlmMutex<T: ?Sized> {
    inner: Mutex<T>,
}

/// RAII guard for [`WlmMutex`].
pub type WlmMutexGuard<'a, T> = MutexGuard<'a, T>;

impl<T> WlmMutex<T> {
    /// Creates a new mutex holding `data`.
    pub fn new(data: T) -> Self {
        Self { inner: Mutex::new(data) }
    }

    /// Consumes the mutex and returns the protected value.
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

impl<T: ?Sized> WlmMutex<T> {
    /// Acquires the lock, blocking the current thread until it is available.
    pub fn lock(&self) -> WlmMutexGuard<'_, T> {
        self.inner.lock()
    }

    /// Attempts to acquire the lock without blocking.
    pub fn try_lock(&self) -> Option<WlmMutexGuard<'_, T>> {
        self.inner.try_lock()
    }
}

impl<T: Default> Default for WlmMutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for WlmMutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_lock() {
            Some(guard) => f.debug_struct("WlmMutex").field("data", &&*guard).finish(),
            None => f.debug_struct("WlmMutex").field("data", &"<locked>").finish(),
        }
    }
}

/// A reader-writer lock backed by `parking_lot`.
///
/// Used for the module and instance registries: lookups take the read
/// side, lifecycle transitions take the write side.
pub struct WlmRwLock<T: ?Sized> {
    inner: RwLock<T>,
}

/// Shared guard for [`WlmRwLock`].
pub type WlmRwLockReadGuard<'a, T> = RwLockReadGuard<'a, T>;
/// Exclusive guard for [`WlmRwLock`].
pub type WlmRwLockWriteGuard<'a, T> = RwLockWriteGuard<'a, T>;

impl<T> WlmRwLock<T> {
    /// Creates a new lock holding `data`.
    pub fn new(data: T) -> Self {
        Self { inner: RwLock::new(data) }
    }
}

impl<T: ?Sized> WlmRwLock<T> {
    /// Acquires shared access.
    pub fn read(&self) -> WlmRwLockReadGuard<'_, T> {
        self.inner.read()
    }

    /// Acquires exclusive access.
    pub fn write(&self) -> WlmRwLockWriteGuard<'_, T> {
        self.inner.write()
    }
}

impl<T: Default> Default for WlmRwLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for WlmRwLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_read() {
            Some(guard) => f.debug_struct("WlmRwLock").field("data", &&*guard).finish(),
            None => f.debug_struct("WlmRwLock").field("data", &"<locked>").finish(),
        }
    }
}
