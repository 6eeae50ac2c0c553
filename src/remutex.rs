// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! A reentrant mutual-exclusion primitive with owner tracking and nested
//! acquisition counting.
//!
//! Handlers are invoked while the dispatch lock may already be held, and may
//! call back into paths that re-acquire it. A thread that already owns the
//! lock increments a nesting count instead of blocking; the underlying
//! primitive only unlocks once every acquisition has been matched by a
//! release. Neither `std` nor `parking_lot` exposes the release-error and
//! explicit-destroy semantics required here, so the bookkeeping is done
//! directly over a `Mutex` + `Condvar` pair.

use {
    std::sync::{Condvar, Mutex},
    std::thread::{self, ThreadId},
    thiserror::Error,
};

const LOCK_COOKIE: u32 = 0x1272_3c04;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LockError {
    #[error("lock is not initialized or already destroyed")]
    Invalid,
    #[error("calling thread does not own the lock")]
    NotOwner,
    #[error("lock is still held")]
    Busy,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum LockState {
    Released,
    Acquired,
    Destroyed,
}

struct Inner {
    cookie: u32,
    state: LockState,
    owner: Option<ThreadId>,
    refcount: u32,
}

pub struct ReentrantMutex {
    inner: Mutex<Inner>,
    cv: Condvar,
}

impl ReentrantMutex {
    /// Initializes the lock in the released state with a nesting count of
    /// zero.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                cookie: LOCK_COOKIE,
                state: LockState::Released,
                owner: None,
                refcount: 0,
            }),
            cv: Condvar::new(),
        }
    }

    /// Acquires the lock, blocking until it is available. If the calling
    /// thread already owns the lock the nesting count is incremented and the
    /// call returns immediately.
    pub fn acquire(&self) -> Result<(), LockError> {
        let mut inner = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if inner.cookie != LOCK_COOKIE {
            return Err(LockError::Invalid);
        }
        let me = thread::current().id();
        if inner.state == LockState::Acquired && inner.owner == Some(me) {
            inner.refcount += 1;
            return Ok(());
        }
        while inner.state == LockState::Acquired {
            inner = match self.cv.wait(inner) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
        if inner.state == LockState::Destroyed || inner.cookie != LOCK_COOKIE {
            return Err(LockError::Invalid);
        }
        inner.state = LockState::Acquired;
        inner.owner = Some(me);
        inner.refcount = 1;
        Ok(())
    }

    /// Releases one level of nesting. The lock is only unlocked, and other
    /// waiters woken, when the count reaches zero. Releasing from a thread
    /// that does not own the lock is an error.
    pub fn release(&self) -> Result<(), LockError> {
        let mut inner = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if inner.cookie != LOCK_COOKIE {
            return Err(LockError::Invalid);
        }
        if inner.owner != Some(thread::current().id()) {
            return Err(LockError::NotOwner);
        }
        if inner.refcount > 0 {
            inner.refcount -= 1;
        }
        if inner.refcount > 0 {
            return Ok(());
        }
        inner.owner = None;
        inner.state = LockState::Released;
        self.cv.notify_one();
        Ok(())
    }

    /// Tears the lock down. Fails with `Busy` while any thread still holds
    /// it. A destroyed lock rejects all further operations.
    pub fn destroy(&self) -> Result<(), LockError> {
        let mut inner = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if inner.cookie != LOCK_COOKIE {
            return Err(LockError::Invalid);
        }
        if inner.state == LockState::Acquired {
            return Err(LockError::Busy);
        }
        inner.cookie = 0;
        inner.state = LockState::Destroyed;
        inner.owner = None;
        inner.refcount = 0;
        Ok(())
    }
}

impl Default for ReentrantMutex {
    fn default() -> Self {
        Self::new()
    }
}
