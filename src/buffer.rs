// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Owned frame buffers with provider-side accounting.
//!
//! A `FrameBuffer` is the transport buffer attached to a received-frame
//! event. It is owned by exactly one component at a time and returned to its
//! provider when dropped. The provider tracks how many buffers are
//! outstanding so tests can verify that every dispatch path releases a
//! buffer exactly once.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

/// Hands out frame buffers and accounts for the ones still alive.
#[derive(Clone)]
pub struct BufferProvider {
    outstanding: Arc<AtomicUsize>,
}

impl BufferProvider {
    pub fn new() -> Self {
        Self { outstanding: Arc::new(AtomicUsize::new(0)) }
    }

    /// Wraps received bytes into an owned buffer tracked by this provider.
    pub fn take(&self, data: Vec<u8>) -> FrameBuffer {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        FrameBuffer { data, outstanding: Arc::clone(&self.outstanding) }
    }

    /// Number of buffers handed out and not yet released.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }
}

impl Default for BufferProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// An exclusively owned transport buffer. Dropping the buffer releases it
/// back to its provider; moving it transfers ownership. There is no way to
/// release a buffer twice or to keep a reference past release.
pub struct FrameBuffer {
    data: Vec<u8>,
    outstanding: Arc<AtomicUsize>,
}

impl FrameBuffer {
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..]
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Drop for FrameBuffer {
    fn drop(&mut self) {
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FrameBuffer({} bytes)", self.data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_and_release() {
        let provider = BufferProvider::new();
        assert_eq!(provider.outstanding(), 0);

        let buf = provider.take(vec![1, 2, 3]);
        assert_eq!(provider.outstanding(), 1);
        assert_eq!(buf.as_slice(), &[1, 2, 3]);

        drop(buf);
        assert_eq!(provider.outstanding(), 0);
    }

    #[test]
    fn transfer_does_not_release() {
        let provider = BufferProvider::new();
        let buf = provider.take(vec![0; 24]);

        // Moving the buffer into a new owner keeps it outstanding.
        let holder = Some(buf);
        assert_eq!(provider.outstanding(), 1);

        drop(holder);
        assert_eq!(provider.outstanding(), 0);
    }

    #[test]
    fn multiple_buffers() {
        let provider = BufferProvider::new();
        let a = provider.take(vec![1]);
        let b = provider.take(vec![2]);
        assert_eq!(provider.outstanding(), 2);
        drop(a);
        assert_eq!(provider.outstanding(), 1);
        drop(b);
        assert_eq!(provider.outstanding(), 0);
    }
}
