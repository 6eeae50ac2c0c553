// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {crate::remutex::LockError, thiserror::Error};

#[derive(Debug, Error)]
pub enum Error {
    #[error("frame too short for a management header: {0} bytes")]
    FrameTooShort(usize),
    #[error("unexpected frame with protocol version {0}")]
    UnsupportedProtocolVersion(u8),
    #[error("session table is full")]
    TooManySessions,
    #[error("no session with id {0}")]
    NoSuchSession(u8),
    #[error("firmware request rejected: {0}")]
    FirmwareRequestRejected(String),
    #[error("lock error: {0}")]
    Lock(#[from] LockError),
    #[error("{0}")]
    Internal(#[from] anyhow::Error),
}
